use std::collections::BTreeMap;
#[cfg(unix)]
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use crate::collectors::report::ReportBuilder;
use crate::collectors::{CollectorContext, EvidenceCollector};
use crate::models::{CollectionResult, Domain};

lazy_static! {
    static ref ACCEPTED_LOGIN: Regex = Regex::new(r"(?i)accepted \w+ for (\S+) from (\S+)").unwrap();
    static ref FAILED_LOGIN: Regex = Regex::new(r"(?i)failed password for (?:invalid user )?(\S+) from (\S+)").unwrap();
    static ref BREAK_IN: Regex = Regex::new(r"(?i)possible break-in attempt|invalid user").unwrap();
    static ref SUDO_COMMAND: Regex = Regex::new(r"sudo:\s+(\S+).*COMMAND=(.+)$").unwrap();
    static ref SOURCE_ADDR: Regex = Regex::new(r"from (\d{1,3}(?:\.\d{1,3}){3})").unwrap();
}

/// Collector for log evidence: authentication events, login history,
/// scheduled tasks and log inventory, plus timeline-tooling capability when
/// the advanced tier is enabled.
pub struct LogCollector;

impl LogCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceCollector for LogCollector {
    fn domain(&self) -> Domain {
        Domain::Log
    }

    fn execute(&mut self, ctx: &CollectorContext) -> CollectionResult {
        let mut report = ReportBuilder::new(Domain::Log);

        report.log_command("log path inventory", "Check configured log files for presence");
        let inventory = log_inventory(&ctx.config.log_paths);
        report.record("log_inventory", |_| Ok(inventory));

        #[cfg(unix)]
        self.execute_unix(ctx, &mut report);

        #[cfg(windows)]
        self.execute_windows(ctx, &mut report);

        if ctx.advanced_enabled {
            report.record_gated(
                ctx.probe,
                "log2timeline",
                "timeline_analysis",
                |_, descriptor| {
                    Ok(json!({
                        "log2timeline_path": descriptor.resolved_path,
                        "note": "super-timeline generation available; requires an output storage path",
                    }))
                },
            );
        }

        report.finish(ctx.session)
    }
}

impl LogCollector {
    #[cfg(unix)]
    fn execute_unix(&self, ctx: &CollectorContext, report: &mut ReportBuilder) {
        let auth_log = ctx
            .config
            .log_paths
            .iter()
            .find(|p| Path::new(p).is_file() && (p.contains("auth") || p.contains("secure")))
            .cloned();

        report.record("auth_events", |r| {
            let Some(path) = auth_log.as_deref() else {
                return Ok(json!({
                    "note": "no readable authentication log among configured paths",
                    "successful_logins": [],
                    "failed_attempts": [],
                    "suspicious_activity": [],
                }));
            };
            let out = r.run_command(
                ctx.runner,
                "tail",
                &["-n", "200", path],
                "Read the tail of the authentication log",
            );
            Ok(classify_auth_lines(&out.stdout))
        });

        report.record("ssh_attempts", |r| {
            let Some(path) = auth_log.as_deref() else {
                return Ok(json!({ "sources": {} }));
            };
            let out = r.run_command(
                ctx.runner,
                "tail",
                &["-n", "200", path],
                "Count SSH attempt sources from the authentication log",
            );
            Ok(ssh_attempt_sources(&out.stdout))
        });

        report.record("sudo_commands", |r| {
            let Some(path) = auth_log.as_deref() else {
                return Ok(json!({ "commands": [] }));
            };
            let out = r.run_command(
                ctx.runner,
                "tail",
                &["-n", "200", path],
                "Extract sudo command invocations",
            );
            Ok(sudo_commands(&out.stdout))
        });

        report.record("recent_logins", |r| {
            let out = r.run_command(ctx.runner, "last", &["-n", "50"], "Show recent logins");
            Ok(out.as_finding())
        });

        report.record("failed_logins", |r| {
            let out = r.run_command(
                ctx.runner,
                "lastb",
                &["-n", "50"],
                "Show recent failed logins",
            );
            Ok(out.as_finding())
        });

        report.record("cron_jobs", |r| {
            let out = r.run_command(
                ctx.runner,
                "crontab",
                &["-l"],
                "List the current user's scheduled jobs",
            );
            let system_cron = list_directory("/etc/cron.d");
            Ok(json!({
                "user_crontab": out.stdout_lines(),
                "system_cron_entries": system_cron,
            }))
        });
    }

    #[cfg(windows)]
    fn execute_windows(&self, ctx: &CollectorContext, report: &mut ReportBuilder) {
        for (finding, channel) in [
            ("security_events", "Security"),
            ("system_events", "System"),
            ("application_events", "Application"),
        ] {
            report.record(finding, |r| {
                let out = r.run_command(
                    ctx.runner,
                    "wevtutil",
                    &["qe", channel, "/c:50", "/rd:true", "/f:text"],
                    "Query recent Windows event log entries",
                );
                Ok(out.as_finding())
            });
        }
    }
}

/// Presence and size of every configured log path.
fn log_inventory(paths: &[String]) -> Value {
    let entries: Vec<Value> = paths
        .iter()
        .map(|path| {
            let metadata = std::fs::metadata(path).ok();
            json!({
                "path": path,
                "present": metadata.is_some(),
                "size": metadata.map(|m| m.len()),
            })
        })
        .collect();
    json!({ "paths": entries })
}

/// Classify authentication log lines into the buckets investigators look at
/// first.
fn classify_auth_lines(text: &str) -> Value {
    let mut successful = Vec::new();
    let mut failed = Vec::new();
    let mut suspicious = Vec::new();

    for line in text.lines() {
        if ACCEPTED_LOGIN.is_match(line) {
            successful.push(line.trim().to_string());
        } else if FAILED_LOGIN.is_match(line) {
            failed.push(line.trim().to_string());
        } else if BREAK_IN.is_match(line) {
            suspicious.push(line.trim().to_string());
        }
    }

    json!({
        "successful_logins": successful,
        "failed_attempts": failed,
        "suspicious_activity": suspicious,
    })
}

/// Count failed-attempt source addresses, ordered for stable serialization.
fn ssh_attempt_sources(text: &str) -> Value {
    let mut sources: BTreeMap<String, u64> = BTreeMap::new();

    for line in text.lines() {
        if FAILED_LOGIN.is_match(line) {
            if let Some(caps) = SOURCE_ADDR.captures(line) {
                *sources.entry(caps[1].to_string()).or_insert(0) += 1;
            }
        }
    }

    json!({ "sources": sources })
}

fn sudo_commands(text: &str) -> Value {
    let commands: Vec<Value> = text
        .lines()
        .filter_map(|line| {
            SUDO_COMMAND.captures(line).map(|caps| {
                json!({
                    "user": caps[1].to_string(),
                    "command": caps[2].trim().to_string(),
                })
            })
        })
        .collect();
    json!({ "commands": commands })
}

#[cfg(unix)]
fn list_directory(path: &str) -> Vec<String> {
    std::fs::read_dir(path)
        .map(|entries| {
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            names
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_AUTH_LOG: &str = "\
Jan 10 10:00:01 host sshd[100]: Accepted publickey for alice from 10.0.0.2 port 5000 ssh2
Jan 10 10:00:05 host sshd[101]: Failed password for root from 203.0.113.9 port 40000 ssh2
Jan 10 10:00:06 host sshd[102]: Failed password for invalid user admin from 203.0.113.9 port 40001 ssh2
Jan 10 10:00:09 host sshd[103]: Failed password for bob from 198.51.100.7 port 41000 ssh2
Jan 10 10:01:00 host sudo:    alice : TTY=pts/0 ; PWD=/home/alice ; USER=root ; COMMAND=/usr/bin/cat /etc/shadow
Jan 10 10:02:00 host sshd[104]: Invalid user oracle from 203.0.113.9";

    #[test]
    fn test_classify_auth_lines() {
        let classified = classify_auth_lines(SAMPLE_AUTH_LOG);
        assert_eq!(classified["successful_logins"].as_array().unwrap().len(), 1);
        assert_eq!(classified["failed_attempts"].as_array().unwrap().len(), 3);
        assert_eq!(classified["suspicious_activity"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_ssh_attempt_sources_counted() {
        let sources = ssh_attempt_sources(SAMPLE_AUTH_LOG);
        assert_eq!(sources["sources"]["203.0.113.9"], 2);
        assert_eq!(sources["sources"]["198.51.100.7"], 1);
    }

    #[test]
    fn test_sudo_commands_extracted() {
        let commands = sudo_commands(SAMPLE_AUTH_LOG);
        let list = commands["commands"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["user"], "alice");
        assert!(list[0]["command"].as_str().unwrap().contains("/etc/shadow"));
    }

    #[test]
    fn test_log_inventory_marks_missing() {
        let inventory = log_inventory(&["/nonexistent/auth.log".to_string()]);
        let entry = &inventory["paths"][0];
        assert_eq!(entry["present"], false);
        assert!(entry["size"].is_null());
    }

    #[test]
    fn test_classify_empty_input() {
        let classified = classify_auth_lines("");
        assert!(classified["failed_attempts"].as_array().unwrap().is_empty());
    }
}
