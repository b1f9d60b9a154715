use serde_json::{json, Value};
use sysinfo::{NetworkExt, System, SystemExt};

use crate::collectors::report::ReportBuilder;
use crate::collectors::{CollectorContext, EvidenceCollector};
use crate::constants::SUSPICIOUS_PORTS;
use crate::exec::CommandOutput;
use crate::models::{CollectionResult, Domain};

/// Collector for network evidence: interfaces, connections, routing and ARP
/// state, plus tshark capability when the advanced tier is enabled.
pub struct NetworkCollector {
    system: System,
}

impl NetworkCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_networks_list();
        Self { system }
    }

    fn network_interfaces(&mut self) -> Value {
        self.system.refresh_networks_list();
        self.system.refresh_networks();

        let mut interfaces: Vec<Value> = self
            .system
            .networks()
            .into_iter()
            .map(|(name, data)| {
                json!({
                    "name": name,
                    "received_bytes": data.total_received(),
                    "transmitted_bytes": data.total_transmitted(),
                    "received_packets": data.total_packets_received(),
                    "transmitted_packets": data.total_packets_transmitted(),
                })
            })
            .collect();

        interfaces.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        json!({ "interfaces": interfaces })
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceCollector for NetworkCollector {
    fn domain(&self) -> Domain {
        Domain::Network
    }

    fn execute(&mut self, ctx: &CollectorContext) -> CollectionResult {
        let mut report = ReportBuilder::new(Domain::Network);

        report.log_command("sysinfo::networks()", "Enumerate network interfaces");
        let interfaces = self.network_interfaces();
        report.record("network_interfaces", |r| {
            r.used_core_tool("sysinfo");
            Ok(interfaces)
        });

        let mut connections_output: Option<CommandOutput> = None;

        #[cfg(target_os = "linux")]
        {
            report.record("active_connections", |r| {
                let out = r.run_command(
                    ctx.runner,
                    "ss",
                    &["-tunap"],
                    "List active network connections",
                );
                connections_output = Some(out.clone());
                Ok(out.as_finding())
            });
            report.record("listening_ports", |r| {
                let out = r.run_command(ctx.runner, "ss", &["-tln"], "Identify listening ports");
                Ok(out.as_finding())
            });
            report.record("routing_table", |r| {
                let out = r.run_command(ctx.runner, "ip", &["route"], "Display routing table");
                Ok(out.as_finding())
            });
        }

        #[cfg(all(unix, not(target_os = "linux")))]
        {
            report.record("active_connections", |r| {
                let out = r.run_command(
                    ctx.runner,
                    "netstat",
                    &["-anv"],
                    "List active network connections",
                );
                connections_output = Some(out.clone());
                Ok(out.as_finding())
            });
            report.record("routing_table", |r| {
                let out = r.run_command(ctx.runner, "netstat", &["-rn"], "Display routing table");
                Ok(out.as_finding())
            });
        }

        #[cfg(windows)]
        {
            report.record("active_connections", |r| {
                let out = r.run_command(
                    ctx.runner,
                    "netstat",
                    &["-ano"],
                    "List active network connections",
                );
                connections_output = Some(out.clone());
                Ok(out.as_finding())
            });
            report.record("routing_table", |r| {
                let out = r.run_command(ctx.runner, "route", &["print"], "Display routing table");
                Ok(out.as_finding())
            });
        }

        report.record("arp_cache", |r| {
            let out = r.run_command(ctx.runner, "arp", &["-a"], "Display ARP cache table");
            Ok(out.as_finding())
        });

        report.log_command(
            "connection heuristics",
            "Scan connection table for suspicious remote ports",
        );
        let suspicious = connections_output
            .as_ref()
            .map(|out| suspicious_connections(&out.stdout))
            .unwrap_or_else(|| json!({ "ports_checked": SUSPICIOUS_PORTS, "matches": [] }));
        report.record("suspicious_connections", |_| Ok(suspicious));

        if ctx.advanced_enabled {
            report.record_gated(ctx.probe, "tshark", "tshark_capture", |r, _descriptor| {
                let out = r.run_command(
                    ctx.runner,
                    "tshark",
                    &["-D"],
                    "List capture-capable interfaces",
                );
                Ok(json!({
                    "capture_interfaces": out.stdout_lines(),
                    "note": "deep packet analysis available via tshark",
                }))
            });
        }

        report.finish(ctx.session)
    }
}

/// Scan a connection listing for remote ports associated with remote-access
/// tooling. Textual heuristics only; packet-level decoding is out of scope.
fn suspicious_connections(listing: &str) -> Value {
    let matches: Vec<Value> = listing
        .lines()
        .filter_map(|line| {
            SUSPICIOUS_PORTS
                .iter()
                .find(|port| line.contains(&format!(":{}", port)))
                .map(|port| json!({ "port": port, "line": line.trim() }))
        })
        .take(50)
        .collect();

    json!({
        "ports_checked": SUSPICIOUS_PORTS,
        "matches": matches,
    })
}
