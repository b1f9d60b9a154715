use serde_json::{json, Value};
use sysinfo::{PidExt, ProcessExt, ProcessStatus, System, SystemExt};

use crate::collectors::report::ReportBuilder;
use crate::collectors::{CollectorContext, EvidenceCollector};
use crate::constants::MAX_PROCESS_ENTRIES;
use crate::models::{CollectionResult, Domain};

/// Collector for volatile memory evidence: running processes, memory
/// pressure, loaded modules and suspicious-process heuristics, plus
/// Volatility capability when the advanced tier is enabled.
pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self { system }
    }

    fn memory_stats(&mut self) -> Value {
        self.system.refresh_memory();
        json!({
            "total_memory": self.system.total_memory(),
            "used_memory": self.system.used_memory(),
            "total_swap": self.system.total_swap(),
            "used_swap": self.system.used_swap(),
        })
    }

    fn running_processes(&self) -> Value {
        let mut processes: Vec<Value> = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| {
                json!({
                    "pid": pid.as_u32(),
                    "name": process.name(),
                    "exe": process.exe().to_string_lossy(),
                    "status": process_status_label(process.status()),
                    "parent_pid": process.parent().map(|p| p.as_u32()),
                    "memory_bytes": process.memory(),
                    "start_time": process.start_time(),
                })
            })
            .collect();

        // Stable order so identical snapshots serialize identically
        processes.sort_by_key(|p| p["pid"].as_u64());
        processes.truncate(MAX_PROCESS_ENTRIES);

        json!({
            "count": self.system.processes().len(),
            "processes": processes,
        })
    }

    fn suspicious_processes(&self) -> Value {
        let mut flagged = Vec::new();

        for (pid, process) in self.system.processes() {
            let exe = process.exe().to_string_lossy().to_string();
            let mut reasons = Vec::new();

            if exe_in_temp_location(&exe) {
                reasons.push("executable runs from a temp location");
            }
            if exe.is_empty() && !process.cmd().is_empty() {
                reasons.push("no backing executable path for a running command");
            }
            if exe.ends_with("(deleted)") {
                reasons.push("backing executable was deleted on disk");
            }

            if !reasons.is_empty() {
                flagged.push(json!({
                    "pid": pid.as_u32(),
                    "name": process.name(),
                    "exe": exe,
                    "reasons": reasons,
                }));
            }
        }

        flagged.sort_by_key(|p| p["pid"].as_u64());
        json!({ "flagged": flagged })
    }

    fn environment_inventory(&self) -> Value {
        // Variable names only; values may hold credentials
        let mut names: Vec<String> = std::env::vars().map(|(k, _)| k).collect();
        names.sort();
        json!({
            "count": names.len(),
            "variable_names": names,
        })
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceCollector for MemoryCollector {
    fn domain(&self) -> Domain {
        Domain::Memory
    }

    fn execute(&mut self, ctx: &CollectorContext) -> CollectionResult {
        let mut report = ReportBuilder::new(Domain::Memory);

        report.log_command("sysinfo::memory()", "Gather memory and swap statistics");
        let stats = self.memory_stats();
        report.record("memory_stats", |r| {
            r.used_core_tool("sysinfo");
            Ok(stats)
        });

        report.log_command("sysinfo::processes()", "Enumerate running processes");
        let processes = self.running_processes();
        report.record("running_processes", |_| Ok(processes));

        report.log_command(
            "process heuristics",
            "Flag processes with suspicious execution characteristics",
        );
        let suspicious = self.suspicious_processes();
        report.record("suspicious_processes", |_| Ok(suspicious));

        #[cfg(target_os = "linux")]
        report.record("loaded_modules", |r| {
            let out = r.run_command(ctx.runner, "lsmod", &[], "List loaded kernel modules");
            Ok(out.as_finding())
        });

        #[cfg(windows)]
        report.record("loaded_modules", |r| {
            let out = r.run_command(
                ctx.runner,
                "driverquery",
                &["/fo", "csv"],
                "List installed drivers",
            );
            Ok(out.as_finding())
        });

        #[cfg(unix)]
        report.record("open_files", |r| {
            let out = r.run_command(
                ctx.runner,
                "lsof",
                &["-n", "-l"],
                "Snapshot open file descriptors",
            );
            Ok(out.as_finding())
        });

        let env_inventory = self.environment_inventory();
        report.record("environment_inventory", |_| Ok(env_inventory));

        if ctx.advanced_enabled {
            report.record_gated(ctx.probe, "volatility3", "volatility_analysis", |_, descriptor| {
                Ok(json!({
                    "volatility_path": descriptor.resolved_path,
                    "note": "requires a memory image for framework analysis; live acquisition is out of scope",
                }))
            });
        }

        report.finish(ctx.session)
    }
}

fn process_status_label(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Run => "Running",
        ProcessStatus::Sleep => "Sleeping",
        ProcessStatus::Stop => "Stopped",
        ProcessStatus::Zombie => "Zombie",
        ProcessStatus::Idle => "Idle",
        _ => "Unknown",
    }
}

fn exe_in_temp_location(exe: &str) -> bool {
    const TEMP_LOCATIONS: &[&str] = &[
        "/tmp/",
        "/var/tmp/",
        "/dev/shm/",
        "\\Temp\\",
        "\\AppData\\Local\\Temp\\",
    ];
    TEMP_LOCATIONS.iter().any(|loc| exe.contains(loc))
}
