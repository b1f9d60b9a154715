use std::time::{Duration, SystemTime};

use serde_json::{json, Value};
use sysinfo::{DiskExt, System, SystemExt};
use walkdir::WalkDir;

use crate::collectors::report::ReportBuilder;
use crate::collectors::{CollectorContext, EvidenceCollector};
use crate::constants::{MAX_SWEEP_RESULTS, RECENT_FILE_DAYS, SUSPICIOUS_EXTENSIONS, SWEEP_PATHS};
use crate::models::{CollectionResult, Domain};

/// Collector for persistent storage evidence: disk inventory, filesystem
/// layout, recent and suspicious files, and Sleuth Kit capability when the
/// advanced tier is enabled.
pub struct DiskCollector {
    system: System,
}

impl DiskCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_disks_list();
        Self { system }
    }

    fn disk_inventory(&mut self) -> Value {
        self.system.refresh_disks_list();
        self.system.refresh_disks();

        let disks: Vec<Value> = self
            .system
            .disks()
            .iter()
            .map(|disk| {
                json!({
                    "name": disk.name().to_string_lossy(),
                    "mount_point": disk.mount_point().to_string_lossy(),
                    "file_system": std::str::from_utf8(disk.file_system()).ok(),
                    "total_space": disk.total_space(),
                    "available_space": disk.available_space(),
                    "is_removable": disk.is_removable(),
                })
            })
            .collect();

        json!({ "disks": disks })
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceCollector for DiskCollector {
    fn domain(&self) -> Domain {
        Domain::Disk
    }

    fn execute(&mut self, ctx: &CollectorContext) -> CollectionResult {
        let mut report = ReportBuilder::new(Domain::Disk);

        report.log_command("sysinfo::disks()", "Enumerate fixed and removable disks");
        let inventory = self.disk_inventory();
        report.record("disk_inventory", |r| {
            r.used_core_tool("sysinfo");
            Ok(inventory)
        });

        #[cfg(unix)]
        {
            report.record("disk_usage", |r| {
                let out = r.run_command(ctx.runner, "df", &["-h"], "Report filesystem usage");
                Ok(out.as_finding())
            });
            report.record("mounted_filesystems", |r| {
                let out = r.run_command(ctx.runner, "mount", &[], "List mounted filesystems");
                Ok(out.as_finding())
            });
            report.record("partition_layout", |r| {
                let out = r.run_command(
                    ctx.runner,
                    "lsblk",
                    &["-o", "NAME,TYPE,SIZE,MOUNTPOINT,FSTYPE"],
                    "Show block device and partition layout",
                );
                Ok(out.as_finding())
            });
        }

        #[cfg(windows)]
        {
            report.record("disk_usage", |r| {
                let out = r.run_command(
                    ctx.runner,
                    "wmic",
                    &["logicaldisk", "get", "size,freespace,caption"],
                    "Report logical disk usage",
                );
                Ok(out.as_finding())
            });
            report.record("partition_layout", |r| {
                let out = r.run_command(
                    ctx.runner,
                    "wmic",
                    &["partition", "get", "name,size,type"],
                    "Show partition layout",
                );
                Ok(out.as_finding())
            });
        }

        report.log_command(
            "walkdir over sweep paths",
            "Sweep temp locations for recent and suspicious files",
        );
        report.record("recent_files", |_| Ok(recent_files_sweep(SWEEP_PATHS)));
        report.record("suspicious_files", |_| {
            Ok(suspicious_files_sweep(SWEEP_PATHS))
        });

        if ctx.advanced_enabled {
            report.record_gated(ctx.probe, "fls", "sleuthkit_analysis", |r, descriptor| {
                let mmls = ctx.probe.resolve("mmls");
                if mmls.available {
                    r.used_advanced_tool("mmls");
                }
                Ok(json!({
                    "fls_path": descriptor.resolved_path,
                    "mmls_available": mmls.available,
                    "note": "requires a disk image or device path for filesystem enumeration and deleted-file recovery",
                }))
            });
        }

        report.finish(ctx.session)
    }
}

/// Files modified within the lookback window under the sweep paths.
fn recent_files_sweep(paths: &[&str]) -> Value {
    let cutoff = SystemTime::now() - Duration::from_secs(RECENT_FILE_DAYS * 24 * 60 * 60);
    let mut files = Vec::new();

    'outer: for base in paths {
        for entry in WalkDir::new(base)
            .max_depth(4)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if modified >= cutoff {
                files.push(json!({
                    "path": entry.path().to_string_lossy(),
                    "size": metadata.len(),
                }));
                if files.len() >= MAX_SWEEP_RESULTS {
                    break 'outer;
                }
            }
        }
    }

    json!({
        "lookback_days": RECENT_FILE_DAYS,
        "paths_scanned": paths,
        "files": files,
    })
}

/// Files under the sweep paths carrying a suspicious extension.
fn suspicious_files_sweep(paths: &[&str]) -> Value {
    let mut matches = Vec::new();

    'outer: for base in paths {
        for entry in WalkDir::new(base)
            .max_depth(4)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let extension = entry
                .path()
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase());
            if let Some(ext) = extension {
                if SUSPICIOUS_EXTENSIONS.contains(&ext.as_str()) {
                    matches.push(json!({
                        "path": entry.path().to_string_lossy(),
                        "extension": ext,
                    }));
                    if matches.len() >= MAX_SWEEP_RESULTS {
                        break 'outer;
                    }
                }
            }
        }
    }

    json!({
        "extensions_checked": SUSPICIOUS_EXTENSIONS,
        "files_found": matches,
    })
}
