//! Built-in OS-specific tool tables.
//!
//! The core tier lists platform-native utilities the collectors reach for by
//! default; the advanced tier lists optional forensic tooling (The Sleuth
//! Kit, Volatility, Wireshark CLI, Plaso) that is capability-probed per
//! session.

use crate::config::custody_config::{CustodyConfig, ToolEntry};
use crate::constants::{DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_EVIDENCE_DIR, DEFAULT_INVESTIGATOR_ID};
use crate::models::{Domain, ToolTier};

fn tool(name: &str, domain: Domain, tier: ToolTier) -> ToolEntry {
    ToolEntry {
        name: name.to_string(),
        domain,
        tier,
        path: None,
    }
}

fn advanced_tools() -> Vec<ToolEntry> {
    vec![
        tool("fls", Domain::Disk, ToolTier::Advanced),
        tool("mmls", Domain::Disk, ToolTier::Advanced),
        tool("volatility3", Domain::Memory, ToolTier::Advanced),
        tool("tshark", Domain::Network, ToolTier::Advanced),
        tool("log2timeline", Domain::Log, ToolTier::Advanced),
    ]
}

fn base_config(tools: Vec<ToolEntry>, log_paths: Vec<&str>) -> CustodyConfig {
    CustodyConfig {
        version: "1.0".to_string(),
        investigator_id: DEFAULT_INVESTIGATOR_ID.to_string(),
        investigator_name: "System Administrator".to_string(),
        organization: "Forensic Lab".to_string(),
        evidence_dir: DEFAULT_EVIDENCE_DIR.to_string(),
        command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        tools,
        log_paths: log_paths.into_iter().map(String::from).collect(),
    }
}

pub fn default_linux() -> CustodyConfig {
    let mut tools = vec![
        tool("lsblk", Domain::Disk, ToolTier::Core),
        tool("df", Domain::Disk, ToolTier::Core),
        tool("mount", Domain::Disk, ToolTier::Core),
        tool("lsmod", Domain::Memory, ToolTier::Core),
        tool("lsof", Domain::Memory, ToolTier::Core),
        tool("ss", Domain::Network, ToolTier::Core),
        tool("ip", Domain::Network, ToolTier::Core),
        tool("arp", Domain::Network, ToolTier::Core),
        tool("tail", Domain::Log, ToolTier::Core),
        tool("last", Domain::Log, ToolTier::Core),
        tool("lastb", Domain::Log, ToolTier::Core),
        tool("crontab", Domain::Log, ToolTier::Core),
    ];
    tools.extend(advanced_tools());

    base_config(
        tools,
        vec![
            "/var/log/auth.log",
            "/var/log/secure",
            "/var/log/syslog",
            "/var/log/kern.log",
        ],
    )
}

pub fn default_macos() -> CustodyConfig {
    let mut tools = vec![
        tool("diskutil", Domain::Disk, ToolTier::Core),
        tool("df", Domain::Disk, ToolTier::Core),
        tool("mount", Domain::Disk, ToolTier::Core),
        tool("kextstat", Domain::Memory, ToolTier::Core),
        tool("lsof", Domain::Memory, ToolTier::Core),
        tool("netstat", Domain::Network, ToolTier::Core),
        tool("arp", Domain::Network, ToolTier::Core),
        tool("tail", Domain::Log, ToolTier::Core),
        tool("last", Domain::Log, ToolTier::Core),
        tool("crontab", Domain::Log, ToolTier::Core),
    ];
    tools.extend(advanced_tools());

    base_config(tools, vec!["/var/log/system.log", "/var/log/install.log"])
}

pub fn default_windows() -> CustodyConfig {
    let mut tools = vec![
        tool("wmic", Domain::Disk, ToolTier::Core),
        tool("driverquery", Domain::Memory, ToolTier::Core),
        tool("netstat", Domain::Network, ToolTier::Core),
        tool("route", Domain::Network, ToolTier::Core),
        tool("arp", Domain::Network, ToolTier::Core),
        tool("wevtutil", Domain::Log, ToolTier::Core),
    ];
    tools.extend(advanced_tools());

    base_config(tools, vec!["Security", "System", "Application"])
}

/// Fallback for platforms without a tailored tool table.
pub fn default_minimal() -> CustodyConfig {
    base_config(advanced_tools(), Vec::new())
}
