//! Global constants for the evidence-custodian application.
//!
//! This module centralizes hardcoded values so that timeout, layout and
//! truncation policies live in one place.

// Command execution constants
/// Default timeout for external command invocations (seconds)
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Upper bound for the configurable command timeout (seconds)
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Maximum characters of command output kept in a finding
pub const MAX_COMMAND_OUTPUT_CHARS: usize = 10_000;

/// Maximum lines of command output kept in a finding
pub const MAX_OUTPUT_LINES: usize = 200;

// Session layout constants
/// Prefix for per-session directories under the evidence base directory
pub const SESSION_DIR_PREFIX: &str = "session_";

/// File name of the merged, hashed evidence record
pub const EVIDENCE_FILE_NAME: &str = "master_evidence.json";

/// File name of the local append-only custody log
pub const CUSTODY_LOG_NAME: &str = "custody_log.json";

/// Subdirectory reserved for report-generation collaborators
pub const REPORTS_DIR_NAME: &str = "reports";

/// Prefix for evidence identifiers derived from a session id
pub const EVIDENCE_ID_PREFIX: &str = "EVD_";

// Custody reconciliation constants
/// Window for matching local custody events to remote anchor events (seconds)
pub const RECONCILE_WINDOW_SECS: i64 = 120;

// Collector scan limits
/// How far back the recent-file sweep looks (days)
pub const RECENT_FILE_DAYS: u64 = 7;

/// Cap on entries returned by filesystem sweeps
pub const MAX_SWEEP_RESULTS: usize = 100;

/// Cap on process entries recorded in the memory collector
pub const MAX_PROCESS_ENTRIES: usize = 500;

/// Status value recorded when an advanced capability is not configured
pub const NOT_AVAILABLE_STATUS: &str = "not_available";

/// File extensions treated as suspicious by the disk sweep
pub const SUSPICIOUS_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "vbs", "ps1", "scr", "pif", "jar", "encrypted",
];

/// Directories scanned for suspicious and recently modified files
#[cfg(unix)]
pub const SWEEP_PATHS: &[&str] = &["/tmp", "/var/tmp", "/dev/shm"];

#[cfg(windows)]
pub const SWEEP_PATHS: &[&str] = &["C:\\Windows\\Temp", "C:\\Temp"];

/// Destination ports commonly associated with remote-access tooling
pub const SUSPICIOUS_PORTS: &[u16] = &[1337, 4444, 5554, 6666, 6667, 9001, 31337];

// Default configuration values
/// Default base directory for evidence output
pub const DEFAULT_EVIDENCE_DIR: &str = "evidence_output";

/// Default investigator identity used when none is configured
pub const DEFAULT_INVESTIGATOR_ID: &str = "INV001";
