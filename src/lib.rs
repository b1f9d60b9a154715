//! # evidence_custodian
//!
//! A cross-platform evidence collection and chain-of-custody tool.
//!
//! ## Overview
//!
//! evidence_custodian collects volatile and persistent evidence (disk,
//! memory, network and log artifacts) from a host, merges it into a single
//! tamper-evident record, and maintains an append-only custody trail that
//! can be verified later and reconciled against a remote ledger anchor.
//!
//! ## Features
//!
//! - **Cross-platform support**: Windows, macOS, and Linux
//! - **Two capability tiers**: core findings always run; advanced findings
//!   are gated on optional forensic tools (Sleuth Kit, Volatility, tshark,
//!   log2timeline)
//! - **Graceful degradation**: a failing finding, collector or remote
//!   ledger never aborts the session
//! - **Deterministic hashing**: canonical serialization and a two-phase
//!   write-then-stamp SHA-256 seal over the persisted bytes
//! - **Chain of custody**: append-only event log with verification,
//!   statistics and remote-anchor reconciliation
//! - **Flexible configuration**: YAML-based tool tables with OS-aware
//!   defaults
//!
//! ## Usage
//!
//! ### Basic Collection
//!
//! ```no_run
//! use std::path::Path;
//!
//! use evidence_custodian::config::CustodyConfig;
//! use evidence_custodian::integrity::IntegrityManager;
//! use evidence_custodian::models::Domain;
//! use evidence_custodian::orchestrator::Orchestrator;
//! use evidence_custodian::session::SessionContext;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = CustodyConfig::default();
//! let session = SessionContext::create(Path::new("evidence_output"))?;
//!
//! let orchestrator = Orchestrator::new(config)?;
//! let mut record = orchestrator.run(&session, &Domain::ALL, false)?;
//!
//! let hash = IntegrityManager::persist(&mut record, &session)?;
//! println!("Evidence sealed with hash {}", hash);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collectors;
pub mod config;
pub mod constants;
pub mod custody;
pub mod exec;
pub mod integrity;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod session;
pub mod utils;
