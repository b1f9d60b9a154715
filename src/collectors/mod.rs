//! Evidence collectors, one per domain.
//!
//! Each collector attempts its core findings first (in-process system APIs
//! and platform-native utilities), then — when the session enables the
//! advanced tier — capability-gated findings that depend on optional
//! forensic tooling. A collector never errors past its own boundary: the
//! worst outcome of `execute` is an error-status [`CollectionResult`].

pub mod disk;
pub mod logs;
pub mod memory;
pub mod network;
pub mod report;

use crate::config::CustodyConfig;
use crate::exec::CommandRunner;
use crate::models::{CollectionResult, Domain};
use crate::probe::CapabilityProbe;
use crate::session::SessionContext;

pub use disk::DiskCollector;
pub use logs::LogCollector;
pub use memory::MemoryCollector;
pub use network::NetworkCollector;

/// Shared, read-only state handed to every collector in a session.
pub struct CollectorContext<'a> {
    pub session: &'a SessionContext,
    pub probe: &'a CapabilityProbe,
    pub runner: &'a CommandRunner,
    pub config: &'a CustodyConfig,
    pub advanced_enabled: bool,
}

/// One unit of evidence gathering over a single domain.
pub trait EvidenceCollector {
    fn domain(&self) -> Domain;

    /// Run every finding for this domain. Individual finding failures are
    /// recorded inside the result, never raised.
    fn execute(&mut self, ctx: &CollectorContext) -> CollectionResult;
}

/// Instantiate the collector for a domain.
pub fn collector_for(domain: Domain) -> Box<dyn EvidenceCollector> {
    match domain {
        Domain::Disk => Box::new(DiskCollector::new()),
        Domain::Memory => Box::new(MemoryCollector::new()),
        Domain::Network => Box::new(NetworkCollector::new()),
        Domain::Log => Box::new(LogCollector::new()),
    }
}
