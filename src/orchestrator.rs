//! Session orchestration: runs the selected collectors in canonical order
//! and merges their results into one evidence record.
//!
//! A collector failure, including a panic, degrades the session instead of
//! aborting it. The session fails only when no domain produced a usable
//! result.

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::{bail, Result};
use log::{error, info};

use crate::collectors::{collector_for, CollectorContext, EvidenceCollector};
use crate::config::CustodyConfig;
use crate::exec::CommandRunner;
use crate::models::{CollectionResult, Domain, EvidenceRecord, HostDescriptor, ToolDescriptor};
use crate::probe::CapabilityProbe;
use crate::session::SessionContext;

pub struct Orchestrator {
    config: CustodyConfig,
    probe: CapabilityProbe,
    runner: CommandRunner,
}

impl Orchestrator {
    pub fn new(config: CustodyConfig) -> Result<Self> {
        let probe = CapabilityProbe::new(&config);
        let runner = CommandRunner::new(config.command_timeout())?;
        Ok(Self {
            config,
            probe,
            runner,
        })
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// Resolve every configured tool, for the tools listing.
    pub fn list_available_tools(&self) -> Vec<ToolDescriptor> {
        self.probe.known_tools()
    }

    /// Run the selected domains and merge their results into a single
    /// unhashed evidence record.
    pub fn run(
        &self,
        session: &SessionContext,
        domains: &[Domain],
        advanced_enabled: bool,
    ) -> Result<EvidenceRecord> {
        let collectors: Vec<Box<dyn EvidenceCollector>> =
            domains.iter().map(|d| collector_for(*d)).collect();
        self.run_with_collectors(session, collectors, advanced_enabled)
    }

    /// Collector-injectable core of [`Orchestrator::run`].
    fn run_with_collectors(
        &self,
        session: &SessionContext,
        collectors: Vec<Box<dyn EvidenceCollector>>,
        advanced_enabled: bool,
    ) -> Result<EvidenceRecord> {
        let mut record = EvidenceRecord::new(
            session.session_id(),
            &self.config.investigator_id,
            HostDescriptor::capture(),
            advanced_enabled,
        );

        let ctx = CollectorContext {
            session,
            probe: &self.probe,
            runner: &self.runner,
            config: &self.config,
            advanced_enabled,
        };

        for mut collector in collectors {
            let domain = collector.domain();
            info!("Collecting {} evidence for session {}", domain, session.session_id());

            let result = match catch_unwind(AssertUnwindSafe(|| collector.execute(&ctx))) {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic);
                    error!("{} collector panicked: {}", domain, message);
                    CollectionResult::failed(domain, format!("collector panicked: {}", message))
                }
            };

            if let Some(err) = &result.error {
                error!("{} collection failed: {}", domain, err);
            } else {
                info!(
                    "{} collection completed with {} findings",
                    domain,
                    result.findings.len()
                );
            }
            record.merge(result)?;
        }

        if record.usable_domains() == 0 {
            bail!("every selected domain failed; no evidence was collected");
        }

        Ok(record)
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
