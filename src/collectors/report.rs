//! Shared scaffolding for building a [`CollectionResult`].
//!
//! The builder owns the timeout/error-isolation discipline once, instead of
//! each collector repeating it: a failing finding records an error payload
//! under its own key and the remaining findings still run; an absent
//! advanced tool records a structured `not_available` payload so callers can
//! tell "not attempted" apart from "attempted and empty".

use anyhow::Result;
use chrono::Utc;
use log::{debug, warn};
use serde_json::{json, Value};

use crate::constants::NOT_AVAILABLE_STATUS;
use crate::exec::{CommandOutput, CommandRunner};
use crate::models::{CollectionResult, CollectionStatus, CommandRecord, Domain, ToolDescriptor};
use crate::probe::CapabilityProbe;
use crate::session::SessionContext;
use crate::utils::atomic_write_json;

pub struct ReportBuilder {
    result: CollectionResult,
}

impl ReportBuilder {
    pub fn new(domain: Domain) -> Self {
        Self {
            result: CollectionResult::new(domain),
        }
    }

    pub fn domain(&self) -> Domain {
        self.result.domain
    }

    /// Compute one finding; a failure lands as an error payload under the
    /// finding's own key and does not abort the rest of the collector.
    pub fn record<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce(&mut ReportBuilder) -> Result<Value>,
    {
        debug!("[{}] computing finding {}", self.result.domain, name);
        match f(self) {
            Ok(value) => self.result.findings.insert(name, value),
            Err(e) => {
                warn!("[{}] finding {} failed: {}", self.result.domain, name, e);
                self.result
                    .findings
                    .insert(name, json!({ "error": e.to_string() }));
            }
        }
    }

    /// Compute one advanced, capability-gated finding.
    ///
    /// When the tool is not resolvable the finding still appears, carrying a
    /// structured `not_available` payload, and no advanced tool usage is
    /// recorded.
    pub fn record_gated<F>(&mut self, probe: &CapabilityProbe, tool: &str, name: &str, f: F)
    where
        F: FnOnce(&mut ReportBuilder, &ToolDescriptor) -> Result<Value>,
    {
        let descriptor = probe.resolve(tool);
        if !descriptor.available {
            debug!(
                "[{}] advanced tool {} not configured, recording placeholder for {}",
                self.result.domain, tool, name
            );
            self.result.findings.insert(
                name,
                json!({
                    "status": NOT_AVAILABLE_STATUS,
                    "note": format!("{} not found - install it or set its path in the config", tool),
                }),
            );
            return;
        }

        match f(self, &descriptor) {
            Ok(value) => {
                self.result.findings.insert(name, value);
                self.used_advanced_tool(tool);
            }
            Err(e) => {
                warn!("[{}] advanced finding {} failed: {}", self.result.domain, name, e);
                self.result
                    .findings
                    .insert(name, json!({ "error": e.to_string() }));
            }
        }
    }

    /// Run an external command, logging it into `commands_executed`.
    pub fn run_command(
        &mut self,
        runner: &CommandRunner,
        program: &str,
        args: &[&str],
        description: &str,
    ) -> CommandOutput {
        let output = runner.run(program, args);
        self.log_command(&output.command, description);
        if output.success {
            self.used_core_tool(program);
        }
        output
    }

    /// Log a command or system API call without spawning anything.
    pub fn log_command(&mut self, command: &str, description: &str) {
        self.result.commands_executed.push(CommandRecord {
            command: command.to_string(),
            description: description.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    pub fn used_core_tool(&mut self, name: &str) {
        self.result.core_tools_used.insert(name.to_string());
    }

    pub fn used_advanced_tool(&mut self, name: &str) {
        self.result.advanced_tools_used.insert(name.to_string());
    }

    /// Finalize the result and persist it as a standalone per-domain
    /// artifact for independent auditing. Persistence problems are logged,
    /// not raised; the in-memory result is still returned to the
    /// orchestrator.
    pub fn finish(mut self, session: &SessionContext) -> CollectionResult {
        self.result.normalize_tools();
        if self.result.status == CollectionStatus::Running {
            self.result.status = CollectionStatus::Completed;
        }

        let artifact = session
            .domain_dir(self.result.domain)
            .join(format!("{}_forensics.json", self.result.domain));
        if let Err(e) = atomic_write_json(&self.result, &artifact) {
            warn!(
                "[{}] could not persist standalone result: {}",
                self.result.domain, e
            );
        }

        self.result
    }
}
