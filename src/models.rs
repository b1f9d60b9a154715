use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::Utc;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sysinfo::{System, SystemExt};

/// Evidence domain covered by one collector.
///
/// The declaration order is the canonical processing order: collectors run
/// and results serialize as disk, memory, network, log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Disk,
    Memory,
    Network,
    Log,
}

impl Domain {
    /// All domains in canonical order.
    pub const ALL: [Domain; 4] = [Domain::Disk, Domain::Memory, Domain::Network, Domain::Log];

    /// Directory name used for this domain inside a session directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Domain::Disk => "disk",
            Domain::Memory => "memory",
            Domain::Network => "network",
            Domain::Log => "logs",
        }
    }

    /// Expand a user-supplied domain selection into canonical order.
    ///
    /// The sentinel `all` expands to the full known set. Unknown names are
    /// rejected rather than silently dropped.
    pub fn expand_selection(names: &[String]) -> Result<Vec<Domain>> {
        if names.iter().any(|n| n.trim().eq_ignore_ascii_case("all")) {
            return Ok(Domain::ALL.to_vec());
        }

        let mut selected = BTreeSet::new();
        for name in names {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                continue;
            }
            selected.insert(trimmed.parse::<Domain>()?);
        }

        if selected.is_empty() {
            bail!("no evidence domains selected");
        }

        Ok(Domain::ALL
            .iter()
            .copied()
            .filter(|d| selected.contains(d))
            .collect())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Disk => "disk",
            Domain::Memory => "memory",
            Domain::Network => "network",
            Domain::Log => "log",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Domain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disk" => Ok(Domain::Disk),
            "memory" => Ok(Domain::Memory),
            "network" => Ok(Domain::Network),
            "log" | "logs" => Ok(Domain::Log),
            other => bail!("unknown evidence domain: {}", other),
        }
    }
}

/// Capability tier a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTier {
    /// Always expected to work without extra tooling
    Core,
    /// Requires an optional external tool
    Advanced,
}

/// Result of probing one tool. Read-only after resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub tier: ToolTier,
    pub resolved_path: Option<PathBuf>,
    pub available: bool,
}

impl ToolDescriptor {
    pub fn unavailable(name: &str, tier: ToolTier) -> Self {
        Self {
            name: name.to_string(),
            tier,
            resolved_path: None,
            available: false,
        }
    }
}

/// Lifecycle state of a single collector invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Running,
    Completed,
    Error,
}

/// One external command (or system API call) executed during collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub description: String,
    pub timestamp: String,
}

/// Insertion-ordered mapping of finding name to structured value.
///
/// Serializes as a JSON object whose key order matches insertion order, so
/// identical collection runs produce byte-identical documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    entries: Vec<(String, Value)>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a finding, replacing an existing entry in place so that the
    /// original position is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Findings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Findings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FindingsVisitor;

        impl<'de> Visitor<'de> for FindingsVisitor {
            type Value = Findings;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of finding names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut findings = Findings::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    findings.insert(key, value);
                }
                Ok(findings)
            }
        }

        deserializer.deserialize_map(FindingsVisitor)
    }
}

/// Immutable output of one collector invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub domain: Domain,
    pub status: CollectionStatus,
    pub started_at: String,
    pub findings: Findings,
    pub core_tools_used: BTreeSet<String>,
    pub advanced_tools_used: BTreeSet<String>,
    pub commands_executed: Vec<CommandRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionResult {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            status: CollectionStatus::Running,
            started_at: Utc::now().to_rfc3339(),
            findings: Findings::new(),
            core_tools_used: BTreeSet::new(),
            advanced_tools_used: BTreeSet::new(),
            commands_executed: Vec::new(),
            error: None,
        }
    }

    /// Build an error-status result for a collector that failed outright.
    pub fn failed(domain: Domain, message: impl Into<String>) -> Self {
        let mut result = Self::new(domain);
        result.status = CollectionStatus::Error;
        result.error = Some(message.into());
        result
    }

    /// Whether this result contributes evidence to the session.
    pub fn is_usable(&self) -> bool {
        self.status != CollectionStatus::Error
    }

    /// Enforce tier segregation: a tool recorded as core never also appears
    /// in the advanced set.
    pub fn normalize_tools(&mut self) {
        let core = self.core_tools_used.clone();
        self.advanced_tools_used.retain(|t| !core.contains(t));
    }
}

/// Union of tool usage and command history across all merged results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsSummary {
    pub core_tools_used: BTreeSet<String>,
    pub advanced_tools_used: BTreeSet<String>,
    pub commands_executed: Vec<CommandRecord>,
}

impl ToolsSummary {
    /// Fold one collector's usage into the summary with deduplication.
    pub fn fold(&mut self, result: &CollectionResult) {
        self.core_tools_used
            .extend(result.core_tools_used.iter().cloned());
        self.advanced_tools_used
            .extend(result.advanced_tools_used.iter().cloned());
        // Core wins when a tool was recorded in both tiers.
        let core = self.core_tools_used.clone();
        self.advanced_tools_used.retain(|t| !core.contains(t));
        self.commands_executed
            .extend(result.commands_executed.iter().cloned());
    }
}

/// Facts about the host the evidence was collected from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub hostname: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub architecture: String,
}

impl HostDescriptor {
    /// Capture the current host's identity.
    pub fn capture() -> Self {
        let system = System::new();
        let hostname = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string())
            .or_else(|| system.host_name());

        Self {
            hostname,
            os_name: system.name(),
            os_version: system.os_version(),
            kernel_version: system.kernel_version(),
            architecture: std::env::consts::ARCH.to_string(),
        }
    }

    /// Short `OS version` string used in custody events.
    pub fn os_source(&self) -> String {
        format!(
            "{} {}",
            self.os_name.as_deref().unwrap_or("unknown"),
            self.os_version.as_deref().unwrap_or("?")
        )
    }
}

/// Merged, hashed snapshot of one session's collection results.
///
/// Created once per session by the orchestrator; mutated only by merges and
/// by the integrity manager when it stamps the hash. Once sealed, any further
/// mutation must go through [`EvidenceRecord::invalidate_hash`] which makes
/// the record a new, unhashed revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub session_id: String,
    pub created_at: String,
    pub investigator_id: String,
    pub host: HostDescriptor,
    pub advanced_tools_enabled: bool,
    pub forensics: BTreeMap<Domain, CollectionResult>,
    pub tools_summary: ToolsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_hash: Option<String>,
}

impl EvidenceRecord {
    pub fn new(
        session_id: impl Into<String>,
        investigator_id: impl Into<String>,
        host: HostDescriptor,
        advanced_tools_enabled: bool,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now().to_rfc3339(),
            investigator_id: investigator_id.into(),
            host,
            advanced_tools_enabled,
            forensics: BTreeMap::new(),
            tools_summary: ToolsSummary::default(),
            evidence_hash: None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.evidence_hash.is_some()
    }

    /// Merge one collector result, regardless of its status, and fold its
    /// tool usage into the summary.
    pub fn merge(&mut self, result: CollectionResult) -> Result<()> {
        if self.is_sealed() {
            bail!("evidence record {} is sealed and cannot be merged into", self.session_id);
        }
        self.tools_summary.fold(&result);
        self.forensics.insert(result.domain, result);
        Ok(())
    }

    /// Number of domains that produced a usable result.
    pub fn usable_domains(&self) -> usize {
        self.forensics.values().filter(|r| r.is_usable()).count()
    }

    /// Stamp the computed hash. Only the integrity manager calls this.
    pub fn seal(&mut self, hash: String) {
        self.evidence_hash = Some(hash);
    }

    /// Clear the hash, turning the record into a new unhashed revision.
    pub fn invalidate_hash(&mut self) {
        self.evidence_hash = None;
    }

    /// Every tool used in the session, both tiers, deduplicated.
    pub fn all_tools_used(&self) -> Vec<String> {
        let mut tools: BTreeSet<String> = self.tools_summary.core_tools_used.clone();
        tools.extend(self.tools_summary.advanced_tools_used.iter().cloned());
        tools.into_iter().collect()
    }
}
