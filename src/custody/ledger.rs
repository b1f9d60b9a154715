//! Local append-only custody log with remote-anchor reconciliation.
//!
//! Events for one evidence id are strictly append-ordered and never deleted
//! or reordered. The only mutation allowed on a recorded event is the
//! derived `anchored` flag, flipped when the remote ledger confirms it holds
//! a counterpart.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::RECONCILE_WINDOW_SECS;
use crate::custody::anchor::{LedgerAnchor, RegistrationMetadata, RemoteEvent};
use crate::session::SessionContext;
use crate::utils::atomic_write_json;

/// Outcome of a hash comparison recorded in a VERIFICATION event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationResult {
    Pass,
    Fail,
}

/// Kind-specific payload of one custody event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyEventDetail {
    Collection {
        evidence_hash: String,
        collection_source: String,
        domains: Vec<String>,
        tools_used: Vec<String>,
    },
    LedgerRegistration {
        transaction_ref: String,
        block_ref: Option<String>,
    },
    Access {
        purpose: String,
    },
    ReportGeneration {
        report_kind: String,
    },
    CustodyTransfer {
        recipient: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    Verification {
        result: VerificationResult,
        original_hash: Option<String>,
        current_hash: String,
    },
}

impl CustodyEventDetail {
    pub fn kind(&self) -> &'static str {
        match self {
            CustodyEventDetail::Collection { .. } => "COLLECTION",
            CustodyEventDetail::LedgerRegistration { .. } => "LEDGER_REGISTRATION",
            CustodyEventDetail::Access { .. } => "ACCESS",
            CustodyEventDetail::ReportGeneration { .. } => "REPORT_GENERATION",
            CustodyEventDetail::CustodyTransfer { .. } => "CUSTODY_TRANSFER",
            CustodyEventDetail::Verification { .. } => "VERIFICATION",
        }
    }
}

/// One entry in the custody trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub event_id: String,
    pub evidence_id: String,
    pub timestamp: String,
    pub actor_id: String,
    pub anchored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_ref: Option<String>,
    #[serde(flatten)]
    pub detail: CustodyEventDetail,
}

/// Verdict of [`CustodyLedger::verify_integrity`].
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityVerdict {
    pub verified: bool,
    pub original_hash: Option<String>,
    pub current_hash: String,
    /// `None` when the remote ledger was not consulted or unreachable.
    pub remote_verified: Option<bool>,
}

/// Outcome of cross-checking the local log against remote events.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub matched: usize,
    /// Local event ids with no remote counterpart.
    pub unmatched_local: Vec<String>,
    /// Remote transaction refs with no local counterpart.
    pub orphan_remote: Vec<String>,
}

/// Derived counts over the custody trail. Pure query, no side effects.
#[derive(Debug, Clone, Serialize)]
pub struct CustodyStatistics {
    pub total_events: usize,
    pub events_by_kind: BTreeMap<String, usize>,
    pub evidence_ids: BTreeSet<String>,
    pub actors: BTreeSet<String>,
    pub anchored_events: usize,
}

pub struct CustodyLedger {
    path: PathBuf,
    events: Vec<CustodyEvent>,
}

impl CustodyLedger {
    /// Open the session's custody log, loading any existing events.
    ///
    /// A log file that exists but does not parse is an error: custody
    /// history is never silently discarded and restarted.
    pub fn open(session: &SessionContext) -> Result<Self> {
        let path = session.custody_log();
        let events = if path.is_file() {
            let content = std::fs::read_to_string(&path)
                .context(format!("Failed to read custody log {}", path.display()))?;
            serde_json::from_str(&content).context(format!(
                "Custody log {} is corrupt; refusing to overwrite custody history",
                path.display()
            ))?
        } else {
            Vec::new()
        };

        Ok(Self { path, events })
    }

    pub fn events(&self) -> &[CustodyEvent] {
        &self.events
    }

    /// Append one event and persist the log.
    ///
    /// Ordering rules enforced here: the first event for an evidence id must
    /// be COLLECTION, and a second COLLECTION for the same id is rejected as
    /// a data-integrity anomaly rather than overwritten.
    pub fn record(
        &mut self,
        evidence_id: &str,
        actor_id: &str,
        detail: CustodyEventDetail,
    ) -> Result<&CustodyEvent> {
        let existing: Vec<&CustodyEvent> = self
            .events
            .iter()
            .filter(|e| e.evidence_id == evidence_id)
            .collect();

        let is_collection = matches!(detail, CustodyEventDetail::Collection { .. });
        if existing.is_empty() && !is_collection {
            bail!(
                "first custody event for {} must be COLLECTION, got {}",
                evidence_id,
                detail.kind()
            );
        }
        if is_collection && existing.iter().any(|e| {
            matches!(e.detail, CustodyEventDetail::Collection { .. })
        }) {
            bail!(
                "evidence {} already has a COLLECTION event; a second one is a custody anomaly",
                evidence_id
            );
        }

        // Append time is the ordering authority; never go backwards even if
        // the wall clock does.
        let now = Utc::now().to_rfc3339();
        let timestamp = match existing.last().map(|e| e.timestamp.clone()) {
            Some(last) if last > now => last,
            _ => now,
        };

        let event = CustodyEvent {
            event_id: Uuid::new_v4().to_string(),
            evidence_id: evidence_id.to_string(),
            timestamp,
            actor_id: actor_id.to_string(),
            anchored: false,
            anchor_ref: None,
            detail,
        };

        info!(
            "Custody event {} recorded for {}",
            event.detail.kind(),
            evidence_id
        );
        let stored = self.events.len();
        self.events.push(event);
        self.save()?;
        Ok(&self.events[stored])
    }

    /// Local custody chain for one evidence id, in append order.
    pub fn chain(&self, evidence_id: &str) -> Vec<&CustodyEvent> {
        self.events
            .iter()
            .filter(|e| e.evidence_id == evidence_id)
            .collect()
    }

    /// The authoritative original hash: the one carried by the first (and
    /// only) COLLECTION event.
    pub fn original_hash(&self, evidence_id: &str) -> Option<&str> {
        self.events
            .iter()
            .filter(|e| e.evidence_id == evidence_id)
            .find_map(|e| match &e.detail {
                CustodyEventDetail::Collection { evidence_hash, .. } => {
                    Some(evidence_hash.as_str())
                }
                _ => None,
            })
    }

    /// Try to register the evidence with the remote anchor.
    ///
    /// On success the COLLECTION event is marked anchored and a
    /// LEDGER_REGISTRATION event is appended. On failure nothing is lost:
    /// the local log stands with `anchored: false` and reconciliation can
    /// catch up later.
    pub fn register_remote(
        &mut self,
        evidence_id: &str,
        actor_id: &str,
        anchor: &dyn LedgerAnchor,
        metadata: &RegistrationMetadata,
    ) -> Result<bool> {
        let Some(hash) = self.original_hash(evidence_id).map(String::from) else {
            bail!("evidence {} has no COLLECTION event to register", evidence_id);
        };

        match anchor.register_evidence(evidence_id, &hash, metadata) {
            Ok(receipt) => {
                for event in self
                    .events
                    .iter_mut()
                    .filter(|e| e.evidence_id == evidence_id)
                {
                    if matches!(event.detail, CustodyEventDetail::Collection { .. }) {
                        event.anchored = true;
                        event.anchor_ref = Some(receipt.transaction_ref.clone());
                    }
                }
                self.record(
                    evidence_id,
                    actor_id,
                    CustodyEventDetail::LedgerRegistration {
                        transaction_ref: receipt.transaction_ref,
                        block_ref: receipt.block_ref,
                    },
                )?;
                Ok(true)
            }
            Err(e) => {
                warn!(
                    "Remote registration of {} failed, local log stands unanchored: {}",
                    evidence_id, e
                );
                self.save()?;
                Ok(false)
            }
        }
    }

    /// Compare a current hash against the original COLLECTION hash and
    /// record a VERIFICATION event with the outcome.
    ///
    /// A FAIL verdict means the hashes differ; it is reported, never
    /// auto-corrected.
    pub fn verify_integrity(
        &mut self,
        evidence_id: &str,
        actor_id: &str,
        current_hash: &str,
        anchor: Option<&dyn LedgerAnchor>,
    ) -> Result<IntegrityVerdict> {
        let original_hash = self.original_hash(evidence_id).map(String::from);
        let verified = original_hash.as_deref() == Some(current_hash);

        let remote_verified = anchor.and_then(|a| match a.verify_hash(evidence_id, current_hash) {
            Ok(answer) => Some(answer),
            Err(e) => {
                warn!("Remote hash check for {} failed: {}", evidence_id, e);
                None
            }
        });

        self.record(
            evidence_id,
            actor_id,
            CustodyEventDetail::Verification {
                result: if verified {
                    VerificationResult::Pass
                } else {
                    VerificationResult::Fail
                },
                original_hash: original_hash.clone(),
                current_hash: current_hash.to_string(),
            },
        )?;

        Ok(IntegrityVerdict {
            verified,
            original_hash,
            current_hash: current_hash.to_string(),
            remote_verified,
        })
    }

    /// Cross-check local events against the remote anchor's view.
    ///
    /// A local event matches a remote one when the evidence id and kind
    /// agree and the timestamps fall within the reconciliation window.
    /// Matched local events are flagged anchored; unmatched local events and
    /// orphan remote events are reported, never altered or deleted.
    pub fn reconcile(
        &mut self,
        evidence_id: &str,
        remote_events: &[RemoteEvent],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut claimed = vec![false; remote_events.len()];

        for event in self
            .events
            .iter_mut()
            .filter(|e| e.evidence_id == evidence_id)
        {
            let matched = remote_events.iter().enumerate().find(|(i, remote)| {
                !claimed[*i]
                    && remote.evidence_id == event.evidence_id
                    && remote.kind == event.detail.kind()
                    && timestamps_close(&event.timestamp, &remote.timestamp)
            });

            match matched {
                Some((i, remote)) => {
                    claimed[i] = true;
                    event.anchored = true;
                    if event.anchor_ref.is_none() {
                        event.anchor_ref = remote.transaction_ref.clone();
                    }
                    report.matched += 1;
                }
                None => report.unmatched_local.push(event.event_id.clone()),
            }
        }

        for (i, remote) in remote_events.iter().enumerate() {
            if !claimed[i] && remote.evidence_id == evidence_id {
                report.orphan_remote.push(
                    remote
                        .transaction_ref
                        .clone()
                        .unwrap_or_else(|| remote.timestamp.clone()),
                );
            }
        }

        if !report.unmatched_local.is_empty() || !report.orphan_remote.is_empty() {
            warn!(
                "Reconciliation drift for {}: {} local unanchored, {} remote orphans",
                evidence_id,
                report.unmatched_local.len(),
                report.orphan_remote.len()
            );
        }

        self.save()?;
        Ok(report)
    }

    /// Derived counts over the whole trail.
    pub fn statistics(&self) -> CustodyStatistics {
        let mut events_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut evidence_ids = BTreeSet::new();
        let mut actors = BTreeSet::new();
        let mut anchored_events = 0;

        for event in &self.events {
            *events_by_kind
                .entry(event.detail.kind().to_string())
                .or_insert(0) += 1;
            evidence_ids.insert(event.evidence_id.clone());
            actors.insert(event.actor_id.clone());
            if event.anchored {
                anchored_events += 1;
            }
        }

        CustodyStatistics {
            total_events: self.events.len(),
            events_by_kind,
            evidence_ids,
            actors,
            anchored_events,
        }
    }

    fn save(&self) -> Result<()> {
        atomic_write_json(&self.events, &self.path)
    }
}

fn timestamps_close(local: &str, remote: &str) -> bool {
    let parse = |s: &str| DateTime::<FixedOffset>::parse_from_rfc3339(s).ok();
    match (parse(local), parse(remote)) {
        (Some(a), Some(b)) => (a - b).num_seconds().abs() <= RECONCILE_WINDOW_SECS,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::anchor::{AnchorReceipt, MockLedgerAnchor};
    use anyhow::anyhow;
    use tempfile::TempDir;

    fn session() -> (TempDir, SessionContext) {
        let dir = TempDir::new().unwrap();
        let session = SessionContext::create(dir.path()).unwrap();
        (dir, session)
    }

    fn collection_detail(hash: &str) -> CustodyEventDetail {
        CustodyEventDetail::Collection {
            evidence_hash: hash.to_string(),
            collection_source: "Linux 6.1".to_string(),
            domains: vec!["disk".to_string()],
            tools_used: vec!["df".to_string()],
        }
    }

    fn metadata() -> RegistrationMetadata {
        RegistrationMetadata {
            investigator_id: "INV001".to_string(),
            collection_source: "Linux 6.1".to_string(),
            domains: vec!["disk".to_string()],
            tools_used: vec!["df".to_string()],
        }
    }

    #[test]
    fn test_first_event_must_be_collection() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();

        let err = ledger.record(
            "EVD_1",
            "INV001",
            CustodyEventDetail::Access {
                purpose: "peek".to_string(),
            },
        );
        assert!(err.is_err());

        assert!(ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .is_ok());
    }

    #[test]
    fn test_second_collection_rejected() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();

        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();
        let err = ledger.record("EVD_1", "INV001", collection_detail("h2"));
        assert!(err.is_err());

        // The original hash stays authoritative.
        assert_eq!(ledger.original_hash("EVD_1"), Some("h1"));
    }

    #[test]
    fn test_log_survives_reopen() {
        let (_dir, session) = session();
        {
            let mut ledger = CustodyLedger::open(&session).unwrap();
            ledger
                .record("EVD_1", "INV001", collection_detail("h1"))
                .unwrap();
        }

        let ledger = CustodyLedger::open(&session).unwrap();
        assert_eq!(ledger.chain("EVD_1").len(), 1);
        assert_eq!(ledger.original_hash("EVD_1"), Some("h1"));
    }

    #[test]
    fn test_corrupt_log_is_an_error() {
        let (_dir, session) = session();
        std::fs::write(session.custody_log(), "{not json").unwrap();
        assert!(CustodyLedger::open(&session).is_err());
    }

    #[test]
    fn test_verification_pass_and_fail() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();
        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();

        let pass = ledger
            .verify_integrity("EVD_1", "INV001", "h1", None)
            .unwrap();
        assert!(pass.verified);

        let fail = ledger
            .verify_integrity("EVD_1", "INV001", "h2", None)
            .unwrap();
        assert!(!fail.verified);
        assert_eq!(fail.original_hash.as_deref(), Some("h1"));

        let chain = ledger.chain("EVD_1");
        assert_eq!(chain.len(), 3);
        match &chain[2].detail {
            CustodyEventDetail::Verification { result, .. } => {
                assert_eq!(*result, VerificationResult::Fail);
            }
            other => panic!("expected VERIFICATION, got {}", other.kind()),
        }
    }

    #[test]
    fn test_register_remote_success_anchors() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();
        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();

        let mut anchor = MockLedgerAnchor::new();
        anchor
            .expect_register_evidence()
            .withf(|id, hash, _| id == "EVD_1" && hash == "h1")
            .times(1)
            .returning(|_, _, _| {
                Ok(AnchorReceipt {
                    status: "success".to_string(),
                    transaction_ref: "0xabc".to_string(),
                    block_ref: Some("42".to_string()),
                    timestamp: Utc::now().to_rfc3339(),
                })
            });

        let anchored = ledger
            .register_remote("EVD_1", "INV001", &anchor, &metadata())
            .unwrap();
        assert!(anchored);

        let chain = ledger.chain("EVD_1");
        assert!(chain[0].anchored);
        assert_eq!(chain[0].anchor_ref.as_deref(), Some("0xabc"));
        assert_eq!(chain[1].detail.kind(), "LEDGER_REGISTRATION");
    }

    #[test]
    fn test_register_remote_failure_keeps_local_event() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();
        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();

        let mut anchor = MockLedgerAnchor::new();
        anchor
            .expect_register_evidence()
            .returning(|_, _, _| Err(anyhow!("ledger unreachable")));

        let anchored = ledger
            .register_remote("EVD_1", "INV001", &anchor, &metadata())
            .unwrap();
        assert!(!anchored);

        let chain = ledger.chain("EVD_1");
        assert_eq!(chain.len(), 1);
        assert!(!chain[0].anchored);
    }

    #[test]
    fn test_reconcile_flips_anchored() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();
        let local = ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();
        let local_ts = local.timestamp.clone();

        let remote = vec![RemoteEvent {
            evidence_id: "EVD_1".to_string(),
            kind: "COLLECTION".to_string(),
            actor_id: "INV001".to_string(),
            timestamp: local_ts,
            transaction_ref: Some("0xdef".to_string()),
        }];

        let report = ledger.reconcile("EVD_1", &remote).unwrap();
        assert_eq!(report.matched, 1);
        assert!(report.unmatched_local.is_empty());
        assert!(report.orphan_remote.is_empty());
        assert!(ledger.chain("EVD_1")[0].anchored);
        assert_eq!(
            ledger.chain("EVD_1")[0].anchor_ref.as_deref(),
            Some("0xdef")
        );
    }

    #[test]
    fn test_reconcile_reports_drift_both_ways() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();
        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();

        // Remote event outside the window and of a different kind.
        let remote = vec![RemoteEvent {
            evidence_id: "EVD_1".to_string(),
            kind: "ACCESS".to_string(),
            actor_id: "INV002".to_string(),
            timestamp: "2020-01-01T00:00:00+00:00".to_string(),
            transaction_ref: Some("0xorphan".to_string()),
        }];

        let report = ledger.reconcile("EVD_1", &remote).unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(report.unmatched_local.len(), 1);
        assert_eq!(report.orphan_remote, vec!["0xorphan".to_string()]);
        assert!(!ledger.chain("EVD_1")[0].anchored);
    }

    #[test]
    fn test_statistics_counts() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();
        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();
        ledger
            .record(
                "EVD_1",
                "INV002",
                CustodyEventDetail::Access {
                    purpose: "review".to_string(),
                },
            )
            .unwrap();
        ledger
            .record("EVD_2", "INV001", collection_detail("h2"))
            .unwrap();

        let stats = ledger.statistics();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.events_by_kind["COLLECTION"], 2);
        assert_eq!(stats.events_by_kind["ACCESS"], 1);
        assert_eq!(stats.evidence_ids.len(), 2);
        assert_eq!(stats.actors.len(), 2);
        assert_eq!(stats.anchored_events, 0);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CustodyEvent {
            event_id: "e1".to_string(),
            evidence_id: "EVD_1".to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            actor_id: "INV001".to_string(),
            anchored: false,
            anchor_ref: None,
            detail: collection_detail("h1"),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "COLLECTION");
        assert_eq!(value["evidence_hash"], "h1");
        assert!(value.get("anchor_ref").is_none());

        let restored: CustodyEvent = serde_json::from_value(value).unwrap();
        assert_eq!(restored.detail.kind(), "COLLECTION");
    }

    #[test]
    fn test_report_generation_event() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();

        // Report generation is subject to the same first-event rule as any
        // other non-COLLECTION kind.
        assert!(ledger
            .record(
                "EVD_1",
                "INV001",
                CustodyEventDetail::ReportGeneration {
                    report_kind: "summary".to_string(),
                },
            )
            .is_err());

        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();
        ledger
            .record(
                "EVD_1",
                "INV001",
                CustodyEventDetail::ReportGeneration {
                    report_kind: "summary".to_string(),
                },
            )
            .unwrap();

        let chain = ledger.chain("EVD_1");
        assert_eq!(chain[1].detail.kind(), "REPORT_GENERATION");

        let value = serde_json::to_value(chain[1]).unwrap();
        assert_eq!(value["event_type"], "REPORT_GENERATION");
        assert_eq!(value["report_kind"], "summary");

        let restored: CustodyEvent = serde_json::from_value(value).unwrap();
        match restored.detail {
            CustodyEventDetail::ReportGeneration { report_kind } => {
                assert_eq!(report_kind, "summary");
            }
            other => panic!("expected REPORT_GENERATION, got {}", other.kind()),
        }

        assert_eq!(ledger.statistics().events_by_kind["REPORT_GENERATION"], 1);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let (_dir, session) = session();
        let mut ledger = CustodyLedger::open(&session).unwrap();
        ledger
            .record("EVD_1", "INV001", collection_detail("h1"))
            .unwrap();
        ledger
            .verify_integrity("EVD_1", "INV001", "h1", None)
            .unwrap();

        let chain = ledger.chain("EVD_1");
        assert!(chain[0].timestamp <= chain[1].timestamp);
    }
}
