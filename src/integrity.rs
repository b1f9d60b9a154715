//! Evidence hashing and verification.
//!
//! The hash discipline is write-then-stamp: the hashless record is persisted
//! first, the digest is computed over those persisted bytes, and only then is
//! the hash stamped into the record and the file rewritten. Verification
//! reverses the stamp: it strips the stored hash, re-serializes and compares.
//! Because the `evidence_hash` field is omitted entirely while unset, the
//! canonical bytes never contain the hash they produce.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::models::EvidenceRecord;
use crate::session::SessionContext;
use crate::utils::{atomic_write, sha256_bytes, sha256_file};

/// Outcome of verifying one evidence record, with enough detail for a
/// custody event.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub session_id: String,
    pub verified: bool,
    pub stored_hash: Option<String>,
    pub computed_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct IntegrityManager;

impl IntegrityManager {
    /// Canonical serialized form of a record: pretty JSON with no hash field.
    ///
    /// Callers pass an unsealed record; a sealed one is rejected rather than
    /// silently stripped, because stripping would hide a caller bug.
    pub fn canonical_bytes(record: &EvidenceRecord) -> Result<Vec<u8>> {
        if record.is_sealed() {
            bail!(
                "record {} is already sealed; canonical form is only defined pre-seal",
                record.session_id
            );
        }
        serde_json::to_vec_pretty(record).context("Failed to serialize evidence record")
    }

    /// Persist the record and seal it with the digest of its persisted bytes.
    ///
    /// Two writes on purpose: the first puts the exact canonical bytes on
    /// disk, the digest is computed from that file, and the second write adds
    /// the stamp. Returns the hash.
    pub fn persist(record: &mut EvidenceRecord, session: &SessionContext) -> Result<String> {
        let path = session.evidence_file();

        let canonical = Self::canonical_bytes(record)?;
        atomic_write(&path, &canonical)?;

        let hash = sha256_file(&path).context("Failed to hash persisted evidence")?;
        record.seal(hash.clone());

        let sealed =
            serde_json::to_vec_pretty(record).context("Failed to serialize sealed record")?;
        atomic_write(&path, &sealed)?;

        info!(
            "Evidence for session {} sealed with hash {}",
            record.session_id, hash
        );
        Ok(hash)
    }

    /// Verify the persisted evidence record against its own stored hash.
    pub fn verify(session: &SessionContext) -> Result<VerificationReport> {
        let record = Self::load(session)?;
        let computed = Self::recompute_hash(&record)?;

        let report = match &record.evidence_hash {
            None => VerificationReport {
                session_id: record.session_id.clone(),
                verified: false,
                stored_hash: None,
                computed_hash: computed,
                reason: Some("evidence record was never sealed".to_string()),
            },
            Some(stored) => {
                let verified = *stored == computed;
                VerificationReport {
                    session_id: record.session_id.clone(),
                    verified,
                    stored_hash: Some(stored.clone()),
                    computed_hash: computed,
                    reason: (!verified)
                        .then(|| "computed hash differs from the stored hash".to_string()),
                }
            }
        };

        if !report.verified {
            warn!(
                "Evidence verification failed for session {}: {}",
                report.session_id,
                report.reason.as_deref().unwrap_or("hash mismatch")
            );
        }
        Ok(report)
    }

    /// Verify the persisted evidence record against an externally supplied
    /// hash, for example one read from a custody receipt.
    pub fn verify_against(session: &SessionContext, expected: &str) -> Result<VerificationReport> {
        let record = Self::load(session)?;
        let computed = Self::recompute_hash(&record)?;
        let verified = computed == expected;

        Ok(VerificationReport {
            session_id: record.session_id,
            verified,
            stored_hash: Some(expected.to_string()),
            computed_hash: computed,
            reason: (!verified)
                .then(|| "computed hash differs from the supplied hash".to_string()),
        })
    }

    fn load(session: &SessionContext) -> Result<EvidenceRecord> {
        let path = session.evidence_file();
        let content = std::fs::read_to_string(&path)
            .context(format!("Failed to read evidence file {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse evidence record")
    }

    /// Recompute the canonical hash of a loaded record by stripping the
    /// stamp and re-serializing. Typed round-tripping means cosmetic
    /// differences (key order, whitespace) cannot leak into the digest.
    fn recompute_hash(record: &EvidenceRecord) -> Result<String> {
        let mut hashless = record.clone();
        hashless.invalidate_hash();
        let canonical = Self::canonical_bytes(&hashless)?;
        Ok(sha256_bytes(&canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionResult, Domain, HostDescriptor};
    use serde_json::json;
    use tempfile::TempDir;

    fn session() -> (TempDir, SessionContext) {
        let dir = TempDir::new().unwrap();
        let session = SessionContext::create(dir.path()).unwrap();
        (dir, session)
    }

    fn record(session: &SessionContext) -> EvidenceRecord {
        let mut record = EvidenceRecord::new(
            session.session_id(),
            "INV001",
            HostDescriptor::capture(),
            false,
        );
        let mut result = CollectionResult::new(Domain::Disk);
        result.findings.insert("marker", json!("payload"));
        record.merge(result).unwrap();
        record
    }

    #[test]
    fn test_persist_seals_and_verifies() {
        let (_dir, session) = session();
        let mut record = record(&session);

        let hash = IntegrityManager::persist(&mut record, &session).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(record.is_sealed());

        let report = IntegrityManager::verify(&session).unwrap();
        assert!(report.verified);
        assert_eq!(report.stored_hash, Some(hash.clone()));
        assert_eq!(report.computed_hash, hash);
        assert!(report.reason.is_none());
    }

    #[test]
    fn test_verify_is_idempotent() {
        let (_dir, session) = session();
        let mut record = record(&session);
        IntegrityManager::persist(&mut record, &session).unwrap();

        let first = IntegrityManager::verify(&session).unwrap();
        let second = IntegrityManager::verify(&session).unwrap();
        assert!(first.verified && second.verified);
        assert_eq!(first.computed_hash, second.computed_hash);
    }

    #[test]
    fn test_tampering_is_detected() {
        let (_dir, session) = session();
        let mut record = record(&session);
        IntegrityManager::persist(&mut record, &session).unwrap();

        // Mutate a finding in the persisted file, keeping the stored hash.
        let path = session.evidence_file();
        let content = std::fs::read_to_string(&path).unwrap();
        let tampered = content.replace("\"payload\"", "\"doctored\"");
        assert_ne!(content, tampered);
        std::fs::write(&path, tampered).unwrap();

        let report = IntegrityManager::verify(&session).unwrap();
        assert!(!report.verified);
        assert_ne!(report.stored_hash.unwrap(), report.computed_hash);
    }

    #[test]
    fn test_persist_refuses_sealed_record() {
        let (_dir, session) = session();
        let mut record = record(&session);
        IntegrityManager::persist(&mut record, &session).unwrap();

        assert!(IntegrityManager::persist(&mut record, &session).is_err());

        // Invalidation opens a new revision that can be sealed again.
        record.invalidate_hash();
        assert!(IntegrityManager::persist(&mut record, &session).is_ok());
    }

    #[test]
    fn test_unsealed_file_reports_reason() {
        let (_dir, session) = session();
        let record = record(&session);
        let canonical = IntegrityManager::canonical_bytes(&record).unwrap();
        atomic_write(&session.evidence_file(), &canonical).unwrap();

        let report = IntegrityManager::verify(&session).unwrap();
        assert!(!report.verified);
        assert!(report.stored_hash.is_none());
        assert!(report.reason.unwrap().contains("never sealed"));
    }

    #[test]
    fn test_verify_against_external_hash() {
        let (_dir, session) = session();
        let mut record = record(&session);
        let hash = IntegrityManager::persist(&mut record, &session).unwrap();

        assert!(IntegrityManager::verify_against(&session, &hash)
            .unwrap()
            .verified);
        assert!(!IntegrityManager::verify_against(&session, "0".repeat(64).as_str())
            .unwrap()
            .verified);
    }

    #[test]
    fn test_identical_content_hashes_identically() {
        let (_dir_a, session_a) = session();
        let (_dir_b, session_b) = session();

        let build = |session: &SessionContext| {
            let mut record = EvidenceRecord::new("fixed-id", "INV001", fixed_host(), false);
            record.created_at = "2024-01-01T00:00:00+00:00".to_string();
            let mut result = CollectionResult::new(Domain::Memory);
            result.started_at = "2024-01-01T00:00:01+00:00".to_string();
            result.findings.insert("stable", json!({"k": 1}));
            record.merge(result).unwrap();
            IntegrityManager::persist(&mut record, session).unwrap()
        };

        assert_eq!(build(&session_a), build(&session_b));
    }

    fn fixed_host() -> HostDescriptor {
        HostDescriptor {
            hostname: Some("host".to_string()),
            os_name: Some("os".to_string()),
            os_version: Some("1".to_string()),
            kernel_version: Some("k".to_string()),
            architecture: "x86_64".to_string(),
        }
    }
}
