//! Boundary to the remote ledger collaborator.
//!
//! Every operation here is fallible and retryable; the local custody log
//! never waits on the anchor to be valid. Transaction signing and contract
//! semantics live entirely on the other side of this trait.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Metadata attached to an evidence registration on the remote ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationMetadata {
    pub investigator_id: String,
    pub collection_source: String,
    pub domains: Vec<String>,
    pub tools_used: Vec<String>,
}

/// Receipt for a successful remote write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub status: String,
    pub transaction_ref: String,
    pub block_ref: Option<String>,
    pub timestamp: String,
}

/// One custody event as reported back by the remote ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub evidence_id: String,
    pub kind: String,
    pub actor_id: String,
    pub timestamp: String,
    pub transaction_ref: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
pub trait LedgerAnchor {
    /// Register newly collected evidence and its hash.
    fn register_evidence(
        &self,
        evidence_id: &str,
        hash: &str,
        metadata: &RegistrationMetadata,
    ) -> Result<AnchorReceipt>;

    /// Mirror one custody event to the remote ledger.
    fn add_custody_event(
        &self,
        evidence_id: &str,
        actor: &str,
        action: &str,
        remarks: &str,
    ) -> Result<AnchorReceipt>;

    /// The remote ledger's view of the custody chain for one evidence id.
    fn custody_chain(&self, evidence_id: &str) -> Result<Vec<RemoteEvent>>;

    /// Ask the remote ledger whether it holds this hash for this evidence.
    fn verify_hash(&self, evidence_id: &str, hash: &str) -> Result<bool>;
}
