//! Chain-of-custody tracking.
//!
//! The local custody log is the single source of truth: it is append-only,
//! saved with the same atomic-write discipline as the evidence file, and
//! valid on its own even when the remote ledger anchor is unreachable. The
//! remote anchor is an eventually reconciled mirror, cross-checked by
//! [`ledger::CustodyLedger::reconcile`].

pub mod anchor;
pub mod ledger;

pub use anchor::{AnchorReceipt, LedgerAnchor, RegistrationMetadata, RemoteEvent};
pub use ledger::{
    CustodyEvent, CustodyEventDetail, CustodyLedger, CustodyStatistics, IntegrityVerdict,
    ReconcileReport, VerificationResult,
};
