//! Per-session directory layout and lifecycle state.
//!
//! A session owns one directory tree under the evidence base directory:
//! per-domain result files, the merged evidence record, the custody log and
//! a reports directory for downstream collaborators. The context is owned by
//! the caller and passed explicitly; there is no global current session.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::constants::{
    CUSTODY_LOG_NAME, EVIDENCE_FILE_NAME, EVIDENCE_ID_PREFIX, REPORTS_DIR_NAME, SESSION_DIR_PREFIX,
};
use crate::models::{Domain, EvidenceRecord};

#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    root: PathBuf,
}

/// Artifacts a front end may download from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Evidence,
    CustodyLog,
    DomainResult(Domain),
}

/// Lifecycle state derived from what is on disk. Purely a read.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub evidence_present: bool,
    pub sealed: bool,
    pub custody_log_present: bool,
    pub domains_collected: Vec<Domain>,
}

impl SessionContext {
    /// Create a fresh timestamped session directory with all subdirectories.
    ///
    /// Failure here is the fatal path: without a session directory no domain
    /// can produce a result.
    pub fn create(base_dir: &Path) -> Result<Self> {
        let session_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let root = base_dir.join(format!("{}{}", SESSION_DIR_PREFIX, session_id));

        fs::create_dir_all(&root).context(format!(
            "Failed to create session directory {}",
            root.display()
        ))?;
        for domain in Domain::ALL {
            fs::create_dir_all(root.join(domain.dir_name()))
                .context("Failed to create domain subdirectory")?;
        }
        fs::create_dir_all(root.join(REPORTS_DIR_NAME))
            .context("Failed to create reports subdirectory")?;

        info!("Session {} created at {}", session_id, root.display());
        Ok(Self { session_id, root })
    }

    /// Open an existing session directory, for verification and custody
    /// queries after the fact.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("session directory {} does not exist", root.display());
        }
        let dir_name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let session_id = dir_name
            .strip_prefix(SESSION_DIR_PREFIX)
            .unwrap_or(&dir_name)
            .to_string();

        Ok(Self {
            session_id,
            root: root.to_path_buf(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Evidence identifier registered with the custody ledger.
    pub fn evidence_id(&self) -> String {
        format!("{}{}", EVIDENCE_ID_PREFIX, self.session_id)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn domain_dir(&self, domain: Domain) -> PathBuf {
        self.root.join(domain.dir_name())
    }

    pub fn evidence_file(&self) -> PathBuf {
        self.root.join(EVIDENCE_FILE_NAME)
    }

    pub fn custody_log(&self) -> PathBuf {
        self.root.join(CUSTODY_LOG_NAME)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR_NAME)
    }

    /// Download pass-through for the front-end collaborator.
    pub fn artifact(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::Evidence => self.evidence_file(),
            ArtifactKind::CustodyLog => self.custody_log(),
            ArtifactKind::DomainResult(domain) => self
                .domain_dir(domain)
                .join(format!("{}_forensics.json", domain)),
        }
    }

    /// Derive the session's lifecycle state from what is on disk.
    pub fn status(&self) -> SessionStatus {
        let evidence_path = self.evidence_file();
        let evidence_present = evidence_path.is_file();

        let sealed = evidence_present
            && fs::read_to_string(&evidence_path)
                .ok()
                .and_then(|s| serde_json::from_str::<EvidenceRecord>(&s).ok())
                .map(|r| r.is_sealed())
                .unwrap_or(false);

        let domains_collected = Domain::ALL
            .iter()
            .copied()
            .filter(|d| self.artifact(ArtifactKind::DomainResult(*d)).is_file())
            .collect();

        SessionStatus {
            session_id: self.session_id.clone(),
            evidence_present,
            sealed,
            custody_log_present: self.custody_log().is_file(),
            domains_collected,
        }
    }
}
