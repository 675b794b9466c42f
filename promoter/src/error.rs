//! Domain error kinds for a promotion run.
//!
//! Core logic and the git transport return [`PromotionError`] so callers can
//! tell the failure kinds apart. Orchestration wraps them in `anyhow` with
//! context; the CLI recovers the kind with `downcast_ref` to pick an exit code.

use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("environment '{0}' not found in ledger header")]
    UnknownEnvironment(String),

    #[error("no branch recorded for environment '{0}'")]
    NoBranchRecorded(String),

    #[error("a new version is required when '{env}' and the next tier share branch '{branch}'")]
    MissingVersion { env: String, branch: String },

    #[error("invalid branch name '{name}': {reason}")]
    InvalidBranchFormat { name: String, reason: String },

    #[error("invalid ledger: {0}")]
    InvalidLedger(String),

    #[error("ledger file {}: {source}", .path.display())]
    LedgerIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("base branch '{0}' not found on remote")]
    BaseBranchNotFound(String),

    #[error("push of branch '{branch}' rejected: {detail}")]
    PushRejected { branch: String, detail: String },

    #[error("push of ledger update to '{branch}' rejected: {detail}")]
    LedgerPushRejected { branch: String, detail: String },

    #[error("git {command} timed out after {timeout_secs}s")]
    TransportTimeout { command: String, timeout_secs: u64 },

    #[error("credential missing: environment variable {0} is not set")]
    CredentialMissing(String),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },
}

impl PromotionError {
    pub(crate) fn invalid_branch(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidBranchFormat {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownEnvironment(_)
            | Self::NoBranchRecorded(_)
            | Self::MissingVersion { .. }
            | Self::InvalidBranchFormat { .. }
            | Self::InvalidLedger(_) => exit_codes::INVALID_INPUT,
            Self::BaseBranchNotFound(_)
            | Self::PushRejected { .. }
            | Self::LedgerPushRejected { .. } => exit_codes::REMOTE_REJECTED,
            Self::TransportTimeout { .. } | Self::CredentialMissing(_) | Self::Git { .. } => {
                exit_codes::TRANSPORT
            }
            Self::LedgerIo { .. } => exit_codes::FAILED,
        }
    }
}
