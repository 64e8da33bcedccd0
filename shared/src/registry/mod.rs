pub mod control;
pub mod v2;

pub use control::RegistryControlClient;
pub use v2::RegistryV2Client;

use thiserror::Error;

/// Errors from either registry-facing HTTP client. `NotFound` must stay
/// distinguishable from everything else: GC treats a missing manifest or
/// blob as successful reclamation, never as a failure (spec §7).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
            || matches!(self, RegistryError::UnexpectedStatus { status, .. } if *status == 404)
    }
}

/// Swallows a not-found error, turning it into `Ok(())`. Every registry
/// delete call in sweep goes through this, matching the Go
/// `ignoreNotFound` helper.
pub fn ignore_not_found(result: Result<(), RegistryError>) -> Result<(), RegistryError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
