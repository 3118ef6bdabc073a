//! Processing services: batch orchestration, quarantine handling,
//! reconciliation and gap detection.

pub mod gaps;
pub mod quarantine;
pub mod reconcile;
pub mod scan;

use thiserror::Error;

use crate::repository::RepositoryError;
use crate::vault::VaultError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
