//! Application error types.

use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Credential store error: {0}")]
    Store(#[from] credential_store::StoreError),

    #[error("Registrations error: {0}")]
    Registrations(#[from] registrations_client::RegistrationsError),
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;
