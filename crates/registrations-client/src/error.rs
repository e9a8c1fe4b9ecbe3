//! Registrations client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationsError {
    /// No API key on file; the administrator has to save one first.
    #[error("no API key saved")]
    MissingApiKey,

    #[error("authentication failed: {status} - {message}")]
    Auth { status: u16, message: String },

    #[error("server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("credential store error: {0}")]
    Store(#[from] credential_store::StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
