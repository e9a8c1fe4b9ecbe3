//! Credential store errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("secure store error: {0}")]
    Backend(String),

    #[error("blocking task failed: {0}")]
    Task(String),
}
