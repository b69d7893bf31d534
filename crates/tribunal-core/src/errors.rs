//! Error taxonomy for the completion-service boundary.
//!
//! Only transport/service failures exist as error values; malformed
//! structured output and bad capability arguments are absorbed by
//! [`crate::decode`] and never cross a component boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("completion service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion service error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("completion service response missing content")]
    MissingContent,

    #[error("completion service call timed out after {0:?}")]
    Timeout(std::time::Duration),
}
