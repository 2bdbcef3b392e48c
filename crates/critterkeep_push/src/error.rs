//! Errors raised while delivering Web Push notifications

use critterkeep_common::{external_service_error, CritterError};
use critterkeep_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    /// Push is disabled or the VAPID keys are missing or malformed
    #[error("Push configuration error: {0}")]
    ConfigError(String),

    #[error("VAPID signing failed: {0}")]
    JwtError(String),

    /// The subscription's keys could not be used to encrypt the payload
    #[error("Payload encryption failed: {0}")]
    EncryptionError(String),

    #[error("Invalid push endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Payload serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Push request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Push request timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    DbError(#[from] DbError),
}

impl From<PushError> for CritterError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::ConfigError(msg) => CritterError::ConfigError(msg),
            PushError::DbError(db) => db.into(),
            PushError::Timeout(secs) => {
                CritterError::TimeoutError(format!("push request exceeded {}s", secs))
            }
            other => external_service_error("web-push", other),
        }
    }
}
