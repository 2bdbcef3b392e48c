// --- File: crates/critterkeep_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// Error type every route handler returns.
///
/// Crates keep their own error enums (`DbError`, `PushError`) and convert
/// into this one at the HTTP boundary.
#[derive(Error, Debug)]
pub enum CritterError {
    /// Missing or invalid configuration, including disabled features
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Missing or invalid bearer token
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Authenticated, but the access policy denies the action
    #[error("Forbidden: {0}")]
    ForbiddenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub trait HttpStatusCode {
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for CritterError {
    fn status_code(&self) -> u16 {
        match self {
            CritterError::ValidationError(_) => 400,
            CritterError::AuthError(_) => 401,
            CritterError::ForbiddenError(_) => 403,
            CritterError::NotFoundError(_) => 404,
            CritterError::ExternalServiceError { .. } => 502,
            CritterError::TimeoutError(_) => 504,
            CritterError::ConfigError(_)
            | CritterError::DatabaseError(_)
            | CritterError::InternalError(_) => 500,
        }
    }
}

// A body we produced ourselves failed to serialize.
impl From<serde_json::Error> for CritterError {
    fn from(err: serde_json::Error) -> Self {
        CritterError::InternalError(err.to_string())
    }
}

pub fn config_error<T: fmt::Display>(message: T) -> CritterError {
    CritterError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> CritterError {
    CritterError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> CritterError {
    CritterError::NotFoundError(message.to_string())
}

pub fn forbidden<T: fmt::Display>(message: T) -> CritterError {
    CritterError::ForbiddenError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> CritterError {
    CritterError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> CritterError {
    CritterError::InternalError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(validation_error("bad").status_code(), 400);
        assert_eq!(not_found("task 3").status_code(), 404);
        assert_eq!(forbidden("admin only").status_code(), 403);
        assert_eq!(CritterError::AuthError("no token".into()).status_code(), 401);
        assert_eq!(external_service_error("push", "down").status_code(), 502);
        assert_eq!(config_error("push disabled").status_code(), 500);
        assert_eq!(internal_error("boom").status_code(), 500);
    }

    #[test]
    fn external_service_error_names_the_service() {
        let err = external_service_error("web-push", "connection reset");
        assert_eq!(
            err.to_string(),
            "External service error: web-push - connection reset"
        );
    }
}
