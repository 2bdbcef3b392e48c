// --- File: crates/critterkeep_common/src/lib.rs ---

pub mod auth; // Bearer auth extractor and access policy
pub mod error; // Shared error type
pub mod http; // Error responses and the outbound HTTP client
pub mod logging; // Tracing setup

pub use error::{
    config_error, external_service_error, forbidden, internal_error, not_found, validation_error,
    CritterError, HttpStatusCode,
};

pub use http::client::create_client;

pub use auth::{AccessPolicy, Action, AuthState, AuthUser, ConfigAccessPolicy, JwtVerifier};
