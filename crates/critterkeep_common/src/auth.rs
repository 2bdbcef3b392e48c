// --- File: crates/critterkeep_common/src/auth.rs ---
//! Bearer-token authentication and the admin access policy.
//!
//! Routers keep a [`JwtVerifier`] in their state and expose it through
//! [`AuthState`]; handlers then take an [`AuthUser`] argument.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use critterkeep_config::AuthConfig;

use crate::error::{internal_error, CritterError};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: i64,
    exp: usize, // Unix epoch seconds
}

/// HS256 token verifier (and issuer, for tooling and tests).
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Returns the user id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<i64, CritterError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.user_id)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                CritterError::AuthError("invalid or expired token".to_string())
            })
    }

    /// Issues a token for `user_id` valid for `ttl_secs`.
    pub fn issue(&self, user_id: i64, ttl_secs: i64) -> Result<String, CritterError> {
        let exp = (Utc::now().timestamp() + ttl_secs).max(0) as usize;
        encode(
            &Header::new(Algorithm::HS256),
            &Claims { user_id, exp },
            &self.encoding_key,
        )
        .map_err(|e| internal_error(format!("failed to sign token: {}", e)))
    }
}

/// Router state that can verify bearer tokens.
pub trait AuthState {
    fn jwt_verifier(&self) -> &JwtVerifier;
}

impl<T: AuthState> AuthState for Arc<T> {
    fn jwt_verifier(&self) -> &JwtVerifier {
        (**self).jwt_verifier()
    }
}

/// The authenticated caller, taken from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: AuthState + Send + Sync,
{
    type Rejection = CritterError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CritterError::AuthError("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| CritterError::AuthError("expected a Bearer token".to_string()))?;

        let user_id = state.jwt_verifier().verify(token.trim())?;
        Ok(AuthUser { user_id })
    }
}

/// Privileged operations gated by [`AccessPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read or modify tasks owned by other users.
    ManageAnyTask,
    /// Move a task from one owner to another.
    ReassignTaskOwner,
}

pub trait AccessPolicy: Send + Sync {
    fn is_authorized(&self, user_id: i64, action: Action) -> bool;
}

/// Grants every [`Action`] to the configured admin ids and nothing to anyone else.
#[derive(Debug, Clone, Default)]
pub struct ConfigAccessPolicy {
    admin_ids: HashSet<i64>,
}

impl ConfigAccessPolicy {
    pub fn new(admin_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            admin_ids: admin_ids.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.admin_user_ids.iter().copied())
    }
}

impl AccessPolicy for ConfigAccessPolicy {
    fn is_authorized(&self, user_id: i64, _action: Action) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// Fails with 403 unless `policy` allows `user` to perform `action`.
pub fn require(policy: &dyn AccessPolicy, user: AuthUser, action: Action) -> Result<(), CritterError> {
    if policy.is_authorized(user.user_id, action) {
        Ok(())
    } else {
        Err(CritterError::ForbiddenError(format!(
            "user {} may not perform {:?}",
            user.user_id, action
        )))
    }
}
