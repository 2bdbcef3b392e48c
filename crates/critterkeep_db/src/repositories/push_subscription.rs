//! Repository for Web Push subscriptions
//!
//! One row per (user, endpoint). Re-subscribing the same endpoint refreshes
//! the row instead of duplicating it.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored push destination, including the browser's encryption keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    pub subscription_id: i64,
    pub user_id: i64,
    pub endpoint: String,
    /// Browser public key (base64url, uncompressed P-256 point)
    pub p256dh: String,
    /// Browser auth secret (base64url, 16 bytes)
    pub auth: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// A subscription as shown to its owner: everything except the keys.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionView {
    pub subscription_id: i64,
    pub user_id: i64,
    pub endpoint: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl From<&PushSubscription> for PushSubscriptionView {
    fn from(sub: &PushSubscription) -> Self {
        Self {
            subscription_id: sub.subscription_id,
            user_id: sub.user_id,
            endpoint: sub.endpoint.clone(),
            user_agent: sub.user_agent.clone(),
            created_at: sub.created_at,
            last_used: sub.last_used,
        }
    }
}

/// Input for [`PushSubscriptionRepository::create_or_refresh`].
#[derive(Debug, Clone)]
pub struct NewPushSubscription {
    pub user_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: String,
}

/// Repository for push subscriptions
pub trait PushSubscriptionRepository {
    /// Create the `push_subscriptions` table if it doesn't exist.
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Store a subscription, or refresh `last_used` and the user agent when
    /// the user already registered this endpoint.
    ///
    /// # Returns
    ///
    /// The stored row and `true` if it was newly created.
    fn create_or_refresh(
        &self,
        subscription: NewPushSubscription,
    ) -> impl std::future::Future<Output = Result<(PushSubscription, bool), DbError>> + Send;

    /// All subscriptions of a user, possibly none.
    fn list_by_owner(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<PushSubscription>, DbError>> + Send;

    /// Delete one subscription. `false` means it was already gone, which
    /// callers treat as success.
    fn evict(
        &self,
        subscription_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Explicit unsubscribe. `false` when the user had no such endpoint.
    fn delete_by_endpoint(
        &self,
        user_id: i64,
        endpoint: &str,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Record a successful delivery.
    fn touch_last_used(
        &self,
        subscription_id: i64,
    ) -> impl std::future::Future<Output = Result<(), DbError>> + Send;
}
