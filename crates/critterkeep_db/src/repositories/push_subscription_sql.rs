//! SQL implementation of the push subscription repository

use crate::error::DbError;
use crate::repositories::push_subscription::{
    NewPushSubscription, PushSubscription, PushSubscriptionRepository,
};
use crate::DbClient;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

const COLUMNS: &str =
    "subscription_id, user_id, endpoint, p256dh, auth, user_agent, created_at, last_used";

// One statement, so concurrent re-subscribes never race a separate lookup.
// `refresh_count` stays 0 only on the insert path.
const UPSERT_QUERY: &str = r#"
    INSERT INTO push_subscriptions
        (user_id, endpoint, p256dh, auth, user_agent, created_at, last_used, refresh_count)
    VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
    ON CONFLICT (user_id, endpoint) DO UPDATE SET
        last_used = excluded.last_used,
        user_agent = excluded.user_agent,
        refresh_count = push_subscriptions.refresh_count + 1
    RETURNING subscription_id, user_id, endpoint, p256dh, auth, user_agent,
              created_at, last_used, refresh_count
"#;

fn subscription_from_row(row: &AnyRow) -> Result<PushSubscription, DbError> {
    let created_at: i64 = row.try_get("created_at")?;
    let last_used: i64 = row.try_get("last_used")?;
    Ok(PushSubscription {
        subscription_id: row.try_get("subscription_id")?,
        user_id: row.try_get("user_id")?,
        endpoint: row.try_get("endpoint")?,
        p256dh: row.try_get("p256dh")?,
        auth: row.try_get("auth")?,
        user_agent: row.try_get("user_agent")?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
        last_used: DateTime::from_timestamp(last_used, 0).unwrap_or_default(),
    })
}

/// SQL implementation of the push subscription repository
#[derive(Debug, Clone)]
pub struct SqlPushSubscriptionRepository {
    /// The database client
    db_client: DbClient,
}

impl SqlPushSubscriptionRepository {
    /// Create a new SQL push subscription repository
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

impl PushSubscriptionRepository for SqlPushSubscriptionRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing push subscription schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS push_subscriptions (
                subscription_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                endpoint TEXT NOT NULL,
                p256dh TEXT NOT NULL,
                auth TEXT NOT NULL,
                user_agent TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                last_used INTEGER NOT NULL,
                refresh_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, endpoint)
            )
        "#;

        self.db_client.execute(query).await?;

        info!("Push subscription schema initialized successfully");
        Ok(())
    }

    async fn create_or_refresh(
        &self,
        subscription: NewPushSubscription,
    ) -> Result<(PushSubscription, bool), DbError> {
        debug!(user_id = subscription.user_id, "Registering push subscription");
        let now = Utc::now().timestamp();

        let row = sqlx::query(UPSERT_QUERY)
            .bind(subscription.user_id)
            .bind(&subscription.endpoint)
            .bind(&subscription.p256dh)
            .bind(&subscription.auth)
            .bind(&subscription.user_agent)
            .bind(now)
            .bind(now)
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to register push subscription: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        let refresh_count: i64 = row.try_get("refresh_count")?;
        let created = refresh_count == 0;
        let stored = subscription_from_row(&row)?;

        if created {
            info!(
                subscription_id = stored.subscription_id,
                user_id = stored.user_id,
                "Push subscription created"
            );
        } else {
            debug!(
                subscription_id = stored.subscription_id,
                "Refreshed existing push subscription"
            );
        }
        Ok((stored, created))
    }

    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<PushSubscription>, DbError> {
        debug!(user_id, "Listing push subscriptions");

        let query = format!(
            "SELECT {} FROM push_subscriptions WHERE user_id = $1 ORDER BY subscription_id",
            COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to list push subscriptions: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn evict(&self, subscription_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE subscription_id = $1")
            .bind(subscription_id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to evict push subscription: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(subscription_id, "Push subscription evicted");
        } else {
            debug!(subscription_id, "Push subscription already gone");
        }
        Ok(deleted)
    }

    async fn delete_by_endpoint(&self, user_id: i64, endpoint: &str) -> Result<bool, DbError> {
        let result =
            sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND endpoint = $2")
                .bind(user_id)
                .bind(endpoint)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| {
                    error!("Failed to delete push subscription: {}", e);
                    DbError::QueryError(e.to_string())
                })?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_used(&self, subscription_id: i64) -> Result<(), DbError> {
        sqlx::query("UPDATE push_subscriptions SET last_used = $1 WHERE subscription_id = $2")
            .bind(Utc::now().timestamp())
            .bind(subscription_id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to touch push subscription: {}", e);
                DbError::QueryError(e.to_string())
            })?;
        Ok(())
    }
}
