//! Fan-out of notifications to subscriptions
//!
//! Delivery is best-effort. A failure for one subscription is logged and
//! counted and never stops delivery to the others; a batch never fails as a
//! whole.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use critterkeep_db::{
    PushSubscription, PushSubscriptionRepository, ResetEvent, SqlPushSubscriptionRepository,
};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::PushTransport;
use crate::composer::NotificationPayload;
use crate::error::PushError;

/// How a push service answered one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The subscription no longer exists at the push service (404 or 410).
    Gone(u16),
    /// Any other non-2xx status. Not retried.
    Failed(u16),
}

/// Maps a push service status code to an outcome.
pub fn classify_status(status: u16) -> DeliveryOutcome {
    match status {
        200..=299 => DeliveryOutcome::Delivered,
        404 | 410 => DeliveryOutcome::Gone(status),
        other => DeliveryOutcome::Failed(other),
    }
}

/// Counts for one [`NotificationSender::deliver_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub delivered: usize,
    pub gone: usize,
    pub failed: usize,
    /// Transport errors, timeouts and storage errors.
    pub errors: usize,
    /// Events whose payload could not be composed.
    pub skipped: usize,
}

impl BatchReport {
    fn record(&mut self, result: &Result<DeliveryOutcome, PushError>) {
        match result {
            Ok(DeliveryOutcome::Delivered) => self.delivered += 1,
            Ok(DeliveryOutcome::Gone(_)) => self.gone += 1,
            Ok(DeliveryOutcome::Failed(_)) => self.failed += 1,
            Err(_) => self.errors += 1,
        }
    }

    fn merge(&mut self, other: BatchReport) {
        self.delivered += other.delivered;
        self.gone += other.gone;
        self.failed += other.failed;
        self.errors += other.errors;
        self.skipped += other.skipped;
    }
}

/// Result of one delivery attempt, kept with its subscription.
#[derive(Debug)]
pub struct SubscriptionDelivery {
    pub subscription: PushSubscription,
    pub result: Result<DeliveryOutcome, PushError>,
}

#[derive(Clone)]
pub struct NotificationSender {
    transport: Arc<dyn PushTransport>,
    registry: SqlPushSubscriptionRepository,
    timeout: Duration,
}

impl std::fmt::Debug for NotificationSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSender")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl NotificationSender {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        registry: SqlPushSubscriptionRepository,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            timeout,
        }
    }

    /// Sends one payload to one subscription and applies the outcome to the
    /// registry: `last_used` is touched on success, the row is evicted when
    /// the push service reports it gone.
    pub async fn deliver_one(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<DeliveryOutcome, PushError> {
        let status = tokio::time::timeout(self.timeout, self.transport.send(subscription, payload))
            .await
            .map_err(|_| PushError::Timeout(self.timeout.as_secs()))??;

        let outcome = classify_status(status);
        match outcome {
            DeliveryOutcome::Delivered => {
                if let Err(e) = self.registry.touch_last_used(subscription.subscription_id).await {
                    // The push went out; a stale timestamp is not a failed delivery.
                    warn!(
                        subscription_id = subscription.subscription_id,
                        "Failed to touch push subscription: {}", e
                    );
                }
            }
            DeliveryOutcome::Gone(_) => {
                info!(
                    subscription_id = subscription.subscription_id,
                    user_id = subscription.user_id,
                    status,
                    "Push subscription expired, evicting"
                );
                // Already deleted by a concurrent request counts as evicted.
                self.registry.evict(subscription.subscription_id).await?;
            }
            DeliveryOutcome::Failed(status) => {
                warn!(
                    subscription_id = subscription.subscription_id,
                    status, "Push service rejected notification"
                );
            }
        }
        Ok(outcome)
    }

    /// Delivers every reset event to every subscription of the event's owner.
    ///
    /// One task per distinct owner; deliveries for one owner run in order.
    pub async fn deliver_batch(&self, events: Vec<ResetEvent>) -> BatchReport {
        let mut by_owner: BTreeMap<i64, Vec<ResetEvent>> = BTreeMap::new();
        for event in events {
            by_owner.entry(event.owner_id).or_default().push(event);
        }

        let mut set = JoinSet::new();
        for (owner_id, owner_events) in by_owner {
            let sender = self.clone();
            set.spawn(async move { sender.deliver_to_owner(owner_id, owner_events).await });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(owner_report) => report.merge(owner_report),
                Err(e) => {
                    error!("Notification task for an owner aborted: {}", e);
                    report.errors += 1;
                }
            }
        }
        report
    }

    async fn deliver_to_owner(&self, owner_id: i64, events: Vec<ResetEvent>) -> BatchReport {
        let mut report = BatchReport::default();

        let subscriptions = match self.registry.list_by_owner(owner_id).await {
            Ok(subs) => subs,
            Err(e) => {
                error!(owner_id, "Failed to load push subscriptions: {}", e);
                report.errors += 1;
                return report;
            }
        };
        if subscriptions.is_empty() {
            debug!(owner_id, "No push subscriptions, nothing to deliver");
            return report;
        }

        let mut evicted = HashSet::new();
        for event in &events {
            let payload = match NotificationPayload::for_reset(event).to_json() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(task_id = event.task_id, "Failed to compose notification: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };

            for subscription in &subscriptions {
                if evicted.contains(&subscription.subscription_id) {
                    continue;
                }
                let result = self.deliver_one(subscription, &payload).await;
                match &result {
                    Ok(DeliveryOutcome::Gone(_)) => {
                        evicted.insert(subscription.subscription_id);
                    }
                    Err(e) => warn!(
                        subscription_id = subscription.subscription_id,
                        task_id = event.task_id,
                        "Push delivery failed: {}",
                        e
                    ),
                    _ => {}
                }
                report.record(&result);
            }
        }

        debug!(owner_id, ?report, "Owner notifications processed");
        report
    }

    /// Sends `payload` to every subscription of `user_id` and returns the
    /// per-subscription results.
    pub async fn send_to_user(
        &self,
        user_id: i64,
        payload: &NotificationPayload,
    ) -> Result<Vec<SubscriptionDelivery>, PushError> {
        let subscriptions = self.registry.list_by_owner(user_id).await?;
        let body = payload.to_json()?;

        let mut deliveries = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let result = self.deliver_one(&subscription, &body).await;
            deliveries.push(SubscriptionDelivery {
                subscription,
                result,
            });
        }
        Ok(deliveries)
    }
}
