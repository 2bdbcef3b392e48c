//! Shared helpers for the push integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use critterkeep_db::{
    DbClient, NewPushSubscription, PushSubscription, PushSubscriptionRepository, ResetEvent,
    SqlPushSubscriptionRepository, SubjectKind,
};
use critterkeep_push::{NotificationSender, PushError, PushTransport};
use p256::ecdsa::SigningKey;
use rand_core::{OsRng, RngCore};

pub async fn setup_registry() -> (DbClient, SqlPushSubscriptionRepository) {
    let db = DbClient::from_url_with_pool_size("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite");
    let registry = SqlPushSubscriptionRepository::new(db.clone());
    registry.init_schema().await.expect("subscription schema");
    (db, registry)
}

/// A browser-side key pair as a real `PushSubscription` would carry it.
pub fn browser_keys() -> (String, String) {
    let key = SigningKey::random(&mut OsRng);
    let p256dh = URL_SAFE_NO_PAD.encode(key.verifying_key().to_encoded_point(false).as_bytes());
    let mut auth = [0u8; 16];
    OsRng.fill_bytes(&mut auth);
    (p256dh, URL_SAFE_NO_PAD.encode(auth))
}

pub async fn subscribe(
    registry: &SqlPushSubscriptionRepository,
    user_id: i64,
    endpoint: &str,
) -> PushSubscription {
    let (p256dh, auth) = browser_keys();
    let (sub, _) = registry
        .create_or_refresh(NewPushSubscription {
            user_id,
            endpoint: endpoint.to_string(),
            p256dh,
            auth,
            user_agent: "Mozilla/5.0 (test)".to_string(),
        })
        .await
        .expect("subscribe");
    sub
}

pub fn reset_event(task_id: i64, owner_id: i64) -> ResetEvent {
    ResetEvent {
        task_id,
        task_name: "Feed".to_string(),
        task_desc: "Two crickets".to_string(),
        owner_id,
        subject_name: "Rex".to_string(),
        subject_kind: SubjectKind::Animal,
    }
}

/// What the fake push service answers for an endpoint.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(u16),
    Unreachable,
}

/// A push service stand-in that records every delivery.
#[derive(Default)]
pub struct RecordingTransport {
    replies: Mutex<HashMap<String, Reply>>,
    sent: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, endpoint: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), reply);
    }

    /// `(endpoint, decoded payload)` for every send attempt, in order.
    pub fn sent(&self) -> Vec<(String, serde_json::Value)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, endpoint: &str) -> usize {
        self.sent().iter().filter(|(e, _)| e == endpoint).count()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<u16, PushError> {
        let json = serde_json::from_slice(payload)?;
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), json));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(Reply::Status(201));
        match reply {
            Reply::Status(status) => Ok(status),
            Reply::Unreachable => Err(PushError::InvalidEndpoint(format!(
                "{}: connection refused",
                subscription.endpoint
            ))),
        }
    }
}

pub fn sender(
    transport: Arc<RecordingTransport>,
    registry: SqlPushSubscriptionRepository,
) -> NotificationSender {
    NotificationSender::new(transport, registry, Duration::from_secs(5))
}
