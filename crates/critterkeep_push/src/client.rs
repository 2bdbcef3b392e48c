//! Web Push HTTP client
//!
//! Sends one encrypted payload to one subscription endpoint and reports the
//! push service's status code. Interpreting that status is left to
//! [`crate::sender::classify_status`].

use async_trait::async_trait;
use chrono::Utc;
use critterkeep_common::create_client;
use critterkeep_config::PushConfig;
use critterkeep_db::PushSubscription;
use reqwest::{header, Client};
use tracing::debug;

use crate::error::PushError;
use crate::vapid::{decode_base64_flexible, VapidSigner};

/// Something that can hand an already-serialized payload to a push service.
///
/// Returns the HTTP status of the push service response. Transport failures
/// (connection refused, TLS, timeout) are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8])
        -> Result<u16, PushError>;
}

/// RFC 8030 client: VAPID authentication and `aes128gcm` payload encryption.
#[derive(Debug)]
pub struct WebPushClient {
    http: Client,
    signer: VapidSigner,
    ttl_secs: u32,
    timeout_secs: u64,
}

impl WebPushClient {
    pub fn new(signer: VapidSigner, ttl_secs: u32, timeout_secs: u64) -> Result<Self, PushError> {
        // Push services answer directly; a redirect is never a delivery.
        let http = create_client(timeout_secs, false)?;
        Ok(Self {
            http,
            signer,
            ttl_secs,
            timeout_secs,
        })
    }

    /// Builds a client from the `[push]` configuration section.
    pub fn from_config(config: &PushConfig) -> Result<Self, PushError> {
        let signer = VapidSigner::new(
            &config.vapid_public_key,
            &config.vapid_private_key,
            &config.vapid_subject,
        )?;
        Self::new(signer, config.ttl_secs, config.request_timeout_secs)
    }

    pub fn public_key(&self) -> &str {
        self.signer.public_key()
    }

    fn encrypt(subscription: &PushSubscription, payload: &[u8]) -> Result<Vec<u8>, PushError> {
        let p256dh = decode_base64_flexible(&subscription.p256dh)
            .map_err(|e| PushError::EncryptionError(format!("bad p256dh key: {}", e)))?;
        let auth = decode_base64_flexible(&subscription.auth)
            .map_err(|e| PushError::EncryptionError(format!("bad auth secret: {}", e)))?;

        ece::encrypt(&p256dh, &auth, payload)
            .map_err(|e| PushError::EncryptionError(e.to_string()))
    }
}

#[async_trait]
impl PushTransport for WebPushClient {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<u16, PushError> {
        let body = Self::encrypt(subscription, payload)?;
        let authorization = self
            .signer
            .authorization(&subscription.endpoint, Utc::now().timestamp())?;

        let response = self
            .http
            .post(&subscription.endpoint)
            .header(header::AUTHORIZATION, authorization)
            .header("TTL", self.ttl_secs.to_string())
            .header("Urgency", "high")
            .header(header::CONTENT_ENCODING, "aes128gcm")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PushError::Timeout(self.timeout_secs)
                } else {
                    PushError::RequestError(e)
                }
            })?;

        let status = response.status().as_u16();
        debug!(
            subscription_id = subscription.subscription_id,
            status, "Push service responded"
        );
        Ok(status)
    }
}
