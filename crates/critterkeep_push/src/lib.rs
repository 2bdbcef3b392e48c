//! Web Push notifications for Critterkeep
//!
//! Turns task resets into notifications and delivers them to every browser
//! subscription of the task's owner.
//!
//! - [`composer`] builds the JSON payload for a reset.
//! - [`client`] signs (VAPID) and encrypts (`aes128gcm`) one push request.
//! - [`sender`] fans out to subscriptions, classifies responses and evicts
//!   subscriptions the push service reports gone.
//! - [`dispatch`] runs delivery on a background worker fed by a bounded queue.
//! - [`routes`] exposes subscription management under `/notification`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use critterkeep_config::PushConfig;
//! use critterkeep_db::{DbClient, SqlPushSubscriptionRepository};
//! use critterkeep_push::{NotificationDispatcher, NotificationSender, WebPushClient};
//!
//! async fn start(db: DbClient, config: &PushConfig) -> Result<(), critterkeep_push::PushError> {
//!     let client = WebPushClient::from_config(config)?;
//!     let sender = NotificationSender::new(
//!         Arc::new(client),
//!         SqlPushSubscriptionRepository::new(db),
//!         Duration::from_secs(config.request_timeout_secs),
//!     );
//!     let (dispatcher, _worker) = NotificationDispatcher::spawn(sender, config.queue_depth);
//!     dispatcher.submit(Vec::new());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod composer;
pub mod dispatch;
#[cfg(feature = "openapi")]
pub mod doc;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sender;
pub mod vapid;

pub use client::{PushTransport, WebPushClient};
pub use composer::NotificationPayload;
pub use dispatch::NotificationDispatcher;
pub use error::PushError;
pub use handlers::PushState;
pub use routes::routes;
pub use sender::{classify_status, BatchReport, DeliveryOutcome, NotificationSender};
pub use vapid::{generate_keys, VapidSigner};

#[cfg(feature = "openapi")]
pub mod openapi {
    pub use crate::doc::PushApiDoc;
}
