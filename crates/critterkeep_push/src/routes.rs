use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::{
    list_subscriptions_handler, send_test_handler, subscribe_handler, unsubscribe_handler,
    vapid_public_key_handler, PushState,
};

/// Notification routes, to be nested under `/api`.
///
/// Registration works even with push disabled; only the VAPID key and the
/// test endpoint need a configured sender.
pub fn routes(state: Arc<PushState>) -> Router {
    info!(
        push_enabled = state.sender.is_some(),
        "Notification routes initialized"
    );

    Router::new()
        .route("/notification/subscribe", post(subscribe_handler))
        .route("/notification/unsubscribe", post(unsubscribe_handler))
        .route("/notification/subscriptions", get(list_subscriptions_handler))
        .route(
            "/notification/vapid-public-key",
            get(vapid_public_key_handler),
        )
        .route("/notification/test", post(send_test_handler))
        .with_state(state)
}
