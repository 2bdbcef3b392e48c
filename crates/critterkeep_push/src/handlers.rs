//! HTTP handlers for Web Push subscriptions
//!
//! Browsers register their `PushSubscription` here, list or remove them, and
//! can ask for a test notification to check that delivery works end to end.

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use critterkeep_common::{
    config_error, not_found, validation_error, AuthState, AuthUser, CritterError, JwtVerifier,
};
use critterkeep_db::{
    NewPushSubscription, PushSubscriptionRepository, PushSubscriptionView,
    SqlPushSubscriptionRepository,
};

use crate::composer::NotificationPayload;
use crate::sender::{DeliveryOutcome, NotificationSender};
use crate::vapid::extract_origin;

/// Endpoints longer than this are shortened in test reports.
const ENDPOINT_DISPLAY_LEN: usize = 50;

/// Shared state for the notification routes
pub struct PushState {
    /// `None` when push delivery is switched off.
    pub sender: Option<NotificationSender>,
    pub subscriptions: SqlPushSubscriptionRepository,
    pub verifier: Arc<JwtVerifier>,
    pub vapid_public_key: Option<String>,
}

impl AuthState for PushState {
    fn jwt_verifier(&self) -> &JwtVerifier {
        &self.verifier
    }
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// The browser's `PushSubscription.toJSON()`.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    pub public_key: String,
}

/// Outcome of the test notification for one subscription.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TestDeliveryResult {
    pub subscription_id: i64,
    pub endpoint: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationResponse {
    pub message: String,
    pub subscription_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<TestDeliveryResult>,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

fn shorten_endpoint(endpoint: &str) -> String {
    match endpoint.char_indices().nth(ENDPOINT_DISPLAY_LEN) {
        Some((cut, _)) => format!("{}...", &endpoint[..cut]),
        None => endpoint.to_string(),
    }
}

fn validate_subscription(request: &SubscribeRequest) -> Result<(), CritterError> {
    let origin = extract_origin(&request.endpoint)
        .map_err(|e| validation_error(format!("invalid endpoint: {}", e)))?;
    if !origin.starts_with("https://") && !origin.starts_with("http://") {
        return Err(validation_error("endpoint must be an http(s) URL"));
    }
    if request.keys.p256dh.trim().is_empty() || request.keys.auth.trim().is_empty() {
        return Err(validation_error("keys.p256dh and keys.auth are required"));
    }
    Ok(())
}

/// Register (or refresh) the caller's push subscription.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notification/subscribe",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscription created", body = MessageResponse),
        (status = 200, description = "Existing subscription refreshed", body = MessageResponse),
        (status = 400, description = "Invalid subscription"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "Notifications"
))]
pub async fn subscribe_handler(
    State(state): State<Arc<PushState>>,
    user: AuthUser,
    headers: HeaderMap,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Response, CritterError> {
    let Json(request) = payload.map_err(|e| validation_error(e.body_text()))?;
    validate_subscription(&request)?;

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (stored, created) = state
        .subscriptions
        .create_or_refresh(NewPushSubscription {
            user_id: user.user_id,
            endpoint: request.endpoint,
            p256dh: request.keys.p256dh,
            auth: request.keys.auth,
            user_agent,
        })
        .await?;

    if created {
        Ok((
            StatusCode::CREATED,
            message("subscription created successfully"),
        )
            .into_response())
    } else {
        debug!(
            subscription_id = stored.subscription_id,
            "Subscription refreshed"
        );
        Ok((StatusCode::OK, message("subscription refreshed successfully")).into_response())
    }
}

/// Remove one of the caller's subscriptions by endpoint.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notification/unsubscribe",
    request_body = UnsubscribeRequest,
    responses(
        (status = 200, description = "Subscription deleted", body = MessageResponse),
        (status = 404, description = "No such subscription for this user")
    ),
    security(("bearer" = [])),
    tag = "Notifications"
))]
pub async fn unsubscribe_handler(
    State(state): State<Arc<PushState>>,
    user: AuthUser,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, CritterError> {
    let Json(request) = payload.map_err(|e| validation_error(e.body_text()))?;

    if state
        .subscriptions
        .delete_by_endpoint(user.user_id, &request.endpoint)
        .await?
    {
        info!(user_id = user.user_id, "Push subscription removed");
        Ok(message("subscription deleted successfully"))
    } else {
        Err(not_found("subscription"))
    }
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/notification/subscriptions",
    responses(
        (status = 200, description = "The caller's subscriptions, without keys", body = [PushSubscriptionView])
    ),
    security(("bearer" = [])),
    tag = "Notifications"
))]
pub async fn list_subscriptions_handler(
    State(state): State<Arc<PushState>>,
    user: AuthUser,
) -> Result<Json<Vec<PushSubscriptionView>>, CritterError> {
    let subscriptions = state.subscriptions.list_by_owner(user.user_id).await?;
    Ok(Json(
        subscriptions.iter().map(PushSubscriptionView::from).collect(),
    ))
}

/// The application server key browsers pass to `pushManager.subscribe`.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/notification/vapid-public-key",
    responses(
        (status = 200, description = "VAPID public key", body = VapidPublicKeyResponse),
        (status = 500, description = "Push is not configured")
    ),
    tag = "Notifications"
))]
pub async fn vapid_public_key_handler(
    State(state): State<Arc<PushState>>,
) -> Result<Json<VapidPublicKeyResponse>, CritterError> {
    state
        .vapid_public_key
        .clone()
        .map(|public_key| Json(VapidPublicKeyResponse { public_key }))
        .ok_or_else(|| config_error("push notifications are disabled"))
}

/// Send a test notification to every subscription of the caller and wait
/// for the results.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notification/test",
    responses(
        (status = 200, description = "Per-subscription delivery results", body = TestNotificationResponse),
        (status = 500, description = "Push is not configured")
    ),
    security(("bearer" = [])),
    tag = "Notifications"
))]
pub async fn send_test_handler(
    State(state): State<Arc<PushState>>,
    user: AuthUser,
) -> Result<Json<TestNotificationResponse>, CritterError> {
    let sender = state
        .sender
        .as_ref()
        .ok_or_else(|| config_error("push notifications are disabled"))?;

    let deliveries = sender
        .send_to_user(user.user_id, &NotificationPayload::test_notification())
        .await?;

    if deliveries.is_empty() {
        return Ok(Json(TestNotificationResponse {
            message: "no subscriptions found".to_string(),
            subscription_count: 0,
            results: Vec::new(),
        }));
    }

    let results: Vec<TestDeliveryResult> = deliveries
        .into_iter()
        .map(|delivery| {
            let (success, status, error) = match delivery.result {
                Ok(DeliveryOutcome::Delivered) => (true, None, None),
                Ok(DeliveryOutcome::Gone(code)) => (
                    false,
                    Some(code),
                    Some("subscription expired and was removed".to_string()),
                ),
                Ok(DeliveryOutcome::Failed(code)) => (
                    false,
                    Some(code),
                    Some(format!("push service returned status {}", code)),
                ),
                Err(e) => (false, None, Some(e.to_string())),
            };
            TestDeliveryResult {
                subscription_id: delivery.subscription.subscription_id,
                endpoint: shorten_endpoint(&delivery.subscription.endpoint),
                success,
                status,
                error,
            }
        })
        .collect();

    info!(
        user_id = user.user_id,
        sent = results.iter().filter(|r| r.success).count(),
        total = results.len(),
        "Test notification sent"
    );

    Ok(Json(TestNotificationResponse {
        message: "test notification sent".to_string(),
        subscription_count: results.len(),
        results,
    }))
}
