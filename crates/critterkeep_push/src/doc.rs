#![allow(dead_code)]
use utoipa::OpenApi;

use crate::composer::{NotificationData, NotificationPayload};
use crate::handlers::{
    MessageResponse, SubscribeRequest, SubscriptionKeys, TestDeliveryResult,
    TestNotificationResponse, UnsubscribeRequest, VapidPublicKeyResponse,
};
use critterkeep_db::PushSubscriptionView;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::subscribe_handler,
        crate::handlers::unsubscribe_handler,
        crate::handlers::list_subscriptions_handler,
        crate::handlers::vapid_public_key_handler,
        crate::handlers::send_test_handler,
    ),
    components(
        schemas(
            SubscribeRequest,
            SubscriptionKeys,
            UnsubscribeRequest,
            MessageResponse,
            VapidPublicKeyResponse,
            TestDeliveryResult,
            TestNotificationResponse,
            PushSubscriptionView,
            NotificationPayload,
            NotificationData,
        )
    ),
    tags(
        (name = "Notifications", description = "Web Push subscriptions and delivery")
    ),
    servers(
        (url = "/api", description = "Critterkeep API")
    )
)]
pub struct PushApiDoc;
