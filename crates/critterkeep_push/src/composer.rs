//! Turns reset events into notification payloads.
//!
//! Pure and deterministic: the same event always yields the same payload, and
//! the tag is stable per task so a newer reset replaces the older one on the
//! device instead of stacking.

use critterkeep_db::ResetEvent;
use serde::Serialize;

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub task_id: i64,
    pub url: String,
}

/// The JSON document the service worker receives.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub data: NotificationData,
    pub tag: String,
    pub require_interaction: bool,
}

impl NotificationPayload {
    /// Payload for `task {id} was reset`.
    pub fn for_reset(event: &ResetEvent) -> Self {
        Self::for_task(
            event.task_id,
            &event.task_name,
            &event.subject_name,
            &event.task_desc,
        )
    }

    /// Synthetic payload used to check that a device receives pushes.
    pub fn test_notification() -> Self {
        Self::for_task(
            0,
            "Test Notification",
            "Test",
            "This is a test notification from Critterkeep",
        )
    }

    fn for_task(task_id: i64, task_name: &str, subject_name: &str, body: &str) -> Self {
        Self {
            title: format!("{} ({})", task_name, subject_name),
            body: body.to_string(),
            data: NotificationData {
                task_id,
                url: format!("/tasks/{}", task_id),
            },
            tag: format!("task-{}", task_id),
            require_interaction: false,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
