use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::{
    admin_create_task_handler, admin_delete_task_handler, admin_get_task_handler,
    admin_tasks_by_subject_handler, admin_tasks_by_user_handler, admin_update_task_handler,
    admin_update_task_owner_handler, admin_update_task_subject_handler, check_completion_handler,
    create_task_handler, delete_task_handler, get_task_handler, list_tasks_handler,
    tasks_by_subject_handler, update_task_handler, update_task_subject_handler, TaskState,
};

/// Task routes, to be nested under `/api`.
///
/// `/task/check-completion` is unauthenticated so an external scheduler can
/// hit it; everything else needs a bearer token.
pub fn routes(state: Arc<TaskState>) -> Router {
    info!(
        notifications = state.dispatcher.is_some(),
        "Task routes initialized"
    );

    Router::new()
        .route("/task/check-completion", get(check_completion_handler))
        .route(
            "/task",
            get(list_tasks_handler)
                .post(create_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .route("/task/byid", get(get_task_handler))
        .route("/task/bysubject", get(tasks_by_subject_handler))
        .route("/task/subject", put(update_task_subject_handler))
        .route(
            "/admin/task",
            post(admin_create_task_handler)
                .put(admin_update_task_handler)
                .delete(admin_delete_task_handler),
        )
        .route("/admin/task/byid", get(admin_get_task_handler))
        .route("/admin/task/byuser", get(admin_tasks_by_user_handler))
        .route("/admin/task/bysubject", get(admin_tasks_by_subject_handler))
        .route("/admin/task/owner", put(admin_update_task_owner_handler))
        .route("/admin/task/subject", put(admin_update_task_subject_handler))
        .with_state(state)
}
