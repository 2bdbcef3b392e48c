//! HTTP handlers for care tasks
//!
//! User routes act on the caller's own tasks; a task owned by someone else
//! answers 404 exactly like a missing one. Admin routes act on any task and
//! are gated by the injected [`AccessPolicy`].

use axum::{
    extract::{rejection::JsonRejection, Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use critterkeep_common::auth::require;
use critterkeep_common::{
    not_found, validation_error, AccessPolicy, Action, AuthState, AuthUser, CritterError,
    JwtVerifier,
};
use critterkeep_db::{
    NewTask, SqlTaskRepository, SubjectRef, Task, TaskRepository, TaskUpdate,
};
use critterkeep_push::NotificationDispatcher;

/// Shared state for the task routes
pub struct TaskState {
    pub tasks: SqlTaskRepository,
    /// `None` when push delivery is switched off; the sweep still runs.
    pub dispatcher: Option<NotificationDispatcher>,
    pub policy: Arc<dyn AccessPolicy>,
    pub verifier: Arc<JwtVerifier>,
}

impl AuthState for TaskState {
    fn jwt_verifier(&self) -> &JwtVerifier {
        &self.verifier
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CheckCompletionResponse {
    pub tasks_reset: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdQuery {
    pub task_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    pub user_id: i64,
}

/// `animalId` and `enclosureId`; exactly one must be nonzero.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectQuery {
    pub animal_id: Option<i64>,
    pub enclosure_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub task_name: String,
    #[serde(default)]
    pub task_desc: String,
    pub repeat_interv_hours: i64,
    #[serde(default)]
    pub animal_id: Option<i64>,
    #[serde(default)]
    pub enclosure_id: Option<i64>,
    /// Defaults to now.
    #[serde(default)]
    pub last_completed: Option<DateTime<Utc>>,
}

impl CreateTaskRequest {
    fn into_parts(self) -> Result<(NewTask, SubjectRef), CritterError> {
        let subject = SubjectRef::from_ids(self.animal_id, self.enclosure_id)?;
        let task = NewTask {
            task_name: self.task_name,
            task_desc: self.task_desc,
            repeat_interv_hours: self.repeat_interv_hours,
            last_completed: self.last_completed.unwrap_or_else(Utc::now),
        };
        task.validate()?;
        Ok((task, subject))
    }
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateTaskRequest {
    pub user_id: i64,
    #[serde(flatten)]
    pub task: CreateTaskRequest,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskSubjectRequest {
    pub task_id: i64,
    #[serde(default)]
    pub animal_id: Option<i64>,
    #[serde(default)]
    pub enclosure_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskOwnerRequest {
    pub task_id: i64,
    pub old_user_id: i64,
    pub new_user_id: i64,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, CritterError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| validation_error(e.body_text()))
}

fn task_not_found(task_id: i64) -> CritterError {
    not_found(format!("task {}", task_id))
}

async fn ensure_owner(state: &TaskState, task_id: i64, user: AuthUser) -> Result<(), CritterError> {
    if state.tasks.is_owner(task_id, user.user_id).await? {
        Ok(())
    } else {
        Err(task_not_found(task_id))
    }
}

async fn fetch_task(state: &TaskState, task_id: i64) -> Result<Json<Task>, CritterError> {
    state
        .tasks
        .get_task_by_id(task_id)
        .await?
        .map(Json)
        .ok_or_else(|| task_not_found(task_id))
}

async fn create_for(
    state: &TaskState,
    request: CreateTaskRequest,
    owner_id: i64,
) -> Result<Response, CritterError> {
    let (task, subject) = request.into_parts()?;
    let created = state.tasks.create_task(task, subject, owner_id).await?;
    info!(task_id = created.task_id, owner_id, "Task created");
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn update_fields(state: &TaskState, update: TaskUpdate) -> Result<StatusCode, CritterError> {
    let task_id = update.task_id;
    if state.tasks.update_task(update).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(task_not_found(task_id))
    }
}

async fn update_subject(
    state: &TaskState,
    request: UpdateTaskSubjectRequest,
) -> Result<StatusCode, CritterError> {
    let subject = SubjectRef::from_ids(request.animal_id, request.enclosure_id)?;
    if state.tasks.update_task_subject(request.task_id, subject).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(task_not_found(request.task_id))
    }
}

async fn delete(state: &TaskState, task_id: i64) -> Result<StatusCode, CritterError> {
    if state.tasks.delete_task(task_id).await? {
        info!(task_id, "Task deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(task_not_found(task_id))
    }
}

/// Reset every overdue task and queue notifications for the owners.
///
/// Meant to be called on a fixed cadence by an external scheduler. Answers
/// as soon as the sweep has committed; delivery happens in the background.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/task/check-completion",
    responses(
        (status = 200, description = "Number of tasks reset", body = CheckCompletionResponse,
         example = json!({"tasksReset": 3})),
        (status = 500, description = "Sweep failed, nothing was reset")
    ),
    tag = "Tasks"
))]
pub async fn check_completion_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<CheckCompletionResponse>, CritterError> {
    let sweep = state
        .tasks
        .sweep_overdue_tasks(Utc::now())
        .await
        .map_err(|e| {
            error!("Task sweep failed: {}", e);
            CritterError::from(e)
        })?;

    let tasks_reset = sweep.reset;
    if tasks_reset > 0 {
        info!(tasks_reset, events = sweep.events.len(), "Overdue tasks reset");
    }
    if !sweep.events.is_empty() {
        if let Some(dispatcher) = &state.dispatcher {
            dispatcher.submit(sweep.events);
        }
    }

    Ok(Json(CheckCompletionResponse { tasks_reset }))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/task",
    responses((status = 200, description = "The caller's tasks", body = [Task])),
    security(("bearer" = [])),
    tag = "Tasks"
))]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
) -> Result<Json<Vec<Task>>, CritterError> {
    Ok(Json(state.tasks.get_tasks_by_owner(user.user_id).await?))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/task/byid",
    params(("taskId" = i64, Query, description = "Task id")),
    responses(
        (status = 200, description = "The task", body = Task),
        (status = 404, description = "No such task for this user")
    ),
    security(("bearer" = [])),
    tag = "Tasks"
))]
pub async fn get_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    Query(query): Query<TaskIdQuery>,
) -> Result<Json<Task>, CritterError> {
    ensure_owner(&state, query.task_id, user).await?;
    fetch_task(&state, query.task_id).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/task/bysubject",
    params(
        ("animalId" = Option<i64>, Query, description = "Animal id, 0 or absent if by enclosure"),
        ("enclosureId" = Option<i64>, Query, description = "Enclosure id, 0 or absent if by animal")
    ),
    responses(
        (status = 200, description = "The caller's tasks on this subject", body = [Task]),
        (status = 400, description = "Not exactly one subject id given")
    ),
    security(("bearer" = [])),
    tag = "Tasks"
))]
pub async fn tasks_by_subject_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<Vec<Task>>, CritterError> {
    let subject = SubjectRef::from_ids(query.animal_id, query.enclosure_id)?;
    let owned: HashSet<i64> = state
        .tasks
        .get_tasks_by_owner(user.user_id)
        .await?
        .into_iter()
        .map(|task| task.task_id)
        .collect();

    let tasks = state.tasks.get_tasks_by_subject(subject).await?;
    Ok(Json(
        tasks
            .into_iter()
            .filter(|task| owned.contains(&task.task_id))
            .collect(),
    ))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/task",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid task, bad subject or duplicate")
    ),
    security(("bearer" = [])),
    tag = "Tasks"
))]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Response, CritterError> {
    create_for(&state, json_body(payload)?, user.user_id).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/task",
    request_body = TaskUpdate,
    responses(
        (status = 204, description = "Task updated"),
        (status = 400, description = "Invalid task"),
        (status = 404, description = "No such task for this user")
    ),
    security(("bearer" = [])),
    tag = "Tasks"
))]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<StatusCode, CritterError> {
    let update = json_body(payload)?;
    ensure_owner(&state, update.task_id, user).await?;
    update_fields(&state, update).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/task/subject",
    request_body = UpdateTaskSubjectRequest,
    responses(
        (status = 204, description = "Subject replaced"),
        (status = 400, description = "Not exactly one subject id given"),
        (status = 404, description = "No such task for this user")
    ),
    security(("bearer" = [])),
    tag = "Tasks"
))]
pub async fn update_task_subject_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    payload: Result<Json<UpdateTaskSubjectRequest>, JsonRejection>,
) -> Result<StatusCode, CritterError> {
    let request = json_body(payload)?;
    ensure_owner(&state, request.task_id, user).await?;
    update_subject(&state, request).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/task",
    params(("taskId" = i64, Query, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "No such task for this user")
    ),
    security(("bearer" = [])),
    tag = "Tasks"
))]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    Query(query): Query<TaskIdQuery>,
) -> Result<StatusCode, CritterError> {
    ensure_owner(&state, query.task_id, user).await?;
    delete(&state, query.task_id).await
}

// --- Admin routes ---

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/admin/task/byid",
    params(("taskId" = i64, Query, description = "Task id")),
    responses(
        (status = 200, description = "The task", body = Task),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such task")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_get_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    Query(query): Query<TaskIdQuery>,
) -> Result<Json<Task>, CritterError> {
    require(state.policy.as_ref(), user, Action::ManageAnyTask)?;
    fetch_task(&state, query.task_id).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/admin/task/byuser",
    params(("userId" = i64, Query, description = "Owner id")),
    responses(
        (status = 200, description = "Tasks of that user", body = [Task]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_tasks_by_user_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<Vec<Task>>, CritterError> {
    require(state.policy.as_ref(), user, Action::ManageAnyTask)?;
    Ok(Json(state.tasks.get_tasks_by_owner(query.user_id).await?))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/admin/task/bysubject",
    params(
        ("animalId" = Option<i64>, Query, description = "Animal id"),
        ("enclosureId" = Option<i64>, Query, description = "Enclosure id")
    ),
    responses(
        (status = 200, description = "All tasks on this subject", body = [Task]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_tasks_by_subject_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<Vec<Task>>, CritterError> {
    require(state.policy.as_ref(), user, Action::ManageAnyTask)?;
    let subject = SubjectRef::from_ids(query.animal_id, query.enclosure_id)?;
    Ok(Json(state.tasks.get_tasks_by_subject(subject).await?))
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/admin/task",
    request_body = AdminCreateTaskRequest,
    responses(
        (status = 201, description = "Task created for the given user", body = Task),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_create_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    payload: Result<Json<AdminCreateTaskRequest>, JsonRejection>,
) -> Result<Response, CritterError> {
    require(state.policy.as_ref(), user, Action::ManageAnyTask)?;
    let request = json_body(payload)?;
    create_for(&state, request.task, request.user_id).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/admin/task",
    request_body = TaskUpdate,
    responses(
        (status = 204, description = "Task updated"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such task")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_update_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<StatusCode, CritterError> {
    require(state.policy.as_ref(), user, Action::ManageAnyTask)?;
    update_fields(&state, json_body(payload)?).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/admin/task/subject",
    request_body = UpdateTaskSubjectRequest,
    responses(
        (status = 204, description = "Subject replaced"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such task")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_update_task_subject_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    payload: Result<Json<UpdateTaskSubjectRequest>, JsonRejection>,
) -> Result<StatusCode, CritterError> {
    require(state.policy.as_ref(), user, Action::ManageAnyTask)?;
    update_subject(&state, json_body(payload)?).await
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/admin/task/owner",
    request_body = UpdateTaskOwnerRequest,
    responses(
        (status = 204, description = "Owner changed"),
        (status = 403, description = "Caller may not reassign tasks"),
        (status = 404, description = "Task is not owned by oldUserId")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_update_task_owner_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    payload: Result<Json<UpdateTaskOwnerRequest>, JsonRejection>,
) -> Result<StatusCode, CritterError> {
    require(state.policy.as_ref(), user, Action::ReassignTaskOwner)?;
    let request = json_body(payload)?;

    if state
        .tasks
        .update_task_owner(request.task_id, request.old_user_id, request.new_user_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!(
            "task {} owned by user {}",
            request.task_id, request.old_user_id
        )))
    }
}

#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/admin/task",
    params(("taskId" = i64, Query, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such task")
    ),
    security(("bearer" = [])),
    tag = "Admin"
))]
pub async fn admin_delete_task_handler(
    State(state): State<Arc<TaskState>>,
    user: AuthUser,
    Query(query): Query<TaskIdQuery>,
) -> Result<StatusCode, CritterError> {
    require(state.policy.as_ref(), user, Action::ManageAnyTask)?;
    delete(&state, query.task_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_needs_exactly_one_subject() {
        let request: CreateTaskRequest = serde_json::from_value(serde_json::json!({
            "taskName": "Mist enclosure",
            "repeatIntervHours": 12,
            "animalId": 3,
            "enclosureId": 4
        }))
        .unwrap();
        assert!(matches!(
            request.into_parts(),
            Err(CritterError::ValidationError(_))
        ));
    }

    #[test]
    fn create_request_defaults_last_completed_to_now() {
        let before = Utc::now();
        let request: CreateTaskRequest = serde_json::from_value(serde_json::json!({
            "taskName": "Feed",
            "repeatIntervHours": 24,
            "enclosureId": 4
        }))
        .unwrap();
        let (task, subject) = request.into_parts().unwrap();
        assert_eq!(subject, SubjectRef::Enclosure(4));
        assert!(task.last_completed >= before);
        assert_eq!(task.task_desc, "");
    }

    #[test]
    fn admin_create_request_flattens_task_fields() {
        let request: AdminCreateTaskRequest = serde_json::from_value(serde_json::json!({
            "userId": 9,
            "taskName": "Feed",
            "repeatIntervHours": 24,
            "animalId": 1
        }))
        .unwrap();
        assert_eq!(request.user_id, 9);
        assert_eq!(request.task.task_name, "Feed");
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let request: CreateTaskRequest = serde_json::from_value(serde_json::json!({
            "taskName": "Feed",
            "repeatIntervHours": 0,
            "animalId": 1
        }))
        .unwrap();
        assert!(matches!(
            request.into_parts(),
            Err(CritterError::ValidationError(_))
        ));
    }
}
