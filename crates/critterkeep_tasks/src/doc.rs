use utoipa::OpenApi;

use crate::handlers::{
    AdminCreateTaskRequest, CheckCompletionResponse, CreateTaskRequest, UpdateTaskOwnerRequest,
    UpdateTaskSubjectRequest,
};
use critterkeep_db::{SubjectRef, Task, TaskUpdate};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::check_completion_handler,
        crate::handlers::list_tasks_handler,
        crate::handlers::get_task_handler,
        crate::handlers::tasks_by_subject_handler,
        crate::handlers::create_task_handler,
        crate::handlers::update_task_handler,
        crate::handlers::update_task_subject_handler,
        crate::handlers::delete_task_handler,
        crate::handlers::admin_get_task_handler,
        crate::handlers::admin_tasks_by_user_handler,
        crate::handlers::admin_tasks_by_subject_handler,
        crate::handlers::admin_create_task_handler,
        crate::handlers::admin_update_task_handler,
        crate::handlers::admin_update_task_subject_handler,
        crate::handlers::admin_update_task_owner_handler,
        crate::handlers::admin_delete_task_handler,
    ),
    components(
        schemas(
            Task,
            SubjectRef,
            TaskUpdate,
            CreateTaskRequest,
            AdminCreateTaskRequest,
            UpdateTaskSubjectRequest,
            UpdateTaskOwnerRequest,
            CheckCompletionResponse,
        )
    ),
    tags(
        (name = "Tasks", description = "Care tasks of the calling user and the overdue sweep"),
        (name = "Admin", description = "Task management across users")
    ),
    servers(
        (url = "/api", description = "Critterkeep API")
    )
)]
pub struct TaskApiDoc;
