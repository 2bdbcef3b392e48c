//! Task store: care tasks, their owner and their subject
//!
//! A task belongs to exactly one user (`task_users`) and concerns exactly one
//! subject, an animal or an enclosure (`task_subjects`). Besides plain CRUD the
//! store performs the overdue sweep that flips completed tasks back to
//! incomplete once their repeat interval has elapsed.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a task is about.
///
/// Wire payloads carry `animalId` and `enclosureId` side by side with `0` or
/// absence meaning "not this one"; [`SubjectRef::from_ids`] turns that into
/// exactly one variant or rejects it.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum SubjectRef {
    Animal(i64),
    Enclosure(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Animal,
    Enclosure,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Animal => "animal",
            SubjectKind::Enclosure => "enclosure",
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, DbError> {
        match s {
            "animal" => Ok(SubjectKind::Animal),
            "enclosure" => Ok(SubjectKind::Enclosure),
            other => Err(DbError::QueryError(format!("unknown subject kind '{}'", other))),
        }
    }
}

impl SubjectRef {
    /// Builds a subject from the two wire ids, where `None` and `0` both mean
    /// "absent". Exactly one must be present.
    pub fn from_ids(animal_id: Option<i64>, enclosure_id: Option<i64>) -> Result<Self, DbError> {
        let animal = animal_id.filter(|id| *id != 0);
        let enclosure = enclosure_id.filter(|id| *id != 0);
        match (animal, enclosure) {
            (Some(id), None) => Ok(SubjectRef::Animal(id)),
            (None, Some(id)) => Ok(SubjectRef::Enclosure(id)),
            _ => Err(DbError::InvalidInput(
                "exactly one of animalId or enclosureId must be nonzero".to_string(),
            )),
        }
    }

    pub(crate) fn from_parts(kind: SubjectKind, id: i64) -> Self {
        match kind {
            SubjectKind::Animal => SubjectRef::Animal(id),
            SubjectKind::Enclosure => SubjectRef::Enclosure(id),
        }
    }

    pub fn kind(&self) -> SubjectKind {
        match self {
            SubjectRef::Animal(_) => SubjectKind::Animal,
            SubjectRef::Enclosure(_) => SubjectKind::Enclosure,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            SubjectRef::Animal(id) | SubjectRef::Enclosure(id) => *id,
        }
    }
}

/// A stored task together with its subject.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: i64,
    pub task_name: String,
    pub task_desc: String,
    pub complete: bool,
    pub last_completed: DateTime<Utc>,
    pub repeat_interv_hours: i64,
    pub subject: SubjectRef,
}

/// Input for creating a task. The subject and owner are passed separately.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_name: String,
    pub task_desc: String,
    pub repeat_interv_hours: i64,
    pub last_completed: DateTime<Utc>,
}

/// Full replacement of a task's own columns.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub task_id: i64,
    pub task_name: String,
    #[serde(default)]
    pub task_desc: String,
    pub complete: bool,
    pub last_completed: DateTime<Utc>,
    pub repeat_interv_hours: i64,
}

fn validate_fields(task_name: &str, repeat_interv_hours: i64) -> Result<(), DbError> {
    if task_name.trim().is_empty() {
        return Err(DbError::InvalidInput("taskName must not be empty".to_string()));
    }
    if repeat_interv_hours <= 0 {
        return Err(DbError::InvalidInput(
            "repeatIntervHours must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

impl NewTask {
    pub fn validate(&self) -> Result<(), DbError> {
        validate_fields(&self.task_name, self.repeat_interv_hours)
    }
}

impl TaskUpdate {
    pub fn validate(&self) -> Result<(), DbError> {
        validate_fields(&self.task_name, self.repeat_interv_hours)
    }
}

/// One task flipped back to incomplete by a sweep, joined with what the
/// notification needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetEvent {
    pub task_id: i64,
    pub task_name: String,
    pub task_desc: String,
    pub owner_id: i64,
    pub subject_name: String,
    pub subject_kind: SubjectKind,
}

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Rows flipped from complete to incomplete.
    pub reset: usize,
    /// One event per flipped task that has an owner and a subject.
    pub events: Vec<ResetEvent>,
}

/// Repository for tasks
pub trait TaskRepository {
    /// Create the task, owner-join and subject-join tables (plus the minimal
    /// subject name tables the sweep joins against) if missing.
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Flip every completed task whose `last_completed + interval <= now` to
    /// incomplete and report how many rows flipped, with one event per
    /// flipped task.
    ///
    /// Runs as a single transaction: either every overdue task is reset and
    /// reported, or none is. Concurrent sweeps each see only the rows they
    /// flipped.
    fn sweep_overdue_tasks(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<SweepResult, DbError>> + Send;

    /// Insert a task with its owner and subject in one transaction.
    ///
    /// # Errors
    ///
    /// * `DbError::InvalidInput` if the task fails validation
    /// * `DbError::Duplicate` if the owner already has a task with the same
    ///   name on the same subject
    fn create_task(
        &self,
        task: NewTask,
        subject: SubjectRef,
        owner_id: i64,
    ) -> impl std::future::Future<Output = Result<Task, DbError>> + Send;

    fn get_task_by_id(
        &self,
        task_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Task>, DbError>> + Send;

    fn get_tasks_by_owner(
        &self,
        owner_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, DbError>> + Send;

    fn get_tasks_by_subject(
        &self,
        subject: SubjectRef,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, DbError>> + Send;

    /// Returns `false` when no task has the given id.
    fn update_task(
        &self,
        task: TaskUpdate,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Returns `false` when the task has no subject row.
    fn update_task_subject(
        &self,
        task_id: i64,
        subject: SubjectRef,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Returns `false` when `old_owner_id` does not own the task.
    fn update_task_owner(
        &self,
        task_id: i64,
        old_owner_id: i64,
        new_owner_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    fn is_owner(
        &self,
        task_id: i64,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;

    /// Delete the task and its join rows in one transaction. Returns `false`
    /// when the task did not exist.
    fn delete_task(
        &self,
        task_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;
}
