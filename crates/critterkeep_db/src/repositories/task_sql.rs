//! SQL implementation of the task repository
//!
//! Timestamps are stored as unix seconds and booleans as `0`/`1` integers so
//! every column decodes through the `sqlx::Any` driver.

use crate::client::DbTransaction;
use crate::error::DbError;
use crate::repositories::task::{
    NewTask, ResetEvent, SubjectKind, SubjectRef, SweepResult, Task, TaskRepository, TaskUpdate,
};
use crate::DbClient;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        task_id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_name TEXT NOT NULL,
        task_desc TEXT NOT NULL DEFAULT '',
        complete INTEGER NOT NULL DEFAULT 0,
        last_completed INTEGER NOT NULL,
        repeat_interv_hours INTEGER NOT NULL CHECK (repeat_interv_hours > 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_users (
        task_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        PRIMARY KEY (task_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_subjects (
        task_id INTEGER PRIMARY KEY,
        subject_kind TEXT NOT NULL CHECK (subject_kind IN ('animal', 'enclosure')),
        subject_id INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS animals (
        animal_id INTEGER PRIMARY KEY,
        animal_name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS enclosures (
        enclosure_id INTEGER PRIMARY KEY,
        enclosure_name TEXT NOT NULL
    )
    "#,
];

// The predicate and the flip are one statement, so a task is reported by at
// most one of several concurrent sweeps. Inclusive boundary: a task is due
// once `last_completed + interval` has been reached, not only after it.
const SWEEP_QUERY: &str = r#"
    UPDATE tasks
    SET complete = 0
    WHERE complete = 1
      AND last_completed + repeat_interv_hours * 3600 <= $1
    RETURNING task_id
"#;

// Ids bound per event query; SQLite caps bound parameters at 32766.
const RESET_EVENT_CHUNK: usize = 500;

const TASK_COLUMNS: &str = r#"
    t.task_id, t.task_name, t.task_desc, t.complete, t.last_completed,
    t.repeat_interv_hours, ts.subject_kind, ts.subject_id
"#;

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn query_error(context: &str, e: sqlx::Error) -> DbError {
    error!("{}: {}", context, e);
    DbError::QueryError(e.to_string())
}

fn task_from_row(row: &AnyRow) -> Result<Task, DbError> {
    let kind: String = row.try_get("subject_kind")?;
    let complete: i64 = row.try_get("complete")?;
    Ok(Task {
        task_id: row.try_get("task_id")?,
        task_name: row.try_get("task_name")?,
        task_desc: row.try_get("task_desc")?,
        complete: complete != 0,
        last_completed: from_unix(row.try_get("last_completed")?),
        repeat_interv_hours: row.try_get("repeat_interv_hours")?,
        subject: SubjectRef::from_parts(SubjectKind::parse(&kind)?, row.try_get("subject_id")?),
    })
}

/// SQL implementation of the task repository
#[derive(Debug, Clone)]
pub struct SqlTaskRepository {
    db_client: DbClient,
}

impl SqlTaskRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    /// Loads the notification view of the given tasks inside `tx`, ordered
    /// by owner then task.
    ///
    /// Subjects without a name row still produce an event, labelled by kind
    /// and id.
    async fn load_reset_events(
        tx: &mut DbTransaction<'_>,
        task_ids: &[i64],
    ) -> Result<Vec<ResetEvent>, DbError> {
        let mut events = Vec::with_capacity(task_ids.len());
        for chunk in task_ids.chunks(RESET_EVENT_CHUNK) {
            events.extend(Self::load_reset_event_chunk(tx, chunk).await?);
        }
        events.sort_by_key(|event| (event.owner_id, event.task_id));
        Ok(events)
    }

    async fn load_reset_event_chunk(
        tx: &mut DbTransaction<'_>,
        task_ids: &[i64],
    ) -> Result<Vec<ResetEvent>, DbError> {
        let placeholders = (1..=task_ids.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            r#"
            SELECT t.task_id, t.task_name, t.task_desc, tu.user_id,
                   ts.subject_kind, ts.subject_id,
                   COALESCE(a.animal_name, e.enclosure_name, '') AS subject_name
            FROM tasks t
            JOIN task_users tu ON tu.task_id = t.task_id
            JOIN task_subjects ts ON ts.task_id = t.task_id
            LEFT JOIN animals a
                ON ts.subject_kind = 'animal' AND a.animal_id = ts.subject_id
            LEFT JOIN enclosures e
                ON ts.subject_kind = 'enclosure' AND e.enclosure_id = ts.subject_id
            WHERE t.task_id IN ({})
            "#,
            placeholders
        );

        let mut q = sqlx::query(&query);
        for id in task_ids {
            q = q.bind(*id);
        }
        let rows = q
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| query_error("Failed to load reset events", e))?;

        rows.iter()
            .map(|row| {
                let kind = SubjectKind::parse(&row.try_get::<String, _>("subject_kind")?)?;
                let subject_id: i64 = row.try_get("subject_id")?;
                let mut subject_name: String = row.try_get("subject_name")?;
                if subject_name.is_empty() {
                    subject_name = format!("{} #{}", kind.as_str(), subject_id);
                }
                Ok(ResetEvent {
                    task_id: row.try_get("task_id")?,
                    task_name: row.try_get("task_name")?,
                    task_desc: row.try_get("task_desc")?,
                    owner_id: row.try_get("user_id")?,
                    subject_name,
                    subject_kind: kind,
                })
            })
            .collect()
    }
}

impl TaskRepository for SqlTaskRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing task schema");
        for statement in SCHEMA {
            self.db_client.execute(statement).await?;
        }
        info!("Task schema initialized successfully");
        Ok(())
    }

    async fn sweep_overdue_tasks(&self, now: DateTime<Utc>) -> Result<SweepResult, DbError> {
        debug!(now = %now, "Sweeping overdue tasks");

        let mut tx = self.db_client.begin().await?;

        let rows = sqlx::query(SWEEP_QUERY)
            .bind(now.timestamp())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to reset overdue tasks", e))?;

        let task_ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("task_id"))
            .collect::<Result<Vec<_>, _>>()?;

        let events = if task_ids.is_empty() {
            Vec::new()
        } else {
            Self::load_reset_events(&mut tx, &task_ids).await?
        };

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        if task_ids.is_empty() {
            debug!("No overdue tasks");
        } else {
            info!(
                reset = task_ids.len(),
                events = events.len(),
                "Reset overdue tasks"
            );
        }
        Ok(SweepResult {
            reset: task_ids.len(),
            events,
        })
    }

    async fn create_task(
        &self,
        task: NewTask,
        subject: SubjectRef,
        owner_id: i64,
    ) -> Result<Task, DbError> {
        task.validate()?;
        debug!(owner_id, task_name = %task.task_name, "Creating task");

        let mut tx = self.db_client.begin().await?;

        let existing = sqlx::query(
            r#"
            SELECT t.task_id
            FROM tasks t
            JOIN task_users tu ON tu.task_id = t.task_id
            JOIN task_subjects ts ON ts.task_id = t.task_id
            WHERE t.task_name = $1 AND tu.user_id = $2
              AND ts.subject_kind = $3 AND ts.subject_id = $4
            "#,
        )
        .bind(&task.task_name)
        .bind(owner_id)
        .bind(subject.kind().as_str())
        .bind(subject.id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to check for duplicate task", e))?;

        if existing.is_some() {
            return Err(DbError::Duplicate(format!(
                "task '{}' already exists for {} {}",
                task.task_name,
                subject.kind().as_str(),
                subject.id()
            )));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO tasks (task_name, task_desc, complete, last_completed, repeat_interv_hours)
            VALUES ($1, $2, 0, $3, $4)
            RETURNING task_id
            "#,
        )
        .bind(&task.task_name)
        .bind(&task.task_desc)
        .bind(task.last_completed.timestamp())
        .bind(task.repeat_interv_hours)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to insert task", e))?;
        let task_id: i64 = row.try_get("task_id")?;

        sqlx::query("INSERT INTO task_users (task_id, user_id) VALUES ($1, $2)")
            .bind(task_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to insert task owner", e))?;

        sqlx::query(
            "INSERT INTO task_subjects (task_id, subject_kind, subject_id) VALUES ($1, $2, $3)",
        )
        .bind(task_id)
        .bind(subject.kind().as_str())
        .bind(subject.id())
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to insert task subject", e))?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        info!(task_id, owner_id, "Task created");
        Ok(Task {
            task_id,
            task_name: task.task_name,
            task_desc: task.task_desc,
            complete: false,
            last_completed: from_unix(task.last_completed.timestamp()),
            repeat_interv_hours: task.repeat_interv_hours,
            subject,
        })
    }

    async fn get_task_by_id(&self, task_id: i64) -> Result<Option<Task>, DbError> {
        debug!(task_id, "Finding task");
        let query = format!(
            r#"
            SELECT {}
            FROM tasks t JOIN task_subjects ts ON ts.task_id = t.task_id
            WHERE t.task_id = $1
            "#,
            TASK_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(task_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| query_error("Failed to find task", e))?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn get_tasks_by_owner(&self, owner_id: i64) -> Result<Vec<Task>, DbError> {
        debug!(owner_id, "Finding tasks for owner");
        let query = format!(
            r#"
            SELECT {}
            FROM tasks t
            JOIN task_users tu ON tu.task_id = t.task_id
            JOIN task_subjects ts ON ts.task_id = t.task_id
            WHERE tu.user_id = $1
            ORDER BY t.task_id
            "#,
            TASK_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| query_error("Failed to find tasks for owner", e))?;

        rows.iter().map(task_from_row).collect()
    }

    async fn get_tasks_by_subject(&self, subject: SubjectRef) -> Result<Vec<Task>, DbError> {
        debug!(?subject, "Finding tasks for subject");
        let query = format!(
            r#"
            SELECT {}
            FROM tasks t JOIN task_subjects ts ON ts.task_id = t.task_id
            WHERE ts.subject_kind = $1 AND ts.subject_id = $2
            ORDER BY t.task_id
            "#,
            TASK_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(subject.kind().as_str())
            .bind(subject.id())
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| query_error("Failed to find tasks for subject", e))?;

        rows.iter().map(task_from_row).collect()
    }

    async fn update_task(&self, task: TaskUpdate) -> Result<bool, DbError> {
        task.validate()?;
        debug!(task_id = task.task_id, "Updating task");

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET task_name = $1, task_desc = $2, complete = $3, last_completed = $4,
                repeat_interv_hours = $5
            WHERE task_id = $6
            "#,
        )
        .bind(&task.task_name)
        .bind(&task.task_desc)
        .bind(i64::from(task.complete))
        .bind(task.last_completed.timestamp())
        .bind(task.repeat_interv_hours)
        .bind(task.task_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| query_error("Failed to update task", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_task_subject(&self, task_id: i64, subject: SubjectRef) -> Result<bool, DbError> {
        debug!(task_id, ?subject, "Updating task subject");

        let result = sqlx::query(
            "UPDATE task_subjects SET subject_kind = $1, subject_id = $2 WHERE task_id = $3",
        )
        .bind(subject.kind().as_str())
        .bind(subject.id())
        .bind(task_id)
        .execute(self.db_client.pool())
        .await
        .map_err(|e| query_error("Failed to update task subject", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_task_owner(
        &self,
        task_id: i64,
        old_owner_id: i64,
        new_owner_id: i64,
    ) -> Result<bool, DbError> {
        debug!(task_id, old_owner_id, new_owner_id, "Updating task owner");

        let result =
            sqlx::query("UPDATE task_users SET user_id = $1 WHERE task_id = $2 AND user_id = $3")
                .bind(new_owner_id)
                .bind(task_id)
                .bind(old_owner_id)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| query_error("Failed to update task owner", e))?;

        if result.rows_affected() > 0 {
            info!(task_id, new_owner_id, "Task owner changed");
        }
        Ok(result.rows_affected() > 0)
    }

    async fn is_owner(&self, task_id: i64, user_id: i64) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT task_id FROM task_users WHERE task_id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| query_error("Failed to check task ownership", e))?;

        Ok(row.is_some())
    }

    async fn delete_task(&self, task_id: i64) -> Result<bool, DbError> {
        debug!(task_id, "Deleting task");

        let mut tx = self.db_client.begin().await?;

        for statement in [
            "DELETE FROM task_subjects WHERE task_id = $1",
            "DELETE FROM task_users WHERE task_id = $1",
        ] {
            sqlx::query(statement)
                .bind(task_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_error("Failed to delete task join rows", e))?;
        }

        let result = sqlx::query("DELETE FROM tasks WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to delete task", e))?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(task_id, "Task deleted");
        }
        Ok(deleted)
    }
}
