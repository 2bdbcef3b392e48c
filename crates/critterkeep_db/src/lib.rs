//! Database access for Critterkeep
//!
//! Holds the task store (including the overdue-task sweep) and the Web Push
//! subscription registry. Everything runs through an `sqlx::Any` pool backed
//! by SQLite.
//!
//! # Example
//!
//! ```rust,no_run
//! use critterkeep_db::{DbClient, SqlTaskRepository, TaskRepository};
//!
//! async fn sweep() -> Result<(), Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_url("sqlite:data/critterkeep.db").await?;
//!     let tasks = SqlTaskRepository::new(db_client);
//!     tasks.init_schema().await?;
//!     let sweep = tasks.sweep_overdue_tasks(chrono::Utc::now()).await?;
//!     println!("{} tasks reset, {} to notify", sweep.reset, sweep.events.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;

pub use client::DbClient;
pub use error::DbError;

pub use repositories::{
    NewPushSubscription, NewTask, PushSubscription, PushSubscriptionRepository,
    PushSubscriptionView, ResetEvent, SqlPushSubscriptionRepository, SqlTaskRepository,
    SubjectKind, SubjectRef, SweepResult, Task, TaskRepository, TaskUpdate,
};
