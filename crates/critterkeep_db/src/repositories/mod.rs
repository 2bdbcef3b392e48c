//! Repository modules for database access
//!
//! Each entity has a trait (`<entity>.rs`)
//! and its SQL implementation (`<entity>_sql.rs`).

pub mod push_subscription;
pub mod push_subscription_sql;
pub mod task;
pub mod task_sql;

pub use push_subscription::{
    NewPushSubscription, PushSubscription, PushSubscriptionRepository, PushSubscriptionView,
};
pub use push_subscription_sql::SqlPushSubscriptionRepository;
pub use task::{
    NewTask, ResetEvent, SubjectKind, SubjectRef, SweepResult, Task, TaskRepository, TaskUpdate,
};
pub use task_sql::SqlTaskRepository;
