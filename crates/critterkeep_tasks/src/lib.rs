//! Care task routes for Critterkeep
//!
//! Besides task CRUD this crate owns `GET /task/check-completion`, the trigger
//! that resets overdue tasks and hands the resets to the notification
//! dispatcher.

#[cfg(feature = "openapi")]
pub mod doc;
pub mod handlers;
pub mod routes;

pub use handlers::TaskState;
pub use routes::routes;

#[cfg(feature = "openapi")]
pub mod openapi {
    pub use crate::doc::TaskApiDoc;
}
