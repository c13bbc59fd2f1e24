//! Tasks
//!
//! Task records, their typed outputs, the handler table and the shared
//! record store.

pub mod handlers;
pub mod output;
pub mod store;
pub mod types;

pub use handlers::{CannedReport, Delay, HandlerTable, TaskHandler};
pub use output::TaskOutput;
pub use store::{StatusCounts, TaskStore};
pub use types::{Task, TaskId, TaskKind, TaskPriority, TaskSpec, TaskStatus};
