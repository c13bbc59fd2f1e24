//! Error types for hub-core

use std::any::Any;
use thiserror::Error;

/// Main error type for hub-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task execution failed: {0}")]
    TaskExecution(String),

    #[error("Task timed out: {0}")]
    TaskTimeout(String),

    #[error("Task queue is full (capacity {0})")]
    QueueFull(usize),

    #[error("Service is stopped")]
    ServiceStopped,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

/// Result type alias for hub-core
pub type Result<T> = std::result::Result<T, Error>;

/// Readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
