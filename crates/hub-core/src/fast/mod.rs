//! Fast task service
//!
//! Cache-backed execution of composite tasks through a bounded priority
//! queue with a fixed concurrency cap.

pub mod queue;
pub mod service;

pub use queue::PriorityQueue;
pub use service::{FastServiceStatus, FastTaskService, PerformanceMetrics, Submission};
