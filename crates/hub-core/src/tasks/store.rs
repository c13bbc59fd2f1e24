//! Task Record Store
//!
//! In-memory task records keyed by id. Records are never evicted; the store
//! lives as long as its owner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{Task, TaskId, TaskStatus};
use crate::agents::AgentId;
use crate::{Error, Result};

/// Number of tasks in each status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }
}

#[derive(Debug, Default)]
struct Records {
    tasks: HashMap<TaskId, Task>,
    /// Insertion order, used for listings
    order: Vec<TaskId>,
}

/// Shared store of task records
#[derive(Debug, Default)]
pub struct TaskStore {
    records: RwLock<Records>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, replacing any record with the same id
    pub async fn insert(&self, task: Task) -> TaskId {
        let id = task.id.clone();
        let mut records = self.records.write().await;
        if records.tasks.insert(id.clone(), task).is_none() {
            records.order.push(id.clone());
        }
        id
    }

    /// Drop a task record
    pub async fn remove(&self, id: &str) -> Option<Task> {
        let mut records = self.records.write().await;
        let task = records.tasks.remove(id)?;
        records.order.retain(|existing| existing.as_str() != id);
        Some(task)
    }

    /// Snapshot of one task
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.records.read().await.tasks.get(id).cloned()
    }

    /// All tasks in creation order
    pub async fn all(&self) -> Vec<Task> {
        let records = self.records.read().await;
        records
            .order
            .iter()
            .filter_map(|id| records.tasks.get(id).cloned())
            .collect()
    }

    /// Tasks owned by one agent, in creation order
    pub async fn by_agent(&self, agent_id: &AgentId) -> Vec<Task> {
        let records = self.records.read().await;
        records
            .order
            .iter()
            .filter_map(|id| records.tasks.get(id))
            .filter(|task| task.agent_id.as_ref() == Some(agent_id))
            .cloned()
            .collect()
    }

    /// Mutate one task in place under the write lock
    ///
    /// # Errors
    /// `TaskNotFound` if no task has this id
    pub async fn update<F, R>(&self, id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Task) -> R,
    {
        let mut records = self.records.write().await;
        let task = records
            .tasks
            .get_mut(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        Ok(f(task))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.tasks.is_empty()
    }

    pub async fn count_by_status(&self) -> StatusCounts {
        let records = self.records.read().await;
        let mut counts = StatusCounts::default();
        for task in records.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Mean `processing_time_ms` over completed tasks, 0 when there are none
    pub async fn average_processing_time_ms(&self) -> f64 {
        let records = self.records.read().await;
        let times: Vec<u64> = records
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.processing_time_ms.unwrap_or(0))
            .collect();

        if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<u64>() as f64 / times.len() as f64
        }
    }
}
