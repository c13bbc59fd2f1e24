//! Task types
//!
//! A task moves through `pending -> running -> (completed | failed)`.
//! Terminal states are final; there is no retry transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use super::output::TaskOutput;
use crate::agents::AgentId;
use crate::{Error, Result};

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self(format!("task_{}", uuid::Uuid::now_v7().simple()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Kind of simulated work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Monitoring,
    Deployment,
    Fixing,
    Franchise,
    Seo,
    Development,
    Testing,
    CodeGeneration,
    Optimization,
}

impl TaskKind {
    pub const ALL: [TaskKind; 9] = [
        Self::Monitoring,
        Self::Deployment,
        Self::Fixing,
        Self::Franchise,
        Self::Seo,
        Self::Development,
        Self::Testing,
        Self::CodeGeneration,
        Self::Optimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring",
            Self::Deployment => "deployment",
            Self::Fixing => "fixing",
            Self::Franchise => "franchise",
            Self::Seo => "seo",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::CodeGeneration => "code-generation",
            Self::Optimization => "optimization",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::Validation(format!("Unknown task type: {}", s)))
    }
}

/// Priority level of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Ordering weight, higher runs first
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" | "urgent" => Ok(Self::Critical),
            other => Err(Error::Validation(format!("Unknown priority: {}", other))),
        }
    }
}

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller submits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub description: String,
    /// Free-form payload handed to the handler
    #[serde(default)]
    pub input: serde_json::Value,
}

impl TaskSpec {
    pub fn new(kind: TaskKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            priority: TaskPriority::default(),
            description: description.into(),
            input: serde_json::Value::Null,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }
}

/// A unit of simulated work and its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Owning agent; `None` for fast service tasks
    pub agent_id: Option<AgentId>,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub description: String,
    pub input: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall time from creation to the terminal state
    pub processing_time_ms: Option<u64>,
    pub result: Option<TaskOutput>,
    pub error: Option<String>,
}

impl Task {
    /// Create a pending task from a spec
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: TaskId::default(),
            agent_id: None,
            kind: spec.kind,
            priority: spec.priority,
            status: TaskStatus::Pending,
            description: spec.description,
            input: spec.input,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            processing_time_ms: None,
            result: None,
            error: None,
        }
    }

    /// Create a pending task owned by an agent
    pub fn for_agent(agent_id: AgentId, spec: TaskSpec) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Self::new(spec)
        }
    }

    /// `pending -> running`
    pub fn start(&mut self) -> Result<()> {
        self.ensure_status(TaskStatus::Pending, TaskStatus::Running)?;
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `running -> completed`
    pub fn complete(&mut self, output: TaskOutput) -> Result<()> {
        self.ensure_status(TaskStatus::Running, TaskStatus::Completed)?;
        self.status = TaskStatus::Completed;
        self.result = Some(output);
        self.finish();
        Ok(())
    }

    /// `running -> failed`
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.ensure_status(TaskStatus::Running, TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.finish();
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.processing_time_ms = Some((now - self.created_at).num_milliseconds().max(0) as u64);
    }

    fn ensure_status(&self, expected: TaskStatus, target: TaskStatus) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(Error::Internal(format!(
                "Invalid task transition for {}: {} -> {}",
                self.id, self.status, target
            )))
        }
    }
}
