//! Agent types
//!
//! Defines the agent record held by the registry and the read-only
//! snapshot handed out to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Static description of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name
    pub name: String,
    /// What the agent is for
    #[serde(default)]
    pub description: String,
    /// Capability tags
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: vec![],
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether the agent advertises a capability tag
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}

/// Lifecycle status of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Running,
    Stopped,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource figures reported for an agent.
///
/// Nothing measures these yet; they stay at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub cpu: f64,
    pub memory: f64,
    pub response_time_ms: u64,
}

/// Per-agent task counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskCounters {
    pub completed: u64,
    pub pending: u64,
    pub failed: u64,
}

impl TaskCounters {
    /// A task was assigned to the agent
    pub fn assigned(&mut self) {
        self.pending += 1;
    }

    /// A task reached `completed`
    pub fn completed(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        self.completed += 1;
    }

    /// A task reached `failed`
    pub fn failed(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        self.failed += 1;
    }
}

/// Mutable agent record owned by the registry
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub config: AgentConfig,
    pub status: AgentStatus,
    pub last_activity: DateTime<Utc>,
    pub performance: AgentPerformance,
    pub tasks: TaskCounters,
}

impl Agent {
    /// Create an idle agent
    pub fn new(id: AgentId, config: AgentConfig) -> Self {
        Self {
            id,
            config,
            status: AgentStatus::Idle,
            last_activity: Utc::now(),
            performance: AgentPerformance::default(),
            tasks: TaskCounters::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == AgentStatus::Running
    }

    /// Record a status change and bump `last_activity`
    pub fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Read-only copy of the externally visible state
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id.clone(),
            name: self.config.name.clone(),
            status: self.status,
            last_activity: self.last_activity,
            performance: self.performance,
            tasks: self.tasks,
        }
    }
}

/// Point-in-time view of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub status: AgentStatus,
    pub last_activity: DateTime<Utc>,
    pub performance: AgentPerformance,
    pub tasks: TaskCounters,
}

/// Capabilities advertised by one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub id: AgentId,
    pub name: String,
    pub capabilities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_agent_is_idle() {
        let agent = Agent::new(AgentId::new("seo"), AgentConfig::new("SEO Agent", ""));
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(!agent.is_running());
        assert_eq!(agent.tasks, TaskCounters::default());
    }

    #[test]
    fn test_counters_never_go_negative() {
        let mut counters = TaskCounters::default();
        counters.completed();
        counters.failed();

        assert_eq!(counters.pending, 0);
        assert_eq!(counters.completed, 1);
        assert_eq!(counters.failed, 1);
    }

    #[test]
    fn test_counters_lifecycle() {
        let mut counters = TaskCounters::default();
        counters.assigned();
        counters.assigned();
        counters.completed();

        assert_eq!(counters.pending, 1);
        assert_eq!(counters.completed, 1);
    }

    #[test]
    fn test_agent_config_capabilities() {
        let config = AgentConfig::new("Fixer Agent", "Automatic bug fixing")
            .with_capabilities(["error_detection", "auto_fix"]);

        assert!(config.has_capability("auto_fix"));
        assert!(!config.has_capability("rollback"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&AgentStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(AgentStatus::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_snapshot_copies_state() {
        let mut agent = Agent::new(AgentId::new("dev"), AgentConfig::new("Dev", ""));
        agent.set_status(AgentStatus::Running);
        agent.tasks.assigned();

        let snapshot = agent.snapshot();
        assert_eq!(snapshot.id.as_str(), "dev");
        assert_eq!(snapshot.name, "Dev");
        assert_eq!(snapshot.status, AgentStatus::Running);
        assert_eq!(snapshot.tasks.pending, 1);
    }
}
