//! Orchestrator
//!
//! Owns the agent registry and the task store, runs tasks through the
//! handler table and reports every lifecycle transition on the event bus.
//!
//! A task assigned to a running agent executes inline: `assign_task`
//! returns once the handler has resolved. A task assigned to any other
//! agent stays `pending`; nothing picks it up later.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::agents::{
    AgentCapabilities, AgentConfig, AgentId, AgentRegistry, AgentSnapshot, AgentStatus,
    default_agents,
};
use crate::events::{EventBus, EventKind, HubEvent};
use crate::tasks::{
    HandlerTable, Task, TaskId, TaskKind, TaskPriority, TaskSpec, TaskStatus, TaskStore,
};
use crate::{Error, Result};

/// Agent that receives development tasks
pub const DEVELOPMENT_AGENT: &str = "development";

/// Orchestrator-level status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub status: AgentStatus,
    pub agents_count: usize,
    pub tasks_count: usize,
    pub running_agents: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentCapabilities {
    pub available_agents: Vec<AgentId>,
    pub agent_capabilities: Vec<AgentCapabilities>,
    pub system_status: OrchestratorStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentAssignment {
    pub task_id: TaskId,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentStatus {
    /// `None` when no development agent is registered
    pub agent_status: Option<AgentSnapshot>,
    pub active_tasks: Vec<Task>,
    pub completed_tasks: Vec<Task>,
    pub pending_tasks: Vec<Task>,
}

/// Agent/task orchestrator
pub struct Orchestrator {
    status: RwLock<AgentStatus>,
    agents: RwLock<AgentRegistry>,
    tasks: TaskStore,
    handlers: HandlerTable,
    events: Arc<EventBus>,
}

impl Orchestrator {
    /// Create an orchestrator with no agents
    pub fn new(handlers: HandlerTable, events: Arc<EventBus>) -> Self {
        Self::with_agents(handlers, events, Vec::new())
    }

    /// Create an orchestrator with the six stock agents registered
    pub fn with_default_agents(handlers: HandlerTable, events: Arc<EventBus>) -> Self {
        Self::with_agents(handlers, events, default_agents())
    }

    /// Create an orchestrator with the given agents registered
    pub fn with_agents(
        handlers: HandlerTable,
        events: Arc<EventBus>,
        agents: Vec<(AgentId, AgentConfig)>,
    ) -> Self {
        let mut registry = AgentRegistry::new();
        for (id, config) in agents {
            let name = config.name.clone();
            registry.register(id.clone(), config);
            events.emit(HubEvent::AgentRegistered { agent_id: id, name });
        }

        info!(agents = registry.len(), "Orchestrator initialized");

        Self {
            status: RwLock::new(AgentStatus::Idle),
            agents: RwLock::new(registry),
            tasks: TaskStore::new(),
            handlers,
            events,
        }
    }

    /// Event bus shared with this orchestrator
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Subscribe to one kind of event
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener);
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Set the orchestrator running and start every registered agent
    pub async fn start(&self) {
        *self.status.write().await = AgentStatus::Running;
        let started = self.set_all(AgentStatus::Running).await;
        for agent_id in started {
            self.events.emit(HubEvent::AgentStarted { agent_id });
        }

        info!("Orchestrator started");
        self.events.emit(HubEvent::MainAgentStarted);
    }

    /// Stop every registered agent and the orchestrator itself
    pub async fn stop(&self) {
        *self.status.write().await = AgentStatus::Stopped;
        let stopped = self.set_all(AgentStatus::Stopped).await;
        for agent_id in stopped {
            self.events.emit(HubEvent::AgentStopped { agent_id });
        }

        info!("Orchestrator stopped");
        self.events.emit(HubEvent::MainAgentStopped);
    }

    async fn set_all(&self, status: AgentStatus) -> Vec<AgentId> {
        let mut agents = self.agents.write().await;
        let ids = agents.ids();
        for id in &ids {
            if let Some(agent) = agents.get_mut(id) {
                agent.set_status(status);
            }
        }
        ids
    }

    // ------------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------------

    /// Register an agent in `idle` status.
    ///
    /// Returns `true` when an existing agent with the same id was replaced.
    pub async fn register_agent(&self, id: AgentId, config: AgentConfig) -> bool {
        let name = config.name.clone();
        let replaced = self.agents.write().await.register(id.clone(), config);
        self.events.emit(HubEvent::AgentRegistered { agent_id: id, name });
        replaced
    }

    pub async fn start_agent(&self, id: &AgentId) -> Result<AgentSnapshot> {
        let snapshot = self.agents.write().await.start(id)?.snapshot();
        info!(agent = %id, "Agent started");
        self.events.emit(HubEvent::AgentStarted { agent_id: id.clone() });
        Ok(snapshot)
    }

    pub async fn stop_agent(&self, id: &AgentId) -> Result<AgentSnapshot> {
        let snapshot = self.agents.write().await.stop(id)?.snapshot();
        info!(agent = %id, "Agent stopped");
        self.events.emit(HubEvent::AgentStopped { agent_id: id.clone() });
        Ok(snapshot)
    }

    pub async fn get_agent_status(&self, id: &AgentId) -> Option<AgentSnapshot> {
        self.agents.read().await.snapshot(id)
    }

    /// Snapshots of every agent in registration order
    pub async fn all_agents_status(&self) -> Vec<AgentSnapshot> {
        self.agents.read().await.snapshots()
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    /// Assign a task to an agent.
    ///
    /// The task is recorded as `pending` and `task_assigned` is emitted. If
    /// the agent is running the task executes before this returns. Handler
    /// failures end up in the task record, not in the return value.
    ///
    /// # Errors
    /// `AgentNotFound` if the agent is not registered; nothing is recorded
    pub async fn assign_task(&self, agent_id: &AgentId, spec: TaskSpec) -> Result<TaskId> {
        let (task, agent_running) = {
            let mut agents = self.agents.write().await;
            let agent = agents
                .get_mut(agent_id)
                .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;

            let task = Task::for_agent(agent_id.clone(), spec);
            agent.tasks.assigned();
            agent.touch();
            self.tasks.insert(task.clone()).await;
            (task, agent.is_running())
        };

        let task_id = task.id.clone();
        info!(task = %task_id, agent = %agent_id, kind = %task.kind, "Task assigned");
        self.events.emit(HubEvent::TaskAssigned {
            task: Box::new(task),
        });

        if agent_running {
            if let Err(e) = self.execute(&task_id).await {
                error!(task = %task_id, "Task bookkeeping failed: {}", e);
            }
        }

        Ok(task_id)
    }

    /// Run a pending task to its terminal state and update the owning agent
    async fn execute(&self, task_id: &TaskId) -> Result<()> {
        let task = self
            .tasks
            .update(task_id.as_str(), |t| t.start().map(|_| t.clone()))
            .await??;

        // No locks held while the handler runs
        let outcome = self.handlers.dispatch(&task).await;

        let finished = self
            .tasks
            .update(task_id.as_str(), |t| {
                let transition = match outcome {
                    Ok(output) => t.complete(output),
                    Err(e) => t.fail(e.to_string()),
                };
                transition.map(|_| t.clone())
            })
            .await??;

        if let Some(agent_id) = &finished.agent_id {
            let mut agents = self.agents.write().await;
            match agents.get_mut(agent_id) {
                Some(agent) => {
                    match finished.status {
                        TaskStatus::Completed => agent.tasks.completed(),
                        _ => agent.tasks.failed(),
                    }
                    agent.touch();
                }
                None => warn!(agent = %agent_id, "Agent disappeared while task was running"),
            }
        }

        match finished.status {
            TaskStatus::Completed => {
                info!(
                    task = %task_id,
                    elapsed_ms = finished.processing_time_ms.unwrap_or(0),
                    "Task completed"
                );
                self.events.emit(HubEvent::TaskCompleted {
                    task: Box::new(finished),
                });
            }
            _ => {
                warn!(
                    task = %task_id,
                    error = finished.error.as_deref().unwrap_or(""),
                    "Task failed"
                );
                self.events.emit(HubEvent::TaskFailed {
                    task: Box::new(finished),
                });
            }
        }

        Ok(())
    }

    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.tasks.get(id).await
    }

    /// All tasks in creation order
    pub async fn all_tasks(&self) -> Vec<Task> {
        self.tasks.all().await
    }

    /// Tasks owned by one agent
    ///
    /// # Errors
    /// `AgentNotFound` if the agent is not registered
    pub async fn agent_tasks(&self, agent_id: &AgentId) -> Result<Vec<Task>> {
        if !self.agents.read().await.contains(agent_id) {
            return Err(Error::AgentNotFound(agent_id.to_string()));
        }
        Ok(self.tasks.by_agent(agent_id).await)
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let status = *self.status.read().await;
        let (agents_count, running_agents) = {
            let agents = self.agents.read().await;
            (agents.len(), agents.running_count())
        };

        OrchestratorStatus {
            status,
            agents_count,
            tasks_count: self.tasks.len().await,
            running_agents,
        }
    }

    // ------------------------------------------------------------------------
    // Development integration
    // ------------------------------------------------------------------------

    pub async fn development_capabilities(&self) -> DevelopmentCapabilities {
        let (available_agents, agent_capabilities) = {
            let agents = self.agents.read().await;
            (agents.ids(), agents.capabilities())
        };

        DevelopmentCapabilities {
            available_agents,
            agent_capabilities,
            system_status: self.status().await,
        }
    }

    /// Assign a `development` task to the development agent
    pub async fn execute_development_task(
        &self,
        description: impl Into<String>,
        priority: Option<TaskPriority>,
    ) -> Result<DevelopmentAssignment> {
        let spec = TaskSpec::new(TaskKind::Development, description)
            .with_priority(priority.unwrap_or_default());
        let task_id = self.assign_task(&AgentId::new(DEVELOPMENT_AGENT), spec).await?;

        Ok(DevelopmentAssignment {
            task_id,
            status: "assigned".to_string(),
        })
    }

    pub async fn development_status(&self) -> DevelopmentStatus {
        let agent_id = AgentId::new(DEVELOPMENT_AGENT);
        let agent_status = self.get_agent_status(&agent_id).await;
        let tasks = self.tasks.by_agent(&agent_id).await;

        let with_status = |status: TaskStatus| -> Vec<Task> {
            tasks.iter().filter(|t| t.status == status).cloned().collect()
        };

        DevelopmentStatus {
            agent_status,
            active_tasks: with_status(TaskStatus::Running),
            completed_tasks: with_status(TaskStatus::Completed),
            pending_tasks: with_status(TaskStatus::Pending),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("handlers", &self.handlers)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
