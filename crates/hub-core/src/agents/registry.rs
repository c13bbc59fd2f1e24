//! Agent Registry
//!
//! Holds the canonical agent records keyed by id, in registration order.
//! Nothing is persisted; the registry lives as long as its owner.

use std::collections::HashMap;
use tracing::{info, warn};

use super::types::{Agent, AgentCapabilities, AgentConfig, AgentId, AgentSnapshot, AgentStatus};
use crate::{Error, Result};

/// Registry of agents
#[derive(Debug, Default)]
pub struct AgentRegistry {
    /// Agents indexed by ID
    agents: HashMap<AgentId, Agent>,
    /// Registration order, used for listings
    order: Vec<AgentId>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an agent in `idle` status.
    ///
    /// Registering an existing id replaces the previous record (counters
    /// included). Returns `true` when an agent was replaced.
    pub fn register(&mut self, id: AgentId, config: AgentConfig) -> bool {
        info!(agent = %id, "Registering agent: {}", config.name);

        let replaced = self.agents.insert(id.clone(), Agent::new(id.clone(), config)).is_some();
        if replaced {
            warn!(agent = %id, "Agent id already registered, previous record replaced");
        } else {
            self.order.push(id);
        }

        replaced
    }

    /// Set an agent's status to `running`
    pub fn start(&mut self, id: &AgentId) -> Result<&Agent> {
        self.transition(id, AgentStatus::Running)
    }

    /// Set an agent's status to `stopped`
    pub fn stop(&mut self, id: &AgentId) -> Result<&Agent> {
        self.transition(id, AgentStatus::Stopped)
    }

    fn transition(&mut self, id: &AgentId, status: AgentStatus) -> Result<&Agent> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| Error::AgentNotFound(id.to_string()))?;
        agent.set_status(status);
        Ok(agent)
    }

    /// Get an agent by ID
    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Get a mutable agent by ID
    pub fn get_mut(&mut self, id: &AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Snapshot of one agent
    pub fn snapshot(&self, id: &AgentId) -> Option<AgentSnapshot> {
        self.agents.get(id).map(Agent::snapshot)
    }

    /// Snapshots of all agents in registration order
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.iter().map(Agent::snapshot).collect()
    }

    /// Agents in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Registered IDs in registration order
    pub fn ids(&self) -> Vec<AgentId> {
        self.order.clone()
    }

    /// Capability listing for every agent
    pub fn capabilities(&self) -> Vec<AgentCapabilities> {
        self.iter()
            .map(|agent| AgentCapabilities {
                id: agent.id.clone(),
                name: agent.config.name.clone(),
                capabilities: agent.config.capabilities.clone(),
            })
            .collect()
    }

    /// Check if an agent is registered
    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// Number of agents in `running` status
    pub fn running_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_running()).count()
    }

    /// Get the number of registered agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if no agents are registered
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// The agents every orchestrator starts with
pub fn default_agents() -> Vec<(AgentId, AgentConfig)> {
    vec![
        (
            AgentId::new("monitoring"),
            AgentConfig::new("Monitoring Agent", "24/7 system monitoring and health checks")
                .with_capabilities(["health_check", "performance_monitoring", "alert_system"]),
        ),
        (
            AgentId::new("deployment"),
            AgentConfig::new("Deployment Agent", "Automated deployment and CI/CD management")
                .with_capabilities(["auto_deploy", "rollback", "environment_management"]),
        ),
        (
            AgentId::new("fixer"),
            AgentConfig::new("Fixer Agent", "Automatic bug fixing and error resolution")
                .with_capabilities(["error_detection", "auto_fix", "code_optimization"]),
        ),
        (
            AgentId::new("franchise"),
            AgentConfig::new("Franchise Agent", "Franchise management and expansion")
                .with_capabilities(["franchise_management", "location_optimization", "growth_analysis"]),
        ),
        (
            AgentId::new("seo"),
            AgentConfig::new("SEO Agent", "Search engine optimization and content management")
                .with_capabilities(["seo_analysis", "content_optimization", "keyword_research"]),
        ),
        (
            AgentId::new("development"),
            AgentConfig::new("Development Agent", "Real-time coding and project management")
                .with_capabilities([
                    "real_time_coding",
                    "project_management",
                    "code_review",
                    "testing",
                ]),
        ),
    ]
}
