//! Agent registry
//!
//! An agent is a named, stateful worker abstraction. Agents own task
//! counters and a lifecycle status; the orchestrator consults the status to
//! decide whether an assigned task runs right away.

pub mod registry;
pub mod types;

pub use registry::{AgentRegistry, default_agents};
pub use types::{
    Agent, AgentCapabilities, AgentConfig, AgentId, AgentPerformance, AgentSnapshot, AgentStatus,
    TaskCounters,
};
