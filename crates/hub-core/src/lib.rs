//! hub-core: Agent Hub Core Library
//!
//! エージェントレジストリ、タスクストア、オーケストレーター、
//! イベントバス、結果キャッシュ、高速タスクサービスのコア機能を提供します。

pub mod agents;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod fast;
pub mod orchestrator;
pub mod tasks;

pub use agents::{AgentConfig, AgentId, AgentRegistry, AgentSnapshot, AgentStatus};
pub use cache::{CacheKey, ResultCache};
pub use config::{ApiConfig, CacheConfig, Config, QueueConfig, SimulationConfig};
pub use error::{Error, Result};
pub use events::{EventBus, EventKind, HubEvent};
pub use fast::{FastTaskService, Submission};
pub use orchestrator::{Orchestrator, OrchestratorStatus};
pub use tasks::{
    HandlerTable, Task, TaskHandler, TaskId, TaskKind, TaskOutput, TaskPriority, TaskSpec,
    TaskStatus,
};
