//! HTTP API handlers
//!
//! Request handlers for the orchestrator and the fast task service.

use axum::{
    Json,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info};
use validator::{Validate, ValidationError};

use hub_core::fast::{FastServiceStatus, PerformanceMetrics};
use hub_core::orchestrator::{DevelopmentCapabilities, DevelopmentStatus};
use hub_core::{
    AgentConfig, AgentId, AgentSnapshot, OrchestratorStatus, Submission, Task, TaskKind,
    TaskPriority, TaskSpec,
};

use crate::error::{ApiError, Result};
use crate::server::AppState;

// ============================================================================
// Response envelope
// ============================================================================

/// Success envelope: `{ success: true, data, message? }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Failure envelope: `{ success: false, error, message? }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

type Reply<T> = Result<(StatusCode, Json<ApiResponse<T>>)>;

fn ok<T>(data: T) -> Reply<T> {
    Ok((StatusCode::OK, Json(ApiResponse::new(data))))
}

fn created<T>(data: T, message: impl Into<String>) -> Reply<T> {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(data).with_message(message)),
    ))
}

// ============================================================================
// Request types
// ============================================================================

/// JSON body that has passed `validator` checks
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn validate_agent_id(id: &str) -> std::result::Result<(), ValidationError> {
    let valid = id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("agent_id");
        error.message = Some("may only contain lowercase letters, digits, '-' and '_'".into());
        Err(error)
    }
}

/// Register agent payload
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAgentRequest {
    #[validate(
        length(min = 1, max = 64, message = "must be 1-64 characters"),
        custom(function = "validate_agent_id")
    )]
    pub id: String,
    #[validate(length(min = 1, max = 128, message = "must be 1-128 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 512, message = "must be at most 512 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 32, message = "at most 32 capabilities"))]
    pub capabilities: Vec<String>,
}

/// Assign task payload
#[derive(Debug, Deserialize, Validate)]
pub struct AssignTaskRequest {
    /// Task kind, e.g. `monitoring` or `code-generation`
    #[serde(rename = "type", alias = "kind")]
    #[validate(length(min = 1, message = "is required"))]
    pub kind: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: String,
    #[serde(default)]
    pub input: Value,
}

/// Fast task payload
#[derive(Debug, Deserialize, Validate)]
pub struct FastTaskRequest {
    #[serde(rename = "type", alias = "kind")]
    #[validate(length(min = 1, message = "is required"))]
    pub kind: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub input: Value,
}

fn parse_priority(priority: Option<&str>) -> Result<TaskPriority> {
    Ok(priority
        .map(str::parse::<TaskPriority>)
        .transpose()?
        .unwrap_or_default())
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DevelopmentOverview {
    pub capabilities: DevelopmentCapabilities,
    pub status: DevelopmentStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheCleared {
    pub cleared: bool,
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

pub async fn status(State(state): State<AppState>) -> Reply<OrchestratorStatus> {
    ok(state.orchestrator.status().await)
}

pub async fn list_agents(State(state): State<AppState>) -> Reply<Vec<AgentSnapshot>> {
    ok(state.orchestrator.all_agents_status().await)
}

pub async fn register_agent(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterAgentRequest>,
) -> Reply<AgentSnapshot> {
    let id = AgentId::new(req.id);
    let config = AgentConfig::new(req.name, req.description).with_capabilities(req.capabilities);
    let replaced = state.orchestrator.register_agent(id.clone(), config).await;

    let snapshot = state
        .orchestrator
        .get_agent_status(&id)
        .await
        .ok_or_else(|| hub_core::Error::AgentNotFound(id.to_string()))?;

    let message = if replaced {
        "Agent replaced"
    } else {
        "Agent registered"
    };
    created(snapshot, message)
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Reply<AgentSnapshot> {
    let snapshot = state
        .orchestrator
        .get_agent_status(&AgentId::new(agent_id.as_str()))
        .await
        .ok_or(hub_core::Error::AgentNotFound(agent_id))?;
    ok(snapshot)
}

pub async fn start_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Reply<AgentSnapshot> {
    let snapshot = state.orchestrator.start_agent(&AgentId::new(agent_id)).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::new(snapshot).with_message("Agent started")),
    ))
}

pub async fn stop_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Reply<AgentSnapshot> {
    let snapshot = state.orchestrator.stop_agent(&AgentId::new(agent_id)).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::new(snapshot).with_message("Agent stopped")),
    ))
}

pub async fn agent_tasks(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Reply<Vec<Task>> {
    ok(state.orchestrator.agent_tasks(&AgentId::new(agent_id)).await?)
}

/// Assign a task; when the agent is running the response carries the finished task
pub async fn assign_task(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    ValidatedJson(req): ValidatedJson<AssignTaskRequest>,
) -> Reply<Task> {
    let kind: TaskKind = req.kind.parse()?;
    let priority = parse_priority(req.priority.as_deref())?;
    debug!(agent = %agent_id, kind = %kind, "Assign task request");

    let spec = TaskSpec::new(kind, req.description)
        .with_priority(priority)
        .with_input(req.input);
    let task_id = state
        .orchestrator
        .assign_task(&AgentId::new(agent_id), spec)
        .await?;

    let task = state
        .orchestrator
        .get_task(task_id.as_str())
        .await
        .ok_or_else(|| hub_core::Error::TaskNotFound(task_id.to_string()))?;
    created(task, "Task assigned")
}

pub async fn list_tasks(State(state): State<AppState>) -> Reply<Vec<Task>> {
    ok(state.orchestrator.all_tasks().await)
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Reply<Task> {
    let task = state
        .orchestrator
        .get_task(&task_id)
        .await
        .ok_or(hub_core::Error::TaskNotFound(task_id))?;
    ok(task)
}

pub async fn development(State(state): State<AppState>) -> Reply<DevelopmentOverview> {
    ok(DevelopmentOverview {
        capabilities: state.orchestrator.development_capabilities().await,
        status: state.orchestrator.development_status().await,
    })
}

/// Submit to the fast service: 200 with the output on a cache hit, 201 when queued
pub async fn submit_fast_task(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<FastTaskRequest>,
) -> Reply<Submission> {
    let kind: TaskKind = req.kind.parse()?;
    let priority = parse_priority(req.priority.as_deref())?;

    match state.fast.add_task(kind, req.input, priority).await? {
        cached @ Submission::Cached { .. } => Ok((
            StatusCode::OK,
            Json(ApiResponse::new(cached).with_message("Served from cache")),
        )),
        accepted @ Submission::Accepted { .. } => created(accepted, "Task queued"),
    }
}

pub async fn get_fast_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Reply<Task> {
    let task = state
        .fast
        .get_task(&task_id)
        .await
        .ok_or(hub_core::Error::TaskNotFound(task_id))?;
    ok(task)
}

pub async fn fast_status(State(state): State<AppState>) -> Reply<FastServiceStatus> {
    ok(state.fast.get_status())
}

pub async fn fast_metrics(State(state): State<AppState>) -> Reply<PerformanceMetrics> {
    ok(state.fast.performance_metrics().await)
}

pub async fn clear_fast_cache(State(state): State<AppState>) -> Reply<CacheCleared> {
    state.fast.clear_cache().await;
    info!("Fast task cache cleared via API");
    Ok((
        StatusCode::OK,
        Json(ApiResponse::new(CacheCleared { cleared: true }).with_message("Cache cleared")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterAgentRequest {
            id: "qa-bot_2".into(),
            name: "QA Bot".into(),
            description: String::new(),
            capabilities: vec![],
        };
        assert!(valid.validate().is_ok());

        let invalid = RegisterAgentRequest {
            id: "QA Bot!".into(),
            name: String::new(),
            description: String::new(),
            capabilities: vec![],
        };
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("id"));
        assert!(fields.contains_key("name"));
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority(None).unwrap(), TaskPriority::Medium);
        assert_eq!(parse_priority(Some("high")).unwrap(), TaskPriority::High);
        assert!(parse_priority(Some("soon")).is_err());
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::new(1).with_message("done")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 1, "message": "done"}));

        let json = serde_json::to_value(ErrorResponse::new("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "nope"}));
    }
}
