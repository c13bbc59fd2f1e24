//! エラー型定義 (hub-api)

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::handlers::ErrorResponse;

/// hub-api のエラー型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Core error: {0}")]
    Core(#[from] hub_core::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        use hub_core::Error as Core;

        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Core(Core::AgentNotFound(_) | Core::TaskNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Core(Core::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Core(Core::QueueFull(_) | Core::ServiceStopped) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        use hub_core::Error as Core;

        match self {
            Self::Unauthorized => ErrorResponse::new("Unauthorized"),
            Self::InvalidRequest(msg) => ErrorResponse::new("Invalid request").with_message(msg),
            Self::Validation(errors) => {
                ErrorResponse::new("Validation failed").with_message(field_messages(errors))
            }
            Self::Core(e @ (Core::AgentNotFound(_) | Core::TaskNotFound(_))) => {
                ErrorResponse::new(e.to_string())
            }
            Self::Core(Core::Validation(msg)) => {
                ErrorResponse::new("Validation failed").with_message(msg)
            }
            Self::Core(e @ (Core::QueueFull(_) | Core::ServiceStopped)) => {
                ErrorResponse::new("Service unavailable").with_message(e.to_string())
            }
            _ => ErrorResponse::new("Internal server error"),
        }
    }
}

/// `field: message` for every failed field, sorted by field name
fn field_messages(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let detail = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, detail)
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Details stay in the log
            error!("Request failed: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, ApiError>;
