//! エラー型定義 (hub-gateway)

use std::fmt;

/// hub-gateway の統合エラー型
///
/// CLI コマンドの解析エラーとコアのエラーをまとめて扱います
#[derive(Debug)]
pub enum GatewayError {
    /// Core error
    Core(hub_core::Error),
    /// Malformed CLI command
    Usage(String),
    /// Invalid JSON argument
    Json(serde_json::Error),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(e) => write!(f, "{}", e),
            Self::Usage(usage) => write!(f, "Usage: {}", usage),
            Self::Json(e) => write!(f, "Invalid JSON input: {}", e),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<hub_core::Error> for GatewayError {
    fn from(e: hub_core::Error) -> Self {
        Self::Core(e)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, GatewayError>;
