//! Error types for the abono binary.

use crate::api_client::ApiClientError;
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use abono_core::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    ApiClient(#[from] ApiClientError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("Usage: {0}")]
    Usage(String),
}
