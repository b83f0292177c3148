//! Error types for the dashboard client.

use crate::api_client::ApiClientError;
use crate::charts::ChartError;
use crate::commands::CommandError;
use crate::config::ConfigError;
use crate::rows::RowError;
use bizdash_core::DashboardError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Rows(#[from] RowError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error("Failed to initialise logging: {0}")]
    Telemetry(String),
}
