//! Error types for BIZDASH operations

use crate::module::ModuleKey;
use thiserror::Error;

/// Failure reported by the RPC transport itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Errors raised while resolving dashboard module data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    #[error("Unknown module key: {key}")]
    UnknownModuleKey { key: String },

    #[error("Fetch for {key} failed in transport: {source}")]
    FetchTransport {
        key: ModuleKey,
        #[source]
        source: TransportError,
    },

    #[error("Fetch for {key} returned an error response: {reason}")]
    FetchLogical { key: ModuleKey, reason: String },

    #[error("Payload for {key} did not match its schema: {reason}")]
    PayloadDecode { key: ModuleKey, reason: String },

    #[error("Joined fetch for {key} failed: {cause}")]
    ConcurrentFetchJoinFailure {
        key: ModuleKey,
        cause: Box<DashboardError>,
    },
}

impl DashboardError {
    /// Module the error refers to, if it names a known one.
    pub fn module(&self) -> Option<ModuleKey> {
        match self {
            DashboardError::UnknownModuleKey { .. } => None,
            DashboardError::FetchTransport { key, .. }
            | DashboardError::FetchLogical { key, .. }
            | DashboardError::PayloadDecode { key, .. }
            | DashboardError::ConcurrentFetchJoinFailure { key, .. } => Some(*key),
        }
    }

    /// Re-label a fetch failure as seen by a caller that joined the flight.
    pub fn joined(self) -> Self {
        match self {
            DashboardError::ConcurrentFetchJoinFailure { .. } => self,
            other => match other.module() {
                Some(key) => DashboardError::ConcurrentFetchJoinFailure {
                    key,
                    cause: Box::new(other),
                },
                None => other,
            },
        }
    }

    /// Stable snake_case code for notifications and logs.
    pub fn code(&self) -> &'static str {
        match self {
            DashboardError::UnknownModuleKey { .. } => "unknown_module_key",
            DashboardError::FetchTransport { .. } => "fetch_transport_error",
            DashboardError::FetchLogical { .. } => "fetch_logical_error",
            DashboardError::PayloadDecode { .. } => "payload_decode_error",
            DashboardError::ConcurrentFetchJoinFailure { .. } => "concurrent_fetch_join_failure",
        }
    }
}

/// Result type for BIZDASH operations.
pub type DashboardResult<T> = Result<T, DashboardError>;
