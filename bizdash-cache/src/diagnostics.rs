//! Side channel for fetch failures.
//!
//! `ensure_loaded` absorbs failures into fallback payloads; the manager
//! reports each failed fetch exactly once through a [`DiagnosticSink`] so the
//! failure is still visible.

use bizdash_core::{DashboardError, ModuleKey, Timestamp};
use chrono::Utc;

/// One failed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadDiagnostic {
    pub key: ModuleKey,
    pub error: DashboardError,
    /// Fetch attempt number for this key, starting at 1.
    pub attempt: u64,
    /// Number of callers that received the fallback from this fetch.
    pub waiters: usize,
    pub at: Timestamp,
}

impl LoadDiagnostic {
    pub fn new(key: ModuleKey, error: DashboardError, attempt: u64, waiters: usize) -> Self {
        Self {
            key,
            error,
            attempt,
            waiters,
            at: Utc::now(),
        }
    }
}

/// Receiver of fetch diagnostics. Must not block.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: &LoadDiagnostic);
}

/// Default sink: a structured `tracing` warning per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn record(&self, diagnostic: &LoadDiagnostic) {
        tracing::warn!(
            module = %diagnostic.key,
            code = diagnostic.error.code(),
            attempt = diagnostic.attempt,
            waiters = diagnostic.waiters,
            error = %diagnostic.error,
            "Module load failed, serving fallback"
        );
    }
}
