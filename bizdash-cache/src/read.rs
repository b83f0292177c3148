//! Result of a module load, carrying where the payload came from.
//!
//! A load never fails outright, so the interesting questions for a caller
//! are whether the payload is real or the fallback skeleton, whether it came
//! from cache, and how old it is.

use std::sync::Arc;
use std::time::Duration;

use bizdash_core::{DashboardError, ModuleKey, ModulePayload, Timestamp};
use tokio::time::Instant;

/// Where a [`ModuleRead`] payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// Served from a fresh cache entry without I/O.
    Cache,
    /// Produced by the fetch this load performed or joined.
    Fetch,
    /// The module's empty skeleton, because the fetch failed.
    Fallback,
}

/// Payload handed to a caller of `ensure_loaded`.
#[derive(Debug, Clone)]
pub struct ModuleRead {
    key: ModuleKey,
    payload: Arc<ModulePayload>,
    origin: ReadOrigin,
    /// Monotonic fetch time; `None` for fallbacks.
    fetched_at: Option<Instant>,
    /// Wall-clock fetch time for display; `None` for fallbacks.
    fetched_at_wall: Option<Timestamp>,
    /// Whether this caller joined a fetch started by someone else.
    joined: bool,
    error: Option<DashboardError>,
}

impl ModuleRead {
    /// A cache hit.
    pub fn from_cache(
        key: ModuleKey,
        payload: Arc<ModulePayload>,
        fetched_at: Instant,
        fetched_at_wall: Timestamp,
    ) -> Self {
        Self {
            key,
            payload,
            origin: ReadOrigin::Cache,
            fetched_at: Some(fetched_at),
            fetched_at_wall: Some(fetched_at_wall),
            joined: false,
            error: None,
        }
    }

    /// A successful fetch.
    pub fn from_fetch(
        key: ModuleKey,
        payload: Arc<ModulePayload>,
        fetched_at: Instant,
        fetched_at_wall: Timestamp,
        joined: bool,
    ) -> Self {
        Self {
            key,
            payload,
            origin: ReadOrigin::Fetch,
            fetched_at: Some(fetched_at),
            fetched_at_wall: Some(fetched_at_wall),
            joined,
            error: None,
        }
    }

    /// A failed fetch served with the fallback skeleton.
    pub fn fallback(
        key: ModuleKey,
        payload: Arc<ModulePayload>,
        error: DashboardError,
        joined: bool,
    ) -> Self {
        Self {
            key,
            payload,
            origin: ReadOrigin::Fallback,
            fetched_at: None,
            fetched_at_wall: None,
            joined,
            error: Some(error),
        }
    }

    pub fn key(&self) -> ModuleKey {
        self.key
    }

    /// Shared handle to the payload; every waiter of one fetch gets the same `Arc`.
    pub fn payload(&self) -> &Arc<ModulePayload> {
        &self.payload
    }

    /// Consume the read and return the payload handle.
    pub fn into_payload(self) -> Arc<ModulePayload> {
        self.payload
    }

    pub fn origin(&self) -> ReadOrigin {
        self.origin
    }

    pub fn was_cache_hit(&self) -> bool {
        self.origin == ReadOrigin::Cache
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == ReadOrigin::Fallback
    }

    pub fn was_joined(&self) -> bool {
        self.joined
    }

    /// The fetch failure behind a fallback.
    pub fn error(&self) -> Option<&DashboardError> {
        self.error.as_ref()
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn fetched_at_wall(&self) -> Option<Timestamp> {
        self.fetched_at_wall
    }

    /// Age of the payload; zero for fallbacks.
    pub fn staleness(&self) -> Duration {
        self.fetched_at
            .map(|at| Instant::now().saturating_duration_since(at))
            .unwrap_or(Duration::ZERO)
    }
}

impl AsRef<ModulePayload> for ModuleRead {
    fn as_ref(&self) -> &ModulePayload {
        &self.payload
    }
}
