//! Module lifecycle and data-cache manager.
//!
//! One instance is owned by the top-level dashboard controller and cloned
//! into whatever needs module data. It keeps, per [`ModuleKey`], the last
//! fetched payload, the [`LoadState`], and at most one in-flight fetch.
//!
//! The in-flight fetch is a [`Shared`] future: the first caller creates it,
//! later callers clone it, and whichever waiter is polled drives the RPC
//! call. Completion bookkeeping runs inside the shared future, so it happens
//! exactly once no matter how many callers wait or drop out early.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bizdash_core::{DashboardError, DashboardResult, LoadState, ModuleKey, ModulePayload, Timestamp};
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::diagnostics::{DiagnosticSink, LoadDiagnostic, TracingDiagnostics};
use crate::read::ModuleRead;
use crate::rpc::{interpret_response, RpcInvoker};
use crate::stats::{CacheStats, Counters};

/// Per-call options for [`ModuleCacheManager::ensure_loaded`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Ignore a fresh cache entry. Still joins a fetch already in flight.
    pub force_refresh: bool,
}

impl LoadOptions {
    pub fn forced() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<ModulePayload>,
    fetched_at: Instant,
    fetched_at_wall: Timestamp,
}

#[derive(Debug, Clone)]
enum FlightOutcome {
    Fetched(CacheEntry),
    Failed {
        payload: Arc<ModulePayload>,
        error: DashboardError,
    },
}

type FlightFuture = Shared<BoxFuture<'static, FlightOutcome>>;

struct Flight {
    future: FlightFuture,
    waiters: usize,
}

#[derive(Default)]
struct Slot {
    state: LoadState,
    entry: Option<CacheEntry>,
    flight: Option<Flight>,
    /// Set by `invalidate`; the next load must fetch.
    stale: bool,
    /// Bumped by `clear`; a flight from an older epoch must not store its result.
    epoch: u64,
    attempts: u64,
}

enum Admission {
    Ready(ModuleRead),
    Join(FlightFuture),
    Lead(FlightFuture),
}

struct Inner {
    rpc: Arc<dyn RpcInvoker>,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: CacheConfig,
    slots: Mutex<HashMap<ModuleKey, Slot>>,
    counters: Counters,
}

impl Inner {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<ModuleKey, Slot>> {
        // Slot updates are single assignments; a panicking holder cannot leave
        // a half-written slot behind.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        Instant::now().saturating_duration_since(entry.fetched_at) < self.config.ttl
    }

    async fn fetch(self: Arc<Self>, key: ModuleKey, epoch: u64, attempt: u64) -> FlightOutcome {
        let result = match self.rpc.invoke(key.rpc_method(), key.rpc_args()).await {
            Ok(response) => interpret_response(key, response),
            Err(source) => Err(DashboardError::FetchTransport { key, source }),
        };
        self.complete(key, epoch, attempt, result)
    }

    fn complete(
        &self,
        key: ModuleKey,
        epoch: u64,
        attempt: u64,
        result: DashboardResult<ModulePayload>,
    ) -> FlightOutcome {
        let mut slots = self.lock_slots();
        let slot = slots.entry(key).or_default();
        let waiters = slot.flight.take().map(|f| f.waiters).unwrap_or(0);
        let same_epoch = slot.epoch == epoch;

        match result {
            Ok(payload) => {
                let entry = CacheEntry {
                    payload: Arc::new(payload),
                    fetched_at: Instant::now(),
                    fetched_at_wall: Utc::now(),
                };
                if same_epoch {
                    slot.entry = Some(entry.clone());
                }
                // An invalidation that arrived mid-flight applies right after the load.
                slot.state = if same_epoch && !slot.stale {
                    LoadState::Loaded
                } else {
                    LoadState::Unloaded
                };
                tracing::info!(module = %key, attempt, waiters, state = %slot.state, "Module data fetched");
                FlightOutcome::Fetched(entry)
            }
            Err(error) => {
                slot.state = LoadState::Failed;
                drop(slots);

                self.counters.failure();
                self.diagnostics
                    .record(&LoadDiagnostic::new(key, error.clone(), attempt, waiters));
                FlightOutcome::Failed {
                    payload: Arc::new(ModulePayload::empty(key)),
                    error,
                }
            }
        }
    }
}

/// Owner of module payloads, load states and in-flight fetches.
#[derive(Clone)]
pub struct ModuleCacheManager {
    inner: Arc<Inner>,
}

impl ModuleCacheManager {
    /// Create a manager fetching through `rpc` and reporting failures to `diagnostics`.
    pub fn new(
        rpc: Arc<dyn RpcInvoker>,
        diagnostics: Arc<dyn DiagnosticSink>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                rpc,
                diagnostics,
                config,
                slots: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Create a manager with default configuration that logs failures via `tracing`.
    pub fn with_defaults(rpc: Arc<dyn RpcInvoker>) -> Self {
        Self::new(rpc, Arc::new(TracingDiagnostics), CacheConfig::default())
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Make fresh-enough data for `key` available.
    ///
    /// - A fresh entry (and no `force_refresh`) is returned without I/O and
    ///   without suspending.
    /// - If a fetch for `key` is in flight, the call joins it.
    /// - Otherwise exactly one RPC call is issued; every caller that joins
    ///   before it completes receives the same payload `Arc`.
    ///
    /// Never fails: a failed fetch resolves every waiter with the module's
    /// empty skeleton and the error attached to the [`ModuleRead`].
    pub async fn ensure_loaded(&self, key: ModuleKey, options: LoadOptions) -> ModuleRead {
        let (flight, joined) = match self.admit(key, options) {
            Admission::Ready(read) => return read,
            Admission::Join(flight) => (flight, true),
            Admission::Lead(flight) => (flight, false),
        };

        match flight.await {
            FlightOutcome::Fetched(entry) => ModuleRead::from_fetch(
                key,
                entry.payload,
                entry.fetched_at,
                entry.fetched_at_wall,
                joined,
            ),
            FlightOutcome::Failed { payload, error } => {
                let error = if joined { error.joined() } else { error };
                ModuleRead::fallback(key, payload, error, joined)
            }
        }
    }

    /// [`ensure_loaded`](Self::ensure_loaded) for a module named by string.
    ///
    /// Unknown names fail here, before any future exists or any I/O happens.
    pub fn ensure_loaded_by_name(
        &self,
        name: &str,
        options: LoadOptions,
    ) -> DashboardResult<impl Future<Output = ModuleRead> + Send + '_> {
        let key: ModuleKey = name.parse()?;
        Ok(self.ensure_loaded(key, options))
    }

    fn admit(&self, key: ModuleKey, options: LoadOptions) -> Admission {
        let mut slots = self.inner.lock_slots();
        let slot = slots.entry(key).or_default();

        if !options.force_refresh && slot.state == LoadState::Loaded && !slot.stale {
            if let Some(entry) = slot.entry.as_ref().filter(|e| self.inner.is_fresh(e)) {
                self.inner.counters.hit();
                tracing::debug!(module = %key, "Module cache hit");
                return Admission::Ready(ModuleRead::from_cache(
                    key,
                    Arc::clone(&entry.payload),
                    entry.fetched_at,
                    entry.fetched_at_wall,
                ));
            }
        }

        if let Some(flight) = slot.flight.as_mut() {
            flight.waiters += 1;
            self.inner.counters.join();
            tracing::debug!(
                module = %key,
                waiters = flight.waiters,
                forced = options.force_refresh,
                "Joining in-flight module fetch"
            );
            return Admission::Join(flight.future.clone());
        }

        slot.state = LoadState::Loading;
        slot.stale = false;
        slot.attempts += 1;
        let future = Arc::clone(&self.inner)
            .fetch(key, slot.epoch, slot.attempts)
            .boxed()
            .shared();
        slot.flight = Some(Flight {
            future: future.clone(),
            waiters: 1,
        });
        self.inner.counters.fetch();
        tracing::debug!(
            module = %key,
            attempt = slot.attempts,
            forced = options.force_refresh,
            "Starting module fetch"
        );
        Admission::Lead(future)
    }

    /// Whatever is cached for `key`, fresh or not. Never performs I/O.
    pub fn peek(&self, key: ModuleKey) -> Option<Arc<ModulePayload>> {
        self.inner
            .lock_slots()
            .get(&key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| Arc::clone(&entry.payload))
    }

    /// Current lifecycle state of `key`.
    pub fn load_state(&self, key: ModuleKey) -> LoadState {
        self.inner
            .lock_slots()
            .get(&key)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    /// Force the next load of `key` to fetch. Idempotent.
    ///
    /// The cached payload stays visible to [`peek`](Self::peek). A fetch
    /// already in flight is not restarted; its result is delivered but the
    /// key is left `Unloaded`.
    pub fn invalidate(&self, key: ModuleKey) {
        let mut slots = self.inner.lock_slots();
        if let Some(slot) = slots.get_mut(&key) {
            Self::invalidate_slot(slot);
            tracing::debug!(module = %key, state = %slot.state, "Module invalidated");
        }
    }

    /// Invalidate every known module.
    pub fn invalidate_all(&self) {
        let mut slots = self.inner.lock_slots();
        for slot in slots.values_mut() {
            Self::invalidate_slot(slot);
        }
        tracing::debug!(modules = slots.len(), "All modules invalidated");
    }

    /// Invalidate every module and drop all cached payloads.
    ///
    /// Used when the session context changes; results of fetches still in
    /// flight are delivered to their waiters but not stored.
    pub fn clear(&self) {
        let mut slots = self.inner.lock_slots();
        for slot in slots.values_mut() {
            Self::invalidate_slot(slot);
            slot.entry = None;
            slot.epoch += 1;
        }
        tracing::info!(modules = slots.len(), "Module cache cleared");
    }

    fn invalidate_slot(slot: &mut Slot) {
        slot.stale = true;
        if slot.state == LoadState::Loaded {
            slot.state = LoadState::Unloaded;
        }
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> CacheStats {
        let entry_count = self
            .inner
            .lock_slots()
            .values()
            .filter(|slot| slot.entry.is_some())
            .count() as u64;
        self.inner.counters.snapshot(entry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bizdash_core::TransportError;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // Mock RPC answering every module with a headcount equal to the call number.
    #[derive(Default)]
    struct CountingRpc {
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RpcInvoker for CountingRpc {
        async fn invoke(&self, _method: &str, _args: Value) -> Result<Value, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(TransportError::new("connection refused"));
            }
            Ok(json!({ "message": { "kpis": { "headcount": call } } }))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        records: AtomicUsize,
    }

    impl DiagnosticSink for CountingSink {
        fn record(&self, _diagnostic: &LoadDiagnostic) {
            self.records.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(rpc: Arc<CountingRpc>, sink: Arc<CountingSink>) -> ModuleCacheManager {
        ModuleCacheManager::new(rpc, sink, CacheConfig::new().with_ttl(Duration::from_secs(60)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_load_within_ttl_is_cache_hit() {
        let rpc = Arc::new(CountingRpc::default());
        let manager = manager(rpc.clone(), Arc::default());

        let first = manager.ensure_loaded(ModuleKey::Hr, LoadOptions::default()).await;
        let second = manager.ensure_loaded(ModuleKey::Hr, LoadOptions::default()).await;

        assert_eq!(rpc.calls.load(Ordering::SeqCst), 1);
        assert!(!first.was_cache_hit());
        assert!(second.was_cache_hit());
        assert!(Arc::ptr_eq(first.payload(), second.payload()));
        assert_eq!(manager.load_state(ModuleKey::Hr), LoadState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_does_not_suspend() {
        let rpc = Arc::new(CountingRpc::default());
        let manager = manager(rpc, Arc::default());
        manager.ensure_loaded(ModuleKey::Sales, LoadOptions::default()).await;

        let read = manager
            .ensure_loaded(ModuleKey::Sales, LoadOptions::default())
            .now_or_never()
            .expect("fresh entry must resolve on first poll");
        assert!(read.was_cache_hit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_refresh_fetches_again() {
        let rpc = Arc::new(CountingRpc::default());
        let manager = manager(rpc.clone(), Arc::default());

        let first = manager.ensure_loaded(ModuleKey::Hr, LoadOptions::default()).await;
        let forced = manager.ensure_loaded(ModuleKey::Hr, LoadOptions::forced()).await;

        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(first.payload(), forced.payload()));
        assert!(Arc::ptr_eq(&manager.peek(ModuleKey::Hr).unwrap(), forced.payload()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_refresh_joins_in_flight_fetch() {
        let rpc = Arc::new(CountingRpc {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let manager = manager(rpc.clone(), Arc::default());

        let (a, b) = tokio::join!(
            manager.ensure_loaded(ModuleKey::Projects, LoadOptions::default()),
            manager.ensure_loaded(ModuleKey::Projects, LoadOptions::forced()),
        );

        assert_eq!(rpc.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(a.payload(), b.payload()));
        assert!(!a.was_joined());
        assert!(b.was_joined());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_serves_fallback_and_records_once() {
        let rpc = Arc::new(CountingRpc {
            fail: true,
            ..Default::default()
        });
        let sink = Arc::new(CountingSink::default());
        let manager = manager(rpc, sink.clone());

        let read = manager.ensure_loaded(ModuleKey::Operations, LoadOptions::default()).await;

        assert!(read.is_fallback());
        assert_eq!(**read.payload(), ModulePayload::empty(ModuleKey::Operations));
        assert_eq!(read.error().map(|e| e.code()), Some("fetch_transport_error"));
        assert_eq!(manager.load_state(ModuleKey::Operations), LoadState::Failed);
        assert!(manager.peek(ModuleKey::Operations).is_none());
        assert_eq!(sink.records.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_keeps_payload_visible_to_peek() {
        let rpc = Arc::new(CountingRpc::default());
        let manager = manager(rpc.clone(), Arc::default());

        let read = manager.ensure_loaded(ModuleKey::Financial, LoadOptions::default()).await;
        manager.invalidate(ModuleKey::Financial);
        manager.invalidate(ModuleKey::Financial);

        assert_eq!(manager.load_state(ModuleKey::Financial), LoadState::Unloaded);
        assert!(Arc::ptr_eq(&manager.peek(ModuleKey::Financial).unwrap(), read.payload()));

        manager.ensure_loaded(ModuleKey::Financial, LoadOptions::default()).await;
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_flight_forces_next_fetch() {
        let rpc = Arc::new(CountingRpc {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let manager = manager(rpc.clone(), Arc::default());

        let mut pending = Box::pin(manager.ensure_loaded(ModuleKey::Sales, LoadOptions::default()));
        assert!(futures_util::poll!(&mut pending).is_pending());
        assert_eq!(manager.load_state(ModuleKey::Sales), LoadState::Loading);

        manager.invalidate(ModuleKey::Sales);
        assert_eq!(manager.load_state(ModuleKey::Sales), LoadState::Loading);

        let read = pending.await;
        assert!(!read.is_fallback());
        assert_eq!(manager.load_state(ModuleKey::Sales), LoadState::Unloaded);

        manager.ensure_loaded(ModuleKey::Sales, LoadOptions::default()).await;
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_payloads_and_in_flight_results() {
        let rpc = Arc::new(CountingRpc {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let manager = manager(rpc, Arc::default());

        manager.ensure_loaded(ModuleKey::Hr, LoadOptions::default()).await;
        let mut pending = Box::pin(manager.ensure_loaded(ModuleKey::Sales, LoadOptions::default()));
        assert!(futures_util::poll!(&mut pending).is_pending());

        manager.clear();
        assert!(manager.peek(ModuleKey::Hr).is_none());

        let read = pending.await;
        assert!(!read.is_fallback());
        assert!(manager.peek(ModuleKey::Sales).is_none());
        assert_eq!(manager.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_name_fails_before_any_io() {
        let rpc = Arc::new(CountingRpc::default());
        let manager = manager(rpc.clone(), Arc::default());

        let err = manager
            .ensure_loaded_by_name("inventory", LoadOptions::default())
            .err()
            .expect("unknown module must be rejected");
        assert_eq!(err.code(), "unknown_module_key");
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);

        let read = manager
            .ensure_loaded_by_name("hr", LoadOptions::default())
            .unwrap()
            .await;
        assert_eq!(read.key(), ModuleKey::Hr);
    }

    #[test]
    fn test_peek_and_state_before_any_load() {
        let rpc = Arc::new(CountingRpc::default());
        let manager = manager(rpc.clone(), Arc::default());

        assert!(manager.peek(ModuleKey::Projects).is_none());
        assert_eq!(manager.load_state(ModuleKey::Projects), LoadState::Unloaded);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.stats(), CacheStats::default());
    }
}
