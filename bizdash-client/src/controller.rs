//! The dashboard view controller.
//!
//! Exactly one module view is active at a time. Every view switch bumps a
//! generation counter and hands out a [`ViewTicket`]; a load started under an
//! older ticket may still finish, but [`DashboardController::apply`] discards
//! it instead of drawing over the newer view.

use std::sync::Arc;

use bizdash_cache::{LoadOptions, ModuleCacheManager, ModuleRead, ReadOrigin};
use bizdash_core::{DashboardError, ModuleKey, ModulePayload, Timestamp};
use futures_util::future::{BoxFuture, FutureExt};

use crate::charts::{chart_specs, ChartError, ChartRenderer, ChartSet};
use crate::rows::{table_for, Table};

/// Identifies the view a load was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket {
    pub key: ModuleKey,
    pub generation: u64,
}

/// A finished load, still tagged with the view it was started for.
#[derive(Debug, Clone)]
pub struct LoadedView {
    pub ticket: ViewTicket,
    pub read: ModuleRead,
}

/// A load in progress. Owns everything it needs, so it can be awaited or
/// spawned while the controller keeps handling input.
pub type PendingLoad = BoxFuture<'static, LoadedView>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Discarded { stale: ViewTicket, current: ViewTicket },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// What the active view currently shows.
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub key: ModuleKey,
    pub payload: Arc<ModulePayload>,
    /// `None` while showing a peeked payload ahead of the real load.
    pub origin: Option<ReadOrigin>,
    pub fetched_at: Option<Timestamp>,
    pub error: Option<DashboardError>,
    pub table: Table,
}

impl RenderedView {
    pub fn is_optimistic(&self) -> bool {
        self.origin.is_none()
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == Some(ReadOrigin::Fallback)
    }

    /// Title, freshness, KPI tiles and the first rows of the main table.
    pub fn summary(&self, row_limit: usize) -> String {
        let status = match (self.origin, self.fetched_at) {
            (None, _) => "cached copy, refreshing".to_string(),
            (Some(ReadOrigin::Fallback), _) => "unavailable, showing empty data".to_string(),
            (Some(ReadOrigin::Cache), Some(at)) => format!("cached, fetched {}", at.format("%H:%M:%S")),
            (Some(_), Some(at)) => format!("fetched {}", at.format("%H:%M:%S")),
            (Some(_), None) => "loaded".to_string(),
        };

        let mut out = format!("== {} ({}) ==\n", self.key.title(), status);
        for (label, value) in self.payload.kpis() {
            out.push_str(&format!("  {:<22} {}\n", label, format_kpi(value)));
        }
        out.push('\n');
        out.push_str(&self.table.render(row_limit));
        out
    }
}

fn format_kpi(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Owns the active view, its charts and the generation counter.
pub struct DashboardController {
    manager: ModuleCacheManager,
    renderer: Arc<dyn ChartRenderer>,
    charts: ChartSet,
    active: ModuleKey,
    generation: u64,
    rendered: Option<RenderedView>,
}

impl DashboardController {
    pub fn new(manager: ModuleCacheManager, renderer: Arc<dyn ChartRenderer>, initial: ModuleKey) -> Self {
        Self {
            manager,
            renderer,
            charts: ChartSet::new(),
            active: initial,
            generation: 0,
            rendered: None,
        }
    }

    pub fn manager(&self) -> &ModuleCacheManager {
        &self.manager
    }

    pub fn active(&self) -> ModuleKey {
        self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ticket(&self) -> ViewTicket {
        ViewTicket {
            key: self.active,
            generation: self.generation,
        }
    }

    pub fn rendered(&self) -> Option<&RenderedView> {
        self.rendered.as_ref()
    }

    pub fn live_charts(&self) -> usize {
        self.charts.len()
    }

    /// Make `key` the active view.
    ///
    /// Tears down the previous view's charts and, if anything is cached for
    /// `key`, renders it right away as an optimistic preview.
    pub fn switch_view(&mut self, key: ModuleKey) -> ViewTicket {
        self.generation += 1;
        let previous = std::mem::replace(&mut self.active, key);
        self.charts.teardown();
        self.rendered = None;
        tracing::debug!(from = %previous, to = %key, generation = self.generation, "View switched");

        if let Some(payload) = self.manager.peek(key) {
            if let Err(err) = self.render(key, payload, None) {
                tracing::warn!(module = %key, error = %err, "Optimistic render failed");
            }
        }
        self.ticket()
    }

    /// Start loading data for the active view.
    pub fn begin_load(&self, options: LoadOptions) -> PendingLoad {
        let ticket = self.ticket();
        let manager = self.manager.clone();
        async move {
            let read = manager.ensure_loaded(ticket.key, options).await;
            LoadedView { ticket, read }
        }
        .boxed()
    }

    /// Render a finished load if its view is still the active one.
    pub fn apply(&mut self, loaded: LoadedView) -> Result<ApplyOutcome, ChartError> {
        let current = self.ticket();
        if loaded.ticket != current {
            tracing::debug!(
                stale_module = %loaded.ticket.key,
                stale_generation = loaded.ticket.generation,
                current_module = %current.key,
                current_generation = current.generation,
                "Discarding load for inactive view"
            );
            return Ok(ApplyOutcome::Discarded {
                stale: loaded.ticket,
                current,
            });
        }

        let payload = Arc::clone(loaded.read.payload());
        self.render(current.key, payload, Some(&loaded.read))?;
        Ok(ApplyOutcome::Applied)
    }

    /// Switch to `key`, load it and render it.
    pub async fn show(&mut self, key: ModuleKey, options: LoadOptions) -> Result<ApplyOutcome, ChartError> {
        self.switch_view(key);
        let loaded = self.begin_load(options).await;
        self.apply(loaded)
    }

    /// Force-refresh the active view in place.
    pub async fn refresh(&mut self) -> Result<ApplyOutcome, ChartError> {
        let loaded = self.begin_load(LoadOptions::forced()).await;
        self.apply(loaded)
    }

    /// Drop everything tied to the current session.
    pub fn logout(&mut self) {
        self.manager.invalidate_all();
        self.manager.clear();
        self.generation += 1;
        self.charts.teardown();
        self.rendered = None;
        tracing::info!(generation = self.generation, "Session cleared");
    }

    fn render(
        &mut self,
        key: ModuleKey,
        payload: Arc<ModulePayload>,
        read: Option<&ModuleRead>,
    ) -> Result<(), ChartError> {
        let specs = chart_specs(&payload);
        self.charts.sync(self.renderer.as_ref(), &specs)?;
        self.rendered = Some(RenderedView {
            key,
            table: table_for(&payload),
            payload,
            origin: read.map(ModuleRead::origin),
            fetched_at: read.and_then(ModuleRead::fetched_at_wall),
            error: read.and_then(|r| r.error().cloned()),
        });
        Ok(())
    }
}

impl std::fmt::Debug for DashboardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardController")
            .field("active", &self.active)
            .field("generation", &self.generation)
            .field("charts", &self.charts)
            .finish()
    }
}
