//! Typed adapter over the chart-rendering collaborator.
//!
//! Views describe charts declaratively with [`ChartSpec`]; a
//! [`ChartRenderer`] turns a spec into a live [`ChartHandle`]. A [`ChartSet`]
//! owns the handles of the active view and destroys every one of them before
//! the view is torn down.

use bizdash_core::ModulePayload;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
}

impl ChartKind {
    /// Pie-like charts show one series as shares of a whole.
    pub fn is_radial(&self) -> bool {
        matches!(self, ChartKind::Pie | ChartKind::Doughnut)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
        };
        write!(f, "{}", value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartOptions {
    pub stacked: bool,
    pub show_legend: bool,
}

/// Declarative chart description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    /// Canvas the chart is drawn into; unique within a view.
    pub canvas: String,
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
    pub options: ChartOptions,
}

impl ChartSpec {
    pub fn new(canvas: impl Into<String>, kind: ChartKind, title: impl Into<String>) -> Self {
        Self {
            canvas: canvas.into(),
            kind,
            title: title.into(),
            labels: Vec::new(),
            series: Vec::new(),
            options: ChartOptions {
                stacked: false,
                show_legend: kind.is_radial(),
            },
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_legend(mut self) -> Self {
        self.options.show_legend = true;
        self
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        if self.kind.is_radial() && self.series.len() != 1 {
            return Err(ChartError::SeriesCount {
                canvas: self.canvas.clone(),
                kind: self.kind,
                got: self.series.len(),
            });
        }
        for series in &self.series {
            if series.values.len() != self.labels.len() {
                return Err(ChartError::SeriesLength {
                    canvas: self.canvas.clone(),
                    series: series.name.clone(),
                    expected: self.labels.len(),
                    got: series.values.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("Series {series} of chart {canvas} has {got} values for {expected} labels")]
    SeriesLength {
        canvas: String,
        series: String,
        expected: usize,
        got: usize,
    },
    #[error("{kind} chart {canvas} takes exactly one series, got {got}")]
    SeriesCount {
        canvas: String,
        kind: ChartKind,
        got: usize,
    },
    #[error("Chart {canvas} was already destroyed")]
    Destroyed { canvas: String },
}

/// A live chart.
pub trait ChartHandle: Send {
    fn canvas(&self) -> &str;
    /// Redraw with new data in place.
    fn update(&mut self, spec: &ChartSpec) -> Result<(), ChartError>;
    /// Release the chart's drawing resources. Idempotent.
    fn destroy(&mut self);
    fn is_destroyed(&self) -> bool;
}

/// The chart-drawing collaborator.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, spec: &ChartSpec) -> Result<Box<dyn ChartHandle>, ChartError>;
}

// ============================================================================
// CHART SET
// ============================================================================

/// The chart handles belonging to the active view.
#[derive(Default)]
pub struct ChartSet {
    handles: Vec<Box<dyn ChartHandle>>,
}

impl ChartSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn canvases(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.canvas()).collect()
    }

    /// Make the live charts match `specs`.
    ///
    /// Charts whose canvas appears in `specs` are updated in place, new
    /// canvases are rendered, and charts with no matching spec are destroyed.
    pub fn sync(&mut self, renderer: &dyn ChartRenderer, specs: &[ChartSpec]) -> Result<(), ChartError> {
        for spec in specs {
            spec.validate()?;
        }

        let mut kept: Vec<Box<dyn ChartHandle>> = Vec::with_capacity(specs.len());
        let mut previous = std::mem::take(&mut self.handles);
        let mut result = Ok(());
        for spec in specs {
            let outcome = match previous.iter().position(|h| h.canvas() == spec.canvas) {
                Some(pos) => {
                    let mut handle = previous.swap_remove(pos);
                    let updated = handle.update(spec);
                    kept.push(handle);
                    updated
                }
                None => renderer.render(spec).map(|handle| kept.push(handle)),
            };
            if let Err(err) = outcome {
                result = Err(err);
                break;
            }
        }
        // Handles stay owned by the set even on error so teardown reaches them.
        for mut stale in previous {
            stale.destroy();
        }
        self.handles = kept;
        result
    }

    /// Destroy every chart. Returns how many were destroyed.
    pub fn teardown(&mut self) -> usize {
        let count = self.handles.len();
        for mut handle in self.handles.drain(..) {
            handle.destroy();
        }
        if count > 0 {
            tracing::debug!(charts = count, "Charts destroyed");
        }
        count
    }
}

impl Drop for ChartSet {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for ChartSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartSet")
            .field("canvases", &self.canvases())
            .finish()
    }
}

// ============================================================================
// SPECS PER MODULE
// ============================================================================

/// Charts shown for a module payload.
///
/// The set of canvases depends only on the module, so an empty fallback
/// payload yields the same charts with no data points.
pub fn chart_specs(payload: &ModulePayload) -> Vec<ChartSpec> {
    match payload {
        ModulePayload::Financial(p) => vec![
            ChartSpec::new("cash-flow-chart", ChartKind::Bar, "Cash Flow")
                .with_labels(p.cash_flow.iter().map(|c| c.period.clone()).collect())
                .with_series(Series::new("Inflow", p.cash_flow.iter().map(|c| c.inflow).collect()))
                .with_series(Series::new("Outflow", p.cash_flow.iter().map(|c| c.outflow).collect()))
                .with_legend(),
            ChartSpec::new("account-balance-chart", ChartKind::Doughnut, "Account Balances")
                .with_labels(p.accounts.iter().map(|a| a.name.clone()).collect())
                .with_series(Series::new("Balance", p.accounts.iter().map(|a| a.balance).collect())),
        ],
        ModulePayload::Sales(p) => vec![
            ChartSpec::new("monthly-revenue-chart", ChartKind::Line, "Monthly Revenue")
                .with_labels(p.monthly_revenue.iter().map(|m| m.period.clone()).collect())
                .with_series(Series::new("Revenue", p.monthly_revenue.iter().map(|m| m.value).collect())),
            ChartSpec::new("top-products-chart", ChartKind::Bar, "Top Products")
                .with_labels(p.top_products.iter().map(|t| t.name.clone()).collect())
                .with_series(Series::new("Sales", p.top_products.iter().map(|t| t.amount).collect())),
            ChartSpec::new("top-customers-chart", ChartKind::Pie, "Top Customers")
                .with_labels(p.top_customers.iter().map(|t| t.name.clone()).collect())
                .with_series(Series::new("Revenue", p.top_customers.iter().map(|t| t.amount).collect())),
        ],
        ModulePayload::Operations(p) => vec![
            ChartSpec::new("line-efficiency-chart", ChartKind::Bar, "Production Line Efficiency")
                .with_labels(p.production_lines.iter().map(|l| l.name.clone()).collect())
                .with_series(Series::new(
                    "Efficiency %",
                    p.production_lines.iter().map(|l| l.efficiency).collect(),
                )),
            ChartSpec::new("equipment-utilization-chart", ChartKind::Bar, "Equipment Utilization")
                .with_labels(p.equipment.iter().map(|e| e.name.clone()).collect())
                .with_series(Series::new(
                    "Utilization %",
                    p.equipment.iter().map(|e| e.utilization).collect(),
                )),
        ],
        ModulePayload::Hr(p) => vec![
            ChartSpec::new("department-chart", ChartKind::Doughnut, "Headcount by Department")
                .with_labels(p.departments.iter().map(|d| d.name.clone()).collect())
                .with_series(Series::new(
                    "Employees",
                    p.departments.iter().map(|d| d.count as f64).collect(),
                )),
            ChartSpec::new("attendance-chart", ChartKind::Line, "Attendance")
                .with_labels(p.attendance.iter().map(|a| a.period.clone()).collect())
                .with_series(Series::new("Present %", p.attendance.iter().map(|a| a.value).collect())),
        ],
        ModulePayload::PurchaseOrders(p) => vec![
            ChartSpec::new("monthly-spend-chart", ChartKind::Line, "Monthly Spend")
                .with_labels(p.monthly_spend.iter().map(|m| m.period.clone()).collect())
                .with_series(Series::new("Spend", p.monthly_spend.iter().map(|m| m.value).collect())),
            ChartSpec::new("supplier-chart", ChartKind::Bar, "Top Suppliers")
                .with_labels(p.top_suppliers.iter().map(|s| s.name.clone()).collect())
                .with_series(Series::new("Spend", p.top_suppliers.iter().map(|s| s.amount).collect())),
        ],
        ModulePayload::Projects(p) => vec![
            ChartSpec::new("project-progress-chart", ChartKind::Bar, "Project Progress")
                .with_labels(p.projects.iter().map(|pr| pr.name.clone()).collect())
                .with_series(Series::new("Progress %", p.projects.iter().map(|pr| pr.progress).collect())),
            ChartSpec::new("task-status-chart", ChartKind::Pie, "Tasks by Status")
                .with_labels(p.tasks_by_status.iter().map(|t| t.name.clone()).collect())
                .with_series(Series::new(
                    "Tasks",
                    p.tasks_by_status.iter().map(|t| t.count as f64).collect(),
                )),
        ],
    }
}

// ============================================================================
// TEXT RENDERER
// ============================================================================

const BAR_WIDTH: f64 = 30.0;

#[derive(Debug, Default)]
struct TextCanvas {
    created: usize,
    destroyed: usize,
    frames: Vec<String>,
}

/// Headless renderer drawing charts as plain text.
///
/// Clones share one canvas, so the shell can collect frames and tests can
/// count live handles after the renderer has been handed to a controller.
#[derive(Debug, Clone, Default)]
pub struct TextChartRenderer {
    canvas: Arc<Mutex<TextCanvas>>,
}

impl TextChartRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_canvas<T>(&self, f: impl FnOnce(&mut TextCanvas) -> T) -> T {
        let mut canvas = self.canvas.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut canvas)
    }

    /// Handles rendered and not yet destroyed.
    pub fn live_handles(&self) -> usize {
        self.with_canvas(|c| c.created - c.destroyed)
    }

    pub fn created(&self) -> usize {
        self.with_canvas(|c| c.created)
    }

    pub fn destroyed(&self) -> usize {
        self.with_canvas(|c| c.destroyed)
    }

    /// Frames drawn since the last call.
    pub fn take_frames(&self) -> Vec<String> {
        self.with_canvas(|c| std::mem::take(&mut c.frames))
    }
}

impl ChartRenderer for TextChartRenderer {
    fn render(&self, spec: &ChartSpec) -> Result<Box<dyn ChartHandle>, ChartError> {
        spec.validate()?;
        self.with_canvas(|c| {
            c.created += 1;
            c.frames.push(draw_text(spec));
        });
        Ok(Box::new(TextChartHandle {
            canvas_id: spec.canvas.clone(),
            canvas: Arc::clone(&self.canvas),
            destroyed: false,
        }))
    }
}

struct TextChartHandle {
    canvas_id: String,
    canvas: Arc<Mutex<TextCanvas>>,
    destroyed: bool,
}

impl ChartHandle for TextChartHandle {
    fn canvas(&self) -> &str {
        &self.canvas_id
    }

    fn update(&mut self, spec: &ChartSpec) -> Result<(), ChartError> {
        if self.destroyed {
            return Err(ChartError::Destroyed {
                canvas: self.canvas_id.clone(),
            });
        }
        spec.validate()?;
        let frame = draw_text(spec);
        self.canvas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frames
            .push(frame);
        Ok(())
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.canvas
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .destroyed += 1;
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

fn draw_text(spec: &ChartSpec) -> String {
    let mut out = format!("{} ({})\n", spec.title, spec.kind);
    if spec.labels.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }
    let label_width = spec.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    if spec.kind.is_radial() {
        let values = spec.series.first().map(|s| s.values.as_slice()).unwrap_or(&[]);
        let total: f64 = values.iter().sum();
        for (label, value) in spec.labels.iter().zip(values) {
            let share = if total > 0.0 { value / total * 100.0 } else { 0.0 };
            out.push_str(&format!("  {:<width$}  {:>5.1}%\n", label, share, width = label_width));
        }
        return out;
    }

    let max = spec
        .series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    for series in &spec.series {
        if spec.series.len() > 1 {
            out.push_str(&format!("  {}\n", series.name));
        }
        for (label, value) in spec.labels.iter().zip(&series.values) {
            let len = if max > 0.0 { (value.abs() / max * BAR_WIDTH).round() as usize } else { 0 };
            out.push_str(&format!(
                "  {:<width$}  {:<bar$}  {}\n",
                label,
                "#".repeat(len),
                value,
                width = label_width,
                bar = BAR_WIDTH as usize
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizdash_core::ModuleKey;

    fn bar(canvas: &str, values: Vec<f64>) -> ChartSpec {
        let labels = (0..values.len()).map(|i| format!("L{}", i)).collect();
        ChartSpec::new(canvas, ChartKind::Bar, "Test")
            .with_labels(labels)
            .with_series(Series::new("S", values))
    }

    #[test]
    fn test_validate_rejects_mismatched_series() {
        let spec = ChartSpec::new("c", ChartKind::Line, "Bad")
            .with_labels(vec!["a".into(), "b".into()])
            .with_series(Series::new("S", vec![1.0]));
        assert!(matches!(spec.validate(), Err(ChartError::SeriesLength { expected: 2, got: 1, .. })));

        let pie = ChartSpec::new("p", ChartKind::Pie, "Bad");
        assert!(matches!(pie.validate(), Err(ChartError::SeriesCount { got: 0, .. })));
    }

    #[test]
    fn test_every_module_has_valid_specs_even_when_empty() {
        for key in ModuleKey::all() {
            let specs = chart_specs(&ModulePayload::empty(*key));
            assert!(!specs.is_empty());
            for spec in &specs {
                assert!(spec.validate().is_ok(), "{} invalid", spec.canvas);
            }
        }
    }

    #[test]
    fn test_sync_updates_matching_canvases_and_destroys_others() {
        let renderer = TextChartRenderer::new();
        let mut set = ChartSet::new();

        set.sync(&renderer, &[bar("a", vec![1.0]), bar("b", vec![2.0])]).unwrap();
        assert_eq!(renderer.live_handles(), 2);

        set.sync(&renderer, &[bar("b", vec![3.0]), bar("c", vec![4.0])]).unwrap();
        assert_eq!(set.canvases(), vec!["b", "c"]);
        assert_eq!(renderer.created(), 3);
        assert_eq!(renderer.destroyed(), 1);
        assert_eq!(renderer.live_handles(), 2);
    }

    #[test]
    fn test_teardown_and_drop_destroy_every_handle() {
        let renderer = TextChartRenderer::new();
        {
            let mut set = ChartSet::new();
            set.sync(&renderer, &[bar("a", vec![1.0]), bar("b", vec![2.0])]).unwrap();
            assert_eq!(set.teardown(), 2);
            assert_eq!(renderer.live_handles(), 0);

            set.sync(&renderer, &[bar("c", vec![1.0])]).unwrap();
        }
        assert_eq!(renderer.live_handles(), 0);
        assert_eq!(renderer.destroyed(), 3);
    }

    #[test]
    fn test_destroyed_handle_rejects_update() {
        let renderer = TextChartRenderer::new();
        let mut handle = renderer.render(&bar("a", vec![1.0])).unwrap();
        handle.destroy();
        handle.destroy();

        assert!(handle.is_destroyed());
        assert_eq!(renderer.destroyed(), 1);
        assert_eq!(
            handle.update(&bar("a", vec![2.0])),
            Err(ChartError::Destroyed { canvas: "a".to_string() })
        );
    }

    #[test]
    fn test_text_frames() {
        let renderer = TextChartRenderer::new();
        renderer.render(&bar("a", vec![5.0, 10.0])).unwrap();
        let pie = ChartSpec::new("p", ChartKind::Pie, "Share")
            .with_labels(vec!["x".into(), "y".into()])
            .with_series(Series::new("S", vec![1.0, 3.0]));
        renderer.render(&pie).unwrap();
        renderer.render(&ChartSpec::new("e", ChartKind::Line, "Empty")).unwrap();

        let frames = renderer.take_frames();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains(&"#".repeat(30)));
        assert!(frames[1].contains("75.0%"));
        assert!(frames[2].contains("(no data)"));
        assert!(renderer.take_frames().is_empty());
    }
}
