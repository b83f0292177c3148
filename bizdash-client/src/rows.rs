//! Client-side filtering and sorting of the rows a payload already holds.

use bizdash_core::ModulePayload;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    fn contains(&self, needle_lower: &str) -> bool {
        self.to_string().to_lowercase().contains(needle_lower)
    }

    /// Numbers compare numerically and sort before text; text compares
    /// case-insensitively.
    fn compare(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(a), Cell::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Number(n) if n.fract() == 0.0 => write!(f, "{:.0}", n),
            Cell::Number(n) => write!(f, "{:.2}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortDirection {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(RowError::UnknownDirection {
                direction: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("Unknown column '{column}' (available: {available})")]
    UnknownColumn { column: String, available: String },
    #[error("Unknown sort direction '{direction}' (use asc or desc)")]
    UnknownDirection { direction: String },
}

/// The main table of a module view.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    title: &'static str,
    columns: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table, padding short rows with empty text and cutting long ones.
    pub fn new(title: &'static str, columns: Vec<&'static str>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Text(String::new()));
                row
            })
            .collect();
        Self {
            title,
            columns,
            rows,
        }
    }

    pub fn title(&self) -> &'static str {
        self.title
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        let wanted = column.trim().to_lowercase().replace(['_', '-'], " ");
        self.columns
            .iter()
            .position(|c| c.to_lowercase() == wanted)
    }

    /// Rows with any cell containing `query`, case-insensitively. An empty
    /// query keeps every row.
    pub fn filter(&self, query: &str) -> Table {
        let needle = query.trim().to_lowercase();
        let rows = self
            .rows
            .iter()
            .filter(|row| needle.is_empty() || row.iter().any(|cell| cell.contains(&needle)))
            .cloned()
            .collect();
        Table {
            title: self.title,
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Stable sort by `column`.
    pub fn sort_by(&mut self, column: &str, direction: SortDirection) -> Result<(), RowError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| RowError::UnknownColumn {
                column: column.to_string(),
                available: self.columns.join(", "),
            })?;
        self.rows.sort_by(|a, b| {
            let ordering = a[idx].compare(&b[idx]);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        Ok(())
    }

    /// Plain-text rendering of at most `limit` rows.
    pub fn render(&self, limit: usize) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        let shown: Vec<Vec<String>> = self
            .rows
            .iter()
            .take(limit)
            .map(|row| row.iter().map(Cell::to_string).collect())
            .collect();
        for row in &shown {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let line = |cells: Vec<&str>| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = format!("{}\n", self.title);
        out.push_str(&line(self.columns.clone()));
        out.push('\n');
        if shown.is_empty() {
            out.push_str("(no rows)\n");
        }
        for row in &shown {
            out.push_str(&line(row.iter().map(String::as_str).collect()));
            out.push('\n');
        }
        if self.rows.len() > limit {
            out.push_str(&format!("... {} more\n", self.rows.len() - limit));
        }
        out
    }
}

/// The table shown for a payload.
pub fn table_for(payload: &ModulePayload) -> Table {
    match payload {
        ModulePayload::Financial(p) => Table::new(
            "Recent Transactions",
            vec!["Date", "Reference", "Description", "Amount"],
            p.recent_transactions
                .iter()
                .map(|t| {
                    vec![
                        Cell::text(&t.date),
                        Cell::text(&t.reference),
                        Cell::text(&t.description),
                        Cell::Number(t.amount),
                    ]
                })
                .collect(),
        ),
        ModulePayload::Sales(p) => Table::new(
            "Recent Orders",
            vec!["Order", "Customer", "Date", "Amount", "Status"],
            p.recent_orders
                .iter()
                .map(|o| {
                    vec![
                        Cell::text(&o.id),
                        Cell::text(&o.customer),
                        Cell::text(&o.date),
                        Cell::Number(o.amount),
                        Cell::text(&o.status),
                    ]
                })
                .collect(),
        ),
        ModulePayload::Operations(p) => Table::new(
            "Production Lines",
            vec!["Line", "Status", "Efficiency", "Output"],
            p.production_lines
                .iter()
                .map(|l| {
                    vec![
                        Cell::text(&l.name),
                        Cell::text(&l.status),
                        Cell::Number(l.efficiency),
                        Cell::Number(l.output as f64),
                    ]
                })
                .collect(),
        ),
        ModulePayload::Hr(p) => Table::new(
            "Employees",
            vec!["Employee", "Name", "Department", "Designation", "Status"],
            p.employees
                .iter()
                .map(|e| {
                    vec![
                        Cell::text(&e.id),
                        Cell::text(&e.name),
                        Cell::text(&e.department),
                        Cell::text(&e.designation),
                        Cell::text(&e.status),
                    ]
                })
                .collect(),
        ),
        ModulePayload::PurchaseOrders(p) => Table::new(
            "Purchase Orders",
            vec!["Order", "Supplier", "Date", "Amount", "Status"],
            p.orders
                .iter()
                .map(|o| {
                    vec![
                        Cell::text(&o.id),
                        Cell::text(&o.supplier),
                        Cell::text(&o.date),
                        Cell::Number(o.amount),
                        Cell::text(&o.status),
                    ]
                })
                .collect(),
        ),
        ModulePayload::Projects(p) => Table::new(
            "Projects",
            vec!["Project", "Name", "Status", "Progress", "Due Date"],
            p.projects
                .iter()
                .map(|pr| {
                    vec![
                        Cell::text(&pr.id),
                        Cell::text(&pr.name),
                        Cell::text(&pr.status),
                        Cell::Number(pr.progress),
                        Cell::text(pr.due_date.as_deref().unwrap_or("-")),
                    ]
                })
                .collect(),
        ),
    }
}
