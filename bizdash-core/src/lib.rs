//! BIZDASH Core - Module Types
//!
//! Module keys, lifecycle states, typed payload schemas and the error
//! taxonomy shared by the cache manager and the dashboard client.
//! This crate contains only data types and their parsing rules.

pub mod error;
pub mod module;
pub mod payload;

use chrono::{DateTime, Utc};

pub use error::{DashboardError, DashboardResult, TransportError};
pub use module::{LoadState, ModuleKey};
pub use payload::{
    BankAccount, BankCashKpis, BankCashPayload, CashFlowPeriod, Employee, Equipment, HrKpis,
    HrPayload, ModulePayload, NamedAmount, NamedCount, OperationsPayload, PeriodValue,
    ProductionLine, Project, ProjectKpis, ProjectsPayload, PurchaseKpis, PurchaseOrder,
    PurchaseOrdersPayload, SalesKpis, SalesOrder, SalesPayload, Transaction,
};

/// Wall-clock timestamp in UTC.
pub type Timestamp = DateTime<Utc>;
