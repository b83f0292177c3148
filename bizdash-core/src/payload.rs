//! Typed dashboard payloads.
//!
//! Every module has an explicit schema whose fields all default to empty, so
//! a renderer only ever asks "is this list empty" and never whether a section
//! exists. The empty value of each schema doubles as the module's fallback
//! when a fetch fails.

use crate::error::{DashboardError, DashboardResult};
use crate::module::ModuleKey;
use serde::{Deserialize, Serialize};

/// Field decoders that never fail a whole payload over one odd cell.
///
/// Report queries routinely send `null` for empty aggregates and floats such
/// as `148.0` for counts.
mod lenient {
    use serde::{Deserialize, Deserializer};

    /// `null` decodes as the type's default.
    pub(super) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Any JSON number as a count: rounded, negatives and `null` as zero.
    pub(super) fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v.round() as u64)
            .unwrap_or(0))
    }
}

// ============================================================================
// SHARED ROW TYPES
// ============================================================================

/// A value attached to a period label such as `"2024-03"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriodValue {
    #[serde(deserialize_with = "lenient::or_default")]
    pub period: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub value: f64,
}

/// A named amount, e.g. revenue per customer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedAmount {
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub amount: f64,
}

/// A named count, e.g. tasks per status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedCount {
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::count")]
    pub count: u64,
}

// ============================================================================
// BANK & CASH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankCashKpis {
    #[serde(deserialize_with = "lenient::or_default")]
    pub cash_balance: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub bank_balance: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub receivables: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub payables: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankAccount {
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub account_type: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CashFlowPeriod {
    #[serde(deserialize_with = "lenient::or_default")]
    pub period: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub inflow: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub outflow: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub reference: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub description: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankCashPayload {
    #[serde(deserialize_with = "lenient::or_default")]
    pub kpis: BankCashKpis,
    #[serde(deserialize_with = "lenient::or_default")]
    pub accounts: Vec<BankAccount>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub cash_flow: Vec<CashFlowPeriod>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub recent_transactions: Vec<Transaction>,
}

// ============================================================================
// SALES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesKpis {
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_revenue: f64,
    #[serde(deserialize_with = "lenient::count")]
    pub order_count: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub average_order_value: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesOrder {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub customer: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesPayload {
    #[serde(deserialize_with = "lenient::or_default")]
    pub kpis: SalesKpis,
    #[serde(deserialize_with = "lenient::or_default")]
    pub monthly_revenue: Vec<PeriodValue>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub top_customers: Vec<NamedAmount>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub top_products: Vec<NamedAmount>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub recent_orders: Vec<SalesOrder>,
}

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductionLine {
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
    /// Percentage, 0-100.
    #[serde(deserialize_with = "lenient::or_default")]
    pub efficiency: f64,
    #[serde(deserialize_with = "lenient::count")]
    pub output: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Equipment {
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
    /// Percentage, 0-100.
    #[serde(deserialize_with = "lenient::or_default")]
    pub utilization: f64,
    pub next_maintenance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationsPayload {
    #[serde(deserialize_with = "lenient::or_default")]
    pub production_lines: Vec<ProductionLine>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub equipment: Vec<Equipment>,
}

// ============================================================================
// HR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HrKpis {
    #[serde(deserialize_with = "lenient::count")]
    pub headcount: u64,
    #[serde(deserialize_with = "lenient::count")]
    pub new_hires: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub attrition_rate: f64,
    #[serde(deserialize_with = "lenient::count")]
    pub open_positions: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Employee {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub department: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub designation: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HrPayload {
    #[serde(deserialize_with = "lenient::or_default")]
    pub kpis: HrKpis,
    #[serde(deserialize_with = "lenient::or_default")]
    pub departments: Vec<NamedCount>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub attendance: Vec<PeriodValue>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub employees: Vec<Employee>,
}

// ============================================================================
// PURCHASE ORDERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseKpis {
    #[serde(deserialize_with = "lenient::count")]
    pub open_orders: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_spend: f64,
    #[serde(deserialize_with = "lenient::count")]
    pub pending_approval: u64,
    #[serde(deserialize_with = "lenient::count")]
    pub overdue: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseOrder {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub supplier: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseOrdersPayload {
    #[serde(deserialize_with = "lenient::or_default")]
    pub kpis: PurchaseKpis,
    #[serde(deserialize_with = "lenient::or_default")]
    pub orders: Vec<PurchaseOrder>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub top_suppliers: Vec<NamedAmount>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub monthly_spend: Vec<PeriodValue>,
}

// ============================================================================
// PROJECTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectKpis {
    #[serde(deserialize_with = "lenient::count")]
    pub active: u64,
    #[serde(deserialize_with = "lenient::count")]
    pub completed: u64,
    #[serde(deserialize_with = "lenient::count")]
    pub overdue: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub average_progress: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: String,
    /// Percentage, 0-100.
    #[serde(deserialize_with = "lenient::or_default")]
    pub progress: f64,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectsPayload {
    #[serde(deserialize_with = "lenient::or_default")]
    pub kpis: ProjectKpis,
    #[serde(deserialize_with = "lenient::or_default")]
    pub projects: Vec<Project>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub tasks_by_status: Vec<NamedCount>,
}

// ============================================================================
// TAGGED UNION
// ============================================================================

/// Payload of one dashboard module, tagged by its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "module", content = "data", rename_all = "snake_case")]
pub enum ModulePayload {
    Financial(BankCashPayload),
    Sales(SalesPayload),
    Operations(OperationsPayload),
    Hr(HrPayload),
    PurchaseOrders(PurchaseOrdersPayload),
    Projects(ProjectsPayload),
}

impl ModulePayload {
    /// The fixed empty skeleton for `key`: every section present, all empty.
    pub fn empty(key: ModuleKey) -> Self {
        match key {
            ModuleKey::Financial => ModulePayload::Financial(BankCashPayload::default()),
            ModuleKey::Sales => ModulePayload::Sales(SalesPayload::default()),
            ModuleKey::Operations => ModulePayload::Operations(OperationsPayload::default()),
            ModuleKey::Hr => ModulePayload::Hr(HrPayload::default()),
            ModuleKey::PurchaseOrders => {
                ModulePayload::PurchaseOrders(PurchaseOrdersPayload::default())
            }
            ModuleKey::Projects => ModulePayload::Projects(ProjectsPayload::default()),
        }
    }

    /// Decode the `message` member of an RPC response for `key`.
    pub fn decode(key: ModuleKey, message: serde_json::Value) -> DashboardResult<Self> {
        let decoded = match key {
            ModuleKey::Financial => serde_json::from_value(message).map(ModulePayload::Financial),
            ModuleKey::Sales => serde_json::from_value(message).map(ModulePayload::Sales),
            ModuleKey::Operations => {
                serde_json::from_value(message).map(ModulePayload::Operations)
            }
            ModuleKey::Hr => serde_json::from_value(message).map(ModulePayload::Hr),
            ModuleKey::PurchaseOrders => {
                serde_json::from_value(message).map(ModulePayload::PurchaseOrders)
            }
            ModuleKey::Projects => serde_json::from_value(message).map(ModulePayload::Projects),
        };
        decoded.map_err(|e| DashboardError::PayloadDecode {
            key,
            reason: e.to_string(),
        })
    }

    pub fn key(&self) -> ModuleKey {
        match self {
            ModulePayload::Financial(_) => ModuleKey::Financial,
            ModulePayload::Sales(_) => ModuleKey::Sales,
            ModulePayload::Operations(_) => ModuleKey::Operations,
            ModulePayload::Hr(_) => ModuleKey::Hr,
            ModulePayload::PurchaseOrders(_) => ModuleKey::PurchaseOrders,
            ModulePayload::Projects(_) => ModuleKey::Projects,
        }
    }

    /// True when the payload equals its module's empty skeleton.
    pub fn is_empty(&self) -> bool {
        *self == ModulePayload::empty(self.key())
    }

    /// The untagged body, as the server would send it in `message`.
    pub fn body(&self) -> serde_json::Value {
        let body = match self {
            ModulePayload::Financial(p) => serde_json::to_value(p),
            ModulePayload::Sales(p) => serde_json::to_value(p),
            ModulePayload::Operations(p) => serde_json::to_value(p),
            ModulePayload::Hr(p) => serde_json::to_value(p),
            ModulePayload::PurchaseOrders(p) => serde_json::to_value(p),
            ModulePayload::Projects(p) => serde_json::to_value(p),
        };
        // Plain structs of strings and numbers; serialization cannot fail.
        body.unwrap_or(serde_json::Value::Null)
    }

    /// Headline figures as `(label, value)` pairs for KPI tiles.
    pub fn kpis(&self) -> Vec<(&'static str, f64)> {
        match self {
            ModulePayload::Financial(p) => vec![
                ("Cash Balance", p.kpis.cash_balance),
                ("Bank Balance", p.kpis.bank_balance),
                ("Receivables", p.kpis.receivables),
                ("Payables", p.kpis.payables),
            ],
            ModulePayload::Sales(p) => vec![
                ("Total Revenue", p.kpis.total_revenue),
                ("Orders", p.kpis.order_count as f64),
                ("Average Order Value", p.kpis.average_order_value),
                ("Conversion Rate", p.kpis.conversion_rate),
            ],
            ModulePayload::Operations(p) => {
                let running = p
                    .production_lines
                    .iter()
                    .filter(|l| l.status.eq_ignore_ascii_case("running"))
                    .count();
                let avg_efficiency = mean(p.production_lines.iter().map(|l| l.efficiency));
                let avg_utilization = mean(p.equipment.iter().map(|e| e.utilization));
                vec![
                    ("Running Lines", running as f64),
                    ("Average Efficiency", avg_efficiency),
                    ("Equipment", p.equipment.len() as f64),
                    ("Average Utilization", avg_utilization),
                ]
            }
            ModulePayload::Hr(p) => vec![
                ("Headcount", p.kpis.headcount as f64),
                ("New Hires", p.kpis.new_hires as f64),
                ("Attrition Rate", p.kpis.attrition_rate),
                ("Open Positions", p.kpis.open_positions as f64),
            ],
            ModulePayload::PurchaseOrders(p) => vec![
                ("Open Orders", p.kpis.open_orders as f64),
                ("Total Spend", p.kpis.total_spend),
                ("Pending Approval", p.kpis.pending_approval as f64),
                ("Overdue", p.kpis.overdue as f64),
            ],
            ModulePayload::Projects(p) => vec![
                ("Active", p.kpis.active as f64),
                ("Completed", p.kpis.completed as f64),
                ("Overdue", p.kpis.overdue as f64),
                ("Average Progress", p.kpis.average_progress),
            ],
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operations_skeleton_shape() {
        let empty = ModulePayload::empty(ModuleKey::Operations);
        assert_eq!(empty.body(), json!({ "productionLines": [], "equipment": [] }));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_every_skeleton_matches_its_key() {
        for key in ModuleKey::all() {
            let empty = ModulePayload::empty(*key);
            assert_eq!(empty.key(), *key);
            assert!(empty.is_empty());
            assert!(empty.body().is_object());
            assert!(empty.kpis().iter().all(|(_, v)| *v == 0.0));
        }
    }

    #[test]
    fn test_decode_fills_missing_sections() {
        let payload = ModulePayload::decode(
            ModuleKey::Sales,
            json!({ "kpis": { "totalRevenue": 1250.5, "orderCount": 3 } }),
        )
        .unwrap();

        match payload {
            ModulePayload::Sales(sales) => {
                assert_eq!(sales.kpis.total_revenue, 1250.5);
                assert_eq!(sales.kpis.order_count, 3);
                assert!(sales.recent_orders.is_empty());
                assert!(sales.monthly_revenue.is_empty());
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_null_cells_decode_as_defaults() {
        let payload = ModulePayload::decode(
            ModuleKey::Sales,
            json!({
                "kpis": null,
                "topCustomers": null,
                "recentOrders": [
                    { "id": "SO-1", "customer": null, "amount": null, "status": "Draft" }
                ]
            }),
        )
        .unwrap();

        match payload {
            ModulePayload::Sales(sales) => {
                assert_eq!(sales.kpis, SalesKpis::default());
                assert!(sales.top_customers.is_empty());
                let order = &sales.recent_orders[0];
                assert_eq!(order.id, "SO-1");
                assert_eq!(order.customer, "");
                assert_eq!(order.amount, 0.0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_counts_accept_float_numbers() {
        let payload = ModulePayload::decode(
            ModuleKey::Hr,
            json!({
                "kpis": { "headcount": 148.0, "newHires": 6, "openPositions": null },
                "departments": [{ "name": "Sales", "count": 33.0 }]
            }),
        )
        .unwrap();

        match payload {
            ModulePayload::Hr(hr) => {
                assert_eq!(hr.kpis.headcount, 148);
                assert_eq!(hr.kpis.new_hires, 6);
                assert_eq!(hr.kpis.open_positions, 0);
                assert_eq!(hr.departments[0].count, 33);
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let ops = ModulePayload::decode(
            ModuleKey::Operations,
            json!({ "productionLines": [{ "name": "Line A", "output": -3 }] }),
        )
        .unwrap();
        assert_eq!(ops.body()["productionLines"][0]["output"], 0);
    }

    #[test]
    fn test_decode_rejects_wrong_shapes() {
        let err = ModulePayload::decode(ModuleKey::Hr, json!({ "employees": "nope" })).unwrap_err();
        assert_eq!(err.code(), "payload_decode_error");
        assert_eq!(err.module(), Some(ModuleKey::Hr));

        assert!(ModulePayload::decode(ModuleKey::Projects, json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_decode_body_round_trip() {
        let message = json!({
            "productionLines": [
                { "name": "Line A", "status": "Running", "efficiency": 92.0, "output": 410 },
                { "name": "Line B", "status": "Stopped", "efficiency": 0.0, "output": 0 }
            ],
            "equipment": [
                { "name": "Press 1", "status": "Active", "utilization": 75.0, "nextMaintenance": "2024-07-01" }
            ]
        });
        let payload = ModulePayload::decode(ModuleKey::Operations, message.clone()).unwrap();
        assert!(!payload.is_empty());
        assert_eq!(payload.body(), message);

        let kpis = payload.kpis();
        assert_eq!(kpis[0], ("Running Lines", 1.0));
        assert_eq!(kpis[1], ("Average Efficiency", 46.0));
    }

    #[test]
    fn test_tagged_serialization() {
        let payload = ModulePayload::empty(ModuleKey::PurchaseOrders);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["module"], "purchase_orders");
        assert!(value["data"]["orders"].as_array().unwrap().is_empty());
    }
}
