//! BIZDASH Test Utilities
//!
//! Centralized test infrastructure for the BIZDASH workspace:
//! - Scripted mock RPC transport with call recording
//! - Recording diagnostic sink
//! - Sample server responses for every module
//! - Proptest generators for module keys and names
//! - Custom assertions for module reads

pub use bizdash_cache::{
    CacheConfig, DiagnosticSink, LoadDiagnostic, LoadOptions, ModuleCacheManager, ModuleRead,
    RpcInvoker,
};
pub use bizdash_core::{
    DashboardError, DashboardResult, LoadState, ModuleKey, ModulePayload, TransportError,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// MOCK RPC
// ============================================================================

/// One scripted answer of [`MockRpc`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Resolve with this response body.
    Body(Value),
    /// Reject with this transport error.
    Transport(TransportError),
}

/// A recorded RPC invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    pub method: String,
    pub args: Value,
}

#[derive(Debug, Default)]
struct MockScript {
    /// Consumed front to back before falling back to `sticky`.
    queued: HashMap<ModuleKey, VecDeque<MockReply>>,
    /// Answer once the queue for a key is empty.
    sticky: HashMap<ModuleKey, MockReply>,
    calls: Vec<RpcCall>,
}

/// Scripted in-memory RPC transport.
///
/// Unscripted modules answer with [`fixtures::sample_response`]. Every call
/// is recorded before the optional delay, so a test can count calls while
/// the fetches are still pending.
#[derive(Debug, Clone, Default)]
pub struct MockRpc {
    script: Arc<Mutex<MockScript>>,
    delay: Option<Duration>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer by `delay` (use with paused tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Always answer `key` with `body`.
    pub fn respond(&self, key: ModuleKey, body: Value) -> &Self {
        self.script().sticky.insert(key, MockReply::Body(body));
        self
    }

    /// Always reject `key` with a transport error.
    pub fn fail_transport(&self, key: ModuleKey, message: &str) -> &Self {
        self.script()
            .sticky
            .insert(key, MockReply::Transport(TransportError::new(message)));
        self
    }

    /// Always answer `key` with a server exception.
    pub fn fail_logical(&self, key: ModuleKey, reason: &str) -> &Self {
        self.respond(key, fixtures::exception_response(reason))
    }

    /// Answer the next call for `key` with `reply`, ahead of the sticky answer.
    pub fn enqueue(&self, key: ModuleKey, reply: MockReply) -> &Self {
        self.script()
            .queued
            .entry(key)
            .or_default()
            .push_back(reply);
        self
    }

    /// Reject the next `times` calls for `key`, then answer normally.
    pub fn fail_times(&self, key: ModuleKey, times: usize, message: &str) -> &Self {
        for _ in 0..times {
            self.enqueue(key, MockReply::Transport(TransportError::new(message)));
        }
        self
    }

    /// Forget sticky and queued answers for `key`.
    pub fn reset(&self, key: ModuleKey) -> &Self {
        let mut script = self.script();
        script.sticky.remove(&key);
        script.queued.remove(&key);
        self
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.script().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script().calls.len()
    }

    /// Number of calls made for `key`'s method.
    pub fn calls_for(&self, key: ModuleKey) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|c| c.method == key.rpc_method())
            .count()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, MockScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_reply(&self, key: ModuleKey) -> MockReply {
        let mut script = self.script();
        if let Some(reply) = script.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return reply;
        }
        script
            .sticky
            .get(&key)
            .cloned()
            .unwrap_or_else(|| MockReply::Body(fixtures::sample_response(key)))
    }
}

#[async_trait]
impl RpcInvoker for MockRpc {
    async fn invoke(&self, method: &str, args: Value) -> Result<Value, TransportError> {
        self.script().calls.push(RpcCall {
            method: method.to_string(),
            args,
        });

        let key = ModuleKey::all()
            .iter()
            .copied()
            .find(|k| k.rpc_method() == method);
        let reply = match key {
            Some(key) => self.next_reply(key),
            None => MockReply::Transport(
                TransportError::new(format!("method not found: {}", method)).with_status(404),
            ),
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            MockReply::Body(body) => Ok(body),
            MockReply::Transport(err) => Err(err),
        }
    }
}

// ============================================================================
// RECORDING DIAGNOSTICS
// ============================================================================

/// Diagnostic sink that keeps every record for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    records: Arc<Mutex<Vec<LoadDiagnostic>>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LoadDiagnostic> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.records().len()
    }

    pub fn count_for(&self, key: ModuleKey) -> usize {
        self.records().iter().filter(|d| d.key == key).count()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn record(&self, diagnostic: &LoadDiagnostic) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic.clone());
    }
}

/// A manager wired to `rpc` and `diagnostics` with the given TTL.
pub fn test_manager(
    rpc: &MockRpc,
    diagnostics: &RecordingDiagnostics,
    ttl: Duration,
) -> ModuleCacheManager {
    ModuleCacheManager::new(
        Arc::new(rpc.clone()),
        Arc::new(diagnostics.clone()),
        CacheConfig::new().with_ttl(ttl),
    )
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Realistic server responses for each module.

    use super::*;

    /// The `message` body the server returns for `key`.
    pub fn sample_message(key: ModuleKey) -> Value {
        match key {
            ModuleKey::Financial => json!({
                "kpis": {
                    "cashBalance": 18250.0,
                    "bankBalance": 412900.5,
                    "receivables": 96400.0,
                    "payables": 51230.75
                },
                "accounts": [
                    { "name": "Main Current Account", "accountType": "Bank", "balance": 389100.5 },
                    { "name": "Payroll Account", "accountType": "Bank", "balance": 23800.0 },
                    { "name": "Petty Cash", "accountType": "Cash", "balance": 18250.0 }
                ],
                "cashFlow": [
                    { "period": "2026-07", "inflow": 120000.0, "outflow": 98000.0 },
                    { "period": "2026-08", "inflow": 134500.0, "outflow": 101200.0 },
                    { "period": "2026-09", "inflow": 128900.0, "outflow": 117400.0 }
                ],
                "recentTransactions": [
                    { "date": "2026-09-28", "reference": "JV-0192", "description": "Supplier payment", "amount": -8400.0 },
                    { "date": "2026-09-27", "reference": "PE-0451", "description": "Customer receipt", "amount": 15200.0 }
                ]
            }),
            ModuleKey::Sales => json!({
                "kpis": {
                    "totalRevenue": 482300.0,
                    "orderCount": 312,
                    "averageOrderValue": 1545.83,
                    "conversionRate": 0.27
                },
                "monthlyRevenue": [
                    { "period": "2026-07", "value": 151000.0 },
                    { "period": "2026-08", "value": 162800.0 },
                    { "period": "2026-09", "value": 168500.0 }
                ],
                "topCustomers": [
                    { "name": "Northwind Traders", "amount": 64200.0 },
                    { "name": "Contoso Ltd", "amount": 48900.0 }
                ],
                "topProducts": [
                    { "name": "Industrial Pump", "amount": 91000.0 },
                    { "name": "Valve Kit", "amount": 37400.0 }
                ],
                "recentOrders": [
                    { "id": "SO-1041", "customer": "Contoso Ltd", "date": "2026-09-29", "amount": 4200.0, "status": "To Deliver" },
                    { "id": "SO-1040", "customer": "Northwind Traders", "date": "2026-09-28", "amount": 12900.0, "status": "Completed" },
                    { "id": "SO-1039", "customer": "Fabrikam", "date": "2026-09-26", "amount": 860.0, "status": "Draft" }
                ]
            }),
            ModuleKey::Operations => json!({
                "productionLines": [
                    { "name": "Line A", "status": "Running", "efficiency": 92.5, "output": 1840 },
                    { "name": "Line B", "status": "Running", "efficiency": 87.5, "output": 1610 },
                    { "name": "Line C", "status": "Maintenance", "efficiency": 0.0, "output": 0 }
                ],
                "equipment": [
                    { "name": "CNC-01", "status": "Operational", "utilization": 78.0, "nextMaintenance": "2026-10-15" },
                    { "name": "Press-02", "status": "Down", "utilization": 0.0, "nextMaintenance": null }
                ]
            }),
            ModuleKey::Hr => json!({
                "kpis": {
                    "headcount": 148,
                    "newHires": 6,
                    "attritionRate": 0.04,
                    "openPositions": 9
                },
                "departments": [
                    { "name": "Engineering", "count": 52 },
                    { "name": "Operations", "count": 41 },
                    { "name": "Sales", "count": 33 },
                    { "name": "Finance", "count": 22 }
                ],
                "attendance": [
                    { "period": "Mon", "value": 96.0 },
                    { "period": "Tue", "value": 94.5 },
                    { "period": "Wed", "value": 95.2 }
                ],
                "employees": [
                    { "id": "HR-EMP-0001", "name": "Amira Haddad", "department": "Engineering", "designation": "Lead Engineer", "status": "Active" },
                    { "id": "HR-EMP-0002", "name": "Jonas Berg", "department": "Sales", "designation": "Account Manager", "status": "Active" },
                    { "id": "HR-EMP-0003", "name": "Chen Wei", "department": "Finance", "designation": "Accountant", "status": "On Leave" }
                ]
            }),
            ModuleKey::PurchaseOrders => json!({
                "kpis": {
                    "openOrders": 27,
                    "totalSpend": 218400.0,
                    "pendingApproval": 5,
                    "overdue": 3
                },
                "orders": [
                    { "id": "PO-0877", "supplier": "Acme Metals", "date": "2026-09-25", "amount": 18400.0, "status": "To Receive" },
                    { "id": "PO-0876", "supplier": "Global Parts", "date": "2026-09-22", "amount": 2650.0, "status": "Draft" },
                    { "id": "PO-0875", "supplier": "Acme Metals", "date": "2026-09-18", "amount": 9100.0, "status": "Completed" }
                ],
                "topSuppliers": [
                    { "name": "Acme Metals", "amount": 96300.0 },
                    { "name": "Global Parts", "amount": 41200.0 }
                ],
                "monthlySpend": [
                    { "period": "2026-07", "value": 70100.0 },
                    { "period": "2026-08", "value": 66800.0 },
                    { "period": "2026-09", "value": 81500.0 }
                ]
            }),
            ModuleKey::Projects => json!({
                "kpis": {
                    "active": 8,
                    "completed": 21,
                    "overdue": 2,
                    "averageProgress": 58.75
                },
                "projects": [
                    { "id": "PROJ-0012", "name": "Warehouse Expansion", "status": "Open", "progress": 65.0, "dueDate": "2026-12-01" },
                    { "id": "PROJ-0011", "name": "ERP Rollout", "status": "Open", "progress": 40.0, "dueDate": "2026-11-15" },
                    { "id": "PROJ-0009", "name": "Office Refit", "status": "Completed", "progress": 100.0, "dueDate": null }
                ],
                "tasksByStatus": [
                    { "name": "Open", "count": 34 },
                    { "name": "Working", "count": 12 },
                    { "name": "Completed", "count": 88 }
                ]
            }),
        }
    }

    /// A successful response envelope for `key`.
    pub fn sample_response(key: ModuleKey) -> Value {
        json!({ "message": sample_message(key) })
    }

    /// The decoded payload of [`sample_response`].
    pub fn sample_payload(key: ModuleKey) -> ModulePayload {
        match ModulePayload::decode(key, sample_message(key)) {
            Ok(payload) => payload,
            Err(err) => panic!("sample message for {} must decode: {}", key, err),
        }
    }

    /// A response carrying a server exception.
    pub fn exception_response(reason: &str) -> Value {
        let messages = json!([json!({ "message": reason, "indicator": "red" }).to_string()]);
        json!({
            "exc_type": "ValidationError",
            "exc": "[\"Traceback (most recent call last): ...\"]",
            "_server_messages": messages.to_string(),
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for module identities.

    use super::*;
    use proptest::prelude::*;

    /// Generate a known module key.
    pub fn arb_module_key() -> impl Strategy<Value = ModuleKey> {
        prop::sample::select(ModuleKey::all().to_vec())
    }

    /// Generate a known module name in a spelling the parser accepts.
    pub fn arb_module_name() -> impl Strategy<Value = String> {
        (arb_module_key(), any::<bool>()).prop_map(|(key, upper)| {
            if upper {
                key.as_str().to_ascii_uppercase().replace('_', "-")
            } else {
                key.as_str().to_string()
            }
        })
    }

    /// Generate a name that is not a module.
    pub fn arb_unknown_module_name() -> impl Strategy<Value = String> {
        "[a-z]{1,12}".prop_filter("must not name a module", |name| {
            name.parse::<ModuleKey>().is_err()
        })
    }

    /// Generate a number of concurrent callers.
    pub fn arb_waiter_count() -> impl Strategy<Value = usize> {
        1usize..=16
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over module reads.

    use super::*;

    /// Assert that `read` carries real data for `key` from a fetch or cache.
    #[track_caller]
    pub fn assert_real_data(read: &ModuleRead, key: ModuleKey) {
        assert_eq!(read.key(), key, "read is for the wrong module");
        assert!(
            !read.is_fallback(),
            "Expected real data for {}, got fallback: {:?}",
            key,
            read.error()
        );
        assert_eq!(read.payload().key(), key, "payload shape does not match module");
    }

    /// Assert that `read` is `key`'s empty skeleton with an error attached.
    #[track_caller]
    pub fn assert_fallback(read: &ModuleRead, key: ModuleKey) {
        assert!(read.is_fallback(), "Expected fallback for {}, got {:?}", key, read.origin());
        assert_eq!(**read.payload(), ModulePayload::empty(key));
        assert!(read.error().is_some(), "fallback must carry its error");
    }

    /// Assert that every read holds the very same payload allocation.
    #[track_caller]
    pub fn assert_same_payload(reads: &[ModuleRead]) {
        if let Some((first, rest)) = reads.split_first() {
            for read in rest {
                assert!(
                    Arc::ptr_eq(first.payload(), read.payload()),
                    "Expected one shared payload across all reads"
                );
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
