//! Module data cache with single-flight fetches and explicit fallbacks.
//!
//! [`ModuleCacheManager`] is the only owner of module payloads. Views ask it
//! to make data available and render whatever it hands back; they never see
//! a fetch error directly.
//!
//! # Guarantees
//!
//! - At most one RPC call per module is in flight. Concurrent loads join it
//!   and all receive the same payload `Arc`.
//! - A load never fails. Transport, logical and decode failures resolve to
//!   the module's empty skeleton, reported once through a [`DiagnosticSink`].
//! - A fresh entry is returned without I/O and without suspending.
//!
//! # Example
//!
//! ```ignore
//! let manager = ModuleCacheManager::with_defaults(Arc::new(client));
//!
//! let read = manager.ensure_loaded(ModuleKey::Sales, LoadOptions::default()).await;
//! if read.is_fallback() {
//!     tracing::warn!(error = ?read.error(), "Rendering empty sales dashboard");
//! }
//! render(read.payload());
//! ```

pub mod config;
pub mod diagnostics;
pub mod manager;
pub mod read;
pub mod rpc;
pub mod stats;

pub use config::{CacheConfig, DEFAULT_TTL};
pub use diagnostics::{DiagnosticSink, LoadDiagnostic, TracingDiagnostics};
pub use manager::{LoadOptions, ModuleCacheManager};
pub use read::{ModuleRead, ReadOrigin};
pub use rpc::{interpret_response, RpcInvoker};
pub use stats::CacheStats;
