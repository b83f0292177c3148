//! Module identity and lifecycle enums.

use crate::error::DashboardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// MODULE KEY
// ============================================================================

/// Identifier of a dashboard feature module.
///
/// The set is closed: names outside it cannot be turned into a `ModuleKey`,
/// so nothing downstream can cache data for an unknown module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKey {
    /// Bank & Cash
    Financial,
    Sales,
    Operations,
    Hr,
    PurchaseOrders,
    Projects,
}

impl ModuleKey {
    /// Every known module, in side-menu order.
    pub fn all() -> &'static [ModuleKey] {
        &[
            ModuleKey::Financial,
            ModuleKey::Sales,
            ModuleKey::Operations,
            ModuleKey::Hr,
            ModuleKey::PurchaseOrders,
            ModuleKey::Projects,
        ]
    }

    /// Wire name used in RPC arguments, config files and the shell.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKey::Financial => "financial",
            ModuleKey::Sales => "sales",
            ModuleKey::Operations => "operations",
            ModuleKey::Hr => "hr",
            ModuleKey::PurchaseOrders => "purchase_orders",
            ModuleKey::Projects => "projects",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ModuleKey::Financial => "Bank & Cash",
            ModuleKey::Sales => "Sales",
            ModuleKey::Operations => "Operations",
            ModuleKey::Hr => "HR",
            ModuleKey::PurchaseOrders => "Purchase Orders",
            ModuleKey::Projects => "Projects",
        }
    }

    /// Whitelisted server method that returns this module's dashboard data.
    pub fn rpc_method(&self) -> &'static str {
        match self {
            ModuleKey::Financial => "bizdash.api.dashboard.get_financial_data",
            ModuleKey::Sales => "bizdash.api.dashboard.get_sales_data",
            ModuleKey::Operations => "bizdash.api.dashboard.get_operations_data",
            ModuleKey::Hr => "bizdash.api.dashboard.get_hr_data",
            ModuleKey::PurchaseOrders => "bizdash.api.dashboard.get_purchase_orders_data",
            ModuleKey::Projects => "bizdash.api.dashboard.get_projects_data",
        }
    }

    /// Arguments sent alongside [`ModuleKey::rpc_method`].
    pub fn rpc_args(&self) -> serde_json::Value {
        serde_json::json!({ "module": self.as_str() })
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKey {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "financial" | "bank_cash" => Ok(ModuleKey::Financial),
            "sales" => Ok(ModuleKey::Sales),
            "operations" => Ok(ModuleKey::Operations),
            "hr" => Ok(ModuleKey::Hr),
            "purchase_orders" => Ok(ModuleKey::PurchaseOrders),
            "projects" => Ok(ModuleKey::Projects),
            _ => Err(DashboardError::UnknownModuleKey {
                key: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// LOAD STATE
// ============================================================================

/// Per-module fetch lifecycle.
///
/// `Unloaded -> Loading -> Loaded | Failed`, `Loaded -> Unloaded` on
/// invalidation and `Failed -> Loading` on the next load. A real fetch always
/// passes through `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Failed => "failed",
        };
        write!(f, "{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_module_key_round_trips_through_wire_name() {
        for key in ModuleKey::all() {
            assert_eq!(key.as_str().parse::<ModuleKey>().unwrap(), *key);
        }
    }

    #[test]
    fn test_module_key_parse_is_lenient_about_case_and_separators() {
        assert_eq!("Purchase-Orders".parse::<ModuleKey>().unwrap(), ModuleKey::PurchaseOrders);
        assert_eq!(" HR ".parse::<ModuleKey>().unwrap(), ModuleKey::Hr);
        assert_eq!("bank cash".parse::<ModuleKey>().unwrap(), ModuleKey::Financial);
    }

    #[test]
    fn test_unknown_module_key_is_typed_error() {
        let err = "inventory".parse::<ModuleKey>().unwrap_err();
        assert_eq!(
            err,
            DashboardError::UnknownModuleKey {
                key: "inventory".to_string()
            }
        );
    }

    #[test]
    fn test_rpc_methods_are_distinct() {
        let mut methods: Vec<_> = ModuleKey::all().iter().map(|k| k.rpc_method()).collect();
        methods.sort();
        methods.dedup();
        assert_eq!(methods.len(), ModuleKey::all().len());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ModuleKey::PurchaseOrders).unwrap();
        assert_eq!(json, "\"purchase_orders\"");
        assert_eq!(serde_json::to_string(&LoadState::Loading).unwrap(), "\"loading\"");
    }

    #[test]
    fn test_load_state_default_is_unloaded() {
        assert_eq!(LoadState::default(), LoadState::Unloaded);
        assert!(!LoadState::default().is_loading());
    }

    proptest! {
        #[test]
        fn unknown_names_never_parse(name in "[a-z]{1,12}") {
            let known = ["financial", "sales", "operations", "hr", "projects"];
            prop_assume!(!known.contains(&name.as_str()));
            prop_assert!(name.parse::<ModuleKey>().is_err());
        }
    }
}
