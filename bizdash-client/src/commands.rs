//! Module action dispatch.
//!
//! Buttons in a module view map to named actions such as `sales.new_order`.
//! A [`CommandTable`] maps each name to one handler instead of one method per
//! button.

use bizdash_core::ModuleKey;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// What a handler sees when an action fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    /// Fully qualified action name.
    pub action: String,
    pub module: ModuleKey,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The action was recorded; the message is shown to the user.
    Logged(String),
    /// The module's data should be refetched.
    Refresh(ModuleKey),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown action: {name}")]
    UnknownAction { name: String },
    #[error("Action {action} belongs to {expected}, but the active view is {active}")]
    WrongModule {
        action: String,
        expected: ModuleKey,
        active: ModuleKey,
    },
    #[error("Could not parse command '{input}': {reason}")]
    Parse { input: String, reason: String },
}

pub type CommandHandler = Arc<dyn Fn(&CommandContext) -> CommandOutcome + Send + Sync>;

#[derive(Clone)]
struct Registered {
    module: ModuleKey,
    handler: CommandHandler,
}

/// Action name to handler.
#[derive(Clone, Default)]
pub struct CommandTable {
    handlers: BTreeMap<String, Registered>,
}

const DEFAULT_ACTIONS: &[(ModuleKey, &[&str])] = &[
    (ModuleKey::Financial, &["new_payment", "reconcile", "export"]),
    (ModuleKey::Sales, &["new_order", "new_quotation", "export"]),
    (ModuleKey::Operations, &["schedule_maintenance", "new_work_order"]),
    (ModuleKey::Hr, &["add_employee", "mark_attendance", "export"]),
    (ModuleKey::PurchaseOrders, &["new_order", "approve", "export"]),
    (ModuleKey::Projects, &["new_project", "new_task"]),
];

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every module's standard actions, each logging itself, plus
    /// `<module>.refresh`.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (module, actions) in DEFAULT_ACTIONS {
            for action in *actions {
                table.register(*module, action, Arc::new(log_action));
            }
            table.register(
                *module,
                "refresh",
                Arc::new(|ctx: &CommandContext| CommandOutcome::Refresh(ctx.module)),
            );
        }
        table
    }

    /// Register `handler` as `<module>.<name>`, replacing any previous one.
    pub fn register(&mut self, module: ModuleKey, name: &str, handler: CommandHandler) {
        self.handlers
            .insert(qualified(module, name), Registered { module, handler });
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Action names available for `module`, fully qualified, sorted.
    pub fn actions_for(&self, module: ModuleKey) -> Vec<&str> {
        self.handlers
            .iter()
            .filter(|(_, r)| r.module == module)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Run `name` with `active` as the current view.
    ///
    /// A bare name (`new_order`) resolves against the active module; a
    /// qualified name must belong to it.
    pub fn dispatch(
        &self,
        name: &str,
        active: ModuleKey,
        args: Vec<String>,
    ) -> Result<CommandOutcome, CommandError> {
        let name = name.trim();
        let action = if name.contains('.') {
            name.to_string()
        } else {
            qualified(active, name)
        };

        let registered = self
            .handlers
            .get(&action)
            .ok_or_else(|| CommandError::UnknownAction {
                name: name.to_string(),
            })?;
        if registered.module != active {
            return Err(CommandError::WrongModule {
                action,
                expected: registered.module,
                active,
            });
        }

        let ctx = CommandContext {
            action,
            module: active,
            args,
        };
        Ok((registered.handler)(&ctx))
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable")
            .field("actions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn qualified(module: ModuleKey, name: &str) -> String {
    format!("{}.{}", module, name)
}

fn log_action(ctx: &CommandContext) -> CommandOutcome {
    tracing::info!(action = %ctx.action, module = %ctx.module, args = ?ctx.args, "Module action");
    let label = ctx
        .action
        .rsplit('.')
        .next()
        .unwrap_or(&ctx.action)
        .replace('_', " ");
    CommandOutcome::Logged(format!("{}: {} requested", ctx.module.title(), label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_bare_name_resolves_against_active_module() {
        let table = CommandTable::with_defaults();
        let outcome = table
            .dispatch("new_order", ModuleKey::Sales, Vec::new())
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Logged("Sales: new order requested".to_string())
        );
    }

    #[test]
    fn test_refresh_is_registered_for_every_module() {
        let table = CommandTable::with_defaults();
        for key in ModuleKey::all() {
            assert_eq!(
                table.dispatch("refresh", *key, Vec::new()),
                Ok(CommandOutcome::Refresh(*key))
            );
        }
    }

    #[test]
    fn test_qualified_name_for_other_module_is_rejected() {
        let table = CommandTable::with_defaults();
        let err = table
            .dispatch("hr.add_employee", ModuleKey::Sales, Vec::new())
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::WrongModule {
                action: "hr.add_employee".to_string(),
                expected: ModuleKey::Hr,
                active: ModuleKey::Sales,
            }
        );
    }

    #[test]
    fn test_unknown_action() {
        let table = CommandTable::with_defaults();
        let err = table
            .dispatch("launch_rocket", ModuleKey::Projects, Vec::new())
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::UnknownAction {
                name: "launch_rocket".to_string()
            }
        );
    }

    #[test]
    fn test_custom_handler_receives_args() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut table = CommandTable::new();
        table.register(
            ModuleKey::Hr,
            "promote",
            Arc::new(move |ctx: &CommandContext| {
                seen.fetch_add(1, Ordering::SeqCst);
                CommandOutcome::Logged(ctx.args.join(","))
            }),
        );

        let outcome = table
            .dispatch("promote", ModuleKey::Hr, vec!["HR-EMP-0001".to_string()])
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Logged("HR-EMP-0001".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.actions_for(ModuleKey::Hr), vec!["hr.promote"]);
    }
}
