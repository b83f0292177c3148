//! Line-oriented command surface over the view controller.

use crate::charts::TextChartRenderer;
use crate::commands::{CommandError, CommandOutcome, CommandTable};
use crate::controller::{ApplyOutcome, DashboardController};
use crate::error::ClientError;
use crate::nav::{self, MenuNav};
use crate::notifications::NotificationInbox;
use crate::rows::SortDirection;
use bizdash_cache::LoadOptions;
use bizdash_core::ModuleKey;

pub const HELP: &str = "\
Commands:
  view <module>            switch to a module (financial, sales, operations, hr, purchase_orders, projects)
  <n>                      switch to menu entry n
  next | prev              cycle through the menu
  refresh                  refetch the active module
  peek <module>            show what is cached for a module without fetching
  filter [text]            filter table rows (no text clears the filter)
  sort <column> [asc|desc] sort table rows
  action <name> [args..]   run a module action (e.g. new_order)
  actions                  list actions of the active module
  menu                     show the module menu
  stats                    show cache statistics
  logout                   clear all cached data
  help                     show this help
  quit                     exit";

const ROW_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    View(ModuleKey),
    Next,
    Prev,
    Refresh,
    Peek(ModuleKey),
    Filter(Option<String>),
    Sort { column: String, direction: SortDirection },
    Action { name: String, args: Vec<String> },
    Actions,
    Menu,
    Stats,
    Logout,
    Help,
    Quit,
    Empty,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<ShellCommand, ClientError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(ShellCommand::Empty);
    };
    let rest: Vec<&str> = words.collect();
    let parse_error = |reason: &str| {
        ClientError::Command(CommandError::Parse {
            input: line.trim().to_string(),
            reason: reason.to_string(),
        })
    };

    if let Ok(number) = head.parse::<usize>() {
        return nav::from_shortcut(number)
            .map(ShellCommand::View)
            .ok_or_else(|| parse_error("no module with that number"));
    }

    let command = match head.to_ascii_lowercase().as_str() {
        "view" | "v" => match rest.as_slice() {
            [] => return Err(parse_error("missing module name")),
            names => ShellCommand::View(names.join(" ").parse()?),
        },
        "peek" => match rest.as_slice() {
            [] => return Err(parse_error("missing module name")),
            names => ShellCommand::Peek(names.join(" ").parse()?),
        },
        "next" | "n" => ShellCommand::Next,
        "prev" | "p" => ShellCommand::Prev,
        "refresh" | "r" => ShellCommand::Refresh,
        "filter" | "f" => {
            let text = rest.join(" ");
            ShellCommand::Filter(if text.is_empty() { None } else { Some(text) })
        }
        "sort" => {
            let (direction, column_words) = match rest.split_last() {
                Some((last, init)) if !init.is_empty() => match last.parse::<SortDirection>() {
                    Ok(direction) => (direction, init),
                    Err(_) => (SortDirection::Ascending, rest.as_slice()),
                },
                _ => (SortDirection::Ascending, rest.as_slice()),
            };
            if column_words.is_empty() {
                return Err(parse_error("missing column name"));
            }
            ShellCommand::Sort {
                column: column_words.join(" "),
                direction,
            }
        }
        "action" | "a" => match rest.split_first() {
            Some((name, args)) => ShellCommand::Action {
                name: name.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            None => return Err(parse_error("missing action name")),
        },
        "actions" => ShellCommand::Actions,
        "menu" | "m" => ShellCommand::Menu,
        "stats" => ShellCommand::Stats,
        "logout" => ShellCommand::Logout,
        "help" | "?" => ShellCommand::Help,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        _ => return Err(parse_error("unknown command, type help")),
    };
    Ok(command)
}

/// Output of one executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellReply {
    pub output: String,
    pub quit: bool,
}

impl ShellReply {
    fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            quit: false,
        }
    }
}

/// Interactive session state.
pub struct Shell {
    controller: DashboardController,
    commands: CommandTable,
    inbox: NotificationInbox,
    charts: Option<TextChartRenderer>,
    filter: Option<String>,
    sort: Option<(String, SortDirection)>,
}

impl Shell {
    pub fn new(controller: DashboardController, commands: CommandTable, inbox: NotificationInbox) -> Self {
        Self {
            controller,
            commands,
            inbox,
            charts: None,
            filter: None,
            sort: None,
        }
    }

    /// Print chart frames drawn by `renderer` after each view render.
    pub fn with_chart_output(mut self, renderer: TextChartRenderer) -> Self {
        self.charts = Some(renderer);
        self
    }

    pub fn controller(&self) -> &DashboardController {
        &self.controller
    }

    /// Parse and run one line.
    pub async fn handle_line(&mut self, line: &str) -> ShellReply {
        let reply = match parse_command(line) {
            Ok(command) => self.execute(command).await,
            Err(err) => Err(err),
        };
        let mut reply = reply.unwrap_or_else(|err| ShellReply::text(format!("error: {}", err)));
        for notification in self.inbox.drain() {
            reply.output.push_str(&format!("\n{}", notification));
        }
        reply
    }

    pub async fn execute(&mut self, command: ShellCommand) -> Result<ShellReply, ClientError> {
        let active = self.controller.active();
        let reply = match command {
            ShellCommand::Empty => ShellReply::default(),
            ShellCommand::View(key) => self.show(key).await?,
            ShellCommand::Next => self.show(active.next()).await?,
            ShellCommand::Prev => self.show(active.previous()).await?,
            ShellCommand::Refresh => {
                let outcome = self.controller.refresh().await?;
                self.rendered_reply(outcome)
            }
            ShellCommand::Peek(key) => {
                let state = self.controller.manager().load_state(key);
                let note = if state.is_loading() { ", load in progress" } else { "" };
                match self.controller.manager().peek(key) {
                    Some(payload) => {
                        let kpis: Vec<String> = payload
                            .kpis()
                            .into_iter()
                            .map(|(label, value)| format!("  {}: {}", label, value))
                            .collect();
                        ShellReply::text(format!(
                            "{} ({}):\n{}",
                            key.title(),
                            state,
                            kpis.join("\n")
                        ))
                    }
                    None => ShellReply::text(format!("{}: nothing cached{}", key.title(), note)),
                }
            }
            ShellCommand::Filter(text) => {
                self.filter = text;
                self.view_reply()?
            }
            ShellCommand::Sort { column, direction } => {
                self.sort = Some((column, direction));
                match self.view_reply() {
                    Ok(reply) => reply,
                    Err(err) => {
                        self.sort = None;
                        return Err(err);
                    }
                }
            }
            ShellCommand::Action { name, args } => {
                match self.commands.dispatch(&name, active, args)? {
                    CommandOutcome::Logged(message) => ShellReply::text(message),
                    CommandOutcome::Refresh(_) => {
                        let outcome = self.controller.refresh().await?;
                        self.rendered_reply(outcome)
                    }
                }
            }
            ShellCommand::Actions => ShellReply::text(self.commands.actions_for(active).join("\n")),
            ShellCommand::Menu => ShellReply::text(nav::menu_lines(active).join("\n")),
            ShellCommand::Stats => {
                let stats = self.controller.manager().stats();
                ShellReply::text(format!(
                    "hits={} joins={} fetches={} failures={} entries={} hit_rate={:.2}",
                    stats.hits,
                    stats.joins,
                    stats.fetches,
                    stats.failures,
                    stats.entry_count,
                    stats.hit_rate()
                ))
            }
            ShellCommand::Logout => {
                self.controller.logout();
                self.filter = None;
                self.sort = None;
                ShellReply::text("Logged out; cached data cleared.")
            }
            ShellCommand::Help => ShellReply::text(HELP),
            ShellCommand::Quit => ShellReply {
                output: String::new(),
                quit: true,
            },
        };
        Ok(reply)
    }

    async fn show(&mut self, key: ModuleKey) -> Result<ShellReply, ClientError> {
        self.filter = None;
        self.sort = None;
        let outcome = self.controller.show(key, LoadOptions::default()).await?;
        Ok(self.rendered_reply(outcome))
    }

    fn rendered_reply(&self, outcome: ApplyOutcome) -> ShellReply {
        match outcome {
            ApplyOutcome::Applied => self
                .view_reply()
                .unwrap_or_else(|err| ShellReply::text(format!("error: {}", err))),
            ApplyOutcome::Discarded { stale, .. } => {
                ShellReply::text(format!("Skipped stale result for {}", stale.key.title()))
            }
        }
    }

    fn view_reply(&self) -> Result<ShellReply, ClientError> {
        let Some(rendered) = self.controller.rendered() else {
            return Ok(ShellReply::text("Nothing rendered yet."));
        };

        let mut view = rendered.clone();
        if let Some(filter) = &self.filter {
            view.table = view.table.filter(filter);
        }
        if let Some((column, direction)) = &self.sort {
            view.table.sort_by(column, *direction)?;
        }

        let mut output = view.summary(ROW_LIMIT);
        if let Some(renderer) = &self.charts {
            for frame in renderer.take_frames() {
                output.push('\n');
                output.push_str(&frame);
            }
        }
        Ok(ShellReply::text(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view_commands() {
        assert_eq!(parse_command("view hr").unwrap(), ShellCommand::View(ModuleKey::Hr));
        assert_eq!(
            parse_command("v purchase orders").unwrap(),
            ShellCommand::View(ModuleKey::PurchaseOrders)
        );
        assert_eq!(parse_command("2").unwrap(), ShellCommand::View(ModuleKey::Sales));
        assert_eq!(parse_command("   ").unwrap(), ShellCommand::Empty);
    }

    #[test]
    fn test_parse_unknown_module_is_dashboard_error() {
        let err = parse_command("view inventory").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Dashboard(bizdash_core::DashboardError::UnknownModuleKey { .. })
        ));
        assert!(parse_command("9").is_err());
    }

    #[test]
    fn test_parse_sort_with_and_without_direction() {
        assert_eq!(
            parse_command("sort amount desc").unwrap(),
            ShellCommand::Sort {
                column: "amount".to_string(),
                direction: SortDirection::Descending
            }
        );
        assert_eq!(
            parse_command("sort due date").unwrap(),
            ShellCommand::Sort {
                column: "due date".to_string(),
                direction: SortDirection::Ascending
            }
        );
        assert_eq!(
            parse_command("sort desc").unwrap(),
            ShellCommand::Sort {
                column: "desc".to_string(),
                direction: SortDirection::Ascending
            }
        );
        assert!(parse_command("sort").is_err());
    }

    #[test]
    fn test_parse_action_and_filter() {
        assert_eq!(
            parse_command("action new_order SO-1 urgent").unwrap(),
            ShellCommand::Action {
                name: "new_order".to_string(),
                args: vec!["SO-1".to_string(), "urgent".to_string()],
            }
        );
        assert_eq!(parse_command("filter").unwrap(), ShellCommand::Filter(None));
        assert_eq!(
            parse_command("filter acme metals").unwrap(),
            ShellCommand::Filter(Some("acme metals".to_string()))
        );
        assert!(parse_command("dance").is_err());
    }
}
