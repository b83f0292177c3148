//! End-to-end shell sessions against a scripted RPC transport.

use std::sync::Arc;
use std::time::Duration;

use bizdash_cache::{CacheConfig, ModuleCacheManager};
use bizdash_client::charts::TextChartRenderer;
use bizdash_client::commands::CommandTable;
use bizdash_client::controller::DashboardController;
use bizdash_client::nav::{self, MenuNav};
use bizdash_client::notifications::NotificationSink;
use bizdash_client::shell::{parse_command, Shell, ShellCommand};
use bizdash_core::ModuleKey;
use bizdash_test_utils::generators::arb_module_key;
use bizdash_test_utils::MockRpc;
use proptest::prelude::*;

fn shell(rpc: &MockRpc) -> Shell {
    let (sink, inbox) = NotificationSink::channel();
    let manager = ModuleCacheManager::new(
        Arc::new(rpc.clone()),
        Arc::new(sink),
        CacheConfig::new().with_ttl(Duration::from_secs(300)),
    );
    let renderer = TextChartRenderer::new();
    let controller = DashboardController::new(manager, Arc::new(renderer.clone()), ModuleKey::Financial);
    Shell::new(controller, CommandTable::with_defaults(), inbox).with_chart_output(renderer)
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{:?} not found in output:\n{}", needle, haystack))
}

#[tokio::test(start_paused = true)]
async fn test_view_renders_kpis_table_and_charts() {
    let rpc = MockRpc::new();
    let mut shell = shell(&rpc);

    let reply = shell.handle_line("view sales").await;
    assert!(!reply.quit);
    assert!(reply.output.starts_with("== Sales (fetched"));
    assert!(reply.output.contains("Total Revenue"));
    assert!(reply.output.contains("Recent Orders"));
    assert!(reply.output.contains("SO-1041"));
    assert!(reply.output.contains("Monthly Revenue (line)"));
    assert_eq!(rpc.calls_for(ModuleKey::Sales), 1);
}

#[tokio::test(start_paused = true)]
async fn test_revisit_is_served_from_cache() {
    let rpc = MockRpc::new();
    let mut shell = shell(&rpc);

    shell.handle_line("view sales").await;
    shell.handle_line("next").await;
    let reply = shell.handle_line("prev").await;
    assert!(reply.output.contains("== Sales (cached, fetched"));
    assert_eq!(rpc.calls_for(ModuleKey::Sales), 1);
    assert_eq!(rpc.calls_for(ModuleKey::Sales.next()), 1);

    let stats = shell.handle_line("stats").await;
    assert!(stats.output.contains("hits=1"));
    assert!(stats.output.contains("fetches=2"));
    assert!(stats.output.contains("entries=2"));
}

#[tokio::test(start_paused = true)]
async fn test_filter_and_sort_rows() {
    let rpc = MockRpc::new();
    let mut shell = shell(&rpc);
    shell.handle_line("view sales").await;

    let filtered = shell.handle_line("filter contoso").await;
    assert!(filtered.output.contains("SO-1041"));
    assert!(!filtered.output.contains("SO-1040"));

    shell.handle_line("filter").await;
    let sorted = shell.handle_line("sort amount desc").await;
    let biggest = position(&sorted.output, "SO-1040");
    let middle = position(&sorted.output, "SO-1041");
    let smallest = position(&sorted.output, "SO-1039");
    assert!(biggest < middle && middle < smallest);

    let err = shell.handle_line("sort price").await;
    assert!(err.output.starts_with("error: Unknown column 'price'"));
}

#[tokio::test(start_paused = true)]
async fn test_actions_resolve_against_active_module() {
    let rpc = MockRpc::new();
    let mut shell = shell(&rpc);
    shell.handle_line("view sales").await;

    let reply = shell.handle_line("action new_order").await;
    assert_eq!(reply.output, "Sales: new order requested");

    let wrong = shell.handle_line("action hr.add_employee").await;
    assert!(wrong.output.starts_with("error:"));
    assert!(wrong.output.contains("hr.add_employee"));

    let listed = shell.handle_line("actions").await;
    assert!(listed.output.contains("sales.new_quotation"));
    assert!(listed.output.contains("sales.refresh"));

    shell.handle_line("action refresh").await;
    assert_eq!(rpc.calls_for(ModuleKey::Sales), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_module_shows_notification() {
    let rpc = MockRpc::new();
    rpc.fail_logical(ModuleKey::Projects, "Not permitted");
    let mut shell = shell(&rpc);

    let reply = shell.handle_line("view projects").await;
    assert!(reply.output.contains("== Projects (unavailable, showing empty data)"));
    assert!(reply.output.contains("(no rows)"));
    assert!(reply.output.contains("[warning] Could not load Projects"));
    assert!(reply.output.contains("(retry: view projects)"));

    rpc.reset(ModuleKey::Projects);
    let retry = shell.handle_line("view projects").await;
    assert!(retry.output.contains("PROJ-0012"));
    assert!(!retry.output.contains("[warning]"));
}

#[tokio::test(start_paused = true)]
async fn test_logout_then_peek_finds_nothing() {
    let rpc = MockRpc::new();
    let mut shell = shell(&rpc);
    shell.handle_line("view hr").await;

    let peek = shell.handle_line("peek hr").await;
    assert!(peek.output.starts_with("HR (loaded)"));

    let reply = shell.handle_line("logout").await;
    assert_eq!(reply.output, "Logged out; cached data cleared.");
    assert_eq!(shell.handle_line("peek hr").await.output, "HR: nothing cached");
    assert!(shell.controller().rendered().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_peek_reports_load_in_progress() {
    let rpc = MockRpc::new().with_delay(Duration::from_millis(100));
    let mut shell = shell(&rpc);

    let manager = shell.controller().manager().clone();
    let pending = tokio::spawn(async move {
        manager
            .ensure_loaded(ModuleKey::Hr, bizdash_cache::LoadOptions::default())
            .await
    });
    tokio::task::yield_now().await;

    let peek = shell.handle_line("peek hr").await;
    assert_eq!(peek.output, "HR: nothing cached, load in progress");

    pending.await.unwrap();
    let peek = shell.handle_line("peek hr").await;
    assert!(peek.output.starts_with("HR (loaded):"));
}

#[tokio::test(start_paused = true)]
async fn test_bad_input_and_quit() {
    let rpc = MockRpc::new();
    let mut shell = shell(&rpc);

    let unknown = shell.handle_line("view inventory").await;
    assert!(unknown.output.starts_with("error:"));
    assert!(unknown.output.contains("inventory"));
    assert_eq!(rpc.call_count(), 0);

    assert_eq!(shell.handle_line("").await.output, "");
    assert!(shell.handle_line("quit").await.quit);
}

proptest! {
    #[test]
    fn prop_shortcut_matches_menu_position(key in arb_module_key()) {
        let number = key.index() + 1;
        prop_assert_eq!(nav::from_shortcut(number), Some(key));
        prop_assert_eq!(parse_command(&number.to_string()).unwrap(), ShellCommand::View(key));
        prop_assert_eq!(key.next().previous(), key);
    }
}
