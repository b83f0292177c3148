//! BIZDASH shell entry point.

use std::sync::Arc;

use bizdash_cache::ModuleCacheManager;
use bizdash_client::api_client::RpcClient;
use bizdash_client::charts::TextChartRenderer;
use bizdash_client::commands::CommandTable;
use bizdash_client::config::DashboardConfig;
use bizdash_client::controller::DashboardController;
use bizdash_client::error::ClientError;
use bizdash_client::notifications::NotificationSink;
use bizdash_client::shell::{Shell, HELP};
use bizdash_client::telemetry;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = DashboardConfig::load()?;
    telemetry::init_tracing(&config.log)?;

    let rpc = RpcClient::new(&config)?;
    tracing::info!(base_url = rpc.base_url(), "Connecting to server");

    let (sink, inbox) = NotificationSink::channel();
    let manager = ModuleCacheManager::new(Arc::new(rpc), Arc::new(sink), config.cache_config());
    let renderer = TextChartRenderer::new();
    let controller = DashboardController::new(
        manager,
        Arc::new(renderer.clone()),
        config.default_module(),
    );
    let mut shell = Shell::new(controller, CommandTable::with_defaults(), inbox)
        .with_chart_output(renderer);

    let mut stdout = tokio::io::stdout();
    write_block(&mut stdout, HELP).await?;
    let initial = format!("view {}", config.default_module());
    let reply = shell.handle_line(&initial).await;
    write_block(&mut stdout, &reply.output).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"bizdash> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let reply = shell.handle_line(&line).await;
        write_block(&mut stdout, &reply.output).await?;
        if reply.quit {
            break;
        }
    }

    tracing::info!(stats = ?shell.controller().manager().stats(), "Shell exited");
    Ok(())
}

async fn write_block(stdout: &mut tokio::io::Stdout, text: &str) -> Result<(), ClientError> {
    if !text.is_empty() {
        stdout.write_all(text.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    Ok(())
}
