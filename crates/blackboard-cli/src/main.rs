use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use blackboard_core::app::{
    Blackboard, Intake, PollingLoop, ResearchHandler, ScanFilter, StageHandler, TaskExecutor,
    TaskRouter, TaskScanner, run_intake,
};
use blackboard_core::config::{AliceConfig, MarcusConfig, StatusConfig};
use blackboard_core::impls::{GeminiGenerator, PostgrestStore, TelegramTransport};
use blackboard_core::observability::init_tracing;

#[derive(Parser)]
#[command(name = "blackboard", version, about = "Blackboard task coordination agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// チャットの依頼を受け付けて blackboard に書く
    Alice,
    /// research_needed のタスクを処理し続ける
    Marcus,
    /// タスクの状態別件数を表示
    Status {
        /// 全エージェント分を数える
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Alice => run_alice().await,
        Commands::Marcus => run_marcus().await,
        Commands::Status { all } => run_status(all).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_alice() -> Result<()> {
    let config = AliceConfig::from_env().context("alice configuration")?;

    let store = Arc::new(PostgrestStore::new(
        &config.store.url,
        &config.store.api_key,
        config.store.timeout,
    )?);
    let generator = Arc::new(GeminiGenerator::new(
        &config.generation.api_key,
        config.generation.timeout,
    )?);
    let transport = Arc::new(TelegramTransport::new(
        &config.telegram_token,
        config.telegram_long_poll,
    )?);

    let router = TaskRouter::new(Blackboard::new(store), &config.agent);
    let intake = Arc::new(Intake::new(
        router,
        generator,
        config.allowed_user_ids,
        &config.classifier_model,
        config.generation.timeout,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let join = tokio::spawn(run_intake(transport, intake, shutdown_rx));
    info!(agent = %config.agent, "alice online");

    wait_for_shutdown().await?;
    let _ = shutdown_tx.send(true);
    join.await.context("intake task failed")?;
    Ok(())
}

async fn run_marcus() -> Result<()> {
    let config = MarcusConfig::from_env().context("marcus configuration")?;

    let store = Arc::new(PostgrestStore::new(
        &config.store.url,
        &config.store.api_key,
        config.store.timeout,
    )?);
    let generator = Arc::new(GeminiGenerator::new(
        &config.generation.api_key,
        config.generation.timeout,
    )?);

    let board = Blackboard::new(store);
    let handler = Arc::new(ResearchHandler::new(&config.agent, &config.research_model));
    let filter = ScanFilter::pending(handler.stage(), handler.agent());
    let executor = TaskExecutor::new(board.clone(), generator, handler, config.generation.timeout)?;

    let handle = PollingLoop::new(
        TaskScanner::new(board),
        Arc::new(executor),
        filter,
        config.poll_interval,
    )
    .spawn();
    info!(agent = %config.agent, "marcus online");

    wait_for_shutdown().await?;
    handle.shutdown_and_join().await;
    Ok(())
}

async fn run_status(all: bool) -> Result<()> {
    let config = StatusConfig::from_env().context("status configuration")?;
    let store = Arc::new(PostgrestStore::new(
        &config.store.url,
        &config.store.api_key,
        config.store.timeout,
    )?);

    let agent = (!all).then_some(config.agent.as_str());
    let counts = Blackboard::new(store).counts_by_status(agent).await?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown requested");
    Ok(())
}
