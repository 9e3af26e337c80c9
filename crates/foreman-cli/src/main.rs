//! Foreman CLI
//!
//! Command-line and MCP front end for the Foreman task orchestrator.

mod args;
mod cli;
mod mcp;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use foreman_core::{params::ListPlans, OrchestratorBuilder};
use log::info;
use mcp::{run_stdio_server, ForemanMcpServer};
use renderer::TerminalRenderer;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        config,
        no_color,
        command,
    } = Args::parse();

    let orchestrator = OrchestratorBuilder::new()
        .with_database_path(database_file)
        .with_config_path(config)
        .build()
        .await
        .context("Failed to initialize orchestrator")?;

    info!(
        "Foreman started with database {}",
        orchestrator.database_path().display()
    );

    let cli = Cli::new(orchestrator, TerminalRenderer::new(!no_color));
    match command {
        Some(Idea { command }) => cli.handle_idea_command(command).await,
        Some(Plan { command }) => cli.handle_plan_command(command).await,
        Some(Task { command }) => cli.handle_task_command(command).await,
        Some(Doc { command }) => cli.handle_doc_command(command).await,
        Some(Gate(args)) => cli.run_gate(args).await,
        Some(Work(args)) => cli.work(args).await,
        Some(Reap) => cli.reap().await,
        Some(Call(args)) => cli.call(args).await,
        Some(Tools) => cli.tools(),
        Some(Serve) => {
            info!("Starting Foreman MCP server");
            run_stdio_server(ForemanMcpServer::new(cli.into_orchestrator()))
                .await
                .context("MCP server failed")
        }
        None => cli.list_plans(&ListPlans { project: None }).await,
    }
}
