//! Command handlers: run one orchestrator operation and render its result.

use std::{
    fs,
    io::{self, Read},
    path::Path,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use foreman_core::{
    dispatch,
    params::{CreatePlan, ListPlans, SubmitIdea},
    scheduler::{CommandExecutor, Reaper},
    Orchestrator, ToolName, WorkerPool,
};
use log::info;
use serde_json::Value;
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
};

use crate::{
    args::{
        CallArgs, DocCommands, GateArgs, IdeaCommands, PlanCommands, TaskCommands, WorkArgs,
    },
    renderer::TerminalRenderer,
};

pub struct Cli {
    orchestrator: Orchestrator,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(orchestrator: Orchestrator, renderer: TerminalRenderer) -> Self {
        Self {
            orchestrator,
            renderer,
        }
    }

    pub fn into_orchestrator(self) -> Orchestrator {
        self.orchestrator
    }

    pub async fn handle_idea_command(&self, command: IdeaCommands) -> Result<()> {
        match command {
            IdeaCommands::Submit(args) => {
                let text = read_input(args.text, args.file.as_deref())?;
                let submission = self
                    .orchestrator
                    .submit_idea(&SubmitIdea {
                        project: args.project,
                        text,
                        priority: args.priority,
                    })
                    .await?;
                self.renderer.render(&submission.to_string())
            }
        }
    }

    pub async fn handle_plan_command(&self, command: PlanCommands) -> Result<()> {
        match command {
            PlanCommands::Create(args) => {
                let raw = read_input(None, Some(&args.file))?;
                let params: CreatePlan =
                    serde_json::from_str(&raw).context("Plan file is not a valid plan")?;
                let submission = self.orchestrator.create_plan(&params).await?;
                self.renderer.render(&submission.to_string())
            }
            PlanCommands::List(args) => self.list_plans(&args.into()).await,
            PlanCommands::Show(args) => {
                let plan = self.orchestrator.show_plan(&args.into()).await?;
                self.renderer.render(&plan.to_string())
            }
            PlanCommands::Questions(args) => {
                let questions = self.orchestrator.list_questions(&args.into()).await?;
                self.renderer.render(&questions.to_string())
            }
        }
    }

    pub async fn handle_task_command(&self, command: TaskCommands) -> Result<()> {
        let output = match command {
            TaskCommands::Show(args) => self.orchestrator.show_task(&args.into()).await?.to_string(),
            TaskCommands::History(args) => self
                .orchestrator
                .task_history(&args.into())
                .await?
                .to_string(),
            TaskCommands::Claim(args) => self
                .orchestrator
                .claim_task(&args.into())
                .await?
                .to_string(),
            TaskCommands::Begin(args) => {
                let task = self.orchestrator.begin_task(&args.into()).await?;
                format!("Task {} is now {}.\n", task.id, task.state.with_icon())
            }
            TaskCommands::Heartbeat(args) => self
                .orchestrator
                .heartbeat(&args.into())
                .await?
                .to_string(),
            TaskCommands::Done(args) => self
                .orchestrator
                .report_done(&args.into())
                .await?
                .to_string(),
            TaskCommands::Fail(args) => self
                .orchestrator
                .report_failure(&args.into())
                .await?
                .to_string(),
        };
        self.renderer.render(&output)
    }

    pub async fn handle_doc_command(&self, command: DocCommands) -> Result<()> {
        match command {
            DocCommands::Append(args) => {
                let body = read_input(args.body.clone(), args.file.as_deref())?;
                let document = self
                    .orchestrator
                    .append_documentation(&args.into_params(body))
                    .await?;
                self.renderer.render(&format!(
                    "Stored {} v{} for project '{}'.\n",
                    document.kind, document.version, document.project
                ))
            }
            DocCommands::Show(args) => {
                let documents = self.orchestrator.fetch_documentation(&args.into()).await?;
                self.renderer.render(&documents.to_string())
            }
            DocCommands::List(args) => {
                let documents = self.orchestrator.list_documentation(&args.project).await?;
                self.renderer.render(&documents.to_string())
            }
        }
    }

    pub async fn run_gate(&self, args: GateArgs) -> Result<()> {
        let report = self.orchestrator.run_quality_gate(&args.into()).await?;
        self.renderer.render(&report.to_string())
    }

    pub async fn list_plans(&self, params: &ListPlans) -> Result<()> {
        let summaries = self.orchestrator.list_plans(params).await?;
        self.renderer.render(&summaries.to_string())
    }

    pub async fn reap(&self) -> Result<()> {
        let reaped = self.orchestrator.reap().await?;
        self.renderer.render(&reaped.to_string())
    }

    /// Runs the worker pool with the configured command executor.
    ///
    /// With `--drain`, a single worker runs attempts back to back until no
    /// task is ready. Otherwise the pool and the reaper run until SIGINT or
    /// SIGTERM; in-flight attempts finish before the process exits.
    pub async fn work(&self, args: WorkArgs) -> Result<()> {
        let config = self.orchestrator.config();
        let command = args
            .command
            .or_else(|| config.executor.command.clone())
            .context("No executor command configured; set executor.command or pass --command")?;
        let executor = Arc::new(CommandExecutor::new(command, config.executor.timeout()));
        let scheduler = self.orchestrator.scheduler().clone();

        let mut pool = WorkerPool::new(scheduler.clone(), executor).with_name(args.name.clone());
        if let Some(workers) = args.workers {
            pool = pool.with_workers(workers);
        }

        if args.drain {
            let worker = format!("{}-0", args.name);
            let results = pool.drain(&worker).await?;
            for result in &results {
                self.renderer.render(&result.to_string())?;
            }
            info!("{worker} drained the queue after {} attempts", results.len());
            return self.renderer.render("No task is ready to claim.\n");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper = Reaper::new(scheduler);
        let reaper_rx = shutdown_rx.clone();
        let reaper_task = tokio::spawn(async move { reaper.run(reaper_rx).await });
        let pool_task = tokio::spawn(async move { pool.run(shutdown_rx).await });

        let received = shutdown_signal().await?;
        info!("Received {received}, stopping workers after their current attempts");
        // Receivers may already be gone if the pool failed.
        let _ = shutdown_tx.send(true);

        pool_task.await??;
        reaper_task.await?;
        info!("Workers stopped");
        Ok(())
    }

    /// Invokes a tool through the generic dispatcher and prints its JSON
    /// result.
    pub async fn call(&self, args: CallArgs) -> Result<()> {
        let value: Value = match args.args.as_deref() {
            Some(raw) => serde_json::from_str(raw).context("Tool arguments are not valid JSON")?,
            None => Value::Null,
        };
        let output = dispatch(&self.orchestrator, &args.tool, value)
            .await
            .map_err(|e| anyhow!("{e} [{}]", e.category()))?;
        println!("{}", serde_json::to_string_pretty(&output.data)?);
        Ok(())
    }

    pub fn tools(&self) -> Result<()> {
        let mut catalog = String::from("# Tools\n\n");
        for tool in ToolName::ALL {
            catalog.push_str(&format!("- `{}`: {}\n", tool.as_str(), tool.summary()));
        }
        self.renderer.render(&catalog)
    }
}

/// Reads text from a file (`-` is stdin), an inline value, or stdin.
fn read_input(inline: Option<String>, file: Option<&Path>) -> Result<String> {
    match (file, inline) {
        (Some(path), _) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, Some(text)) => Ok(text),
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

/// Waits for SIGINT or SIGTERM and returns the signal's name.
pub async fn shutdown_signal() -> Result<&'static str> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}
