//! Command-line argument definitions.
//!
//! Each subcommand has a clap `Args` struct that converts into the matching
//! core parameter type, so the core stays free of clap attributes:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Orchestrator
//! ```

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use foreman_core::{
    models::DocumentKind,
    params::{
        AppendDocumentation, ClaimTask, FetchDocumentation, Id, LeaseRef, ListPlans,
        ListQuestions, ReportDone, ReportFailure,
    },
};

/// Foreman turns ideas into dependency-ordered task plans, leases tasks to
/// workers and checks every result against a staged quality gate.
///
/// Without a subcommand, lists all plans.
#[derive(Parser)]
#[command(version, about, name = "foreman")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/foreman/foreman.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Path to the JSON configuration file. Defaults to
    /// $XDG_CONFIG_HOME/foreman/config.json when it exists
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit ideas for planning
    #[command(alias = "i")]
    Idea {
        #[command(subcommand)]
        command: IdeaCommands,
    },
    /// Inspect and create plans
    #[command(alias = "p")]
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Inspect tasks and drive their lifecycle by hand
    #[command(alias = "t")]
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage versioned project documentation
    #[command(alias = "d")]
    Doc {
        #[command(subcommand)]
        command: DocCommands,
    },
    /// Evaluate the quality gate for a task without changing it
    Gate(GateArgs),
    /// Run the worker pool and the lease reaper until interrupted
    Work(WorkArgs),
    /// Return every expired lease once and exit
    Reap,
    /// Invoke a tool by name with JSON arguments and print the JSON result
    Call(CallArgs),
    /// List the tool catalog
    Tools,
    /// Start the MCP server on stdio
    Serve,
}

// ============================================================================
// Ideas
// ============================================================================

#[derive(Subcommand)]
pub enum IdeaCommands {
    /// Plan an idea against the project's current documentation
    #[command(alias = "s")]
    Submit(SubmitIdeaArgs),
}

/// Submit an idea
///
/// The first line is the intent; bullet lines (`- [key] Title (after: a, b)
/// {ui} => acceptance`) become tasks. Reads the text from --file, the
/// positional argument, or stdin, in that order.
#[derive(ClapArgs)]
pub struct SubmitIdeaArgs {
    /// Project the idea belongs to
    pub project: String,
    /// Idea text
    pub text: Option<String>,
    /// Read the idea text from a file
    #[arg(short, long, conflicts_with = "text")]
    pub file: Option<PathBuf>,
    /// Scheduling priority; higher runs first
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i32,
}

// ============================================================================
// Plans
// ============================================================================

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a plan from a JSON task graph
    #[command(alias = "c")]
    Create(CreatePlanArgs),
    /// List plans with per-state task counts
    #[command(aliases = ["l", "ls"])]
    List(ListPlansArgs),
    /// Show a plan with its tasks and open questions
    #[command(alias = "s")]
    Show(IdArgs),
    /// List open questions raised during planning
    #[command(alias = "q")]
    Questions(ListQuestionsArgs),
}

/// Create a plan
///
/// The file holds a JSON object with `title`, `project`, optional
/// `priority` and `tasks`, each task a `key`, `title`, optional `payload`
/// and `depends_on` keys. Use `-` to read stdin.
#[derive(ClapArgs)]
pub struct CreatePlanArgs {
    /// JSON file describing the plan
    pub file: PathBuf,
}

#[derive(ClapArgs)]
pub struct ListPlansArgs {
    /// Only plans of this project
    #[arg(long)]
    pub project: Option<String>,
}

impl From<ListPlansArgs> for ListPlans {
    fn from(val: ListPlansArgs) -> Self {
        ListPlans {
            project: val.project,
        }
    }
}

#[derive(ClapArgs)]
pub struct ListQuestionsArgs {
    /// Only questions of this plan
    #[arg(long)]
    pub plan: Option<u64>,
    /// Only questions of this project's plans
    #[arg(long)]
    pub project: Option<String>,
}

impl From<ListQuestionsArgs> for ListQuestions {
    fn from(val: ListQuestionsArgs) -> Self {
        ListQuestions {
            plan_id: val.plan,
            project: val.project,
        }
    }
}

#[derive(ClapArgs)]
pub struct IdArgs {
    #[arg(help = "Unique identifier")]
    pub id: u64,
}

impl From<IdArgs> for Id {
    fn from(val: IdArgs) -> Self {
        Id { id: val.id }
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Show a task with its history and quality results
    #[command(alias = "s")]
    Show(IdArgs),
    /// Show the recorded state transitions of a task
    #[command(alias = "h")]
    History(IdArgs),
    /// Claim the next ready task and print its lease
    #[command(alias = "c")]
    Claim(ClaimArgs),
    /// Start work on a claimed task
    Begin(LeaseArgs),
    /// Extend a lease
    Heartbeat(LeaseArgs),
    /// Report a finished action and run the quality gate
    Done(DoneArgs),
    /// Report a failed action
    Fail(FailArgs),
}

#[derive(ClapArgs)]
pub struct ClaimArgs {
    /// Worker identity recorded on the lease
    #[arg(short, long)]
    pub worker: String,
    /// Only claim from this plan
    #[arg(long)]
    pub plan: Option<u64>,
}

impl From<ClaimArgs> for ClaimTask {
    fn from(val: ClaimArgs) -> Self {
        ClaimTask {
            worker: val.worker,
            plan_id: val.plan,
        }
    }
}

#[derive(ClapArgs)]
pub struct LeaseArgs {
    /// Task ID
    pub task_id: u64,
    /// Lease token printed by `task claim`
    pub token: String,
}

impl From<LeaseArgs> for LeaseRef {
    fn from(val: LeaseArgs) -> Self {
        LeaseRef {
            task_id: val.task_id,
            token: val.token,
        }
    }
}

#[derive(ClapArgs)]
pub struct DoneArgs {
    #[command(flatten)]
    pub lease: LeaseArgs,
    /// Reference to what the action produced (path, commit, URL)
    #[arg(short, long)]
    pub artifact: Option<String>,
}

impl From<DoneArgs> for ReportDone {
    fn from(val: DoneArgs) -> Self {
        ReportDone {
            task_id: val.lease.task_id,
            token: val.lease.token,
            artifact: val.artifact,
        }
    }
}

#[derive(ClapArgs)]
pub struct FailArgs {
    #[command(flatten)]
    pub lease: LeaseArgs,
    /// What went wrong
    #[arg(short, long)]
    pub message: String,
}

impl From<FailArgs> for ReportFailure {
    fn from(val: FailArgs) -> Self {
        ReportFailure {
            task_id: val.lease.task_id,
            token: val.lease.token,
            message: val.message,
        }
    }
}

// ============================================================================
// Documentation
// ============================================================================

#[derive(Subcommand)]
pub enum DocCommands {
    /// Append a new version of a document
    #[command(alias = "a")]
    Append(AppendDocArgs),
    /// Show the latest documents, or one kind at a version
    #[command(alias = "s")]
    Show(ShowDocArgs),
    /// List every stored version
    #[command(aliases = ["l", "ls"])]
    List(ListDocsArgs),
}

/// Append a document
///
/// Reads the body from --file, the positional argument, or stdin, in that
/// order.
#[derive(ClapArgs)]
pub struct AppendDocArgs {
    pub project: String,
    pub kind: DocKindArg,
    /// Document body
    pub body: Option<String>,
    /// Read the body from a file
    #[arg(short, long, conflicts_with = "body")]
    pub file: Option<PathBuf>,
}

impl AppendDocArgs {
    pub fn into_params(self, body: String) -> AppendDocumentation {
        AppendDocumentation {
            project: self.project,
            kind: self.kind.into(),
            body,
        }
    }
}

#[derive(ClapArgs)]
pub struct ShowDocArgs {
    pub project: String,
    /// Document kind; all kinds when omitted
    #[arg(short, long)]
    pub kind: Option<DocKindArg>,
    /// Version to show; the latest when omitted
    #[arg(short, long, requires = "kind")]
    pub version: Option<u32>,
}

impl From<ShowDocArgs> for FetchDocumentation {
    fn from(val: ShowDocArgs) -> Self {
        FetchDocumentation {
            project: val.project,
            kind: val.kind.map(Into::into),
            version: val.version,
        }
    }
}

#[derive(ClapArgs)]
pub struct ListDocsArgs {
    pub project: String,
}

/// Document kinds accepted on the command line.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DocKindArg {
    #[value(alias = "spec")]
    Specification,
    Architecture,
    #[value(alias = "story")]
    UserStory,
    Note,
}

impl From<DocKindArg> for DocumentKind {
    fn from(val: DocKindArg) -> Self {
        match val {
            DocKindArg::Specification => DocumentKind::Specification,
            DocKindArg::Architecture => DocumentKind::Architecture,
            DocKindArg::UserStory => DocumentKind::UserStory,
            DocKindArg::Note => DocumentKind::Note,
        }
    }
}

// ============================================================================
// Gate, workers and raw tool calls
// ============================================================================

#[derive(ClapArgs)]
pub struct GateArgs {
    /// Task to evaluate
    pub task_id: u64,
}

impl From<GateArgs> for Id {
    fn from(val: GateArgs) -> Self {
        Id { id: val.task_id }
    }
}

#[derive(ClapArgs)]
pub struct WorkArgs {
    /// Number of workers; defaults to `scheduler.workers`
    #[arg(short, long)]
    pub workers: Option<usize>,
    /// Shell command run per attempt; defaults to `executor.command`
    #[arg(short, long)]
    pub command: Option<String>,
    /// Prefix for worker names
    #[arg(long, default_value = "worker")]
    pub name: String,
    /// Run attempts one after another until nothing is ready, then exit
    #[arg(long)]
    pub drain: bool,
}

#[derive(ClapArgs)]
pub struct CallArgs {
    /// Tool name, see `foreman tools`
    pub tool: String,
    /// JSON arguments; `{}` when omitted
    pub args: Option<String>,
}
