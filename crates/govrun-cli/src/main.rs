//! `govrun`: a thin wiring shim over `govrun-core`'s release-governance
//! engine — enough to plan, bump, generate notes for, approve, publish,
//! retry, and cancel a release run against a real git repository and a
//! JSON-file-backed run store. Not a product surface: no interactive
//! approval UI, no dashboard. Those are out of scope for the core and for
//! this binary alike.

mod git_inspector;
mod git_log;
mod git_version_calculator;
mod stdout_adapters;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use govrun_core::broadcaster::Broadcaster;
use govrun_core::config::GovernanceConfig;
use govrun_core::ports::NotesOptions;
use govrun_core::run::{Actor, ActorType};
use govrun_core::storage::JsonFileRepository;
use govrun_core::usecases::{self, Deps};

use git_inspector::GitRepoInspector;
use git_version_calculator::GitConventionalVersionCalculator;
use stdout_adapters::{StdoutNotesGenerator, StdoutPublisher};

#[derive(Parser)]
#[command(name = "govrun", version, about = "Release-governance engine CLI")]
struct Cli {
    /// Repository root to operate on.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Base ref commits are compared against.
    #[arg(long, global = true, default_value = "main")]
    base_ref: String,

    /// Path to a TOML governance config; defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Identity recorded as the acting actor for mutating commands.
    #[arg(long, global = true, default_value = "local")]
    actor_id: String,

    #[arg(long, global = true, value_enum, default_value_t = CliActorType::Human)]
    actor_type: CliActorType,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, ValueEnum)]
enum CliActorType {
    Human,
    Ci,
    Agent,
}

impl From<CliActorType> for ActorType {
    fn from(value: CliActorType) -> Self {
        match value {
            CliActorType::Human => ActorType::Human,
            CliActorType::Ci => ActorType::Ci,
            CliActorType::Agent => ActorType::Agent,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a new run in Draft and advance it to Planned.
    Plan,
    /// Calculate the next version and advance Planned -> Versioned.
    Bump {
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Generate release notes and run the governance evaluator.
    Notes {
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long, default_value = "external")]
        audience: String,
        #[arg(long, default_value = "neutral")]
        tone: String,
        /// Proceed even if HEAD has moved since planning.
        #[arg(long)]
        force: bool,
    },
    /// Approve a run currently in NotesReady.
    Approve {
        #[arg(long)]
        run_id: Option<String>,
        /// Plan hash the approval is bound to; defaults to the run's current hash.
        #[arg(long)]
        plan_hash: Option<String>,
    },
    /// Walk the step plan for an Approved run.
    Publish {
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Re-enter the executor for a Failed run.
    Retry {
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Cancel a run that has not yet published.
    Cancel {
        #[arg(long)]
        run_id: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Print a run's current JSON document.
    Show {
        #[arg(long)]
        run_id: Option<String>,
    },
}

fn build_deps(cli: &Cli) -> Result<Deps> {
    let repo_dir = cli.repo.clone();
    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            GovernanceConfig::from_toml(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => GovernanceConfig::default(),
    };

    Ok(Deps {
        repository: Arc::new(JsonFileRepository::new(&repo_dir)),
        inspector: Arc::new(GitRepoInspector::new(&repo_dir)),
        publisher: Arc::new(StdoutPublisher),
        notes_generator: Arc::new(StdoutNotesGenerator),
        version_calculator: Arc::new(GitConventionalVersionCalculator::new(&repo_dir)),
        history: None,
        events: Arc::new(Broadcaster::new(64)),
        config,
    })
}

fn actor(cli: &Cli) -> Actor {
    Actor {
        actor_type: cli.actor_type.into(),
        id: cli.actor_id.clone(),
    }
}

async fn resolve_run_id(deps: &Deps, repo_root: &str, run_id: Option<String>) -> Result<String> {
    if let Some(id) = run_id {
        return Ok(id);
    }
    let run = deps
        .repository
        .load_latest(repo_root)
        .await
        .context("no run_id given and no existing run found under this repo root")?;
    Ok(run.id)
}

fn print_run(run: &govrun_core::run::ReleaseRun) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(run)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    govrun_core::telemetry::init_tracing_from_env();

    let cli = Cli::parse();
    let repo_root = cli.repo.display().to_string();
    let deps = build_deps(&cli)?;
    let acting_actor = actor(&cli);

    match &cli.command {
        Command::Plan => {
            let run = usecases::plan(&deps, &repo_root, &cli.base_ref, acting_actor).await?;
            print_run(&run)?;
        }
        Command::Bump { run_id } => {
            let run_id = resolve_run_id(&deps, &repo_root, run_id.clone()).await?;
            let run = usecases::bump(&deps, &run_id, &acting_actor.id).await?;
            print_run(&run)?;
        }
        Command::Notes {
            run_id,
            audience,
            tone,
            force,
        } => {
            let run_id = resolve_run_id(&deps, &repo_root, run_id.clone()).await?;
            let options = NotesOptions {
                audience: audience.clone(),
                tone: tone.clone(),
                force: *force,
            };
            let run = usecases::generate_notes(&deps, &run_id, &options, &acting_actor.id).await?;
            print_run(&run)?;
        }
        Command::Approve { run_id, plan_hash } => {
            let run_id = resolve_run_id(&deps, &repo_root, run_id.clone()).await?;
            let plan_hash = match plan_hash {
                Some(hash) => hash.clone(),
                None => deps.repository.load(&run_id).await?.plan_hash,
            };
            let run = usecases::approve(&deps, &run_id, &plan_hash, acting_actor, false).await?;
            print_run(&run)?;
        }
        Command::Publish { run_id } => {
            let run_id = resolve_run_id(&deps, &repo_root, run_id.clone()).await?;
            let run = usecases::publish(&deps, &run_id, &acting_actor.id).await?;
            print_run(&run)?;
        }
        Command::Retry { run_id } => {
            let run_id = resolve_run_id(&deps, &repo_root, run_id.clone()).await?;
            let run = usecases::retry(&deps, &run_id, &acting_actor.id).await?;
            print_run(&run)?;
        }
        Command::Cancel { run_id, reason } => {
            let run_id = resolve_run_id(&deps, &repo_root, run_id.clone()).await?;
            let run = usecases::cancel(&deps, &run_id, &acting_actor.id, reason.clone()).await?;
            print_run(&run)?;
        }
        Command::Show { run_id } => {
            let run_id = resolve_run_id(&deps, &repo_root, run_id.clone()).await?;
            let run = deps.repository.load(&run_id).await?;
            print_run(&run)?;
        }
    }

    Ok(())
}
