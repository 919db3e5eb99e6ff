//! Reportsmith - checkpointed research reports from the command line.
//!
//! Each subcommand maps onto one pipeline operation. Threads are checkpointed
//! between invocations, so `start`, `resume`, `run` and `status` can be
//! called from separate processes.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reportsmith::core::StoreBackend;
use reportsmith::{
    Config, FileStore, MemoryStore, Orchestrator, PipelineError, StateStore, StatusReport,
};

/// Checkpointed, LLM-driven research reports
#[derive(Parser)]
#[command(name = "reportsmith")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default lookup
    #[arg(short, long, global = true, env = "REPORTSMITH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a report and run it to the feedback gate
    Start {
        /// Report topic
        topic: String,

        /// Number of analysts (defaults to pipeline.default_analysts)
        #[arg(short = 'n', long)]
        analysts: Option<usize>,

        /// Only create the checkpoint; drive it later with `run`
        #[arg(short, long)]
        detach: bool,
    },

    /// Answer the feedback gate
    Resume {
        /// Thread id
        thread_id: String,

        /// Feedback for the analyst panel (omit, or say "none", to approve)
        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Continue a checkpointed thread from its current stage
    Run {
        /// Thread id
        thread_id: String,
    },

    /// Show a thread's progress
    Status {
        /// Thread id
        thread_id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List all threads
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // API keys may live in a local .env file
    dotenvy::dotenv().ok();

    let config = load_config(cli.config.as_deref())?;

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.general.log_level))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Start { topic, analysts, detach } => cmd_start(&config, &topic, analysts, detach),
        Commands::Resume { thread_id, feedback } => cmd_resume(&config, &thread_id, feedback.as_deref()),
        Commands::Run { thread_id } => cmd_run(&config, &thread_id),
        Commands::Status { thread_id, format } => cmd_status(&config, &thread_id, format),
        Commands::List { format } => cmd_list(&config, format),
        Commands::Config { path } => cmd_config(cli.config.as_deref(), path),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
}

/// Pipeline errors are shown as `Kind: message`.
fn report(error: PipelineError) -> anyhow::Error {
    anyhow::anyhow!("{}: {error}", error.kind())
}

fn open_store(config: &Config) -> Arc<dyn StateStore> {
    match config.store.backend {
        StoreBackend::File => Arc::new(FileStore::new(config.store_dir())),
        StoreBackend::Memory => {
            tracing::warn!("Memory store selected; threads will not outlive this process");
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(feature = "ai")]
fn build_orchestrator(config: &Config, store: Arc<dyn StateStore>) -> Result<Orchestrator> {
    let chain = reportsmith::GeneratorChain::from_config(&config.ai)?;
    tracing::debug!(providers = ?chain.provider_names(), "Generator chain ready");
    Ok(Orchestrator::from_config(Arc::new(chain), store, config))
}

#[cfg(not(feature = "ai"))]
fn build_orchestrator(_config: &Config, _store: Arc<dyn StateStore>) -> Result<Orchestrator> {
    anyhow::bail!("This build has no AI providers. Rebuild with `--features ai`.")
}

/// Start a thread.
fn cmd_start(config: &Config, topic: &str, analysts: Option<usize>, detach: bool) -> Result<()> {
    let orchestrator = build_orchestrator(config, open_store(config))?;
    let count = analysts.unwrap_or(config.pipeline.default_analysts);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let thread_id = orchestrator.create(topic, count).await.map_err(report)?;

        if detach {
            println!("{thread_id}");
            return Ok(());
        }

        println!("Thread: {thread_id}");
        orchestrator.run(&thread_id).await.map_err(report)?;

        let status = orchestrator.status(&thread_id).await.map_err(report)?;
        print_status(&status);
        print_next_step(&status);
        Ok(())
    })
}

/// Resume a thread paused at the feedback gate.
fn cmd_resume(config: &Config, thread_id: &str, feedback: Option<&str>) -> Result<()> {
    let orchestrator = build_orchestrator(config, open_store(config))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        orchestrator.resume(thread_id, feedback).await.map_err(report)?;

        let status = orchestrator.status(thread_id).await.map_err(report)?;
        print_status(&status);
        print_next_step(&status);
        Ok(())
    })
}

/// Drive a checkpointed thread forward.
fn cmd_run(config: &Config, thread_id: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config, open_store(config))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        orchestrator.run(thread_id).await.map_err(report)?;

        let status = orchestrator.status(thread_id).await.map_err(report)?;
        print_status(&status);
        print_next_step(&status);
        Ok(())
    })
}

/// Show one thread. Reads the store directly so no provider is needed.
fn cmd_status(config: &Config, thread_id: &str, format: Format) -> Result<()> {
    let store = open_store(config);

    let rt = tokio::runtime::Runtime::new()?;
    let state = rt
        .block_on(store.get(thread_id))
        .map_err(|e| report(e.into()))?
        .ok_or_else(|| report(PipelineError::NotFound(thread_id.to_string())))?;
    let status = StatusReport::from(&state);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        Format::Text => print_status(&status),
    }

    Ok(())
}

/// List every stored thread.
fn cmd_list(config: &Config, format: Format) -> Result<()> {
    let store = open_store(config);

    let rt = tokio::runtime::Runtime::new()?;
    let threads = rt.block_on(store.list_threads()).map_err(|e| report(e.into()))?;
    let reports: Vec<StatusReport> = threads.iter().map(StatusReport::from).collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        Format::Text => {
            if reports.is_empty() {
                println!("No threads yet. Start one with: reportsmith start \"<topic>\"");
                return Ok(());
            }
            for r in &reports {
                println!(
                    "{}  {:<22}  {}  {}",
                    r.thread_id,
                    r.stage.as_str(),
                    r.updated_at.format("%Y-%m-%d %H:%M"),
                    r.topic
                );
            }
            println!("\nTotal: {} threads", reports.len());
        }
    }

    Ok(())
}

fn print_status(status: &StatusReport) {
    println!("Thread:   {}", status.thread_id);
    println!("Topic:    {}", status.topic);
    println!("Stage:    {}", status.stage);

    if !status.personas.is_empty() {
        println!("Analysts:");
        for (i, p) in status.personas.iter().enumerate() {
            println!("  {}. {} - {}", i + 1, p.name, p.role);
            println!("     {}", p.focus);
        }
    }

    if status.interviews > 0 {
        println!("Sections: {}/{} written", status.sections_written, status.interviews);
    }
    if status.feedback_rounds > 0 {
        println!("Feedback rounds: {}", status.feedback_rounds);
    }
    if let Some(feedback) = &status.pending_feedback {
        println!("Pending feedback: {feedback}");
    }
    if let Some(files) = &status.files {
        println!("Files:");
        println!("  {}", files.markdown.display());
        println!("  {}", files.html.display());
    }
    if let Some(failure) = &status.failure {
        println!("Failure:  {failure}");
    }
}

fn print_next_step(status: &StatusReport) {
    if status.stage.is_paused() {
        println!();
        println!("Approve:  reportsmith resume {}", status.thread_id);
        println!("Revise:   reportsmith resume {} -f \"<feedback>\"", status.thread_id);
    }
}

/// Show configuration.
fn cmd_config(explicit: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Config::global_config_path(),
        };
        if let Some(path) = path {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = load_config(explicit)?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "reportsmith", &mut io::stdout());
}
