//! Taskloop - command line entry point
//!
//! `taskloop run` performs one daily pass over due and overdue tasks and
//! writes a markdown report.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use taskloop::context::ContextLibrary;
use taskloop::observability::{init_default_logging, metrics};
use taskloop::{Pipeline, PipelineConfig, RunOptions, TaskLoopError};
use tokio::signal;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATHS: &[&str] = &["taskloop.toml", "config/taskloop.toml"];

/// Daily task triage with LLM processors
#[derive(Parser)]
#[command(name = "taskloop")]
#[command(about = "Classify, route and process today's Todoist tasks")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "TASKLOOP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process today's and overdue tasks once and write a report
    Run {
        /// Process at most this many tasks
        #[arg(long)]
        limit: Option<usize>,

        /// Route with the static table only
        #[arg(long)]
        static_routing: bool,
    },
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
    /// List context documents available to the learning processor
    Contexts,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.log_level.as_deref());

    info!("Starting taskloop v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run {
            limit,
            static_routing,
        } => {
            run_pipeline(
                &config,
                RunOptions {
                    limit,
                    static_routing,
                },
            )
            .await
        }
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Contexts => list_contexts(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(path: Option<&Path>) -> Result<PipelineConfig, TaskLoopError> {
    if let Some(path) = path {
        info!("Loading configuration from: {}", path.display());
        return Ok(PipelineConfig::load_from_file(path)?);
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(PipelineConfig::load_from_file(path)?);
        }
    }

    warn!("No configuration file found, using built-in defaults");
    Ok(PipelineConfig::default())
}

async fn run_pipeline(config: &PipelineConfig, options: RunOptions) -> Result<(), TaskLoopError> {
    let pipeline = Pipeline::from_config(config, &options)?;

    let summary = tokio::select! {
        result = pipeline.run() => result?,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, no report written for this run");
            return Err(TaskLoopError::internal("run interrupted"));
        }
    };

    println!("Report: {}", summary.report_path.display());
    println!(
        "Tasks: {} (completed {}, forced {}, failed {})",
        summary.tasks, summary.completed, summary.forced_complete, summary.failed
    );
    for path in &summary.learning_files {
        println!("Learning file: {}", path.display());
    }
    for anomaly in &summary.anomalies {
        println!("Note: {anomaly}");
    }

    match serde_json::to_string(&metrics().snapshot()) {
        Ok(snapshot) => info!(metrics = %snapshot, "Run metrics"),
        Err(e) => warn!(error = %e, "Failed to serialize metrics"),
    }

    Ok(())
}

fn handle_config_command(config: &PipelineConfig, show: bool) -> Result<(), TaskLoopError> {
    config.validate()?;

    if show {
        println!("{}", config.to_toml_string()?);
    }

    if let Err(e) = config.get_todoist_token() {
        warn!("{}", e);
    }
    if let Err(e) = config.get_llm_api_key() {
        warn!("{}", e);
    }
    if config.get_search_api_key().is_none() {
        warn!(
            "{} is not set, planning tasks will run without web search",
            config.search.api_key_env
        );
    }

    info!("Configuration validation complete");
    Ok(())
}

fn list_contexts(config: &PipelineConfig) -> Result<(), TaskLoopError> {
    let library = ContextLibrary::from_config(&config.output.contexts_dir, &config.contexts);

    for rule in library.rules() {
        let path = library.dir().join(&rule.file);
        let status = if path.exists() { "present" } else { "missing" };
        println!("{} [{}]: {}", rule.file, status, rule.keywords.join(", "));
    }

    match library.available() {
        Ok(files) => {
            for path in files {
                println!("available: {}", path.display());
            }
        }
        Err(e) => warn!(
            dir = %library.dir().display(),
            error = %e,
            "Contexts directory not readable"
        ),
    }

    Ok(())
}
