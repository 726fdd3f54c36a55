//! Playbox Runner CLI
//!
//! A command-line tool for running playground snippets in a sandbox.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use playbox::{
    Config, EXAMPLE_CONFIG, Priority, RunRequest, RunScheduler, RunStatus, Snippet,
    SnippetRegistry, sandbox::program,
};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "playbox")]
#[command(about = "A tool for running playground snippets in a sandbox")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: playbox.toml)
        #[arg(short, long, default_value = "playbox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a snippet file
    Run {
        /// Snippet file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Entry point function (default: main)
        #[arg(short, long)]
        entry: Option<String>,

        /// Wall clock limit in milliseconds
        #[arg(short, long)]
        time_limit: Option<u64>,

        /// Memory budget in bytes
        #[arg(short, long)]
        memory_limit: Option<u64>,

        /// Submit with high priority
        #[arg(long)]
        high_priority: bool,
    },

    /// Parse a snippet file and list its entry points
    Check {
        /// Snippet file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            file,
            entry,
            time_limit,
            memory_limit,
            high_priority,
        } => {
            run_snippet(
                &config,
                &file,
                entry.as_deref(),
                time_limit,
                memory_limit,
                high_priority,
            )
            .await
        }
        Commands::Check { file } => check_snippet(&file).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_snippet(
    config: &Config,
    file: &Path,
    entry: Option<&str>,
    time_limit: Option<u64>,
    memory_limit: Option<u64>,
    high_priority: bool,
) -> Result<()> {
    let source = tokio::fs::read_to_string(file)
        .await
        .context("failed to read snippet file")?;

    let id = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snippet".to_string());

    let mut snippet = Snippet::new(&id, source);
    if let Some(entry) = entry {
        snippet = snippet.with_entry_point(entry);
    }
    if let Some(ms) = time_limit {
        snippet = snippet.with_timeout_ms(ms);
    }
    if let Some(bytes) = memory_limit {
        snippet = snippet.with_memory_cap_bytes(bytes);
    }

    let registry = Arc::new(SnippetRegistry::new(config.replace_policy));
    registry
        .register(snippet)
        .context("failed to register snippet")?;

    let scheduler = RunScheduler::new(config, Arc::clone(&registry));

    let mut request = RunRequest::new(&id);
    if high_priority {
        request = request.with_priority(Priority::High);
    }

    info!(snippet = %id, "running snippet");
    let result = scheduler.run(request).await.context("run failed")?;

    // Captured streams go to their own streams, keeping stdout clean for piping
    print!("{}", result.stdout_lossy());
    let stderr = result.stderr_lossy();
    if !stderr.is_empty() {
        eprint!("{stderr}");
    }

    info!(
        status = %result.status,
        duration_ms = result.duration.as_millis() as u64,
        "run finished"
    );
    if let Some(ref failure) = result.failure {
        eprintln!("{failure}");
    }

    match exit_code(result.status) {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}

/// Map a run status 1:1 to a process exit code
fn exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Completed => 0,
        RunStatus::Failed => 1,
        RunStatus::TimedOut => 124,
        RunStatus::Cancelled => 130,
    }
}

async fn check_snippet(file: &Path) -> Result<()> {
    let source = tokio::fs::read_to_string(file)
        .await
        .context("failed to read snippet file")?;

    match program::parse(&source) {
        Ok(program) => {
            println!("{} parses cleanly", file.display());
            println!("Entry points:");
            for name in program.entry_points() {
                println!("  {name}");
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("{}: {err}", file.display());
            std::process::exit(1);
        }
    }
}

fn show_config(config: &Config) {
    println!("Concurrency cap: {}", config.concurrency);
    println!("Queue wait: {} ms", config.queue_wait_ms);
    println!("Stop grace period: {} ms", config.grace_ms);
    println!("Replace policy: {:?}", config.replace_policy);
    println!();
    println!("Default limits:");
    println!("  Wall time: {:?} ms", config.default_limits.wall_time_ms);
    println!(
        "  Memory budget: {:?} bytes",
        config.default_limits.memory_cap_bytes
    );
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
