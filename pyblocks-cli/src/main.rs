mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pyblocks_sandbox::AppConfig;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser)]
#[command(name = "pyblocks")]
#[command(about = "Run block-built Python programs in a sandboxed interpreter")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.config/pyblocks/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging (also mirrors the log to stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory the log file is written to
    #[arg(long, global = true, default_value = ".")]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive console (default if no subcommand provided)
    Console {
        /// Run this file instead of the stored program
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Store a program as the current one, as the block editor would
    Save {
        /// File containing the generated Python source
        path: PathBuf,
    },
    /// Print the stored program with line numbers
    Show,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.log_dir, cli.verbose);

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load().context("Failed to load config")?,
    };
    if cli.config.is_some() {
        config.apply_env_overrides();
    }

    match cli.command {
        Some(Commands::Console { file }) => commands::run_console(config, file).await,
        Some(Commands::Save { path }) => commands::save_program(&config, &path),
        Some(Commands::Show) => commands::show_program(&config),
        Some(Commands::Config) => commands::show_config(&config),
        None => commands::run_console(config, None).await,
    }
}

/// Log to a file, and to stderr as well when verbose
fn init_logging(log_dir: &std::path::Path, verbose: bool) -> WorkerGuard {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "info" };

    let file_appender = tracing_appender::rolling::never(log_dir, "pyblocks.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "pyblocks={},pyblocks_sandbox={},pyblocks_common={}",
                    log_level, log_level, log_level
                ))
            }),
        )
        .init();

    guard
}
