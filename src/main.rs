use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use narrate::diff::DiffStrategy;
use narrate::narrate_config::CliOverrides;
use narrate::tracker::TrackingMode;

mod cmd;

#[derive(Parser)]
#[command(name = "narrate")]
#[command(version, about = "Live commentary on your edits from a local model")]
pub struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a directory and comment on every saved change
    Watch {
        /// Directory to watch
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Only watch files matching this glob (repeatable; replaces [watch] patterns)
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,

        /// Model name
        #[arg(short, long, env = "NARRATE_MODEL")]
        model: Option<String>,

        /// Model server base URL
        #[arg(long, env = "NARRATE_ENDPOINT")]
        endpoint: Option<String>,

        /// Tracking mode: cache or snapshot
        #[arg(long)]
        mode: Option<TrackingMode>,

        /// Diff strategy: positional or lcs
        #[arg(long)]
        diff: Option<DiffStrategy>,

        /// Fragments remembered per file
        #[arg(long)]
        cache_size: Option<usize>,

        /// Added lines that reset a file's baseline
        #[arg(long)]
        reset_threshold: Option<usize>,
    },
    /// View or validate configuration
    Config {
        /// Directory whose .narrate/narrate.toml is used
        #[arg(long, global = true)]
        dir: Option<PathBuf>,

        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default narrate.toml file
    Init,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "narrate=debug" } else { "narrate=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Watch {
            dir,
            patterns,
            model,
            endpoint,
            mode,
            diff,
            cache_size,
            reset_threshold,
        } => {
            let overrides = CliOverrides {
                endpoint,
                model,
                mode,
                diff,
                cache_size,
                reset_threshold,
                patterns,
            };
            cmd::cmd_watch(&dir, overrides).await?;
        }
        Commands::Config { dir, command } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir().context("Failed to get current directory")?,
            };
            cmd::cmd_config(&dir, command)?;
        }
    }

    Ok(())
}
