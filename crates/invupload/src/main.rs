//! invupload
//!
//! Generates inventory report slices for the cloud inventory service and
//! supervises the external commands that produce and upload them

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;

/// Inventory report generation and upload
#[derive(Parser, Debug)]
#[command(name = "invupload", version, about)]
struct Args {
    /// Configuration file (defaults to `INVUPLOAD_CONFIG` or the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a batch of hosts as one report slice
    Generate {
        /// JSON file holding an array of hosts
        #[arg(long)]
        hosts: PathBuf,

        /// Slice id (random UUID when omitted)
        #[arg(long)]
        slice_id: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run an external command and stream its output
    Run {
        /// Progress label
        #[arg(long, default_value = "invupload")]
        label: String,

        /// Extra environment variable (`KEY=VALUE`), repeatable
        #[arg(short, long = "env", value_parser = commands::parse_env_pair)]
        env: Vec<(String, String)>,

        /// Kill the command after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    let config_path = args.config.clone().or_else(Config::locate);
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &config_path {
        Some(path) => debug!(path = %path.display(), "loaded config"),
        None => warn!("no config file found, using defaults"),
    }

    match args.command {
        Command::Generate {
            hosts,
            slice_id,
            output,
        } => commands::generate(&config, &hosts, slice_id, output.as_deref()),
        Command::Run {
            label,
            env,
            timeout_secs,
            command,
        } => commands::run(&label, command, env, timeout_secs).await,
    }
}
