//! branchwatch CLI.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "branchwatch")]
#[command(about = "Build changed branches of watched repositories", long_about = None)]
struct Cli {
    /// System configuration file (KDL). A missing default file means built-in defaults.
    #[arg(long, global = true, env = "BRANCHWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent build workers
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Repo list file
    #[arg(long, global = true)]
    repos: Option<PathBuf>,

    /// Result cache file
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass: build every changed branch, then exit
    Run,
    /// Run passes repeatedly until interrupted
    Watch {
        /// Seconds between passes (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Show the jobs the next pass would dispatch, without building
    Plan,
    /// Print the result cache
    Status,
    /// Check the configuration and repo list
    Validate,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let overrides = commands::Overrides {
        config: cli.config,
        workers: cli.workers,
        repos: cli.repos,
        cache: cli.cache,
    };

    match cli.command {
        Commands::Run => commands::run::run(&overrides).await?,
        Commands::Watch { interval } => commands::run::watch(&overrides, interval).await?,
        Commands::Plan => commands::plan::plan(&overrides).await?,
        Commands::Status => commands::status::status(&overrides)?,
        Commands::Validate => commands::validate::validate(&overrides)?,
    }

    Ok(())
}
