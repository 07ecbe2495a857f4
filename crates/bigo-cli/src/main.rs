//! BigO CLI - classify coding tasks and route them to the cheapest capable model.

mod commands;
mod config;
mod workers;

use std::path::PathBuf;

use bigo_core::Tier;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::RunArgs;

/// BigO - tiered task routing for coding agents
#[derive(Parser)]
#[command(name = "bigo")]
#[command(about = "Classify coding tasks and route them to local or hosted models", long_about = None)]
struct Cli {
    /// Project directory containing .bigo/
    #[arg(short = 'C', long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize BigO in the project directory
    Init,

    /// Classify a task and execute it on the routed backend
    Run {
        /// Task description
        #[arg(required = true, num_args = 1..)]
        task: Vec<String>,

        /// Extra details passed to the worker
        #[arg(short, long, default_value = "")]
        details: String,

        /// Force a tier instead of classifying (trivial..critical or t0..t4)
        #[arg(short, long)]
        tier: Option<Tier>,

        /// Show the routing decision without executing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Show the tier a task would be classified into
    Classify {
        /// Task description
        #[arg(required = true, num_args = 1..)]
        task: Vec<String>,
    },

    /// Show ledger statistics and recent tasks
    Status {
        /// Number of recent tasks to list
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Print the effective configuration
    Config,

    /// Print version information
    Version,
}

fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Init => {
            commands::init(&cli.dir)?;
        }
        Commands::Run {
            task,
            details,
            tier,
            dry_run,
        } => {
            let args = RunArgs {
                title: task.join(" "),
                description: details,
                tier,
                dry_run,
            };
            if !commands::run(&cli.dir, args).await? {
                std::process::exit(1);
            }
        }
        Commands::Classify { task } => {
            commands::classify(&cli.dir, &task.join(" "))?;
        }
        Commands::Status { limit } => {
            commands::status(&cli.dir, limit)?;
        }
        Commands::Config => {
            commands::show_config(&cli.dir)?;
        }
        Commands::Version => {
            println!("bigo {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
