use std::path::PathBuf;

use clap::{Parser, Subcommand};
use incident_kb::Result;
use incident_kb::commands::{ask, check};
use incident_kb::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "incident-kb")]
#[command(about = "Match IT incident reports against a knowledge base of known fixes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure remote services and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Resolve an incident description to a known fix
    Ask {
        /// Free-text incident description
        text: String,
        /// Path to the knowledge base CSV (overrides the configured path)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Check configuration, credentials, and remote-service health
    Check,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ask { text, dataset } => {
            ask(&text, dataset)?;
        }
        Commands::Check => {
            check()?;
        }
    }

    Ok(())
}
