use anyhow::Result;
use clap::{Parser, Subcommand};
use kb_assist::commands::{ask, check, init_config, load_config};
use kb_assist::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kb-assist")]
#[command(about = "Answer support questions from an internal knowledge base, falling back to web search")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question; without QUERY, prompt for questions until an empty line
    Ask {
        /// Question to answer
        query: Option<String>,
        /// Number of internal results to return
        #[arg(long)]
        top_k: Option<usize>,
        /// Distance threshold; only results strictly below it are shown
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Check configuration, knowledge base and embedding provider
    Check {
        /// Also send a test query to the external search API
        #[arg(long)]
        probe_external: bool,
    },
    /// Configure embedding, retrieval and external search settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write a default config.toml without prompting
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Ask {
            query,
            top_k,
            threshold,
        } => {
            ask(config_dir, query, top_k, threshold).await?;
        }
        Commands::Check { probe_external } => {
            check(config_dir, probe_external)?;
        }
        Commands::Config { show, init } => {
            if show {
                show_config(&load_config(config_dir)?);
            } else if init {
                init_config(config_dir)?;
            } else {
                run_interactive_config(&get_config_dir(config_dir)?)?;
            }
        }
    }

    Ok(())
}
