//! dekomposit CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : single message or interactive chat with the agent
//! - `tools`  : list registered tools
//! - `config` : print the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "dekomposit",
    about = "dekomposit: a tool-calling language-learning agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Preferred target language for translations (code or name)
        #[arg(long)]
        target: Option<String>,
    },

    /// List registered tools and whether the model can see them
    Tools,

    /// Print the effective configuration (secrets omitted)
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,

        /// Print the config file path only
        #[arg(long, conflicts_with = "default")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { message, target } => commands::chat::run(message, target).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { default, path } => {
            if path {
                commands::config_cmd::path()?
            } else if default {
                commands::config_cmd::defaults()?
            } else {
                commands::config_cmd::show()?
            }
        }
    }

    Ok(())
}
