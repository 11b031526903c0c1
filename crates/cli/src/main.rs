//! CloudPilot CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP gateway
//! - `ask`     Run one command in agent or direct mode
//! - `tools`   List the tool catalog
//! - `config`  Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "cloudpilot",
    about = "CloudPilot: ask about your AWS control plane in plain language",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to load instead of the default search path
    #[arg(short, long, global = true, env = "CLOUDPILOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single command and print the answer
    Ask {
        /// What to ask, in plain language
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Target AWS account id (12 digits)
        #[arg(short, long)]
        account: Option<String>,

        /// Conversation session id
        #[arg(short, long)]
        session: Option<String>,

        /// Resolve to one action and run one tool instead of the agent loop
        #[arg(short, long)]
        direct: bool,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the tools the agent can call
    Tools,

    /// Print the effective configuration with secrets redacted
    Config {
        /// Print only the default config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            text,
            account,
            session,
            direct,
            json,
        } => {
            commands::ask::run(config_path, text.join(" "), account, session, direct, json).await?
        }
        Commands::Tools => commands::tools::run(config_path).await?,
        Commands::Config { path } => commands::config_cmd::run(config_path, path)?,
    }

    Ok(())
}
