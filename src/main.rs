mod cli;
mod config;
mod context;
mod llm;
mod logging;
mod server;
mod tools;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;

use crate::config::{AppConfig, ConfigOverrides};
use crate::context::AppContext;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "finchat",
    version,
    about = "Chat-completion proxy with function calling (HTTP server or console)"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Default model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key (set via env OPENAI_API_KEY recommended)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log level or filter (error,warn,info,debug,trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Serve POST /v1/chat/completions
    Serve {
        /// Listen address
        #[arg(long)]
        addr: Option<String>,
    },
    /// Interactive console chat (default)
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Repl);

    // keep the console quiet so logs don't interleave with streamed text
    let default_level = match command {
        Command::Serve { .. } => "info",
        Command::Repl => "warn",
    };
    logging::init_logging(
        cli.log_level.as_deref(),
        default_level,
        cli.log_file.as_deref(),
    )?;

    let overrides = ConfigOverrides {
        base_url: cli.base_url,
        model: cli.model,
        api_key: cli.api_key,
        addr: match &command {
            Command::Serve { addr } => addr.clone(),
            Command::Repl => None,
        },
    };
    let cfg = AppConfig::from_cli(overrides)?;
    info!(base_url = %cfg.base_url, model = %cfg.model, "app config");

    let ctx = AppContext::from_config(cfg)?;
    match command {
        Command::Serve { .. } => {
            let addr = ctx.config.server.addr.clone();
            server::serve(ctx, &addr).await
        }
        Command::Repl => cli::run_console(ctx).await,
    }
}
