//! Modelport binary.
//!
//! Entry point for the modelport CLI: registry listing, deployment
//! planning, and endpoint invocation.

use std::path::PathBuf;

use clap::Parser;
use modelport_core::{
    cli::commands::Commands,
    cli::handlers::{handle_invoke, handle_models, handle_plan},
    config::AppConfig,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "modelport_core=debug"
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::WARN.into())
                .parse_lossy(cli.log_filter.as_deref().unwrap_or("modelport_core=info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let app = AppConfig::load(cli.config.as_deref())?;
    debug!(region = %app.region, "configuration loaded");

    match cli.command {
        Commands::Models(cmd) => handle_models(cmd, app).await,
        Commands::Plan(cmd) => handle_plan(cmd, app).await,
        Commands::Invoke(cmd) => handle_invoke(cmd, app).await,
    }
}
