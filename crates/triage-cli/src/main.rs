//! Triage CLI - bucket inference from the terminal
//!
//! - `body-parts`: list the configured body parts and their buckets
//! - `score`: run the deterministic weight path and red-flag gate only
//! - `graph`: print the inference graph as a Mermaid flowchart
//! - `infer`: run the full graph, including evidence search and arbitration

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_config::EngineConfig;

mod commands;
mod output;
mod request;

use commands::Commands;

/// Triage CLI
#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Musculoskeletal bucket inference", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, env = "TRIAGE_CONFIG")]
    config: Option<String>,

    /// Body-part data directory, overrides `data.dir`
    #[arg(short, long, env = "TRIAGE_DATA_DIR")]
    data_dir: Option<String>,

    /// Log level or filter directive, overrides `logging.level`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = EngineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        settings.data.dir = dir.into();
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    settings.logging.json |= cli.json_logs;

    init_tracing(&settings);

    commands::execute(cli.command, &settings, cli.output).await
}

fn init_tracing(settings: &EngineConfig) {
    // Logs go to stderr so stdout stays machine-readable.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| settings.logging.level.clone().into());

    if settings.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
