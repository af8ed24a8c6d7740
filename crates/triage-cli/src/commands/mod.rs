//! Subcommands

use clap::Subcommand;
use std::sync::Arc;
use triage_config::{CachedConfigProvider, ConfigProvider, EngineConfig, FileConfigProvider};

use crate::output::OutputFormat;
use crate::request::RequestArgs;

pub mod body_parts;
pub mod infer;
pub mod score;

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// List configured body parts and their buckets
    BodyParts,

    /// Score symptoms with the weight table and red-flag rules only
    Score {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Print the inference graph as a Mermaid flowchart
    Graph,

    /// Run full inference with evidence search and arbitration
    Infer {
        #[command(flatten)]
        request: RequestArgs,

        /// Continue from the request's checkpoint log
        #[arg(long)]
        resume: bool,
    },
}

pub async fn execute(
    command: Commands,
    settings: &EngineConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Commands::BodyParts => body_parts::execute(&config_provider(settings), format).await,
        Commands::Score { request } => {
            score::execute(&config_provider(settings), request.into_requests()?, format).await
        }
        Commands::Graph => {
            print!("{}", triage_engine::node::mermaid());
            Ok(())
        }
        Commands::Infer { request, resume } => {
            infer::execute(
                settings,
                config_provider(settings),
                request.into_requests()?,
                resume,
                format,
            )
            .await
        }
    }
}

fn config_provider(settings: &EngineConfig) -> Arc<dyn ConfigProvider> {
    Arc::new(CachedConfigProvider::new(Arc::new(FileConfigProvider::new(
        settings.data.dir.clone(),
    ))))
}
