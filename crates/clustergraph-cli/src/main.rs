//! clustergraph
//!
//! Clusters chat messages into conversations and topics.
//!
//! # Usage
//!
//! ```bash
//! clustergraph process --input messages.json [--output result.json] [--force]
//! clustergraph search --input result.json --query "deploy failures" [--tag ops]
//! clustergraph cache clear
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/clustergraph/config.toml)
//! 3. Environment variables (CLUSTERGRAPH_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use clustergraph_cli::{
    clear_cache, init_logging, load_settings, process, search, CacheCommands, Cli, Commands,
    ProcessArgs, SearchArgs,
};
use clustergraph_orchestrator::SearchFilters;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Process {
            input,
            output,
            force,
            distance_threshold,
            min_cluster_size,
            include_embeddings,
            no_cache,
        } => {
            process(
                &settings,
                ProcessArgs {
                    input,
                    output,
                    force,
                    distance_threshold,
                    min_cluster_size,
                    include_embeddings,
                    no_cache,
                },
            )
            .await?;
        }
        Commands::Search {
            input,
            query,
            top_k,
            tags,
            clusters,
            clusters_only,
        } => {
            search(
                &settings,
                SearchArgs {
                    input,
                    query,
                    top_k,
                    filters: SearchFilters {
                        tags,
                        cluster_ids: clusters,
                    },
                    clusters_only,
                },
            )
            .await?;
        }
        Commands::Cache {
            command: CacheCommands::Clear,
        } => {
            let removed = clear_cache(&settings)?;
            println!("Removed {} cached result(s)", removed);
        }
    }

    Ok(())
}
