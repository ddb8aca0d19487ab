//! CLI argument parsing for clustergraph.
//!
//! Flags override every other configuration source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cluster chat messages into conversations and topics.
#[derive(Parser, Debug)]
#[command(name = "clustergraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/clustergraph/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster a JSON file of messages
    Process {
        /// Messages file: a JSON array, or an object with a `messages` array
        #[arg(short, long)]
        input: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Recompute even when a cached result exists
        #[arg(short, long)]
        force: bool,

        /// Override the topic distance threshold
        #[arg(long)]
        distance_threshold: Option<f32>,

        /// Override the minimum conversations per topic
        #[arg(long)]
        min_cluster_size: Option<usize>,

        /// Attach message embeddings to the output
        #[arg(long)]
        include_embeddings: bool,

        /// Neither read nor write the result cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Search a clustering result
    Search {
        /// Output file of a previous `process` run
        #[arg(short, long)]
        input: PathBuf,

        /// Free-text query
        #[arg(short, long)]
        query: String,

        /// Number of results
        #[arg(short = 'k', long, default_value_t = 10)]
        top_k: usize,

        /// Only messages with this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only messages in this conversation or topic (repeatable)
        #[arg(long = "cluster")]
        clusters: Vec<String>,

        /// Rank clusters instead of messages
        #[arg(long)]
        clusters_only: bool,
    },

    /// Result cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Remove every cached result
    Clear,
}
