//! Command implementations for the clustergraph binary.
//!
//! Handles:
//! - process: load messages, run the pipeline, write the result
//! - search: rank messages or clusters of a saved result against a query
//! - cache clear: drop every cached result

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use clustergraph_cache::{CacheStore, FileCacheStore};
use clustergraph_embeddings::{CandleEmbedder, ModelCache};
use clustergraph_orchestrator::{Orchestrator, PipelineOptions, SearchFilters};
use clustergraph_topics::KeywordLabeler;
use clustergraph_types::{ClusteringOutput, Message, Settings};

/// Arguments of the `process` command.
#[derive(Debug, Clone)]
pub struct ProcessArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub force: bool,
    pub distance_threshold: Option<f32>,
    pub min_cluster_size: Option<usize>,
    pub include_embeddings: bool,
    pub no_cache: bool,
}

/// Arguments of the `search` command.
#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub input: PathBuf,
    pub query: String,
    pub top_k: usize,
    pub filters: SearchFilters,
    pub clusters_only: bool,
}

/// Accepted shapes of a messages file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessagesFile {
    List(Vec<Message>),
    Wrapped { messages: Vec<Message> },
}

/// Load configuration (defaults -> file -> env) and apply the log level flag.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Read a JSON array of messages, or an object with a `messages` array.
pub fn read_messages(path: &Path) -> Result<Vec<Message>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read messages from {}", path.display()))?;
    let file: MessagesFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid messages file {}", path.display()))?;
    Ok(match file {
        MessagesFile::List(messages) | MessagesFile::Wrapped { messages } => messages,
    })
}

/// Read the output of a previous `process` run.
pub fn read_output(path: &Path) -> Result<ClusteringOutput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read result from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid result file {}", path.display()))
}

/// Pretty-print `value` to `path`, or to stdout.
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote output");
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Build an orchestrator over the local embedder and keyword labeler.
async fn build_orchestrator(settings: &Settings, use_cache: bool) -> Result<Orchestrator> {
    let model_cache = ModelCache::new(
        settings.expanded_model_cache_dir(),
        settings.embedding.model_repo.clone(),
    );
    info!(model = %settings.embedding.model_repo, "Loading embedding model");

    // Model download and load are blocking
    let embedder = tokio::task::spawn_blocking(move || CandleEmbedder::load(&model_cache))
        .await
        .context("Model loading task failed")?
        .context("Failed to load embedding model")?;

    let labeler = KeywordLabeler::new(&settings.labeling);
    let mut orchestrator =
        Orchestrator::new(Arc::new(embedder), Arc::new(labeler), settings.clone());

    if use_cache && settings.cache.enabled {
        let dir = settings.expanded_cache_dir();
        info!(dir = %dir.display(), "Using result cache");
        orchestrator = orchestrator.with_cache(Arc::new(FileCacheStore::new(dir)));
    }
    Ok(orchestrator)
}

/// Run the `process` command.
pub async fn process(settings: &Settings, args: ProcessArgs) -> Result<()> {
    let messages = read_messages(&args.input)?;
    info!(count = messages.len(), input = %args.input.display(), "Loaded messages");

    let orchestrator = build_orchestrator(settings, !args.no_cache)
        .await?
        .with_options(PipelineOptions {
            include_embeddings: args.include_embeddings,
        });

    let output = orchestrator
        .process_messages(
            messages,
            args.force,
            args.distance_threshold,
            args.min_cluster_size,
        )
        .await
        .context("Clustering failed")?;

    write_json(&output, args.output.as_deref())
}

/// Run the `search` command.
pub async fn search(settings: &Settings, args: SearchArgs) -> Result<()> {
    let result = read_output(&args.input)?;
    let orchestrator = build_orchestrator(settings, false).await?;

    if args.clusters_only {
        let hits = orchestrator
            .search_clusters(&args.query, &result.clusters, args.top_k)
            .await
            .context("Cluster search failed")?;
        return write_json(&hits, None);
    }

    let hits = orchestrator
        .search(
            &args.query,
            &result.messages_with_tags,
            &args.filters,
            args.top_k,
        )
        .await
        .context("Search failed")?;
    write_json(&hits, None)
}

/// Run `cache clear`, returning the number of removed entries.
pub fn clear_cache(settings: &Settings) -> Result<usize> {
    let store = FileCacheStore::new(settings.expanded_cache_dir());
    let removed = store.clear().context("Failed to clear cache")?;
    info!(removed, dir = %store.dir().display(), "Cleared result cache");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_messages_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("msgs.json");
        fs::write(
            &path,
            r#"[{"text": "hi", "channel": "general", "user": "u1", "timestamp": "2025-11-14T10:00:00Z"}]"#,
        )
        .unwrap();

        let messages = read_messages(&path).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel.as_deref(), Some("general"));
    }

    #[test]
    fn test_read_messages_wrapped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("msgs.json");
        fs::write(
            &path,
            r#"{"messages": [{"text": "hi", "timestamp": "1731578400.000100"}]}"#,
        )
        .unwrap();

        let messages = read_messages(&path).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].channel.is_none());
    }

    #[test]
    fn test_read_messages_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("msgs.json");
        fs::write(&path, "{\"nope\": 1}").unwrap();
        assert!(read_messages(&path).is_err());
        assert!(read_messages(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_write_json_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json(&vec![1, 2, 3], Some(&path)).unwrap();

        let back: Vec<i32> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_clear_cache_counts_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("abc123.json"), "{}").unwrap();
        fs::write(dir.path().join("def456.json"), "{}").unwrap();

        let mut settings = Settings::default();
        settings.cache.dir = dir.path().to_string_lossy().to_string();

        assert_eq!(clear_cache(&settings).unwrap(), 2);
        assert_eq!(clear_cache(&settings).unwrap(), 0);
    }

    #[test]
    fn test_load_settings_log_level_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[clustering]\nmax_topics = 7\n").unwrap();

        let settings = load_settings(path.to_str(), Some("debug")).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.clustering.max_topics, 7);
    }
}
