//! Configuration loading for clustergraph.
//!
//! Layered config: defaults -> config file -> CLI-given file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/clustergraph/config.{toml,json,yaml}.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ClusterGraphError;

/// How members of an undersized group are reassigned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmallGroupPolicy {
    /// Merge into the smallest surviving label (inherited behaviour, may attach
    /// unrelated members to an arbitrary group)
    #[default]
    SmallestLabel,
    /// Merge into the surviving group whose centroid is most similar
    NearestCentroid,
}

/// What the conversation grouper does with unparsable timestamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Fail the grouping with the offending message index
    #[default]
    Reject,
    /// Substitute the run's wall-clock time and report the substituted indices
    WallClock,
}

/// Clustering parameters for both hierarchy levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Ward merge height above which topic groups are kept apart
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,

    /// Minimum conversations per topic
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Upper bound on the number of topics
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    /// Time gap (seconds) that starts a new conversation
    #[serde(default = "default_conversation_gap_secs")]
    pub conversation_gap_secs: i64,

    /// Minimum messages per conversation (1 keeps every conversation)
    #[serde(default = "default_min_conversation_size")]
    pub min_conversation_size: usize,

    /// Reassignment rule for undersized groups
    #[serde(default)]
    pub small_group_policy: SmallGroupPolicy,

    /// Handling of unparsable timestamps
    #[serde(default)]
    pub timestamp_policy: TimestampPolicy,
}

fn default_distance_threshold() -> f32 {
    1.5
}

fn default_min_cluster_size() -> usize {
    3
}

fn default_max_topics() -> usize {
    15
}

fn default_conversation_gap_secs() -> i64 {
    3600
}

fn default_min_conversation_size() -> usize {
    1
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            min_cluster_size: default_min_cluster_size(),
            max_topics: default_max_topics(),
            conversation_gap_secs: default_conversation_gap_secs(),
            min_conversation_size: default_min_conversation_size(),
            small_group_policy: SmallGroupPolicy::default(),
            timestamp_policy: TimestampPolicy::default(),
        }
    }
}

impl ClusteringConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(format!(
                "distance_threshold must be a finite value >= 0, got {}",
                self.distance_threshold
            ));
        }
        if self.min_cluster_size == 0 {
            return Err("min_cluster_size must be >= 1".to_string());
        }
        if self.max_topics == 0 {
            return Err("max_topics must be >= 1".to_string());
        }
        if self.conversation_gap_secs < 0 {
            return Err(format!(
                "conversation_gap_secs must be >= 0, got {}",
                self.conversation_gap_secs
            ));
        }
        if self.min_conversation_size == 0 {
            return Err("min_conversation_size must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// HuggingFace model repository
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Texts per encode batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seed passed to the provider
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Local directory for downloaded model files
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: String,
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_seed() -> u64 {
    42
}

fn default_model_cache_dir() -> String {
    project_cache_dir("models")
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_repo: default_model_repo(),
            batch_size: default_batch_size(),
            seed: default_seed(),
            model_cache_dir: default_model_cache_dir(),
        }
    }
}

/// Label generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelingConfig {
    /// Representative messages sampled per topic
    #[serde(default = "default_representative_count")]
    pub representative_count: usize,

    /// Tags requested per topic
    #[serde(default = "default_num_tags")]
    pub num_tags: usize,

    /// Concurrent label generator calls
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Use the keyword fallback when the label generator fails
    #[serde(default = "default_true")]
    pub fallback_on_error: bool,

    /// Conversations up to this many messages are labelled by their first message
    #[serde(default = "default_short_conversation_len")]
    pub short_conversation_len: usize,

    /// Truncation length for first-message conversation labels
    #[serde(default = "default_conversation_label_chars")]
    pub conversation_label_chars: usize,

    /// Maximum label length
    #[serde(default = "default_max_label_length")]
    pub max_label_length: usize,
}

fn default_representative_count() -> usize {
    10
}

fn default_num_tags() -> usize {
    5
}

fn default_max_workers() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_short_conversation_len() -> usize {
    3
}

fn default_conversation_label_chars() -> usize {
    60
}

fn default_max_label_length() -> usize {
    50
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            representative_count: default_representative_count(),
            num_tags: default_num_tags(),
            max_workers: default_max_workers(),
            fallback_on_error: default_true(),
            short_conversation_len: default_short_conversation_len(),
            conversation_label_chars: default_conversation_label_chars(),
            max_label_length: default_max_label_length(),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding `{key}.json` entries
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

fn default_cache_dir() -> String {
    project_cache_dir("results")
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            dir: default_cache_dir(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub labeling: LabelingConfig,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn project_cache_dir(leaf: &str) -> String {
    ProjectDirs::from("", "", "clustergraph")
        .map(|p| p.cache_dir().join(leaf))
        .unwrap_or_else(|| PathBuf::from(".cache").join(leaf))
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clustering: ClusteringConfig::default(),
            embedding: EmbeddingSettings::default(),
            labeling: LabelingConfig::default(),
            cache: CacheSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/clustergraph/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CLUSTERGRAPH_*, nested keys split on `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ClusterGraphError> {
        let config_dir = ProjectDirs::from("", "", "clustergraph")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())?
            .set_default("cache.dir", default_cache_dir())?
            .set_default("embedding.model_cache_dir", default_model_cache_dir())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: CLUSTERGRAPH_LOG_LEVEL, CLUSTERGRAPH_CLUSTERING__MAX_TOPICS, ...
        builder = builder.add_source(
            Environment::with_prefix("CLUSTERGRAPH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ClusterGraphError> {
        self.clustering.validate().map_err(ClusterGraphError::Config)?;
        if self.embedding.batch_size == 0 {
            return Err(ClusterGraphError::Config(
                "embedding.batch_size must be >= 1".to_string(),
            ));
        }
        if self.labeling.max_workers == 0 {
            return Err(ClusterGraphError::Config(
                "labeling.max_workers must be >= 1".to_string(),
            ));
        }
        if self.labeling.representative_count == 0 {
            return Err(ClusterGraphError::Config(
                "labeling.representative_count must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache directory with a leading `~/` expanded.
    pub fn expanded_cache_dir(&self) -> PathBuf {
        expand_home(&self.cache.dir)
    }

    /// Model directory with a leading `~/` expanded.
    pub fn expanded_model_cache_dir(&self) -> PathBuf {
        expand_home(&self.embedding.model_cache_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
