//! On-disk store of sentence-transformer files.
//!
//! The first load fetches whatever is missing from HuggingFace Hub; later
//! loads run offline from the same directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Repository used when the configuration names none.
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// File names a BERT checkpoint needs, in fetch order.
pub const MODEL_FILES: &[&str] = &[
    ModelFile::Config.file_name(),
    ModelFile::Tokenizer.file_name(),
    ModelFile::Weights.file_name(),
];

/// One of the files making up a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFile {
    Config,
    Tokenizer,
    Weights,
}

impl ModelFile {
    pub const ALL: [ModelFile; 3] = [ModelFile::Config, ModelFile::Tokenizer, ModelFile::Weights];

    pub const fn file_name(self) -> &'static str {
        match self {
            ModelFile::Config => "config.json",
            ModelFile::Tokenizer => "tokenizer.json",
            ModelFile::Weights => "model.safetensors",
        }
    }
}

/// Where the files of one repository live locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCache {
    /// Root shared by every cached repository
    pub cache_dir: PathBuf,
    /// HuggingFace repository, `org/name`
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("clustergraph")
            .join("models");
        Self::new(root, DEFAULT_MODEL_REPO)
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// `<root>/org_name` for repository `org/name`.
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    /// Last segment of the repository id, reported as the model name.
    pub fn model_name(&self) -> &str {
        match self.repo_id.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => name,
            _ => &self.repo_id,
        }
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }

    pub fn paths(&self) -> ModelPaths {
        ModelPaths::in_dir(&self.model_dir())
    }

    /// Files not yet present locally.
    pub fn missing_files(&self) -> Vec<ModelFile> {
        let paths = self.paths();
        ModelFile::ALL
            .into_iter()
            .filter(|file| !paths.get(*file).is_file())
            .collect()
    }

    pub fn is_cached(&self) -> bool {
        self.missing_files().is_empty()
    }
}

/// Resolved locations of a checkpoint's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(ModelFile::Config.file_name()),
            tokenizer: dir.join(ModelFile::Tokenizer.file_name()),
            weights: dir.join(ModelFile::Weights.file_name()),
        }
    }

    pub fn get(&self, file: ModelFile) -> &Path {
        match file {
            ModelFile::Config => &self.config,
            ModelFile::Tokenizer => &self.tokenizer,
            ModelFile::Weights => &self.weights,
        }
    }
}

/// Resolve the checkpoint, fetching only the files that are missing.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    let missing = cache.missing_files();
    if missing.is_empty() {
        debug!(dir = %cache.model_dir().display(), "Model files present");
    } else {
        info!(repo = %cache.repo_id, missing = missing.len(), "Fetching model files");
        fetch(cache, &missing)?;
    }
    Ok(cache.paths())
}

fn fetch(cache: &ModelCache, files: &[ModelFile]) -> Result<(), EmbeddingError> {
    let api = hf_hub::api::sync::Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());
    let target = cache.paths();
    std::fs::create_dir_all(cache.model_dir())?;

    for file in files {
        let name = file.file_name();
        let fetched = repo
            .get(name)
            .map_err(|e| EmbeddingError::Download(format!("{name}: {e}")))?;
        std::fs::copy(&fetched, target.get(*file))?;
        debug!(file = name, "Stored model file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_points_at_minilm() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.ends_with("clustergraph/models"));
        assert_eq!(cache.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_repo_layout() {
        let cache = ModelCache::new("/tmp/models", "org/name");
        assert_eq!(cache.model_dir(), PathBuf::from("/tmp/models/org_name"));
        assert_eq!(cache.model_name(), "name");
        assert_eq!(
            cache.paths().weights,
            PathBuf::from("/tmp/models/org_name/model.safetensors")
        );

        let bare = ModelCache::new("/tmp/models", "local-model");
        assert_eq!(bare.model_name(), "local-model");
    }

    #[test]
    fn test_missing_files_shrinks_as_files_appear() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "test/model");
        assert_eq!(cache.missing_files(), ModelFile::ALL.to_vec());

        std::fs::create_dir_all(cache.model_dir()).unwrap();
        std::fs::write(cache.file_path("config.json"), b"{}").unwrap();
        std::fs::write(cache.file_path("tokenizer.json"), b"{}").unwrap();
        assert_eq!(cache.missing_files(), vec![ModelFile::Weights]);
        assert!(!cache.is_cached());

        std::fs::write(cache.file_path("model.safetensors"), b"").unwrap();
        assert!(cache.is_cached());
        assert_eq!(get_or_download_model(&cache).unwrap(), cache.paths());
    }

    #[test]
    fn test_model_files_constant_matches_enum() {
        let names: Vec<_> = ModelFile::ALL.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, MODEL_FILES);
    }
}
