//! Runtime configuration utilities for review-lens.

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;

use crate::{clusters::Linkage, nlp::embeddings::RetryPolicy};

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bearer token for the OpenAI-compatible API. Empty when unset.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    pub embedding_model: String,
    pub completion_model: String,
    /// Sampling temperature used for cluster labels.
    pub label_temperature: f32,
    /// Root folder for the file-backed document store.
    pub data_dir: PathBuf,
    /// Root folder for exported reports.
    pub outputs_dir: PathBuf,
    /// Maximum in-flight requests against the external APIs.
    pub max_concurrency: usize,
    /// Maximum number of writes the store accepts in one batch.
    pub store_batch_limit: usize,
    /// Reviews with fewer words after punctuation stripping are discarded.
    pub min_review_words: usize,
    pub default_clusters: usize,
    /// Extract per-review attributes and cluster each attribute separately.
    pub attribute_analysis: bool,
    /// Upper bound on clusters per attribute.
    pub attribute_clusters: usize,
    /// Length of one backoff "time unit" in milliseconds.
    pub retry_unit_ms: u64,
    pub http_timeout_secs: u64,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let openai_base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let embedding_model =
            env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-ada-002".to_string());
        let completion_model =
            env::var("COMPLETION_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let outputs_dir = env::var("OUTPUTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./outputs"));

        std::fs::create_dir_all(&data_dir).context("creating data dir")?;
        std::fs::create_dir_all(&outputs_dir).context("creating outputs dir")?;

        let settings = Self {
            openai_api_key,
            openai_base_url,
            embedding_model,
            completion_model,
            label_temperature: env_or("LABEL_TEMPERATURE", 0.0),
            data_dir,
            outputs_dir,
            max_concurrency: env_or("MAX_CONCURRENCY", 8),
            store_batch_limit: env_or("STORE_BATCH_LIMIT", 500),
            min_review_words: env_or("MIN_REVIEW_WORDS", 6),
            default_clusters: env_or("DEFAULT_CLUSTERS", 3),
            attribute_analysis: env_or("ATTRIBUTE_ANALYSIS", true),
            attribute_clusters: env_or("ATTRIBUTE_CLUSTERS", 2),
            retry_unit_ms: env_or("RETRY_UNIT_MS", 1000),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 60),
        };
        anyhow::ensure!(settings.max_concurrency > 0, "MAX_CONCURRENCY must be positive");
        anyhow::ensure!(
            settings.attribute_clusters > 0,
            "ATTRIBUTE_CLUSTERS must be positive"
        );
        anyhow::ensure!(
            settings.store_batch_limit > 0,
            "STORE_BATCH_LIMIT must be positive"
        );
        Ok(settings)
    }

    /// Fail early for commands that call the external APIs.
    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        let key = self.openai_api_key.trim();
        anyhow::ensure!(!key.is_empty(), "OPENAI_API_KEY is not set");
        Ok(key)
    }

    /// Convenience helper for derived path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Convenience helper for derived output path segments.
    pub fn join_output<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.outputs_dir.join(path)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Pipeline knobs derived from the environment.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            embedding_model: self.embedding_model.clone(),
            completion_model: self.completion_model.clone(),
            label_temperature: self.label_temperature,
            max_concurrency: self.max_concurrency,
            min_review_words: self.min_review_words,
            retry: RetryPolicy {
                unit: Duration::from_millis(self.retry_unit_ms),
                ..RetryPolicy::default()
            },
            linkage: Linkage::default(),
            attribute_analysis: self.attribute_analysis,
            attribute_clusters: self.attribute_clusters,
        }
    }
}

/// Knobs consumed by [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub embedding_model: String,
    pub completion_model: String,
    pub label_temperature: f32,
    pub max_concurrency: usize,
    pub min_review_words: usize,
    pub retry: RetryPolicy,
    pub linkage: Linkage,
    pub attribute_analysis: bool,
    pub attribute_clusters: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-ada-002".into(),
            completion_model: "gpt-3.5-turbo".into(),
            label_temperature: 0.0,
            max_concurrency: 8,
            min_review_words: 6,
            retry: RetryPolicy::default(),
            linkage: Linkage::default(),
            attribute_analysis: true,
            attribute_clusters: 2,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
