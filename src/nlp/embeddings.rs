//! Embedding client with bounded retry and index-preserving fan-out.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::{error::Result, pool::map_bounded};

/// Anything that turns one text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;
}

/// Result of an embedding call after retries.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Embedded(Vec<f32>),
    /// Every attempt failed; downstream stages skip the item.
    Exhausted { attempts: u32, last_error: String },
}

impl EmbeddingOutcome {
    pub fn vector(&self) -> Option<&[f32]> {
        match self {
            Self::Embedded(v) => Some(v),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Embedded(v) => Some(v),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Randomised exponential backoff: after failed attempt `n` (0-based) wait
/// `uniform(1, min(cap, 2^n))` units.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub cap_units: f64,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            cap_units: 20.0,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same attempt count, no sleeps.
    pub fn immediate() -> Self {
        Self {
            unit: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Upper bound, in units, of the wait after failed attempt `attempt`.
    pub fn ceiling(&self, attempt: u32) -> f64 {
        2f64.powi(attempt.min(30) as i32).min(self.cap_units)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let units = if ceiling > 1.0 {
            rand::thread_rng().gen_range(1.0..=ceiling)
        } else {
            1.0
        };
        self.unit.mul_f64(units)
    }
}

/// Embed one text, retrying per `policy`. Never returns an error: exhaustion is
/// reported as [`EmbeddingOutcome::Exhausted`].
pub async fn embed_with_retry(
    embedder: &dyn Embedder,
    text: &str,
    model: &str,
    policy: &RetryPolicy,
) -> EmbeddingOutcome {
    let mut last_error = String::new();
    for attempt in 0..policy.max_attempts {
        match embedder.embed(text, model).await {
            Ok(vector) => {
                debug!(attempt = attempt + 1, dims = vector.len(), "embedded text");
                return EmbeddingOutcome::Embedded(vector);
            }
            Err(err) => {
                warn!(attempt = attempt + 1, max = policy.max_attempts, %err, "embedding request failed");
                last_error = err.to_string();
                if attempt + 1 < policy.max_attempts {
                    tokio::time::sleep(policy.delay(attempt)).await;
                }
            }
        }
    }
    warn!(attempts = policy.max_attempts, "giving up on embedding; returning no embedding");
    EmbeddingOutcome::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    }
}

/// Embed a batch concurrently; output is aligned with `texts`.
pub async fn embed_all(
    embedder: Arc<dyn Embedder>,
    texts: Vec<String>,
    model: &str,
    policy: &RetryPolicy,
    concurrency: usize,
) -> Vec<EmbeddingOutcome> {
    map_bounded(texts, concurrency, |text| {
        let embedder = embedder.clone();
        async move { embed_with_retry(embedder.as_ref(), &text, model, policy).await }
    })
    .await
}
