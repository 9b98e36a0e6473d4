mod common;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::FlakyEmbedder;
use review_lens::{
    error::{PipelineError, Result},
    nlp::embeddings::{embed_all, embed_with_retry, Embedder, EmbeddingOutcome, RetryPolicy},
};

#[tokio::test]
async fn five_failures_then_success() {
    let embedder = FlakyEmbedder::new(5);
    let outcome = embed_with_retry(&embedder, "text", "model", &RetryPolicy::immediate()).await;
    assert_eq!(outcome, EmbeddingOutcome::Embedded(vec![0.5, 0.25]));
    assert_eq!(embedder.calls(), 6);
}

#[tokio::test]
async fn gives_up_after_six_attempts() {
    let embedder = FlakyEmbedder::new(u32::MAX);
    let outcome = embed_with_retry(&embedder, "text", "model", &RetryPolicy::immediate()).await;
    match outcome {
        EmbeddingOutcome::Exhausted { attempts, last_error } => {
            assert_eq!(attempts, 6);
            assert!(last_error.contains("rate limited"));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(embedder.calls(), 6);
}

#[tokio::test]
async fn first_success_stops_retrying() {
    let embedder = FlakyEmbedder::new(0);
    let outcome = embed_with_retry(&embedder, "text", "model", &RetryPolicy::immediate()).await;
    assert!(outcome.vector().is_some());
    assert_eq!(embedder.calls(), 1);
}

/// Encodes the trailing number of the text; early inputs answer last.
struct NumberedEmbedder;

#[async_trait]
impl Embedder for NumberedEmbedder {
    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        let n: u64 = text
            .rsplit(' ')
            .next()
            .and_then(|tail| tail.parse().ok())
            .ok_or_else(|| PipelineError::Service(format!("no number in {text}")))?;
        tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(n))).await;
        Ok(vec![n as f32, 1.0])
    }
}

#[tokio::test]
async fn batch_results_align_with_inputs() {
    let texts: Vec<String> = (0..20).map(|i| format!("review {i}")).collect();
    let outcomes = embed_all(
        Arc::new(NumberedEmbedder),
        texts,
        "model",
        &RetryPolicy::immediate(),
        3,
    )
    .await;
    assert_eq!(outcomes.len(), 20);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.vector(), Some(&[i as f32, 1.0][..]), "row {i}");
    }
}

#[tokio::test]
async fn batch_calls_each_text_once() {
    let embedder = Arc::new(FlakyEmbedder::new(0));
    let texts: Vec<String> = (0..20).map(|i| format!("review {i}")).collect();
    let outcomes = embed_all(embedder.clone(), texts, "model", &RetryPolicy::immediate(), 3).await;
    assert!(outcomes.iter().all(|o| o.vector().is_some()));
    assert_eq!(embedder.calls(), 20);
}
