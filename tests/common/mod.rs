//! Fakes and fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use async_trait::async_trait;
use review_lens::{
    config::PipelineConfig,
    data::{
        memory::MemoryStore,
        store::{child_path, to_document, DocumentStore},
        PRODUCTS, REVIEWS,
    },
    error::{PipelineError, Result},
    nlp::{
        completion::{CompletionRequest, CompletionService},
        embeddings::{Embedder, RetryPolicy},
    },
    pipeline::Pipeline,
};
use serde_json::json;

pub const ASIN_A: &str = "B000000001";
pub const ASIN_B: &str = "B000000002";

/// Maps texts onto three well separated topic centres.
pub struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        let jitter = (text.len() % 7) as f32 * 0.01;
        let vector = if text.contains("battery") {
            vec![10.0 + jitter, 0.0, 0.0]
        } else if text.contains("zipper") {
            vec![0.0, 10.0 + jitter, 0.0]
        } else {
            vec![0.0, 0.0, 10.0 + jitter]
        };
        Ok(vector)
    }
}

/// Fails the first `failures` calls, then returns a fixed vector.
pub struct FlakyEmbedder {
    pub failures: u32,
    pub calls: AtomicU32,
}

impl FlakyEmbedder {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(PipelineError::Service(format!("rate limited on call {call}")))
        } else {
            Ok(vec![0.5, 0.25])
        }
    }
}

/// Always answers with a well-formed label.
pub struct FixedLabeler;

#[async_trait]
impl CompletionService for FixedLabeler {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Ok(json!({ "clusterLabel": "customers talk about the same issue" }).to_string())
    }
}

/// Answers every forced function call with a canned payload chosen from the prompt.
pub struct ScriptedCompletion;

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let name = request
            .function
            .as_ref()
            .map(|f| f.name.clone())
            .unwrap_or_default();
        let prompt = request.prompt.to_lowercase();
        let payload = match name.as_str() {
            "reviewData" if prompt.contains("battery") => json!({
                "reviewSummary": "battery is weak",
                "issues": "battery drains overnight",
                "quality": "not mentioned"
            }),
            "reviewData" if prompt.contains("zipper") => json!({
                "issues": "zipper snaps on trips",
                "durability": "fell apart fast",
                "season": "N/A"
            }),
            "reviewData" => json!({ "reviewSummary": "pairing is flaky", "issues": "unknown" }),
            "productSummary" => json!({
                "productSummary": "rechargeable travel speaker with a carry bag",
                "productSummaryOutliers": ""
            }),
            "problemStatement" => json!({
                "problemIdentification": "hardware wears out early",
                "problemStatement": "Customers report parts failing within weeks.",
                "customerVoiceExamples": ["it broke on the second trip"]
            }),
            _ => json!({ "clusterLabel": "customers talk about the same issue" }),
        };
        Ok(payload.to_string())
    }
}

pub struct DownLabeler;

#[async_trait]
impl CompletionService for DownLabeler {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Err(PipelineError::Service("completion service unavailable".into()))
    }
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::immediate(),
        max_concurrency: 4,
        attribute_analysis: false,
        ..PipelineConfig::default()
    }
}

pub fn pipeline_with(
    store: Arc<MemoryStore>,
    embedder: Arc<dyn Embedder>,
    labeler: Arc<dyn CompletionService>,
) -> Pipeline {
    Pipeline::new(store, embedder, labeler, test_config())
}

pub async fn seed_product(store: &MemoryStore, asin: &str, reviews: &[(String, String, u8)]) {
    store
        .set(PRODUCTS, asin, to_document(&json!({ "asin": asin })).unwrap(), false)
        .await
        .unwrap();
    for (id, text, rating) in reviews {
        let doc = json!({ "id": id, "review": text, "rating": rating });
        store
            .set(
                &child_path(PRODUCTS, asin, REVIEWS),
                id,
                to_document(&doc).unwrap(),
                false,
            )
            .await
            .unwrap();
    }
}

/// Twelve reviews, four per topic, spread over two products.
pub fn topic_reviews() -> Vec<(String, String, u8)> {
    let mut out = Vec::new();
    for n in 0..4 {
        out.push((
            format!("bat{n}"),
            format!("The battery died after {n} days of normal charging use"),
            2,
        ));
        out.push((
            format!("zip{n}"),
            format!("Zipper snapped on trip number {n} while packing clothes"),
            1,
        ));
        out.push((
            format!("blu{n}"),
            format!("Bluetooth pairing dropped {n} times during one long call"),
            3,
        ));
    }
    out
}
