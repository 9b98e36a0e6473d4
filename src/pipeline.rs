//! Orchestrates one investigation: extract, clean, embed, cluster, label, persist.

mod attributes;

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::{
    clusters::{cluster_rows, quantify, InsightReport, Linkage},
    config::{PipelineConfig, Settings},
    data::{
        files::FileStore,
        investigations::{self, InvestigationStatus},
        reviews,
        store::{to_document, DocumentStore},
        Review, CLUSTERS, INVESTIGATIONS,
    },
    error::{PipelineError, Result, Stage},
    nlp::{
        clean::{CleanerConfig, TextCleaner},
        completion::CompletionService,
        embeddings::{embed_all, Embedder, EmbeddingOutcome},
        labels::{ClusterLabeler, LabelReport, LabelerConfig},
        openai::OpenAiClient,
    },
};

pub use attributes::AttributeReport;

/// Write-back totals for the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSummary {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub investigation_id: String,
    /// Last stage the run reached.
    pub stage: Stage,
    pub reviews_extracted: usize,
    pub reviews_cleaned: usize,
    pub reviews_embedded: usize,
    /// Cluster count actually used; lower than requested when few reviews embedded.
    pub clusters: usize,
    pub labels: LabelReport,
    pub insights: InsightReport,
    /// Present when attribute analysis is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeReport>,
    pub writes: WriteSummary,
}

impl PipelineOutcome {
    fn empty(investigation_id: &str, stage: Stage, extracted: usize) -> Self {
        Self {
            investigation_id: investigation_id.to_string(),
            stage,
            reviews_extracted: extracted,
            reviews_cleaned: 0,
            reviews_embedded: 0,
            clusters: 0,
            labels: LabelReport::default(),
            insights: InsightReport::default(),
            attributes: None,
            writes: WriteSummary::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clusters == 0
    }
}

/// Cluster document persisted per investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    pub id: usize,
    pub label: Option<String>,
    pub review_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    pub investigation_id: String,
    pub linkage: Linkage,
    pub k: usize,
    pub clusters: Vec<ClusterRecord>,
    pub created_at: chrono::DateTime<Utc>,
}

pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn CompletionService>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn CompletionService>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            completer,
            config,
        }
    }

    /// File-backed store plus the OpenAI client for both embeddings and labels.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let store = FileStore::open(settings).context("opening document store")?;
        let client = Arc::new(OpenAiClient::from_settings(settings)?);
        Ok(Self::new(
            Arc::new(store),
            client.clone(),
            client,
            settings.pipeline_config(),
        ))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Run every stage for `investigation_id` with `k` clusters.
    ///
    /// Any error aborts the run; writes already committed stay in place.
    #[instrument(skip(self))]
    pub async fn run(&self, investigation_id: &str, k: usize) -> Result<PipelineOutcome> {
        let mut stage = Stage::Started;
        match self.execute(investigation_id, k, &mut stage).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(investigation = %investigation_id, last_stage = %stage, %err, "pipeline failed");
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        investigation_id: &str,
        k: usize,
        stage: &mut Stage,
    ) -> Result<PipelineOutcome> {
        if k == 0 {
            return Err(PipelineError::validation("cluster count must be at least 1"));
        }
        let store = self.store.as_ref();
        let investigation = investigations::get_investigation(store, investigation_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(INVESTIGATIONS, investigation_id))?;
        if investigation.status == InvestigationStatus::Completed {
            return Err(PipelineError::validation(format!(
                "investigation {investigation_id} is already completed"
            )));
        }
        let asins = investigations::asins_for(store, investigation_id).await?;

        // extract
        let mut batch =
            reviews::fetch_reviews(store, &asins, self.config.max_concurrency).await?;
        *stage = Stage::Extracted;
        let extracted = batch.len();
        if batch.is_empty() {
            warn!(investigation = %investigation_id, "no reviews to process");
            return Ok(PipelineOutcome::empty(investigation_id, *stage, 0));
        }

        // clean
        let cleaner = TextCleaner::new(CleanerConfig {
            min_words: self.config.min_review_words,
            ..CleanerConfig::default()
        });
        let cleaned = cleaner.clean(batch.iter().map(|r| r.text.as_deref()))?;
        *stage = Stage::Cleaned;
        if cleaned.is_empty() {
            warn!(investigation = %investigation_id, extracted, "every review was filtered out by cleaning");
            return Ok(PipelineOutcome::empty(investigation_id, *stage, extracted));
        }
        let mut kept: Vec<Review> = cleaned
            .items
            .iter()
            .map(|item| {
                let mut review = batch[item.index].clone();
                review.clean_review = Some(item.text.clone());
                review.word_count = Some(item.word_count);
                review
            })
            .collect();
        batch.clear();
        info!(cleaned = kept.len(), words = cleaned.word_count, "cleaned reviews");

        // embed
        let texts: Vec<String> = cleaned.items.iter().map(|item| item.text.clone()).collect();
        let outcomes = embed_all(
            self.embedder.clone(),
            texts.clone(),
            &self.config.embedding_model,
            &self.config.retry,
            self.config.max_concurrency,
        )
        .await;
        let embedded = outcomes.iter().filter(|o| o.vector().is_some()).count();
        if embedded == 0 {
            return Err(PipelineError::failure(
                Stage::Embedded,
                format!("all {} embedding requests were exhausted", outcomes.len()),
            ));
        }
        let rows: Vec<Option<Vec<f32>>> = outcomes
            .into_iter()
            .map(EmbeddingOutcome::into_vector)
            .collect();
        for (review, row) in kept.iter_mut().zip(&rows) {
            review.embedding = row.clone();
        }
        *stage = Stage::Embedded;
        info!(embedded, skipped = rows.len() - embedded, "embedded reviews");

        // cluster
        let effective_k = if k > embedded {
            warn!(requested = k, embedded, "fewer embedded reviews than clusters; lowering k");
            embedded
        } else {
            k
        };
        let assignments = cluster_rows(&rows, effective_k, self.config.linkage)?;
        for (review, cluster) in kept.iter_mut().zip(&assignments) {
            review.cluster = *cluster;
        }
        *stage = Stage::Clustered;
        info!(k = effective_k, linkage = ?self.config.linkage, "clustered reviews");

        // label
        let labeler = ClusterLabeler::new(
            self.completer.clone(),
            LabelerConfig {
                model: self.config.completion_model.clone(),
                temperature: self.config.label_temperature,
                concurrency: self.config.max_concurrency,
                ..LabelerConfig::default()
            },
        );
        let labels = labeler.label_clusters(&texts, &assignments, effective_k).await;
        if labels.all_failed() {
            return Err(PipelineError::failure(
                Stage::Labeled,
                format!("labeling failed for all {effective_k} clusters"),
            ));
        }
        for review in kept.iter_mut() {
            review.cluster_label = review.cluster.and_then(|c| labels.labels.get(&c).cloned());
        }
        *stage = Stage::Labeled;

        // attributes
        let attributes = if self.config.attribute_analysis {
            Some(self.analyze_attributes(&asins, &mut kept).await?)
        } else {
            None
        };

        // persist
        let report = reviews::write_back(store, &kept).await?;
        let writes = WriteSummary {
            batches: report.batches,
            succeeded: report.succeeded(),
            failed: report.failed().count(),
        };
        let snapshot = snapshot(investigation_id, self.config.linkage, effective_k, &kept, &labels.labels);
        store
            .set(CLUSTERS, investigation_id, to_document(&snapshot)?, false)
            .await?;
        let insights = quantify(&kept, &labels.labels);
        let results = json!({
            "clusters": effective_k,
            "insights": insights,
            "labelFailures": labels.failures,
            "attributes": attributes,
            "writes": writes,
        });
        investigations::complete_investigation(store, investigation_id, results).await?;
        *stage = Stage::Persisted;
        info!(
            investigation = %investigation_id,
            clusters = effective_k,
            written = writes.succeeded,
            failed_writes = writes.failed,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            investigation_id: investigation_id.to_string(),
            stage: *stage,
            reviews_extracted: extracted,
            reviews_cleaned: kept.len(),
            reviews_embedded: embedded,
            clusters: effective_k,
            labels,
            insights,
            attributes,
            writes,
        })
    }
}

fn snapshot(
    investigation_id: &str,
    linkage: Linkage,
    k: usize,
    reviews: &[Review],
    labels: &BTreeMap<usize, String>,
) -> ClusterSnapshot {
    let mut members: Vec<Vec<String>> = vec![Vec::new(); k];
    for review in reviews {
        if let Some(ids) = review.cluster.and_then(|c| members.get_mut(c)) {
            ids.push(review.id.clone());
        }
    }
    ClusterSnapshot {
        investigation_id: investigation_id.to_string(),
        linkage,
        k,
        clusters: members
            .into_iter()
            .enumerate()
            .map(|(id, review_ids)| ClusterRecord {
                id,
                label: labels.get(&id).cloned(),
                review_ids,
            })
            .collect(),
        created_at: Utc::now(),
    }
}

/// Cluster snapshot saved by the last completed run.
pub async fn load_clusters(
    store: &dyn DocumentStore,
    investigation_id: &str,
) -> Result<Option<ClusterSnapshot>> {
    match store.get(CLUSTERS, investigation_id).await? {
        Some(doc) => Ok(Some(serde_json::from_value(Value::Object(doc))?)),
        None => Ok(None),
    }
}

async fn load_result(store: &dyn DocumentStore, investigation_id: &str, key: &str) -> Result<Value> {
    let investigation = investigations::get_investigation(store, investigation_id)
        .await?
        .ok_or_else(|| PipelineError::not_found(INVESTIGATIONS, investigation_id))?;
    investigation
        .results
        .and_then(|mut results| results.get_mut(key).map(Value::take))
        .filter(|value| !value.is_null())
        .ok_or_else(|| {
            PipelineError::validation(format!(
                "investigation {investigation_id} has no {key} results"
            ))
        })
}

/// Insights attached to a completed investigation.
pub async fn load_report(store: &dyn DocumentStore, investigation_id: &str) -> Result<InsightReport> {
    let insights = load_result(store, investigation_id, "insights").await?;
    Ok(serde_json::from_value(insights)?)
}

/// Attribute clusters and problem statements of a completed investigation.
pub async fn load_attribute_report(
    store: &dyn DocumentStore,
    investigation_id: &str,
) -> Result<AttributeReport> {
    let attributes = load_result(store, investigation_id, "attributes").await?;
    Ok(serde_json::from_value(attributes)?)
}
