//! Human-readable cluster labels from an LLM completion service.

use std::{collections::BTreeMap, sync::Arc};

use indexmap::IndexSet;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::completion::{CompletionRequest, CompletionService, FunctionSpec};
use crate::{
    error::{PipelineError, Result},
    pool::map_bounded,
};

/// Name of the function the model is asked to call.
pub const LABEL_FUNCTION: &str = "clusterLabel";

#[derive(Debug, Clone)]
pub struct LabelerConfig {
    pub model: String,
    pub temperature: f32,
    /// Distinct member texts shown to the model per cluster.
    pub max_samples: usize,
    pub concurrency: usize,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            temperature: 0.0,
            max_samples: 5,
            concurrency: 8,
        }
    }
}

/// Outcome of labeling one batch: every requested cluster id appears in
/// exactly one of the two maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelReport {
    pub labels: BTreeMap<usize, String>,
    pub failures: BTreeMap<usize, String>,
}

impl LabelReport {
    pub fn all_failed(&self) -> bool {
        self.labels.is_empty() && !self.failures.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LabelArguments {
    #[serde(rename = "clusterLabel")]
    cluster_label: String,
}

/// JSON schema of the forced function call.
pub fn label_function() -> FunctionSpec {
    FunctionSpec {
        name: LABEL_FUNCTION.to_string(),
        description: "Provide a single label for the topic represented in the list of reviews."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "clusterLabel": {
                    "type": "string",
                    "description": "A single label of about seven words. Examples: \
                        'low perceived quality versus competitors', \
                        'the assembly kit breaks easily and often', \
                        'the taste was better than expected'"
                }
            },
            "required": ["clusterLabel"]
        }),
    }
}

/// `aspect` names the review attribute the texts were extracted for, if any.
pub fn label_prompt(samples: &[String], aspect: Option<&str>) -> String {
    let listing = samples
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    match aspect {
        Some(aspect) => format!(
            "The following customer observations all describe `{aspect}` and belong to the \
             same topic. Provide a single label of seven words for this list:\n```\n{listing}\n```"
        ),
        None => format!(
            "The following customer reviews belong to the same topic. \
             Provide a single label of seven words for this list of reviews:\n```\n{listing}\n```"
        ),
    }
}

/// Parse the function-call arguments; anything but `{"clusterLabel": "<text>"}` is rejected.
pub fn parse_label(arguments: &str) -> Result<String> {
    let parsed: LabelArguments = serde_json::from_str(arguments)
        .map_err(|err| PipelineError::validation(format!("malformed label payload: {err}")))?;
    let label = parsed.cluster_label.trim().to_string();
    if label.is_empty() {
        return Err(PipelineError::validation("empty cluster label"));
    }
    Ok(label)
}

pub struct ClusterLabeler {
    service: Arc<dyn CompletionService>,
    config: LabelerConfig,
}

impl ClusterLabeler {
    pub fn new(service: Arc<dyn CompletionService>, config: LabelerConfig) -> Self {
        Self { service, config }
    }

    /// Label clusters `0..k`. `texts` and `assignments` are aligned per review.
    pub async fn label_clusters(
        &self,
        texts: &[String],
        assignments: &[Option<usize>],
        k: usize,
    ) -> LabelReport {
        self.label_aspect_clusters(None, texts, assignments, k).await
    }

    /// Same as [`Self::label_clusters`], telling the model which attribute the texts describe.
    pub async fn label_aspect_clusters(
        &self,
        aspect: Option<&str>,
        texts: &[String],
        assignments: &[Option<usize>],
        k: usize,
    ) -> LabelReport {
        let mut members: Vec<IndexSet<&str>> = vec![IndexSet::new(); k];
        for (text, cluster) in texts.iter().zip(assignments) {
            if let Some(set) = cluster.and_then(|c| members.get_mut(c)) {
                set.insert(text.as_str());
            }
        }

        let mut report = LabelReport::default();
        let mut jobs = Vec::new();
        {
            let mut rng = rand::thread_rng();
            for (id, set) in members.iter().enumerate() {
                if set.is_empty() {
                    warn!(cluster = id, "cluster has no members; not labeling");
                    report.failures.insert(id, "cluster has no members".into());
                    continue;
                }
                let pool: Vec<&str> = set.iter().copied().collect();
                let samples: Vec<String> = pool
                    .choose_multiple(&mut rng, self.config.max_samples.max(1))
                    .map(|s| s.to_string())
                    .collect();
                jobs.push((id, samples));
            }
        }

        let results = map_bounded(jobs, self.config.concurrency, |(id, samples)| async move {
            (id, self.label_one(&samples, aspect).await)
        })
        .await;

        for (id, result) in results {
            match result {
                Ok(label) => {
                    report.labels.insert(id, label);
                }
                Err(err) => {
                    warn!(cluster = id, %err, "labeling failed");
                    report.failures.insert(id, err.to_string());
                }
            }
        }
        info!(
            aspect = aspect.unwrap_or("review"),
            labeled = report.labels.len(),
            failed = report.failures.len(),
            "labeled clusters"
        );
        report
    }

    async fn label_one(&self, samples: &[String], aspect: Option<&str>) -> Result<String> {
        let request = CompletionRequest::function_call(
            label_prompt(samples, aspect),
            &self.config.model,
            self.config.temperature,
            label_function(),
        );
        let arguments = self.service.complete(request).await?;
        parse_label(&arguments)
    }
}
