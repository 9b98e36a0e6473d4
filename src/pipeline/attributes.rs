//! Attribute stage: per-review aspects, clustered and labeled one aspect at a
//! time, plus a product description and problem statements for the issues.
//!
//! Nothing in here aborts a run. Failed extractions, embeddings, and labels are
//! counted and logged; only store errors propagate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::Pipeline;
use crate::{
    clusters::{
        attributes::{attribute_k, observations, quantify_attributes, AttributeCluster},
        cluster_rows,
    },
    data::{Product, Review, PRODUCTS},
    error::Result,
    nlp::{
        attributes::{Attribute, AttributeExtractor, ExtractorConfig},
        embeddings::{embed_all, EmbeddingOutcome},
        labels::{ClusterLabeler, LabelerConfig},
        problems::{write_problem_statements, IssueCluster, ProblemStatement},
        products::{describe_products, ProductDescription},
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeReport {
    /// Reviews whose attributes were extracted.
    pub reviews_analyzed: usize,
    pub extraction_failures: usize,
    pub observations: usize,
    /// Observations left out of clustering because their embedding was exhausted.
    pub unembedded_observations: usize,
    pub clusters: Vec<AttributeCluster>,
    /// Keyed by `attribute/cluster`.
    pub label_failures: BTreeMap<String, String>,
    pub product_description: Option<ProductDescription>,
    pub problem_statements: Vec<ProblemStatement>,
}

impl Pipeline {
    pub(super) async fn analyze_attributes(
        &self,
        asins: &[String],
        reviews: &mut [Review],
    ) -> Result<AttributeReport> {
        let config = &self.config;
        let mut report = AttributeReport::default();

        let extractor = AttributeExtractor::new(
            self.completer.clone(),
            ExtractorConfig {
                model: config.completion_model.clone(),
                temperature: config.label_temperature,
                concurrency: config.max_concurrency,
            },
        );
        let texts: Vec<String> = reviews
            .iter()
            .map(|r| r.text.clone().unwrap_or_default())
            .collect();
        let extracted = extractor.extract(&texts).await;
        for (review, result) in reviews.iter_mut().zip(extracted) {
            match result {
                Ok(attributes) => {
                    review.attributes = Some(attributes);
                    report.reviews_analyzed += 1;
                }
                Err(_) => report.extraction_failures += 1,
            }
        }

        let obs = observations(reviews);
        report.observations = obs.len();
        let mut assignments: Vec<Option<usize>> = vec![None; obs.len()];
        let mut labels: BTreeMap<(Attribute, usize), String> = BTreeMap::new();

        if !obs.is_empty() {
            let values: Vec<String> = obs.iter().map(|o| o.value.clone()).collect();
            let rows: Vec<Option<Vec<f32>>> = embed_all(
                self.embedder.clone(),
                values.clone(),
                &config.embedding_model,
                &config.retry,
                config.max_concurrency,
            )
            .await
            .into_iter()
            .map(EmbeddingOutcome::into_vector)
            .collect();
            report.unembedded_observations = rows.iter().filter(|r| r.is_none()).count();

            let labeler = ClusterLabeler::new(
                self.completer.clone(),
                LabelerConfig {
                    model: config.completion_model.clone(),
                    temperature: config.label_temperature,
                    concurrency: config.max_concurrency,
                    ..LabelerConfig::default()
                },
            );
            for attribute in Attribute::ALL {
                let members: Vec<usize> = (0..obs.len())
                    .filter(|&i| obs[i].attribute == attribute && rows[i].is_some())
                    .collect();
                let k = attribute_k(
                    members.iter().map(|&i| values[i].as_str()),
                    config.attribute_clusters,
                );
                if k == 0 {
                    continue;
                }
                let member_rows: Vec<Option<Vec<f32>>> =
                    members.iter().map(|&i| rows[i].clone()).collect();
                let member_assignments = match cluster_rows(&member_rows, k, config.linkage) {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(%attribute, %err, "attribute clustering failed");
                        continue;
                    }
                };
                let member_texts: Vec<String> = members.iter().map(|&i| values[i].clone()).collect();
                let labeled = labeler
                    .label_aspect_clusters(
                        Some(attribute.title()),
                        &member_texts,
                        &member_assignments,
                        k,
                    )
                    .await;

                for (&i, cluster) in members.iter().zip(&member_assignments) {
                    assignments[i] = *cluster;
                }
                for (cluster, label) in labeled.labels {
                    labels.insert((attribute, cluster), label);
                }
                for (cluster, reason) in labeled.failures {
                    report
                        .label_failures
                        .insert(format!("{attribute}/{cluster}"), reason);
                }
            }
        }
        report.clusters = quantify_attributes(&obs, &assignments, &labels, report.reviews_analyzed);

        let products = self.load_products(asins).await?;
        report.product_description = match describe_products(
            self.completer.clone(),
            &products,
            &config.completion_model,
            config.label_temperature,
        )
        .await
        {
            Ok(description) => description,
            Err(err) => {
                warn!(%err, "product description failed");
                None
            }
        };

        let issues: Vec<IssueCluster> = report
            .clusters
            .iter()
            .filter(|c| c.attribute == Attribute::Issues)
            .filter_map(|c| {
                c.label.clone().map(|label| IssueCluster {
                    label,
                    quotes: c.values.clone(),
                })
            })
            .collect();
        if !issues.is_empty() {
            report.problem_statements = write_problem_statements(
                self.completer.clone(),
                issues,
                report.product_description.as_ref(),
                &config.completion_model,
                config.label_temperature,
                config.max_concurrency,
            )
            .await;
        }

        info!(
            analyzed = report.reviews_analyzed,
            observations = report.observations,
            clusters = report.clusters.len(),
            problems = report.problem_statements.len(),
            "attribute analysis finished"
        );
        Ok(report)
    }

    async fn load_products(&self, asins: &[String]) -> Result<Vec<Product>> {
        let mut products = Vec::with_capacity(asins.len());
        for asin in asins {
            let Some(mut doc) = self.store.get(PRODUCTS, asin).await? else {
                continue;
            };
            doc.entry("asin")
                .or_insert_with(|| Value::String(asin.clone()));
            match serde_json::from_value::<Product>(Value::Object(doc)) {
                Ok(product) => products.push(product),
                Err(err) => warn!(%asin, %err, "skipping malformed product"),
            }
        }
        Ok(products)
    }
}
