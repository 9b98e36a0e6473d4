//! Per-cluster statistics over a labeled review batch.

use std::{collections::BTreeMap, io::Write, path::Path};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    data::Review,
    error::{PipelineError, Result},
};

/// Breakdown of one cluster restricted to a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsinShare {
    pub observation_count: usize,
    /// Share of the product's clustered reviews that fall in this cluster.
    pub percentage: f64,
    pub rating_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInsight {
    pub id: usize,
    pub label: Option<String>,
    pub observation_count: usize,
    /// Share of all clustered reviews, 0-100.
    pub percentage: f64,
    /// Share of every review in the batch, clustered or not, 0-100.
    #[serde(default)]
    pub percentage_of_reviews: f64,
    pub rating_avg: Option<f64>,
    pub review_ids: Vec<String>,
    pub by_asin: BTreeMap<String, AsinShare>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    /// Reviews in the batch, including those that could not be embedded.
    #[serde(default)]
    pub total_reviews: usize,
    /// Reviews that carry a cluster assignment.
    pub clustered_reviews: usize,
    pub clusters: Vec<ClusterInsight>,
}

pub(crate) fn mean(ratings: &[u8]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: f64 = ratings.iter().map(|r| f64::from(*r)).sum();
    Some(sum / ratings.len() as f64)
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Count, share and average rating of every cluster, overall and per product.
///
/// Reviews without a cluster only count towards `percentage_of_reviews`.
/// Clusters are listed by id.
pub fn quantify(reviews: &[Review], labels: &BTreeMap<usize, String>) -> InsightReport {
    let clustered: Vec<(&Review, usize)> = reviews
        .iter()
        .filter_map(|r| r.cluster.map(|c| (r, c)))
        .collect();

    let mut per_asin_total: BTreeMap<&str, usize> = BTreeMap::new();
    let mut grouped: BTreeMap<usize, Vec<&Review>> = BTreeMap::new();
    for (review, cluster) in &clustered {
        *per_asin_total.entry(review.asin.as_str()).or_default() += 1;
        grouped.entry(*cluster).or_default().push(review);
    }

    let clusters = grouped
        .into_iter()
        .map(|(id, members)| {
            let ratings: Vec<u8> = members.iter().filter_map(|r| r.rating).collect();

            let mut asin_members: BTreeMap<&str, Vec<&Review>> = BTreeMap::new();
            for review in &members {
                asin_members.entry(review.asin.as_str()).or_default().push(review);
            }
            let by_asin = asin_members
                .into_iter()
                .map(|(asin, rows)| {
                    let ratings: Vec<u8> = rows.iter().filter_map(|r| r.rating).collect();
                    let total = per_asin_total.get(asin).copied().unwrap_or_default();
                    let share = AsinShare {
                        observation_count: rows.len(),
                        percentage: percent(rows.len(), total),
                        rating_avg: mean(&ratings),
                    };
                    (asin.to_string(), share)
                })
                .collect();

            ClusterInsight {
                id,
                label: labels.get(&id).cloned(),
                observation_count: members.len(),
                percentage: percent(members.len(), clustered.len()),
                percentage_of_reviews: percent(members.len(), reviews.len()),
                rating_avg: mean(&ratings),
                review_ids: members.iter().map(|r| r.id.clone()).collect(),
                by_asin,
            }
        })
        .collect();

    InsightReport {
        total_reviews: reviews.len(),
        clustered_reviews: clustered.len(),
        clusters,
    }
}

/// One row per cluster and product, plus an `ALL` row per cluster.
pub fn write_csv<W: Write>(report: &InsightReport, sink: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    let csv_err = |err: csv::Error| PipelineError::Store(format!("csv: {err}"));
    writer
        .write_record([
            "cluster",
            "label",
            "asin",
            "observation_count",
            "percentage",
            "percentage_of_reviews",
            "rating_avg",
        ])
        .map_err(csv_err)?;

    let fmt_rating = |r: Option<f64>| r.map(|v| format!("{v:.2}")).unwrap_or_default();
    for cluster in &report.clusters {
        let label = cluster.label.clone().unwrap_or_default();
        let mut rows = vec![[
            cluster.id.to_string(),
            label.clone(),
            "ALL".to_string(),
            cluster.observation_count.to_string(),
            format!("{:.2}", cluster.percentage),
            format!("{:.2}", cluster.percentage_of_reviews),
            fmt_rating(cluster.rating_avg),
        ]];
        rows.extend(cluster.by_asin.iter().map(|(asin, share)| {
            [
                cluster.id.to_string(),
                label.clone(),
                asin.clone(),
                share.observation_count.to_string(),
                format!("{:.2}", share.percentage),
                String::new(),
                fmt_rating(share.rating_avg),
            ]
        }));
        for row in &rows {
            writer.write_record(row).map_err(csv_err)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv_file(report: &InsightReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(report, file)?;
    info!(path = %path.display(), clusters = report.clusters.len(), "wrote cluster report");
    Ok(())
}
