//! Review extraction and write-back against the document store.

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    store::{child_path, to_document, write_in_batches, BatchReport, DocumentStore, WriteOp},
    validate_asin, Review, PRODUCTS, REVIEWS,
};
use crate::{error::Result, nlp::attributes::ReviewAttributes, pool::map_bounded};

/// Load every review of the given products.
///
/// Products that do not exist are logged and skipped; reviews that fail to
/// parse are logged and skipped. Store errors abort the extraction.
pub async fn fetch_reviews(
    store: &dyn DocumentStore,
    asins: &[String],
    concurrency: usize,
) -> Result<Vec<Review>> {
    for asin in asins {
        validate_asin(asin)?;
    }
    let per_product = map_bounded(asins.to_vec(), concurrency, |asin| async move {
        fetch_product_reviews(store, &asin).await
    })
    .await;

    let mut reviews = Vec::new();
    for batch in per_product {
        reviews.extend(batch?);
    }
    info!(products = asins.len(), reviews = reviews.len(), "extracted reviews");
    Ok(reviews)
}

async fn fetch_product_reviews(store: &dyn DocumentStore, asin: &str) -> Result<Vec<Review>> {
    if store.get(PRODUCTS, asin).await?.is_none() {
        warn!(%asin, "no product document; skipping");
        return Ok(Vec::new());
    }
    let mut children = store.stream_children(PRODUCTS, asin, REVIEWS);
    let mut reviews = Vec::new();
    while let Some(doc) = children.next().await {
        let mut doc = doc?;
        doc.entry("asin")
            .or_insert_with(|| Value::String(asin.to_string()));
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<no id>")
            .to_string();
        match serde_json::from_value::<Review>(Value::Object(doc)) {
            Ok(review) => reviews.push(review),
            Err(err) => warn!(%asin, %id, %err, "skipping malformed review"),
        }
    }
    if reviews.is_empty() {
        warn!(%asin, "no reviews found for product");
    }
    Ok(reviews)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    clean_review: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<&'a [f32]>,
    cluster: Option<usize>,
    cluster_label: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<&'a ReviewAttributes>,
}

/// Merge pipeline results back into each review document, chunked to the store limit.
pub async fn write_back(store: &dyn DocumentStore, reviews: &[Review]) -> Result<BatchReport> {
    let mut ops = Vec::with_capacity(reviews.len());
    for review in reviews {
        let patch = ReviewPatch {
            clean_review: review.clean_review.as_deref(),
            word_count: review.word_count,
            embedding: review.embedding.as_deref(),
            cluster: review.cluster,
            cluster_label: review.cluster_label.as_deref(),
            attributes: review.attributes.as_ref(),
        };
        ops.push(WriteOp::merge(
            child_path(PRODUCTS, &review.asin, REVIEWS),
            review.id.clone(),
            to_document(&patch)?,
        ));
    }
    let report = write_in_batches(store, ops).await;
    let failed = report.failed().count();
    if failed > 0 {
        warn!(failed, batches = report.batches, "some review writes failed");
    } else {
        info!(written = report.succeeded(), batches = report.batches, "wrote reviews back");
    }
    Ok(report)
}
