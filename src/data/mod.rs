//! Persistence layer: document store abstraction and the records kept in it.

pub mod files;
pub mod investigations;
pub mod memory;
pub mod reviews;
pub mod store;
pub mod users;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::nlp::attributes::ReviewAttributes;

pub use store::{DocumentStore, WriteOp};

pub const PRODUCTS: &str = "products";
pub const REVIEWS: &str = "reviews";
pub const INVESTIGATIONS: &str = "investigations";
pub const CLUSTERS: &str = "clusters";
pub const USERS: &str = "users";
pub const SUBSCRIPTIONS: &str = "subscriptions";

/// Product record scraped upstream. Read-only for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub asin: String,
    #[serde(default)]
    pub details: Value,
}

/// A single customer review and everything the pipeline derives from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub asin: String,
    /// Raw review body as scraped. Absent bodies are rejected by the cleaner.
    #[serde(default, rename = "review")]
    pub text: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_label: Option<String>,
    /// Per-aspect observations extracted from the review text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ReviewAttributes>,
}

impl Review {
    pub fn new(id: impl Into<String>, asin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            asin: asin.into(),
            text: Some(text.into()),
            rating: None,
            clean_review: None,
            word_count: None,
            embedding: None,
            cluster: None,
            cluster_label: None,
            attributes: None,
        }
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// ASINs are ten upper-case alphanumerics.
pub fn validate_asin(asin: &str) -> crate::error::Result<()> {
    if asin.len() == 10 && asin.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(crate::error::PipelineError::validation(format!(
            "invalid ASIN `{asin}`: must be 10 alphanumeric characters"
        )))
    }
}
