//! One consolidated product description from the detail sheets of every ASIN.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::completion::{complete_as, CompletionRequest, CompletionService, FunctionSpec};
use crate::{data::Product, error::Result};

pub const PRODUCT_SUMMARY_FUNCTION: &str = "productSummary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDescription {
    #[serde(rename = "productSummary")]
    pub summary: String,
    /// Products that differ from the rest, with the reason.
    #[serde(rename = "productSummaryOutliers", default)]
    pub outliers: Option<String>,
}

pub fn product_summary_function() -> FunctionSpec {
    FunctionSpec {
        name: PRODUCT_SUMMARY_FUNCTION.to_string(),
        description: "Describe a product based on the fact sheets of similar products".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "productSummary": {
                    "type": "string",
                    "description": "A single fact sheet summary of the product in about 200 words. Exclude brand names."
                },
                "productSummaryOutliers": {
                    "type": "string",
                    "description": "Products that stand out from the rest, by ASIN, and why."
                }
            },
            "required": ["productSummary", "productSummaryOutliers"]
        }),
    }
}

fn has_details(product: &Product) -> bool {
    match &product.details {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    }
}

/// Summarise the products' details; `None` when no product carries any.
pub async fn describe_products(
    service: Arc<dyn CompletionService>,
    products: &[Product],
    model: &str,
    temperature: f32,
) -> Result<Option<ProductDescription>> {
    let sheets: Vec<String> = products
        .iter()
        .filter(|p| has_details(p))
        .map(|p| format!("{}: {}", p.asin, p.details))
        .collect();
    if sheets.is_empty() {
        return Ok(None);
    }
    let request = CompletionRequest::function_call(
        format!("PRODUCT DETAILS:\n```\n{}\n```", sheets.join("\n")),
        model,
        temperature,
        product_summary_function(),
    );
    let mut description: ProductDescription = complete_as(service.as_ref(), request).await?;
    description.summary = description.summary.trim().to_string();
    if description.outliers.as_deref().is_some_and(|o| o.trim().is_empty()) {
        description.outliers = None;
    }
    info!(products = sheets.len(), "described products");
    Ok(Some(description))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl CompletionService for Recorder {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.0.lock().unwrap().push(request.prompt);
            Ok(r#"{"productSummary": " foldable drawing board ", "productSummaryOutliers": ""}"#
                .to_string())
        }
    }

    fn product(asin: &str, details: Value) -> Product {
        Product {
            asin: asin.to_string(),
            details,
        }
    }

    #[tokio::test]
    async fn skips_the_call_without_details() {
        let service = Arc::new(Recorder::default());
        let products = vec![product("B000000001", Value::Null)];
        let out = describe_products(service.clone(), &products, "m", 0.0).await.unwrap();
        assert!(out.is_none());
        assert!(service.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_only_products_with_details() {
        let service = Arc::new(Recorder::default());
        let products = vec![
            product("B000000001", json!({ "title": "magnetic drawing board" })),
            product("B000000002", json!({})),
        ];
        let out = describe_products(service.clone(), &products, "m", 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.summary, "foldable drawing board");
        assert!(out.outliers.is_none());
        let prompts = service.0.lock().unwrap();
        assert!(prompts[0].contains("B000000001"));
        assert!(!prompts[0].contains("B000000002"));
    }
}
