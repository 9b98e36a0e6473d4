//! Structured observations pulled out of each review by an LLM.
//!
//! Every review is sent once with a forced `reviewData` function call whose
//! schema lists the [`Attribute`]s below. Placeholder answers such as
//! "not mentioned" are dropped, so a review only carries the attributes it
//! actually talks about.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::completion::{CompletionRequest, CompletionService, FunctionSpec};
use crate::{
    error::{PipelineError, Result},
    pool::map_bounded,
};

pub const REVIEW_DATA_FUNCTION: &str = "reviewData";

/// Aspects of a review the model is asked to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    ReviewSummary,
    BuyerMotivation,
    CustomerExpectations,
    HowTheProductIsUsed,
    WhereTheProductIsUsed,
    UserDescription,
    Packaging,
    Season,
    WhenTheProductIsUsed,
    Appraisal,
    Quality,
    Durability,
    EaseOfUse,
    SetupAndInstructions,
    NoiseAndSmell,
    SizeAndFit,
    DangerAppraisal,
    DesignAndAppearance,
    PartsAndComponents,
    Issues,
}

impl Attribute {
    pub const ALL: [Attribute; 20] = [
        Self::ReviewSummary,
        Self::BuyerMotivation,
        Self::CustomerExpectations,
        Self::HowTheProductIsUsed,
        Self::WhereTheProductIsUsed,
        Self::UserDescription,
        Self::Packaging,
        Self::Season,
        Self::WhenTheProductIsUsed,
        Self::Appraisal,
        Self::Quality,
        Self::Durability,
        Self::EaseOfUse,
        Self::SetupAndInstructions,
        Self::NoiseAndSmell,
        Self::SizeAndFit,
        Self::DangerAppraisal,
        Self::DesignAndAppearance,
        Self::PartsAndComponents,
        Self::Issues,
    ];

    /// Key used in function-call payloads and stored documents.
    pub fn key(self) -> &'static str {
        match self {
            Self::ReviewSummary => "reviewSummary",
            Self::BuyerMotivation => "buyerMotivation",
            Self::CustomerExpectations => "customerExpectations",
            Self::HowTheProductIsUsed => "howTheProductIsUsed",
            Self::WhereTheProductIsUsed => "whereTheProductIsUsed",
            Self::UserDescription => "userDescription",
            Self::Packaging => "packaging",
            Self::Season => "season",
            Self::WhenTheProductIsUsed => "whenTheProductIsUsed",
            Self::Appraisal => "appraisal",
            Self::Quality => "quality",
            Self::Durability => "durability",
            Self::EaseOfUse => "easeOfUse",
            Self::SetupAndInstructions => "setupAndInstructions",
            Self::NoiseAndSmell => "noiseAndSmell",
            Self::SizeAndFit => "sizeAndFit",
            Self::DangerAppraisal => "dangerAppraisal",
            Self::DesignAndAppearance => "designAndAppearance",
            Self::PartsAndComponents => "partsAndComponents",
            Self::Issues => "issues",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.key() == key)
    }

    /// Human-readable name, used in labeling prompts.
    pub fn title(self) -> &'static str {
        match self {
            Self::ReviewSummary => "Review Summary",
            Self::BuyerMotivation => "Buyer Motivation",
            Self::CustomerExpectations => "Customer Expectations",
            Self::HowTheProductIsUsed => "How the product is used",
            Self::WhereTheProductIsUsed => "Where the product is used",
            Self::UserDescription => "User Description",
            Self::Packaging => "Packaging",
            Self::Season => "Season",
            Self::WhenTheProductIsUsed => "When the product is used",
            Self::Appraisal => "Appraisal",
            Self::Quality => "Quality",
            Self::Durability => "Durability",
            Self::EaseOfUse => "Ease of Use",
            Self::SetupAndInstructions => "Setup and Instructions",
            Self::NoiseAndSmell => "Noise and Smell",
            Self::SizeAndFit => "Size and Fit",
            Self::DangerAppraisal => "Danger Appraisal",
            Self::DesignAndAppearance => "Design and Appearance",
            Self::PartsAndComponents => "Parts and Components",
            Self::Issues => "Issues",
        }
    }

    fn guidance(self) -> &'static str {
        match self {
            Self::ReviewSummary => "A brief summary of the review. Eg: good product overall, but battery life could be longer.",
            Self::BuyerMotivation => "Why the buyer purchased the product. Eg: to replace an old one, to give as a gift.",
            Self::CustomerExpectations => "What the customer expected before buying. Eg: to last a long time.",
            Self::HowTheProductIsUsed => "What the product is used for. Eg: doodling, practicing letters, playing games.",
            Self::WhereTheProductIsUsed => "Locations or situations of use. Eg: car, restaurant, garden.",
            Self::UserDescription => "Who uses the product. Eg: children, basketball players, office workers.",
            Self::Packaging => "The product's packaging. Eg: sturdy recyclable box, great for gifting.",
            Self::Season => "Season of use. Eg: fall and winter.",
            Self::WhenTheProductIsUsed => "Time of day or week of use. Eg: early in the morning.",
            Self::Appraisal => "Observations on price or value.",
            Self::Quality => "Observations on quality. Eg: poor quality, great quality.",
            Self::Durability => "Observations on durability. Eg: not durable, very durable.",
            Self::EaseOfUse => "Observations on ease of use. Eg: easy to use.",
            Self::SetupAndInstructions => "Observations on setup. Eg: unclear instructions, easy to set up.",
            Self::NoiseAndSmell => "Observations on noise or smell. Eg: too loud, plastic smell.",
            Self::SizeAndFit => "Observations on fit. Eg: too tight, fits well, too small.",
            Self::DangerAppraisal => "Observations on safety. Eg: can break and harm, safe for children.",
            Self::DesignAndAppearance => "Observations on design and appearance. Eg: love the design.",
            Self::PartsAndComponents => "Observations on parts. Eg: missing parts, easy to assemble.",
            Self::Issues => "Actionable product problems, if any, in at most 100 words. Eg: started to rust after one year.",
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

pub type ReviewAttributes = BTreeMap<Attribute, String>;

/// Answers the model gives when a review says nothing about an attribute.
const PLACEHOLDERS: &[&str] = &[
    "",
    "missing",
    "n/a",
    "na",
    "nan",
    "none",
    "not applicable",
    "not mentioned",
    "not specified",
    "null",
    "unknown",
];

fn is_placeholder(value: &str) -> bool {
    let value = value.trim().trim_end_matches('.').to_ascii_lowercase();
    PLACEHOLDERS.contains(&value.as_str())
}

pub fn attribute_function() -> FunctionSpec {
    let mut properties = Map::new();
    for attr in Attribute::ALL {
        properties.insert(
            attr.key().to_string(),
            json!({ "type": "string", "description": attr.guidance() }),
        );
    }
    let required: Vec<&str> = Attribute::ALL.iter().map(|a| a.key()).collect();
    FunctionSpec {
        name: REVIEW_DATA_FUNCTION.to_string(),
        description: "Describe what a product review says about each aspect of the product. \
                      Answer 'not mentioned' when the review is silent on an aspect."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

/// Decode `reviewData` arguments. Unknown keys are ignored, placeholders dropped.
pub fn parse_attributes(arguments: &str) -> Result<ReviewAttributes> {
    let raw: Map<String, Value> = serde_json::from_str(arguments)
        .map_err(|err| PipelineError::validation(format!("malformed review data payload: {err}")))?;
    let mut out = ReviewAttributes::new();
    for (key, value) in raw {
        let Some(attr) = Attribute::from_key(&key) else {
            debug!(%key, "ignoring unknown review attribute");
            continue;
        };
        match value {
            Value::Null => {}
            Value::String(text) if is_placeholder(&text) => {}
            Value::String(text) => {
                out.insert(attr, text.trim().to_string());
            }
            other => {
                return Err(PipelineError::validation(format!(
                    "review attribute `{key}` must be a string, got {other}"
                )))
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub model: String,
    pub temperature: f32,
    pub concurrency: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            temperature: 0.0,
            concurrency: 8,
        }
    }
}

pub struct AttributeExtractor {
    service: Arc<dyn CompletionService>,
    config: ExtractorConfig,
}

impl AttributeExtractor {
    pub fn new(service: Arc<dyn CompletionService>, config: ExtractorConfig) -> Self {
        Self { service, config }
    }

    /// One result per review text, aligned with the input.
    pub async fn extract(&self, reviews: &[String]) -> Vec<Result<ReviewAttributes>> {
        let results = map_bounded(reviews.to_vec(), self.config.concurrency, |review| async move {
            let request = CompletionRequest::function_call(
                format!("REVIEW: ```{review}```"),
                &self.config.model,
                self.config.temperature,
                attribute_function(),
            );
            let arguments = self.service.complete(request).await?;
            parse_attributes(&arguments)
        })
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "attribute extraction failed for some reviews");
        }
        info!(reviews = results.len() - failed, "extracted review attributes");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_serde() {
        for attr in Attribute::ALL {
            let encoded = serde_json::to_value(attr).unwrap();
            assert_eq!(encoded, attr.key());
            assert_eq!(Attribute::from_key(attr.key()), Some(attr));
        }
    }

    #[test]
    fn schema_requires_every_attribute() {
        let spec = attribute_function();
        assert_eq!(spec.name, REVIEW_DATA_FUNCTION);
        assert_eq!(spec.parameters["required"].as_array().unwrap().len(), 20);
        assert!(spec.parameters["properties"]["issues"]["description"].is_string());
    }

    #[test]
    fn placeholders_and_unknown_keys_are_dropped() {
        let parsed = parse_attributes(
            r#"{
                "issues": " zipper broke within a week ",
                "quality": "Not mentioned.",
                "season": null,
                "packaging": "N/A",
                "colors": "red"
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[&Attribute::Issues], "zipper broke within a week");
    }

    #[test]
    fn non_string_values_are_rejected() {
        assert!(parse_attributes(r#"{"issues": 3}"#).is_err());
        assert!(parse_attributes("[]").is_err());
        assert!(parse_attributes("not json").is_err());
    }
}
