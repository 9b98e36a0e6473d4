//! Problem statements for the issue clusters of an investigation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::{
    completion::{complete_as, CompletionRequest, CompletionService, FunctionSpec},
    products::ProductDescription,
};
use crate::{error::Result, pool::map_bounded};

pub const PROBLEM_STATEMENT_FUNCTION: &str = "problemStatement";

/// Quotes passed to the model per issue.
pub const MAX_VOICE_EXAMPLES: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProblemArguments {
    problem_identification: String,
    problem_statement: String,
    #[serde(default)]
    customer_voice_examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemStatement {
    /// Label of the issue cluster the statement was written for.
    pub issue: String,
    pub problem_identification: String,
    pub problem_statement: String,
    pub customer_voice_examples: Vec<String>,
}

/// An issue cluster together with the customer quotes that make it up.
#[derive(Debug, Clone)]
pub struct IssueCluster {
    pub label: String,
    pub quotes: Vec<String>,
}

pub fn problem_statement_function() -> FunctionSpec {
    FunctionSpec {
        name: PROBLEM_STATEMENT_FUNCTION.to_string(),
        description: "Isolate and describe the single primary issue of a product from customer \
                      complaints and the product description."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "problemIdentification": {
                    "type": "string",
                    "description": "The key problem with the product, in one short phrase."
                },
                "problemStatement": {
                    "type": "string",
                    "description": "A detailed statement of the problem grounded in the complaints, up to 200 words."
                },
                "customerVoiceExamples": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Up to 10 customer quotes that illustrate the problem and its impact."
                }
            },
            "required": ["problemIdentification", "problemStatement", "customerVoiceExamples"]
        }),
    }
}

pub fn problem_prompt(issue: &IssueCluster, product: Option<&ProductDescription>) -> String {
    let quotes = issue
        .quotes
        .iter()
        .take(MAX_VOICE_EXAMPLES)
        .map(|q| format!("- {q}"))
        .collect::<Vec<_>>()
        .join("\n");
    let mut prompt = format!("ISSUE: {}\nCUSTOMER VOICE EXAMPLES:\n{quotes}", issue.label);
    if let Some(product) = product {
        prompt.push_str(&format!("\nPRODUCT DESCRIPTION: {}", product.summary));
    }
    prompt
}

/// One statement per issue; issues whose call fails are logged and left out.
pub async fn write_problem_statements(
    service: Arc<dyn CompletionService>,
    issues: Vec<IssueCluster>,
    product: Option<&ProductDescription>,
    model: &str,
    temperature: f32,
    concurrency: usize,
) -> Vec<ProblemStatement> {
    let service = service.as_ref();
    let results = map_bounded(issues, concurrency, |issue| async move {
        let request = CompletionRequest::function_call(
            problem_prompt(&issue, product),
            model,
            temperature,
            problem_statement_function(),
        );
        let parsed: Result<ProblemArguments> = complete_as(service, request).await;
        (issue.label, parsed)
    })
    .await;

    let mut statements = Vec::new();
    for (issue, parsed) in results {
        match parsed {
            Ok(args) => statements.push(ProblemStatement {
                issue,
                problem_identification: args.problem_identification.trim().to_string(),
                problem_statement: args.problem_statement.trim().to_string(),
                customer_voice_examples: args.customer_voice_examples,
            }),
            Err(err) => warn!(%issue, %err, "problem statement failed"),
        }
    }
    info!(statements = statements.len(), "wrote problem statements");
    statements
}
