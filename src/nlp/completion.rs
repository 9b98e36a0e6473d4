//! Boundary for LLM completion services.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// JSON-schema described function the model is forced to call.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    /// When set, the response text is the function call's JSON arguments.
    pub function: Option<FunctionSpec>,
}

impl CompletionRequest {
    pub fn function_call(
        prompt: String,
        model: &str,
        temperature: f32,
        function: FunctionSpec,
    ) -> Self {
        Self {
            prompt,
            model: model.to_string(),
            temperature,
            function: Some(function),
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Run a forced function call and decode its arguments into `T`.
pub async fn complete_as<T: DeserializeOwned>(
    service: &dyn CompletionService,
    request: CompletionRequest,
) -> Result<T> {
    let name = request
        .function
        .as_ref()
        .map(|f| f.name.clone())
        .unwrap_or_default();
    let arguments = service.complete(request).await?;
    serde_json::from_str(&arguments)
        .map_err(|err| PipelineError::validation(format!("malformed `{name}` payload: {err}")))
}
