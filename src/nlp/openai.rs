//! OpenAI-compatible REST client for embeddings and chat completions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::{
    completion::{CompletionRequest, CompletionService, FunctionSpec},
    embeddings::Embedder,
};
use crate::{
    config::Settings,
    error::{PipelineError, Result},
};

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(PipelineError::validation("missing OpenAI API key"));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| PipelineError::validation("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent("review-lens/0.1")
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let key = settings.require_api_key()?;
        Ok(Self::new(
            key,
            &settings.openai_base_url,
            settings.http_timeout(),
        )?)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/{path}", self.base_url);
        let resp = self.client.post(&url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(status_error(status, &text));
        }
        resp.json::<R>()
            .await
            .map_err(|err| PipelineError::Service(format!("undecodable response from {path}: {err}")))
    }
}

fn status_error(status: StatusCode, body: &str) -> PipelineError {
    match status {
        StatusCode::BAD_REQUEST => {
            PipelineError::validation(format!("OpenAI rejected the request: {body}"))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PipelineError::Service(format!("OpenAI refused credentials ({status}): {body}"))
        }
        _ => PipelineError::Service(format!("OpenAI returned {status}: {body}")),
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model,
            input: [text],
        };
        let parsed: EmbeddingResponse = self.post("embeddings", &request).await?;
        parsed
            .data
            .into_iter()
            .min_by_key(|entry| entry.index)
            .map(|entry| entry.embedding)
            .ok_or_else(|| PipelineError::Service("OpenAI returned no embedding".into()))
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let function_call = request
            .function
            .as_ref()
            .map(|f| FunctionCallChoice { name: &f.name });
        let body = ChatRequest {
            model: &request.model,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            functions: request.function.as_ref().map(std::slice::from_ref),
            function_call,
        };
        let parsed: ChatResponse = self.post("chat/completions", &body).await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion usage"
            );
        }
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| PipelineError::Service("OpenAI returned no choices".into()))?;
        match (request.function.is_some(), message.function_call, message.content) {
            (true, Some(call), _) => Ok(call.arguments),
            (true, None, _) => Err(PipelineError::validation(
                "expected a function call in the completion",
            )),
            (false, _, Some(content)) => Ok(content),
            (false, _, None) => Err(PipelineError::validation("completion had no content")),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<&'a [FunctionSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallChoice<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct FunctionCallChoice<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
