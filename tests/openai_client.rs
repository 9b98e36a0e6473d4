use std::time::Duration;

use review_lens::{
    error::PipelineError,
    nlp::{
        completion::{CompletionRequest, CompletionService},
        embeddings::Embedder,
        labels::{label_function, parse_label},
        openai::OpenAiClient,
    },
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new("sk-test", &server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn embeds_text_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "text-embedding-ada-002", "input": ["sturdy zipper"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }],
            "model": "text-embedding-ada-002"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vector = client(&server)
        .embed("sturdy zipper", "text-embedding-ada-002")
        .await
        .unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn server_errors_surface_as_service_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = client(&server).embed("text", "model").await.unwrap_err();
    assert!(matches!(err, PipelineError::Service(ref msg) if msg.contains("slow down")));
}

#[tokio::test]
async fn function_call_arguments_are_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "function_call": { "name": "clusterLabel" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": "clusterLabel",
                        "arguments": "{\"clusterLabel\": \"zipper breaks within the first week\"}"
                    }
                }
            }],
            "usage": { "prompt_tokens": 40, "completion_tokens": 12 }
        })))
        .mount(&server)
        .await;

    let request = CompletionRequest {
        prompt: "label these".into(),
        model: "gpt-3.5-turbo".into(),
        temperature: 0.0,
        function: Some(label_function()),
    };
    let arguments = client(&server).complete(request).await.unwrap();
    assert_eq!(parse_label(&arguments).unwrap(), "zipper breaks within the first week");
}

#[tokio::test]
async fn plain_content_without_function_call_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "a label" } }]
        })))
        .mount(&server)
        .await;

    let request = CompletionRequest {
        prompt: "label these".into(),
        model: "gpt-3.5-turbo".into(),
        temperature: 0.0,
        function: Some(label_function()),
    };
    let err = client(&server).complete(request).await.unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn empty_key_is_refused() {
    assert!(OpenAiClient::new("  ", "http://localhost", Duration::from_secs(1)).is_err());
}
