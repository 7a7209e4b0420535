//! Gemini REST backend against a local HTTP stub.

mod common;

use common::StubServer;
use pretty_assertions::assert_eq;
use prism_adapters::gemini::{GeminiAdapter, GeminiApi};
use prism_core::{ToolOutput, ToolServer};
use serde_json::json;

fn adapter(stub: &StubServer) -> GeminiAdapter {
    let api = GeminiApi::new(Some("AIza-test".to_string())).with_api_base(stub.base_url.clone());
    GeminiAdapter::new(Box::new(api))
}

#[tokio::test]
async fn test_generate_joins_candidate_parts() {
    let stub = StubServer::json(&json!({
        "candidates": [{ "content": { "parts": [{ "text": "a" }, { "text": "b" }] } }]
    }))
    .await;

    let output = adapter(&stub)
        .call("gemini_generate", json!({ "prompt": "hi" }))
        .await
        .unwrap();
    assert_eq!(output, ToolOutput::text("a\nb"));

    let request = stub.single_request();
    assert_eq!(request.path, "/models/gemini-2.5-flash:generateContent");
    assert_eq!(request.headers["x-goog-api-key"], "AIza-test");
    assert_eq!(
        request.body,
        json!({ "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }] })
    );
}

#[tokio::test]
async fn test_research_enables_search_tool() {
    let stub = StubServer::json(&json!({
        "candidates": [{ "content": { "parts": [{ "text": "grounded" }] } }]
    }))
    .await;

    adapter(&stub)
        .call(
            "gemini_research",
            json!({ "query": "tokio 2.0", "depth": "thorough", "model": "gemini-2.5-pro" }),
        )
        .await
        .unwrap();

    let request = stub.single_request();
    assert_eq!(request.path, "/models/gemini-2.5-pro:generateContent");
    assert_eq!(request.body["tools"], json!([{ "google_search": {} }]));
    let prompt = request.body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("multiple sources and perspectives"));
    assert!(prompt.ends_with("Topic: tokio 2.0"));
}

#[tokio::test]
async fn test_empty_model_uses_default() {
    let stub = StubServer::json(&json!({
        "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
    }))
    .await;

    adapter(&stub)
        .call("gemini_generate", json!({ "prompt": "hi", "model": "" }))
        .await
        .unwrap();

    assert_eq!(
        stub.single_request().path,
        "/models/gemini-2.5-flash:generateContent"
    );
}

#[tokio::test]
async fn test_reply_without_candidates_falls_back_to_json() {
    let stub = StubServer::json(&json!({ "promptFeedback": { "blockReason": "SAFETY" } })).await;

    let output = adapter(&stub)
        .call("gemini_generate", json!({ "prompt": "hi" }))
        .await
        .unwrap();
    assert!(!output.is_error);
    assert!(output.joined_text().contains("\"blockReason\": \"SAFETY\""));
}

#[tokio::test]
async fn test_api_error_status() {
    let stub = StubServer::start(400, "application/json", "{\"error\":{\"code\":400}}").await;

    let output = adapter(&stub)
        .call("gemini_analyze", json!({ "prompt": "review", "context": "x" }))
        .await
        .unwrap();
    assert!(output.is_error);
    assert_eq!(
        output.joined_text(),
        "Error: Gemini API error (400): {\"error\":{\"code\":400}}"
    );
}
