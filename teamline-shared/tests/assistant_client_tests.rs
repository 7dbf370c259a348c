/// Generation-client tests against a mock HTTP server
///
/// These run fully in-process: wiremock stands in for the generation
/// API, so no network access or API key is needed.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use teamline_shared::assistant::{
    AssistantError, ChatTurn, GeminiClient, GeminiConfig, GenerationClient, TurnRole,
    SYSTEM_INSTRUCTION,
};

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        model: "gemini-2.5-flash".to_string(),
    })
}

fn history() -> Vec<ChatTurn> {
    vec![
        ChatTurn {
            role: TurnRole::User,
            text: "How do I split this epic?".to_string(),
        },
        ChatTurn {
            role: TurnRole::Model,
            text: "Break it into independent deliverables.".to_string(),
        },
        ChatTurn {
            role: TurnRole::User,
            text: "Give me three.".to_string(),
        },
    ]
}

#[tokio::test]
async fn test_generate_returns_first_candidate_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"parts": [{"text": "1. API 2. UI 3. Docs"}], "role": "model"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server)
        .generate(&history(), SYSTEM_INSTRUCTION)
        .await
        .unwrap();

    assert_eq!(reply, "1. API 2. UI 3. Docs");
}

#[tokio::test]
async fn test_generate_sends_history_and_system_instruction() {
    let server = MockServer::start().await;

    // The matcher pins the wire contract: ordered contents with
    // user/model roles, and the system instruction alongside them.
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "How do I split this epic?"}]},
                {"role": "model", "parts": [{"text": "Break it into independent deliverables."}]},
                {"role": "user", "parts": [{"text": "Give me three."}]}
            ],
            "systemInstruction": {"parts": [{"text": SYSTEM_INSTRUCTION}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server)
        .generate(&history(), SYSTEM_INSTRUCTION)
        .await
        .unwrap();

    assert_eq!(reply, "ok");
}

#[tokio::test]
async fn test_generate_upstream_error_surfaces_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("quota exhausted"),
        )
        .mount(&server)
        .await;

    let result = client_for(&server)
        .generate(&history(), SYSTEM_INSTRUCTION)
        .await;

    match result {
        Err(AssistantError::Api { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "quota exhausted");
        }
        other => panic!("expected Api error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_generate_empty_candidates_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .generate(&history(), SYSTEM_INSTRUCTION)
        .await;

    assert!(matches!(result, Err(AssistantError::EmptyResponse)));
}
