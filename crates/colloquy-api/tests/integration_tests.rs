//! Integration tests for the Colloquy HTTP API.
//!
//! Every test builds its own router over scripted chat, mock speech and mock
//! vision services, and drives it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use colloquy_api::create_router;
use colloquy_api::handlers::{HealthResponse, HistoryResponse, SessionCreated, SessionList};
use colloquy_api::state::AppState;
use colloquy_chat::{ChatOrchestrator, ScriptedChatService};
use colloquy_core::config::ColloquyConfig;
use colloquy_speech::{MockAudioSource, MockRecognizer, VoiceInput};
use colloquy_vision::MockImageDescriber;

// =============================================================================
// Helpers
// =============================================================================

fn make_state_with(chat: ScriptedChatService, voice: Option<VoiceInput>) -> AppState {
    let config = ColloquyConfig::default();
    let orchestrator = ChatOrchestrator::new(config.chat.clone(), Arc::new(chat));
    AppState::new(
        config,
        orchestrator,
        voice,
        Arc::new(MockImageDescriber::new("a cat on a mat")),
    )
}

fn make_state() -> AppState {
    make_state_with(
        ScriptedChatService::new(["Hello, ", "world!"]),
        Some(voice(MockRecognizer::recognizing("what is rust"))),
    )
}

fn voice(recognizer: MockRecognizer) -> VoiceInput {
    VoiceInput::new(Arc::new(MockAudioSource::new()), Arc::new(recognizer))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).unwrap()
}

fn multipart(uri: &str, field: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "colloquy-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Split an SSE body into (event name, JSON data) pairs.
async fn sse_events(resp: axum::response::Response) -> Vec<(String, Value)> {
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    text.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = Vec::new();
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push(v.strip_prefix(' ').unwrap_or(v).to_string());
                }
            }
            let name = name?;
            Some((name, serde_json::from_str(&data.join("\n")).unwrap()))
        })
        .collect()
}

async fn create_session(app: &axum::Router) -> Uuid {
    let resp = app
        .clone()
        .oneshot(post_empty("/api/sessions"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: SessionCreated = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    created.id
}

async fn history(app: &axum::Router, id: Uuid) -> HistoryResponse {
    let resp = app
        .clone()
        .oneshot(get(&format!("/api/sessions/{}/history", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn names(events: &[(String, Value)]) -> Vec<&str> {
    events.iter().map(|(n, _)| n.as_str()).collect()
}

// =============================================================================
// Page and health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = create_router(make_state());
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.chat_model, "gemini-pro");
    assert!(health.speech_enabled);
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_root_and_ui_serve_page() {
    let app = create_router(make_state());
    for path in ["/", "/ui"] {
        let resp = app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(ct.starts_with("text/html"));
        let html = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(html.contains("<title>Personalized Chat Bot</title>"));
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_create_and_list_sessions() {
    let app = create_router(make_state());
    let a = create_session(&app).await;
    let b = create_session(&app).await;

    let resp = app.clone().oneshot(get("/api/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list: SessionList = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let ids: Vec<Uuid> = list.sessions.iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a));
    assert!(ids.contains(&b));
}

#[tokio::test]
async fn test_new_session_has_empty_history() {
    let app = create_router(make_state());
    let id = create_session(&app).await;
    let h = history(&app, id).await;
    assert_eq!(h.session_id, id);
    assert!(h.turns.is_empty());
}

#[tokio::test]
async fn test_delete_session() {
    let app = create_router(make_state());
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(delete(&format!("/api/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(delete(&format!("/api/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_history_unknown_session() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(get(&format!("/api/sessions/{}/history", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Ask
// =============================================================================

#[tokio::test]
async fn test_ask_streams_turns_chunks_and_response() {
    let app = create_router(make_state());
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/ask", id),
            r#"{"query":"Hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_events(resp).await;
    assert_eq!(
        names(&events),
        vec!["turn", "turn", "chunk", "turn", "chunk", "response"]
    );
    assert_eq!(events[0].1["speaker"], "user");
    assert_eq!(events[0].1["label"], "You");
    assert_eq!(events[0].1["text"], "Hi");
    assert_eq!(events[1].1["speaker"], "bot");
    assert_eq!(events[2].1["text"], "Hello, ");
    assert_eq!(events[4].1["text"], "world!");
    assert_eq!(events[5].1["text"], "Hello, \nworld!\n");

    let h = history(&app, id).await;
    let texts: Vec<&str> = h.turns.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["Hi", "Hello, ", "world!"]);
}

#[tokio::test]
async fn test_ask_appends_to_existing_history() {
    let app = create_router(make_state());
    let id = create_session(&app).await;
    for q in ["first", "second"] {
        let resp = app
            .clone()
            .oneshot(post_json(
                &format!("/api/sessions/{}/ask", id),
                &serde_json::json!({ "query": q }).to_string(),
            ))
            .await
            .unwrap();
        sse_events(resp).await;
    }
    let h = history(&app, id).await;
    assert_eq!(h.turns.len(), 6);
    assert_eq!(h.turns[3].text, "second");
}

#[tokio::test]
async fn test_ask_empty_query_rejected() {
    let app = create_router(make_state());
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/ask", id),
            r#"{"query":"   "}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "bad_request");

    assert!(history(&app, id).await.turns.is_empty());
}

#[tokio::test]
async fn test_ask_unknown_session() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/ask", Uuid::new_v4()),
            r#"{"query":"Hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ask_failure_mid_stream_reports_error_event() {
    let app = create_router(make_state_with(
        ScriptedChatService::new(["partial", "never"]).failing_after(1, "connection reset"),
        None,
    ));
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/ask", id),
            r#"{"query":"Q"}"#,
        ))
        .await
        .unwrap();
    let events = sse_events(resp).await;
    assert_eq!(names(&events), vec!["turn", "turn", "chunk", "error"]);
    assert_eq!(events[3].1["error"], "chat_failed");
    assert!(events[3].1["message"]
        .as_str()
        .unwrap()
        .contains("connection reset"));

    let h = history(&app, id).await;
    assert_eq!(h.turns.len(), 2);
}

#[tokio::test]
async fn test_ask_failure_on_start_keeps_user_turn() {
    let app = create_router(make_state_with(
        ScriptedChatService::new(["x"]).failing_on_start("API key not valid"),
        None,
    ));
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/ask", id),
            r#"{"query":"Q"}"#,
        ))
        .await
        .unwrap();
    let events = sse_events(resp).await;
    assert_eq!(names(&events), vec!["turn", "error"]);
    assert_eq!(history(&app, id).await.turns.len(), 1);
}

// =============================================================================
// Speak
// =============================================================================

#[tokio::test]
async fn test_speak_recognized_submits_transcript() {
    let app = create_router(make_state());
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_empty(&format!("/api/sessions/{}/speak", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let events = sse_events(resp).await;

    assert_eq!(events[0].0, "notice");
    assert_eq!(events[0].1["text"], "Listening...");
    assert_eq!(events[1].0, "notice");
    assert_eq!(events[1].1["level"], "success");
    assert_eq!(events[1].1["text"], "You said: what is rust");
    assert_eq!(events.last().unwrap().0, "response");

    let h = history(&app, id).await;
    let speakers: Vec<String> = h
        .turns
        .iter()
        .map(|t| t.label.clone())
        .collect();
    assert_eq!(speakers, vec!["You (via speech)", "You", "Bot", "Bot"]);
}

#[tokio::test]
async fn test_speak_not_understood_appends_nothing() {
    let app = create_router(make_state_with(
        ScriptedChatService::new(["x"]),
        Some(voice(MockRecognizer::unintelligible())),
    ));
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_empty(&format!("/api/sessions/{}/speak", id)))
        .await
        .unwrap();
    let events = sse_events(resp).await;
    assert_eq!(names(&events), vec!["notice", "notice"]);
    assert_eq!(events[1].1["level"], "error");
    assert_eq!(events[1].1["text"], "Sorry, I did not understand that.");

    assert!(history(&app, id).await.turns.is_empty());
}

#[tokio::test]
async fn test_speak_service_unavailable_notice() {
    let app = create_router(make_state_with(
        ScriptedChatService::new(["x"]),
        Some(voice(MockRecognizer::unavailable("recognition connection failed"))),
    ));
    let id = create_session(&app).await;

    let resp = app
        .clone()
        .oneshot(post_empty(&format!("/api/sessions/{}/speak", id)))
        .await
        .unwrap();
    let events = sse_events(resp).await;
    assert_eq!(
        events[1].1["text"],
        "Could not request results from the speech recognition service; recognition connection failed"
    );
    assert!(history(&app, id).await.turns.is_empty());
}

#[tokio::test]
async fn test_speak_disabled() {
    let app = create_router(make_state_with(ScriptedChatService::new(["x"]), None));
    let id = create_session(&app).await;

    let resp = app
        .oneshot(post_empty(&format!("/api/sessions/{}/speak", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Clear history
// =============================================================================

#[tokio::test]
async fn test_clear_history_is_idempotent() {
    let app = create_router(make_state());
    let id = create_session(&app).await;
    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/ask", id),
            r#"{"query":"Hi"}"#,
        ))
        .await
        .unwrap();
    sse_events(resp).await;
    assert_eq!(history(&app, id).await.turns.len(), 3);

    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(delete(&format!("/api/sessions/{}/history", id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cleared: HistoryResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert!(cleared.turns.is_empty());
    }
    assert!(history(&app, id).await.turns.is_empty());
}

// =============================================================================
// Image analysis
// =============================================================================

#[tokio::test]
async fn test_analyze_image() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(multipart("/api/analyze-image", "image", b"\x89PNG fake bytes"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["description"], "a cat on a mat");
}

#[tokio::test]
async fn test_analyze_image_missing_field() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(multipart("/api/analyze-image", "photo", b"bytes"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert!(json["message"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn test_analyze_image_empty_upload() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(multipart("/api/analyze-image", "image", b""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
