use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use repurpose::config::Config;
use repurpose::db::{self, queries};
use repurpose::pipeline::cost::{ModelRates, PricingTable, TokenUsage};
use repurpose::pipeline::quota::{RateLimitTable, RateLimits};
use repurpose::routes::build_router;
use repurpose::services::claude::{ClaudeResult, LlmProvider, MessageContent, MessagesPayload, ProviderFailure};
use repurpose::state::AppState;

const TOKEN: &str = "session-token";

/// Answers by looking at what the prompt asks for.
struct ScriptedProvider;

fn prompt_text(payload: &MessagesPayload) -> String {
    match &payload.messages[0].content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn send(&self, payload: &MessagesPayload) -> Result<ClaudeResult, ProviderFailure> {
        let prompt = prompt_text(payload);
        let text = if prompt.contains("FAIL") || prompt.contains("nurture sequence") {
            return Err(ProviderFailure::new("Overloaded"));
        } else if prompt.contains("LinkedIn posts") {
            "---POST 1---\nHook one\n---POST 2---\nHook two"
        } else if prompt.contains("LIGHT TOUCH") {
            "Polished text"
        } else if prompt.contains("brand voice profile") {
            "You write with warmth."
        } else {
            "Single piece"
        };
        Ok(ClaudeResult {
            text: text.into(),
            usage: TokenUsage {
                input_tokens: 1000,
                output_tokens: 100,
                cache_creation_input_tokens: 0,
                cache_read_input_tokens: 0,
            },
        })
    }
}

struct TestApp {
    _temp_dir: tempfile::TempDir,
    state: AppState,
    router: axum::Router,
}

fn test_config(api_key: &str, db_path: &str) -> Config {
    Config {
        port: 0,
        database_path: db_path.into(),
        anthropic_api_key: api_key.into(),
        anthropic_base_url: "http://127.0.0.1:9".into(),
        default_model: "test-model".into(),
    }
}

async fn build_app_with(api_key: &str, per_minute: i64) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let db_path = temp_dir.path().join("test.db");
    let db_path = db_path.to_str().expect("utf-8 path").to_string();
    let conn = db::open_db(&db_path).expect("open db");

    queries::ensure_user(&conn, "user-1", Some("one@example.com")).unwrap();
    queries::insert_account(&conn, "acct-1", "user-1", Some("pro")).unwrap();
    queries::insert_auth_session(&conn, TOKEN, "user-1", None).unwrap();
    queries::ensure_user(&conn, "user-2", None).unwrap();
    queries::insert_account(&conn, "acct-2", "user-2", None).unwrap();
    queries::insert_auth_session(&conn, "other-token", "user-2", None).unwrap();
    queries::ensure_user(&conn, "no-account", None).unwrap();
    queries::insert_auth_session(&conn, "orphan-token", "no-account", None).unwrap();

    let pricing = PricingTable::new(ModelRates {
        input: 3.0,
        output: 15.0,
        cache_write: 3.75,
        cache_read: 0.3,
    });
    let limits = RateLimitTable::new(RateLimits {
        per_minute,
        per_day: 1000,
    });
    let state = AppState::with_provider(
        conn,
        test_config(api_key, &db_path),
        Arc::new(ScriptedProvider),
        pricing,
        limits,
    );
    let router = build_router(state.clone());

    TestApp {
        _temp_dir: temp_dir,
        state,
        router,
    }
}

async fn build_app() -> TestApp {
    build_app_with("sk-test", 100).await
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let body = response.into_body().collect().await.expect("body").to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()))
    };
    (status, value)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

fn gateway_body(prompt: &str) -> Value {
    json!({
        "payload": {
            "model": "claude-sonnet-4-20250514",
            "max_tokens": 100,
            "messages": [{"role": "user", "content": prompt}],
            "system": [{"type": "text", "text": "voice", "cache_control": {"type": "ephemeral"}}]
        },
        "logContext": {"operation": "content_generation", "contentType": "blog_post"}
    })
}

#[tokio::test]
async fn gateway_rejects_other_methods() {
    let app = build_app().await;
    let req = Request::builder()
        .method("GET")
        .uri("/api/anthropic")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn gateway_reports_missing_credentials() {
    let app = build_app_with("", 100).await;
    let (status, body) = send(&app, json_request("POST", "/api/anthropic", Some(TOKEN), gateway_body("hi"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["missing"], json!(["ANTHROPIC_API_KEY"]));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn gateway_requires_a_known_session_with_an_account() {
    let app = build_app().await;
    for token in [None, Some("wrong"), Some("orphan-token")] {
        let (status, _) = send(&app, json_request("POST", "/api/anthropic", token, gateway_body("hi"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {token:?}");
    }
}

#[tokio::test]
async fn gateway_rejects_malformed_bodies() {
    let app = build_app().await;
    let bad = Request::builder()
        .method("POST")
        .uri("/api/anthropic")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::from("not json"))
        .unwrap();
    assert_eq!(send(&app, bad).await.0, StatusCode::BAD_REQUEST);

    let no_model = json!({"payload": {"max_tokens": 5, "messages": []}});
    assert_eq!(
        send(&app, json_request("POST", "/api/anthropic", Some(TOKEN), no_model)).await.0,
        StatusCode::BAD_REQUEST
    );

    let blank_model = json!({"payload": {"model": " ", "max_tokens": 5, "messages": []}});
    let (status, body) = send(&app, json_request("POST", "/api/anthropic", Some(TOKEN), blank_model)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid payload");

    let conn = app.state.db.lock().await;
    assert!(queries::list_usage_for_account(&conn, "acct-1").unwrap().is_empty());
}

#[tokio::test]
async fn gateway_success_returns_text_and_priced_usage() {
    let app = build_app().await;
    let (status, body) = send(&app, json_request("POST", "/api/anthropic", Some(TOKEN), gateway_body("hi"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Single piece");
    assert_eq!(body["usage"]["input_tokens"], 1000);
    assert_eq!(body["usage"]["model"], "claude-sonnet-4-20250514");
    let cost = body["usage"]["estimated_cost"].as_f64().unwrap();
    assert!((cost - 0.0045).abs() < 1e-12);

    let conn = app.state.db.lock().await;
    let rows = queries::list_usage_for_account(&conn, "acct-1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].operation, "content_generation");
    assert_eq!(rows[0].content_type.as_deref(), Some("blog_post"));
}

#[tokio::test]
async fn gateway_provider_failure_is_bad_gateway() {
    let app = build_app().await;
    let (status, body) = send(&app, json_request("POST", "/api/anthropic", Some(TOKEN), gateway_body("FAIL"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Overloaded");
}

#[tokio::test]
async fn gateway_enforces_the_minute_window() {
    let app = build_app_with("sk-test", 2).await;
    for _ in 0..2 {
        let (status, _) = send(&app, json_request("POST", "/api/anthropic", Some(TOKEN), gateway_body("hi"))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app, json_request("POST", "/api/anthropic", Some(TOKEN), gateway_body("hi"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["window"], "minute");
}

#[tokio::test]
async fn account_routes_require_bearer_auth() {
    let app = build_app().await;
    let (status, _) = send(&app, json_request("POST", "/api/sources", None, json!({"text": "x"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, health).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn generation_flow_with_partial_failure_revisions_and_usage() {
    let app = build_app().await;

    // Upload a WebVTT transcript.
    let vtt = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:03.000\n<v Host>We shipped the thing.\n";
    let (status, source) = send(
        &app,
        json_request("POST", "/api/sources", Some(TOKEN), json!({"filename": "ep1.vtt", "content": vtt})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source["source_text"], "We shipped the thing.");
    assert_eq!(source["title"], "ep1.vtt");
    let source_id = source["id"].as_str().unwrap().to_string();

    // Three types, the email sequence fails at the provider.
    let (status, outcome) = send(
        &app,
        json_request(
            "POST",
            "/api/generations",
            Some(TOKEN),
            json!({
                "source_id": source_id,
                "content_types": ["linkedin_post", "email_sequence", "blog_post"],
                "tone": "casual",
                "options": {"linkedin_length": "long"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["generation"]["status"], "complete");
    let artifacts = outcome["artifacts"].as_array().unwrap();
    assert_eq!(artifacts.len(), 3);
    assert_eq!(artifacts[0]["content_metadata"]["linkedin_length"], "long");
    assert_eq!(outcome["outcomes"][1]["error"], "Overloaded");
    let generation_id = outcome["generation"]["id"].as_str().unwrap().to_string();

    let (status, detail) = send(
        &app,
        Request::builder()
            .uri(format!("/api/generations/{generation_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["artifacts"].as_array().unwrap().len(), 3);

    // Another account cannot see it.
    let (status, _) = send(
        &app,
        Request::builder()
            .uri(format!("/api/generations/{generation_id}"))
            .header(header::AUTHORIZATION, "Bearer other-token")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Manual edit, then AI polish of that edit: both hang off the original.
    let original_id = artifacts[2]["id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/content/{original_id}/revisions"),
            Some(TOKEN),
            json!({"text": "Edited", "metadata": {"kind": "email", "subject": "Oops"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Metadata does not apply to blog_post content");

    let (status, rev1) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/content/{original_id}/revisions"),
            Some(TOKEN),
            json!({"text": "Edited by hand"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rev1["revision_number"], 1);
    let rev1_id = rev1["id"].as_str().unwrap().to_string();

    let polish = Request::builder()
        .method("POST")
        .uri(format!("/api/content/{rev1_id}/polish"))
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, polished) = send(&app, polish).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(polished["revision"]["content_text"], "Polished text");
    assert_eq!(polished["revision"]["revision_of"], original_id.as_str());
    assert_eq!(polished["revision"]["revision_number"], 2);

    let (status, lineage) = send(
        &app,
        Request::builder()
            .uri(format!("/api/content/{rev1_id}/revisions"))
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lineage["original"]["id"], original_id.as_str());
    assert_eq!(lineage["revisions"].as_array().unwrap().len(), 3);

    // Archive hides content from the source listing.
    let (status, archived) = send(
        &app,
        json_request("POST", &format!("/api/content/{original_id}/archive"), Some(TOKEN), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["archived"], 1);

    let (status, listed) = send(
        &app,
        Request::builder()
            .uri(format!("/api/sources/{source_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let live = listed["content"].as_array().unwrap();
    assert!(live.iter().all(|a| a["id"] != original_id.as_str()));
    assert_eq!(live.len(), 4);
    assert_eq!(listed["existing_types"], json!(["linkedin_post", "blog_post"]));

    let post_ids: Vec<String> = artifacts[..2]
        .iter()
        .map(|a| a["id"].as_str().unwrap().to_string())
        .collect();
    let (status, bulk) = send(
        &app,
        json_request("POST", "/api/content/archive", Some("other-token"), json!({"ids": post_ids})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bulk["archived"], 0);
    let (_, bulk) = send(
        &app,
        json_request("POST", "/api/content/archive", Some(TOKEN), json!({"ids": post_ids})),
    )
    .await;
    assert_eq!(bulk["archived"], 2);

    // Usage: three generation calls (one failed) and one polish call.
    let (status, usage) = send(
        &app,
        Request::builder()
            .uri("/api/usage")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["plan_tier"], "pro");
    assert_eq!(usage["generations_used"], 1);
    assert_eq!(usage["generations_allowed"], 50);
    assert_eq!(usage["stats"]["call_count"], 4);
    assert_eq!(usage["stats"]["by_operation"]["content_generation"]["calls"], 3);
    assert_eq!(usage["stats"]["by_operation"]["content_revision"]["calls"], 1);
}

#[tokio::test]
async fn account_listings_cover_sources_generations_and_history() {
    let app = build_app().await;
    let mut source_ids = Vec::new();
    for title in ["First", "Second"] {
        let (status, source) = send(
            &app,
            json_request("POST", "/api/sources", Some(TOKEN), json!({"title": title, "text": "We shipped."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        source_ids.push(source["id"].as_str().unwrap().to_string());
    }

    let (status, outcome) = send(
        &app,
        json_request(
            "POST",
            "/api/generations",
            Some(TOKEN),
            json!({"source_id": source_ids[0], "content_types": ["linkedin_post", "blog_post"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let post_id = outcome["artifacts"][0]["id"].as_str().unwrap().to_string();

    let (status, sources) = send(&app, get_request("/api/sources", TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = sources.as_array().unwrap().iter().map(|s| s["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Second", "First"]);

    let (status, generations) = send(&app, get_request("/api/generations", TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generations.as_array().unwrap().len(), 1);
    assert_eq!(generations[0]["selected_types"], json!(["linkedin_post", "blog_post"]));

    let (status, history) = send(&app, get_request("/api/content", TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 3);

    let (_, blogs) = send(&app, get_request("/api/content?content_type=blog_post", TOKEN)).await;
    assert_eq!(blogs.as_array().unwrap().len(), 1);
    assert_eq!(blogs[0]["content_text"], "Single piece");

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/api/content/{post_id}/archive"), Some(TOKEN), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, live) = send(&app, get_request("/api/content", TOKEN)).await;
    assert_eq!(live.as_array().unwrap().len(), 2);
    let (_, archived) = send(&app, get_request("/api/content?archived=true", TOKEN)).await;
    assert_eq!(archived.as_array().unwrap().len(), 1);
    assert_eq!(archived[0]["id"], post_id.as_str());
    let (_, limited) = send(&app, get_request("/api/content?limit=1", TOKEN)).await;
    assert_eq!(limited.as_array().unwrap().len(), 1);

    for uri in ["/api/sources", "/api/generations", "/api/content"] {
        let (status, other) = send(&app, get_request(uri, "other-token")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(other.as_array().unwrap().is_empty(), "{uri} leaked across accounts");
    }
    let (status, _) = send(&app, Request::builder().uri("/api/content").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn brand_voice_analysis_updates_the_account() {
    let app = build_app().await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/brand-voice",
            Some(TOKEN),
            json!({"examples": ["We ship weekly."], "words_to_avoid": "synergy"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"], "You write with warmth.");

    let conn = app.state.db.lock().await;
    let account = queries::get_account_for_user(&conn, "user-1").unwrap().unwrap();
    assert_eq!(account.brand_voice_profile.as_deref(), Some("You write with warmth."));
    assert_eq!(account.words_to_avoid.as_deref(), Some("synergy"));
    let rows = queries::list_usage_for_account(&conn, "acct-1").unwrap();
    assert_eq!(rows[0].operation, "brand_voice_analysis");
    assert_eq!(rows[0].generation_id, None);
}

#[tokio::test]
async fn unsupported_uploads_are_rejected() {
    let app = build_app().await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/sources",
            Some(TOKEN),
            json!({"filename": "deck.pdf", "content": "%PDF", "mime_type": "application/pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported file type: application/pdf");
}
