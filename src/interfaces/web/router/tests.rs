use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use super::*;
use crate::core::cache::{CacheGateway, eventually_cached, keys};
use crate::core::integrations::providers::KeywordDataClient;
use crate::core::integrations::testing::{FnTransport, Harness, harness};
use crate::core::store::{
    AccessStore, BriefRecord, BriefRequirements, BriefStore, ClientRecord, ClientStore,
    ContentRecord, NewBrief, NewContent,
};
use crate::core::sync::SyncOrchestrator;
use crate::core::workflow::WorkflowEngine;

struct TestApp {
    h: Harness,
    router: Router,
}

fn keyword_transport() -> Arc<FnTransport> {
    Arc::new(FnTransport::new("keyword_data", |_, request, _| {
        let task = &request.body.as_ref().unwrap()[0];
        Ok(json!({ "target": task["target"], "organic_keywords": 10 }))
    }))
}

async fn test_app_on(host: &str, deny: bool) -> TestApp {
    let h = harness(deny).await;
    let cache = CacheGateway::new(h.kv.clone());
    let keyword = KeywordDataClient::new(h.ctx.clone(), keyword_transport());
    let state = AppState {
        store: h.store.clone(),
        cache: cache.clone(),
        workflow: WorkflowEngine::new(h.store.clone(), cache),
        sync: Arc::new(SyncOrchestrator::new(h.store.clone()).with_keyword_data(Arc::new(keyword))),
        api_host: host.to_string(),
        api_port: 17990,
    };
    TestApp {
        router: build_api_router(state),
        h,
    }
}

async fn test_app() -> TestApp {
    test_app_on("127.0.0.1", false).await
}

async fn seed(app: &TestApp) -> (BriefRecord, ContentRecord) {
    app.h
        .store
        .upsert_client(&ClientRecord {
            id: "acme".into(),
            name: "Acme".into(),
            domain: "acme.test".into(),
            target_keywords: vec!["anvils".into()],
        })
        .await
        .unwrap();
    let brief = app
        .h
        .store
        .create_brief(NewBrief {
            client_id: "acme".into(),
            title: "Anvil buying guide".into(),
            target_keyword: "anvils".into(),
            priority: "high".into(),
            requirements: BriefRequirements::default(),
        })
        .await
        .unwrap();
    let content = app
        .h
        .store
        .create_content(NewContent {
            brief_id: brief.id.clone(),
            client_id: "acme".into(),
            body: "Anvils are heavy.".into(),
            status: "reviewing".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    (brief, content)
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

#[tokio::test]
async fn legal_transition_moves_the_brief() {
    let app = test_app().await;
    let (brief, _) = seed(&app).await;

    let uri = format!("/api/briefs/{}/transition", brief.id);
    let (status, _, body) = send(&app, "POST", &uri, Some(json!({"status": "approved"})), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from"], "draft");
    assert_eq!(body["to"], "approved");
    // Open loopback mode has no actor to stamp.
    assert!(body["approved_by"].is_null());
    let stored = app.h.store.get_brief(&brief.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "approved");
}

#[tokio::test]
async fn illegal_transition_is_rejected_without_writing() {
    let app = test_app().await;
    let (brief, _) = seed(&app).await;

    let uri = format!("/api/briefs/{}/transition", brief.id);
    let (status, _, body) =
        send(&app, "POST", &uri, Some(json!({"status": "published"})), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_transition");
    let stored = app.h.store.get_brief(&brief.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "draft");
}

#[tokio::test]
async fn transition_of_unknown_brief_is_not_found() {
    let app = test_app().await;
    let (status, _, body) = send(
        &app,
        "POST",
        "/api/briefs/missing/transition",
        Some(json!({"status": "approved"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn transition_without_status_is_a_validation_error() {
    let app = test_app().await;
    let (brief, _) = seed(&app).await;
    let uri = format!("/api/briefs/{}/transition", brief.id);
    let (status, _, body) = send(&app, "POST", &uri, Some(json!({"state": "x"})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn brief_listing_is_cached_until_a_transition_invalidates_it() {
    let app = test_app().await;
    let (brief, _) = seed(&app).await;
    let key = keys::client_briefs("acme");

    let (status, _, body) = send(&app, "GET", "/api/briefs?client_id=acme", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["status"], "draft");
    assert!(eventually_cached(&app.h.kv, &key).await);

    let uri = format!("/api/briefs/{}/transition", brief.id);
    send(&app, "POST", &uri, Some(json!({"status": "approved"})), None).await;
    assert!(app.h.kv.peek(&key).await.is_none());

    let (_, _, body) = send(&app, "GET", "/api/briefs?client_id=acme", None, None).await;
    assert_eq!(body[0]["status"], "approved");
}

#[tokio::test]
async fn brief_listing_requires_a_client() {
    let app = test_app().await;
    let (status, _, body) = send(&app, "GET", "/api/briefs", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn approving_content_publishes_it_and_its_brief() {
    let app = test_app().await;
    let (brief, content) = seed(&app).await;

    let uri = format!("/api/content/{}/review", content.id);
    let (status, _, body) = send(
        &app,
        "POST",
        &uri,
        Some(json!({"action": "approve", "reviewer_notes": "Ship it", "review_time_minutes": 12})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "published");
    assert_eq!(body["reviewer_notes"], "Ship it");
    assert_eq!(body["human_review_time_minutes"], 12);
    let stored = app.h.store.get_brief(&brief.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "published");
}

#[tokio::test]
async fn unknown_review_action_is_rejected() {
    let app = test_app().await;
    let (_, content) = seed(&app).await;
    let uri = format!("/api/content/{}/review", content.id);
    let (status, _, body) = send(&app, "POST", &uri, Some(json!({"action": "reject"})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn sync_rejects_unknown_providers() {
    let app = test_app().await;
    seed(&app).await;
    let (status, _, body) = send(
        &app,
        "POST",
        "/api/clients/acme/sync",
        Some(json!({"provider": "backlinks"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_provider");
}

#[tokio::test]
async fn sync_of_unknown_client_is_not_found() {
    let app = test_app().await;
    let (status, _, body) = send(
        &app,
        "POST",
        "/api/clients/nobody/sync",
        Some(json!({"provider": "keyword_data"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn keyword_sync_reports_metrics_and_feeds_health() {
    let app = test_app().await;
    seed(&app).await;
    let (status, _, body) = send(
        &app,
        "POST",
        "/api/clients/acme/sync",
        Some(json!({"provider": "keyword_data"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "keyword_data");
    assert_eq!(body["domain_metrics"]["domain"], "acme.test");

    app.h.ctx.telemetry.flush().await;
    let (status, _, body) = send(&app, "GET", "/api/integrations/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providers"][0]["provider"], "keyword_data");
    assert_eq!(body["providers"][0]["status"], "healthy");
}

#[tokio::test]
async fn rate_limited_sync_carries_retry_after() {
    let app = test_app_on("127.0.0.1", true).await;
    seed(&app).await;
    let (status, headers, body) = send(
        &app,
        "POST",
        "/api/clients/acme/sync",
        Some(json!({"provider": "keyword_data"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["kind"], "rate_limited");
    assert_eq!(body["retry_after"], 30);
    assert_eq!(headers[header::RETRY_AFTER], "30");
}

#[tokio::test]
async fn health_starts_empty() {
    let app = test_app().await;
    let (status, _, body) = send(&app, "GET", "/api/integrations/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "providers": [] }));
}

#[tokio::test]
async fn issued_tokens_close_open_mode() {
    let app = test_app().await;
    seed(&app).await;
    let (raw, _) = app.h.store.create_api_token("ci", "alice").await.unwrap();

    let (status, _, body) = send(&app, "GET", "/api/briefs?client_id=acme", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthenticated");

    let (status, _, _) =
        send(&app, "GET", "/api/briefs?client_id=acme", None, Some("bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) =
        send(&app, "GET", "/api/briefs?client_id=acme", None, Some(&raw)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "access_denied");

    app.h.store.grant_client_access("alice", "acme").await.unwrap();
    let (status, _, _) = send(&app, "GET", "/api/briefs?client_id=acme", None, Some(&raw)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn approval_by_token_holder_is_stamped() {
    let app = test_app().await;
    let (brief, _) = seed(&app).await;
    let (raw, _) = app.h.store.create_api_token("ci", "alice").await.unwrap();
    app.h.store.grant_client_access("alice", "acme").await.unwrap();

    let uri = format!("/api/briefs/{}/transition", brief.id);
    let (status, _, body) = send(
        &app,
        "POST",
        &uri,
        Some(json!({"status": "approved"})),
        Some(&raw),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved_by"], "alice");
    assert!(body["approved_at"].is_string());
}

#[tokio::test]
async fn sync_checks_access_before_reading_the_body() {
    let app = test_app().await;
    seed(&app).await;
    let (raw, _) = app.h.store.create_api_token("ci", "mallory").await.unwrap();
    let (status, _, _) = send(
        &app,
        "POST",
        "/api/clients/acme/sync",
        Some(json!({"provider": "backlinks"})),
        Some(&raw),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn non_loopback_bind_without_tokens_is_closed() {
    let app = test_app_on("0.0.0.0", false).await;
    let (status, _, _) = send(&app, "GET", "/api/integrations/health", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = test_app_on("0.0.0.0", false).await;
    // Rejections from the auth layer are covered too.
    let (_, headers, _) = send(&app, "GET", "/api/integrations/health", None, None).await;
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn cors_admits_loopback_origins_only() {
    let app = test_app().await;
    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/api/integrations/health")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app
        .router
        .clone()
        .oneshot(preflight("http://localhost:17990"))
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:17990"
    );

    let foreign = app
        .router
        .clone()
        .oneshot(preflight("http://evil.test"))
        .await
        .unwrap();
    assert!(
        foreign
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}
