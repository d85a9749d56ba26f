//! HTTP-level tests driving the router with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use artifact_curator_backend::api::routes::create_router;
use artifact_curator_backend::models::user::Role;

use common::{TestContext, SYSTEM_IDENTITY};

struct Caller<'a> {
    identity: &'a str,
    role: &'a str,
}

const ALICE: Caller = Caller {
    identity: "0xalice",
    role: "MEMBER",
};
const BOB: Caller = Caller {
    identity: "0xbob",
    role: "MEMBER",
};
const EXPERT: Caller = Caller {
    identity: "0xexpert",
    role: "EXPERT",
};
const ADMIN: Caller = Caller {
    identity: "0xadmin",
    role: "ADMIN",
};

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Option<&Caller<'_>>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder
            .header("x-user-id", caller.identity)
            .header("x-user-role", caller.role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn artifact_body() -> Value {
    json!({
        "title": "Harbor map of 1921",
        "description": "Hand-drawn survey of the harbor entrance",
        "type": "image",
        "source_url": "https://archive.example.org/maps/harbor",
        "tags": ["maps"]
    })
}

async fn create(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/artifacts",
        Some(&ALICE),
        Some(artifact_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["ledger"]["status"], "configured");

    let ctx = TestContext::without_integrations().await;
    let app = create_router(ctx.state.clone());
    let (status, body) = send(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["content_store"]["status"], "disabled");

    let (status, _) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_submission_requires_identity() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/artifacts",
        None,
        Some(artifact_body()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_reserved_identity_is_refused() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let impostor = Caller {
        identity: SYSTEM_IDENTITY,
        role: "ADMIN",
    };

    let (status, _) = send(&app, Method::POST, "/api/v1/admin/sweep", Some(&impostor), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_role_is_refused() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let caller = Caller {
        identity: "0xcarol",
        role: "OWNER",
    };
    let (status, body) = send(&app, Method::GET, "/api/v1/artifacts", Some(&caller), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_vote_flow_status_codes() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let id = create(&app).await;
    let votes = format!("/api/v1/artifacts/{}/votes", id);

    let (status, body) = send(
        &app,
        Method::POST,
        &votes,
        Some(&BOB),
        Some(json!({"value": "APPROVE"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["value"], "APPROVE");

    let (status, body) = send(
        &app,
        Method::POST,
        &votes,
        Some(&BOB),
        Some(json!({"value": "REJECT"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(
        &app,
        Method::POST,
        &votes,
        Some(&ALICE),
        Some(json!({"value": "APPROVE"})),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "PRECONDITION_FAILED");

    let summary = format!("{}/summary", votes);
    let (status, body) = send(&app, Method::GET, &summary, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&app, Method::GET, &summary, Some(&ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approve"], 1);
    assert_eq!(body["status"], "COMMUNITY_REVIEW");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("{}/mine", votes),
        Some(&BOB),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "APPROVE");
}

#[tokio::test]
async fn test_missing_artifact_is_not_found() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let uri = format!("/api/v1/artifacts/{}/votes", uuid::Uuid::new_v4());

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&BOB),
        Some(json!({"value": "APPROVE"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_hidden_artifact_is_not_found_for_outsiders() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let id = create(&app).await;
    let uri = format!("/api/v1/artifacts/{}", id);

    let (status, _) = send(&app, Method::GET, &uri, Some(&BOB), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, Method::GET, &uri, Some(&ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMMUNITY_REVIEW");
    assert_eq!(body["type"], "image");

    let pin_info = format!("/api/v1/ipfs/artifacts/{}", id);
    let (status, _) = send(&app, Method::GET, &pin_info, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let my_vote = format!("{}/votes/mine", uri);
    let (status, _) = send(&app, Method::GET, &my_vote, Some(&BOB), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_member_cannot_use_expert_endpoints() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let id = create(&app).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/expert/queue", Some(&BOB), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/expert/artifacts/{}/review", id),
        Some(&BOB),
        Some(json!({"decision": "APPROVE"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/ipfs/artifacts/{}/pin", id),
        Some(&BOB),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/v1/admin/stats", Some(&EXPERT), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_full_review_over_http() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let id = create(&app).await;
    let uuid = uuid::Uuid::parse_str(&id).unwrap();
    ctx.approve_votes(uuid, 3).await;
    ctx.clock.advance(Duration::days(8));

    let (status, body) = send(&app, Method::POST, "/api/v1/admin/sweep", Some(&ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["advanced"], 1);

    let (status, body) = send(&app, Method::GET, "/api/v1/expert/queue", Some(&EXPERT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["items"][0]["artifact"]["id"], id.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/expert/artifacts/{}/review", id),
        Some(&EXPERT),
        Some(json!({"decision": "APPROVE", "notes": "Matches the port register"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["artifact"]["status"], "VERIFIED");
    assert_eq!(body["publication"]["pending"], false);

    // Public now.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/artifacts/{}", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content_id"], "bafyjson1");

    let (status, proof) = send(
        &app,
        Method::GET,
        &format!("/api/v1/chain/artifacts/{}/proof", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proof["matches"], true);

    let canonical: Value = serde_json::from_str(proof["canonical"].as_str().unwrap()).unwrap();
    let (status, digest) = send(
        &app,
        Method::POST,
        "/api/v1/chain/verify",
        None,
        Some(canonical),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(digest["hash"], proof["recorded_hash"]);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/chain/artifacts/{}/anchor", id),
        Some(&EXPERT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, events) = send(
        &app,
        Method::GET,
        &format!("/api/v1/artifacts/{}/activity", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(types.first(), Some(&"SUBMITTED"));
    assert_eq!(types.last(), Some(&"ANCHORED"));

    let (status, stats) = send(&app, Method::GET, "/api/v1/admin/stats", Some(&ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["by_status"]["VERIFIED"], 1);
    assert_eq!(stats["anchored"], 1);

    let (status, recent) = send(
        &app,
        Method::GET,
        "/api/v1/admin/events?limit=2",
        Some(&ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recent.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_anchor_without_ledger_is_unavailable() {
    let ctx = TestContext::build(true, false).await;
    let app = create_router(ctx.state.clone());
    let expert = ctx.user("0xexpert", Role::Expert).await;
    let alice = ctx.user("0xalice", Role::Member).await;
    let artifact = ctx.to_expert_review(&alice).await;
    ctx.approve(artifact.id, &expert).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/chain/artifacts/{}/anchor", artifact.id),
        Some(&EXPERT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "EXTERNAL_UNAVAILABLE");
}

#[tokio::test]
async fn test_flags_and_comments_over_http() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let id = create(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/artifacts/{}/flags", id),
        Some(&BOB),
        Some(json!({"reason": "COPYRIGHT", "details": "Scanned from a 2019 book"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["flag_count"], 1);
    assert_eq!(body["escalated"], false);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/artifacts/{}/flags", id),
        Some(&BOB),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, flags) = send(
        &app,
        Method::GET,
        &format!("/api/v1/artifacts/{}/flags", id),
        Some(&EXPERT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flags.as_array().unwrap().len(), 1);

    let comments = format!("/api/v1/artifacts/{}/comments", id);
    let (status, _) = send(
        &app,
        Method::POST,
        &comments,
        Some(&ALICE),
        Some(json!({"body": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for body in ["First scan", "Second scan", "Third scan"] {
        let (status, _) = send(
            &app,
            Method::POST,
            &comments,
            Some(&ALICE),
            Some(json!({"body": body})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(
        &app,
        Method::GET,
        &format!("{}?page=2&per_page=2", comments),
        Some(&EXPERT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["total_pages"], 2);
    assert_eq!(page["items"][0]["body"], "Third scan");
}

#[tokio::test]
async fn test_withdraw_over_http() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());
    let id = create(&app).await;
    let uri = format!("/api/v1/artifacts/{}/withdraw", id);

    let (status, _) = send(&app, Method::POST, &uri, Some(&BOB), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, Method::POST, &uri, Some(&ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "WITHDRAWN");
    let (status, _) = send(&app, Method::POST, &uri, Some(&ALICE), None).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_invalid_pagination_is_rejected() {
    let ctx = TestContext::new().await;
    let app = create_router(ctx.state.clone());

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/artifacts?per_page=500",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/artifacts?page=1&per_page=5",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["per_page"], 5);
    assert_eq!(body["items"], json!([]));
}
