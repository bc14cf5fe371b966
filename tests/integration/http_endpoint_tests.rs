//! End-to-end tests for the HTTP surface.
//!
//! Each test binds the router on an ephemeral port and talks to it with
//! `reqwest`.

use std::sync::Arc;
use std::time::Duration;

use hostline::delivery::gateway::HttpGateway;
use hostline::delivery::pacer::NoPacer;
use hostline::persistence::db::Database;
use hostline::webhook::{server, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{memory_db, seed_property, test_config, PROPERTY_ID};

const API_TOKEN: &str = "sweep-secret";

struct TestServer {
    base_url: String,
    db: Arc<Database>,
    ct: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

async fn spawn_server(api_token: Option<&str>) -> TestServer {
    let db = memory_db().await;
    seed_property(&db, PROPERTY_ID, "http://127.0.0.1:9").await;

    let mut config = test_config();
    config.api_token = api_token.map(str::to_owned);
    let state = Arc::new(AppState::new(
        Arc::new(config),
        &db,
        Arc::new(HttpGateway::new(Duration::from_secs(1))),
        Arc::new(NoPacer),
    ));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = server::serve_on(listener, state, server_ct).await;
    });

    TestServer {
        base_url: format!("http://{addr}"),
        db,
        ct,
    }
}

#[tokio::test]
async fn health_returns_ok() {
    let srv = spawn_server(None).await;
    let resp = reqwest::get(format!("{}/health", srv.base_url))
        .await
        .expect("GET /health");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.expect("body"), "ok");
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let srv = spawn_server(Some(API_TOKEN)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/cron/queue", srv.base_url))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["success"], json!(false));

    let resp = client
        .post(format!("{}/cron/queue", srv.base_url))
        .bearer_auth("wrong")
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn protected_routes_fail_closed_without_configured_token() {
    let srv = spawn_server(None).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/cron/automations", srv.base_url))
        .bearer_auth("anything")
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn sweep_triggers_return_camel_case_summaries() {
    let srv = spawn_server(Some(API_TOKEN)).await;
    let client = reqwest::Client::new();

    let queue: Value = client
        .post(format!("{}/cron/queue", srv.base_url))
        .bearer_auth(API_TOKEN)
        .send()
        .await
        .expect("POST")
        .json()
        .await
        .expect("json");
    assert_eq!(queue["processed"], json!(0));
    assert_eq!(queue["leftInQueue"], json!(0));

    let daily: Value = client
        .post(format!("{}/cron/automations", srv.base_url))
        .bearer_auth(API_TOKEN)
        .send()
        .await
        .expect("POST")
        .json()
        .await
        .expect("json");
    assert_eq!(daily["properties"], json!(1));
    assert_eq!(daily["enqueued"], json!(0));
    assert!(daily.get("staysEvaluated").is_some());
}

#[tokio::test]
async fn enqueue_action_creates_job_and_retry_rejects_non_failed() {
    let srv = spawn_server(Some(API_TOKEN)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/queue", srv.base_url))
        .bearer_auth(API_TOKEN)
        .json(&json!({
            "propertyId": PROPERTY_ID,
            "to": "+55 11 98888-7777",
            "body": "Seu café da manhã está pronto.",
            "maxRetries": 2
        }))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("json");
    let job_id = body["jobId"].as_str().expect("jobId").to_owned();

    let job = hostline::persistence::message_repo::MessageRepo::new(Arc::clone(&srv.db))
        .get_by_id(&job_id)
        .await
        .expect("get")
        .expect("job");
    assert_eq!(job.contact_number, "5511988887777");
    assert_eq!(job.max_attempts, 2);

    let resp = client
        .post(format!("{}/api/queue/{job_id}/retry", srv.base_url))
        .bearer_auth(API_TOKEN)
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn enqueue_validation_and_unknown_property() {
    let srv = spawn_server(Some(API_TOKEN)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/queue", srv.base_url))
        .bearer_auth(API_TOKEN)
        .json(&json!({ "propertyId": PROPERTY_ID, "body": "no recipient" }))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/api/queue", srv.base_url))
        .bearer_auth(API_TOKEN)
        .json(&json!({ "propertyId": "ghost", "to": "5511988887777", "body": "hi" }))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn message_webhook_records_and_rejects() {
    let srv = spawn_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/webhook/whatsapp", srv.base_url))
        .json(&json!({
            "propertyId": PROPERTY_ID,
            "contactNumber": "5511999990000@c.us",
            "text": "Olá!",
            "direction": "inbound",
            "messageId": "wamid.http1"
        }))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("message recorded"));

    let resp = client
        .post(format!("{}/webhook/whatsapp", srv.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/webhook/whatsapp", srv.base_url))
        .json(&json!({
            "propertyId": "ghost",
            "contactNumber": "5511999990000",
            "text": "Olá!",
            "direction": "inbound"
        }))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn status_webhook_applies_ack_and_reports_unknown() {
    let srv = spawn_server(None).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/webhook/whatsapp", srv.base_url))
        .json(&json!({
            "propertyId": PROPERTY_ID,
            "contactNumber": "5511999990000",
            "text": "Olá!",
            "direction": "inbound",
            "messageId": "wamid.http2"
        }))
        .send()
        .await
        .expect("POST");

    let resp = client
        .post(format!("{}/webhook/whatsapp/status", srv.base_url))
        .json(&json!({
            "propertyId": PROPERTY_ID,
            "messageId": "wamid.http2",
            "type": "ack",
            "ack": 3
        }))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["success"], json!(true));

    let resp = client
        .post(format!("{}/webhook/whatsapp/status", srv.base_url))
        .json(&json!({
            "propertyId": PROPERTY_ID,
            "messageId": "wamid.unknown",
            "type": "ack",
            "ack": 3
        }))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 404);
}
