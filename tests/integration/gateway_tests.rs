//! Integration tests for the HTTP gateway client.

use std::time::Duration;

use hostline::delivery::gateway::{Gateway, HttpGateway};
use hostline::models::property::WhatsappConfig;
use hostline::AppError;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target(server: &MockServer) -> WhatsappConfig {
    WhatsappConfig {
        api_url: format!("{}/", server.uri()),
        token: "secret-token".into(),
    }
}

#[tokio::test]
async fn send_posts_number_and_message_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(header("x-api-key", "secret-token"))
        .and(body_json(json!({ "number": "5511988887777", "message": "Oi!" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageId": "wamid.ABC" })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(Duration::from_secs(5));
    let receipt = gateway
        .send(&target(&server), "5511988887777", "Oi!")
        .await
        .expect("send accepted");
    assert_eq!(receipt.provider_message_id.as_deref(), Some("wamid.ABC"));
}

#[tokio::test]
async fn accepted_send_without_message_id_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(201).set_body_string("queued"))
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(Duration::from_secs(5));
    let receipt = gateway
        .send(&target(&server), "5511988887777", "Oi!")
        .await
        .expect("send accepted");
    assert!(receipt.provider_message_id.is_none());
}

#[tokio::test]
async fn non_success_status_surfaces_provider_error_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "number not on whatsapp" })),
        )
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(Duration::from_secs(5));
    let err = gateway
        .send(&target(&server), "5511988887777", "Oi!")
        .await
        .expect_err("rejected");
    match err {
        AppError::Gateway(msg) => assert!(msg.contains("number not on whatsapp"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(Duration::from_millis(300));
    let err = gateway
        .send(&target(&server), "5511988887777", "Oi!")
        .await
        .expect_err("timed out");
    assert!(matches!(err, AppError::Gateway(_)));
}
