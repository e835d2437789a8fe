use crate::relay_harness::{RelayHarness, loopback_policy};
use relaydesk::store::NewApp;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn partner(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

async fn harness_with_app(secret: Option<&str>) -> (RelayHarness, String) {
    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, _) = harness
        .app(NewApp {
            name: "Probe Shop".into(),
            webhook_secret: secret.map(Into::into),
            ..NewApp::default()
        })
        .await;
    (harness, app.id)
}

#[tokio::test]
async fn healthy_partner_reports_ok_with_signature() {
    let server = partner(ResponseTemplate::new(200).set_body_json(json!({"reply": "pong"}))).await;
    let (harness, app_id) = harness_with_app(Some("probe-secret")).await;

    let report = harness
        .chat
        .probe_webhook(&app_id, &format!("{}/hook", server.uri()), Some("ping"))
        .await
        .unwrap();

    assert!(report.ok);
    assert_eq!(report.status_code, Some(200));
    assert!(report.latency_ms.is_some());
    assert!(report.error.is_none());
    assert!(report.signature_sent);
    assert_eq!(report.response_json, Some(json!({"reply": "pong"})));

    let requests = server.received_requests().await.unwrap();
    let envelope: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope["thread"]["id"], "00000000-0000-0000-0000-000000000000");
    assert_eq!(envelope["thread"]["customer_id"], "test-customer");
    assert_eq!(envelope["message"]["content"], "ping");
    assert!(requests[0].headers.get("X-Signature").is_some());
}

#[tokio::test]
async fn probe_defaults_sample_message_and_skips_signature_without_secret() {
    let server = partner(ResponseTemplate::new(200).set_body_json(json!({"reply": "pong"}))).await;
    let (harness, app_id) = harness_with_app(None).await;

    let report = harness
        .chat
        .probe_webhook(&app_id, &format!("{}/hook", server.uri()), None)
        .await
        .unwrap();

    assert!(report.ok);
    assert!(!report.signature_sent);

    let requests = server.received_requests().await.unwrap();
    let envelope: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope["message"]["content"], "Hello");
    assert!(requests[0].headers.get("X-Signature").is_none());
}

#[tokio::test]
async fn failing_partner_reports_status_and_text() {
    let server = partner(ResponseTemplate::new(500).set_body_string("boom")).await;
    let (harness, app_id) = harness_with_app(None).await;

    let report = harness
        .chat
        .probe_webhook(&app_id, &format!("{}/hook", server.uri()), None)
        .await
        .unwrap();

    assert!(!report.ok);
    assert_eq!(report.status_code, Some(500));
    assert_eq!(report.error.as_deref(), Some("Webhook returned HTTP 500"));
    assert_eq!(report.response_text.as_deref(), Some("boom"));
}

#[tokio::test]
async fn reply_field_is_required() {
    let server = partner(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"}))).await;
    let (harness, app_id) = harness_with_app(None).await;

    let report = harness
        .chat
        .probe_webhook(&app_id, &format!("{}/hook", server.uri()), None)
        .await
        .unwrap();

    assert!(!report.ok);
    assert_eq!(
        report.error.as_deref(),
        Some("Response missing required 'reply' field")
    );
    assert_eq!(report.response_json, Some(json!({"status": "ok"})));
}

#[tokio::test]
async fn slow_probe_reports_timeout() {
    let server = partner(
        ResponseTemplate::new(200)
            .set_body_json(json!({"reply": "late"}))
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    let mut policy = loopback_policy();
    policy.default_timeout = Duration::from_millis(200);
    let harness = RelayHarness::start(policy).await;
    let (app, _) = harness.app(NewApp::default()).await;

    let report = harness
        .chat
        .probe_webhook(&app.id, &format!("{}/hook", server.uri()), None)
        .await
        .unwrap();

    assert!(!report.ok);
    assert_eq!(report.error.as_deref(), Some("Request timed out"));
    assert!(report.status_code.is_none());
}
