use crate::relay_harness::{RelayHarness, loopback_policy};
use relaydesk::orchestrator::{ChatOrchestrator, ReplySource, RunRequest, StreamStatus};
use relaydesk::security::verify;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
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

fn hook_url(server: &MockServer) -> String {
    format!("{}/hook", server.uri())
}

#[tokio::test]
async fn webhook_reply_is_persisted_as_assistant_message() {
    let server = partner(ResponseTemplate::new(200).set_body_json(json!({
        "reply": "Your order ships tomorrow.",
        "metadata": {"order": "A-1"}
    })))
    .await;
    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, conversation) = harness.webhook_app(&hook_url(&server), None).await;
    harness.say(&app, &conversation, "Where is my order?").await;

    let response = harness.chat.run(&app.id, &conversation.id).await.unwrap();

    assert_eq!(response.status, StreamStatus::Completed);
    assert!(response.error.is_none());
    let message = response.assistant_message.unwrap();
    assert_eq!(message.seq, 2);
    assert_eq!(message.content.as_deref(), Some("Your order ships tomorrow."));
    assert_eq!(message.content_json, json!({"source": "webhook"}));
}

#[tokio::test]
async fn signed_request_carries_verifiable_headers_and_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, conversation) = harness
        .webhook_app(&hook_url(&server), Some("partner-secret"))
        .await;
    harness.say(&app, &conversation, "hello").await;

    harness.chat.run(&app.id, &conversation.id).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    let body = String::from_utf8(request.body.clone()).unwrap();

    assert_eq!(request.headers.get("X-App-Id").unwrap(), app.id.as_str());
    assert_eq!(
        request.headers.get("X-Thread-Id").unwrap(),
        conversation.id.as_str()
    );
    let timestamp: i64 = request
        .headers
        .get("X-Timestamp")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let signature = request.headers.get("X-Signature").unwrap().to_str().unwrap();
    assert!(signature.starts_with("sha256="));
    assert!(verify("partner-secret", &body, timestamp, signature));
    assert!(!verify("other-secret", &body, timestamp, signature));

    let envelope: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(envelope["version"], "1.0");
    assert_eq!(envelope["event"], "message_received");
    assert_eq!(envelope["app"]["name"], "Partner Shop");
    assert_eq!(envelope["thread"]["customer_id"], "customer-42");
    assert_eq!(envelope["message"]["seq"], 1);
    assert_eq!(envelope["message"]["role"], "user");
    assert_eq!(envelope["message"]["content"], "hello");
    assert_eq!(envelope["history_tail"][0]["content"], "hello");

    let keys: Vec<&String> = envelope.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        [
            "version",
            "event",
            "app",
            "thread",
            "message",
            "history_tail",
            "timestamp"
        ]
    );
}

#[tokio::test]
async fn app_without_secret_sends_no_signature() {
    let server = partner(ResponseTemplate::new(200).set_body_json(json!({"reply": "ok"}))).await;
    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, conversation) = harness.webhook_app(&hook_url(&server), None).await;
    harness.say(&app, &conversation, "hello").await;

    harness.chat.run(&app.id, &conversation.id).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("X-Signature").is_none());
    assert!(requests[0].headers.get("X-Timestamp").is_none());
}

#[tokio::test]
async fn error_status_truncates_body_and_persists_nothing() {
    let server = partner(ResponseTemplate::new(502).set_body_string("x".repeat(500))).await;
    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, conversation) = harness.webhook_app(&hook_url(&server), None).await;
    harness.say(&app, &conversation, "hello").await;

    let response = harness.chat.run(&app.id, &conversation.id).await.unwrap();

    assert_eq!(response.status, StreamStatus::Error);
    assert!(response.assistant_message.is_none());
    let error = response.error.unwrap();
    assert!(error.contains("HTTP 502"));
    assert!(error.contains(&"x".repeat(200)));
    assert!(!error.contains(&"x".repeat(201)));

    let history = harness.chat.store().history(&conversation.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn non_json_reply_is_an_error() {
    let server = partner(ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;
    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, conversation) = harness.webhook_app(&hook_url(&server), None).await;
    harness.say(&app, &conversation, "hello").await;

    let response = harness.chat.run(&app.id, &conversation.id).await.unwrap();

    assert_eq!(response.status, StreamStatus::Error);
    assert!(response.error.unwrap().contains("invalid JSON"));
}

#[tokio::test]
async fn missing_reply_field_is_an_error() {
    let server =
        partner(ResponseTemplate::new(200).set_body_json(json!({"answer": "wrong key"}))).await;
    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, conversation) = harness.webhook_app(&hook_url(&server), None).await;
    harness.say(&app, &conversation, "hello").await;

    let response = harness.chat.run(&app.id, &conversation.id).await.unwrap();

    assert_eq!(response.status, StreamStatus::Error);
    assert!(response.error.unwrap().contains("'reply'"));
}

#[tokio::test]
async fn slow_partner_times_out_without_simulator_fallback() {
    let server = partner(
        ResponseTemplate::new(200)
            .set_body_json(json!({"reply": "too late"}))
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    let harness = RelayHarness::start(loopback_policy()).await;
    let (app, conversation) = harness
        .webhook_app_with(
            &hook_url(&server),
            None,
            json!({
                "integration": {"mode": "webhook"},
                "webhook": {"timeout_ms": 200}
            }),
        )
        .await;

    let result = ChatOrchestrator::new(loopback_policy(), 20)
        .run(RunRequest {
            app: &app,
            conversation: &conversation,
            user_message: "hello",
            message: None,
            history: &[],
        })
        .await;

    assert!(result.reply_text.is_none());
    assert_eq!(result.source, ReplySource::Webhook);
    assert!(result.error().unwrap().contains("timed out"));
}
