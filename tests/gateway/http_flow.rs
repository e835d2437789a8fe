use crate::relay_harness::{RelayHarness, loopback_policy};
use relaydesk::store::{App, Conversation, NewApp};
use relaydesk::transport::gateway::run_gateway_with_listener;
use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct GatewayTestServer {
    base: String,
    harness: RelayHarness,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl GatewayTestServer {
    async fn start() -> Self {
        let harness = RelayHarness::start(loopback_policy()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let chat = harness.chat.clone();
        let handle =
            tokio::spawn(async move { run_gateway_with_listener(listener, chat, &[]).await });

        Self {
            base,
            harness,
            handle,
        }
    }

    async fn seed(&self, new_app: NewApp) -> (App, Conversation) {
        self.harness.app(new_app).await
    }

    fn thread_url(&self, app: &App, conversation: &Conversation, tail: &str) -> String {
        format!(
            "{}/apps/{}/threads/{}/{tail}",
            self.base, app.id, conversation.id
        )
    }
}

impl Drop for GatewayTestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_endpoint_answers() {
    let server = GatewayTestServer::start().await;

    let response = reqwest::get(format!("{}/health", server.base)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn simulator_conversation_over_http() {
    let server = GatewayTestServer::start().await;
    let (app, conversation) = server
        .seed(NewApp {
            name: "Shop".into(),
            config: json!({"simulator": {"scenario": "generic"}}),
            ..NewApp::default()
        })
        .await;
    let client = reqwest::Client::new();

    let posted = client
        .post(server.thread_url(&app, &conversation, "messages"))
        .json(&json!({"content": "hello there"}))
        .send()
        .await
        .unwrap();
    assert_eq!(posted.status(), StatusCode::CREATED);
    let posted: Value = posted.json().await.unwrap();
    assert_eq!(posted["seq"], 1);
    assert_eq!(posted["role"], "user");

    let run: Value = client
        .post(server.thread_url(&app, &conversation, "run"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["status"], "completed");
    assert_eq!(run["assistant_message"]["seq"], 2);
    assert_eq!(run["assistant_message"]["content"], "Echo: hello there");
    assert_eq!(
        run["assistant_message"]["content_json"],
        json!({"source": "simulator"})
    );

    let stream = client
        .get(server.thread_url(&app, &conversation, "run/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);
    assert_eq!(
        stream.headers()[reqwest::header::CONTENT_TYPE],
        "text/event-stream"
    );
    let text = stream.text().await.unwrap();
    assert!(text.starts_with("event: meta\ndata: {\"source\":\"simulator\"}\n\n"));
    assert!(text.contains("event: delta\ndata: {\"text\":\"Echo: hello there\"}\n\n"));
    assert!(text.contains("\"seq\":3"));
    assert!(text.trim_end().ends_with('}'));

    let history = server
        .harness
        .chat
        .store()
        .history(&conversation.id, 10)
        .await
        .unwrap();
    assert_eq!(
        history.iter().map(|m| m.seq).collect::<Vec<_>>(),
        [1, 2, 3]
    );
}

#[tokio::test]
async fn unknown_thread_is_not_found() {
    let server = GatewayTestServer::start().await;
    let (app, _) = server.seed(NewApp::default()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/apps/{}/threads/missing/messages", server.base, app.id))
        .json(&json!({"content": "hi"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = GatewayTestServer::start().await;
    let (app, conversation) = server.seed(NewApp::default()).await;

    let response = reqwest::Client::new()
        .post(server.thread_url(&app, &conversation, "messages"))
        .json(&json!({"content": "x".repeat(70_000)}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn webhook_test_endpoint_probes_partner() {
    let partner = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "pong"})))
        .expect(1)
        .mount(&partner)
        .await;

    let server = GatewayTestServer::start().await;
    let (app, _) = server
        .seed(NewApp {
            name: "Shop".into(),
            webhook_secret: Some("s3cret".into()),
            ..NewApp::default()
        })
        .await;

    let report: Value = reqwest::Client::new()
        .post(format!("{}/apps/{}/webhook/test", server.base, app.id))
        .json(&json!({"webhook_url": format!("{}/hook", partner.uri())}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(report["ok"], true);
    assert_eq!(report["status_code"], 200);
    assert_eq!(report["signature_sent"], true);
    assert_eq!(report["response_json"]["reply"], "pong");
}
