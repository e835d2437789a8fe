use super::handlers::{
    handle_health, handle_post_message, handle_run, handle_run_stream, handle_webhook_test,
};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};

use crate::chat::ChatService;
use crate::config::Config;
use crate::orchestrator::ChatOrchestrator;
use crate::store::{SqliteChatStore, connect_pool};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Run the HTTP gateway on the configured host and port.
pub async fn run_gateway(config: Arc<Config>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;

    let chat = build_chat_service(&config)
        .await
        .context("initialize chat service")?;
    run_gateway_with_listener(listener, chat, &config.gateway.cors_origins).await
}

/// Validate config, open the store and wire the orchestrator.
pub async fn build_chat_service(config: &Config) -> crate::error::Result<ChatService> {
    config.validate()?;

    let pool = connect_pool(
        &config.database_url(),
        config.database.max_connections,
        Duration::from_millis(config.database.busy_timeout_ms),
    )
    .await?;
    let store = SqliteChatStore::new(pool).await?;
    let orchestrator = ChatOrchestrator::new(config.webhook.policy(), config.simulator.chunk_size);

    Ok(ChatService::new(store, orchestrator))
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    listener: tokio::net::TcpListener,
    chat: ChatService,
    cors_origins: &[String],
) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .context("get gateway listener local address")?;

    print_gateway_banner(&local_addr.to_string());
    tracing::info!(%local_addr, "gateway listening");

    let app = build_app(AppState { chat }, cors_origins);
    axum::serve(listener, app)
        .await
        .context("serve HTTP gateway")?;

    Ok(())
}

fn print_gateway_banner(display_addr: &str) {
    println!("Gateway listening on {display_addr}");
    println!("  GET  /health");
    println!("  POST /apps/{{app}}/threads/{{thread}}/messages");
    println!("  POST /apps/{{app}}/threads/{{thread}}/run");
    println!("  GET  /apps/{{app}}/threads/{{thread}}/run/stream");
    println!("  POST /apps/{{app}}/webhook/test");
}

pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    let mut app = Router::new()
        .route("/health", get(handle_health))
        .route(
            "/apps/{app_id}/threads/{thread_id}/messages",
            post(handle_post_message),
        )
        .route("/apps/{app_id}/threads/{thread_id}/run", post(handle_run))
        .route(
            "/apps/{app_id}/threads/{thread_id}/run/stream",
            get(handle_run_stream),
        )
        .route("/apps/{app_id}/webhook/test", post(handle_webhook_test))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    if !cors_origins.is_empty() {
        let origins: Vec<_> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        );
    }

    app
}
