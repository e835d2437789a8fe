//! Routes a run to the simulator or the app's webhook.
//!
//! Routing is decided once per run by [`Integration::resolve`]. A failed
//! webhook call ends the run with an error; it is never retried and never
//! handed to the simulator instead.

mod types;

pub use types::{ReplySource, RunResult, StreamEvent, StreamStatus};

use crate::error::WebhookError;
use crate::integration::Integration;
use crate::simulator::SimulatorHandler;
use crate::store::{App, Conversation, Message};
use crate::utils::text::char_chunks;
use crate::webhook::{OutboundPayload, OutboundRequest, WebhookGateway, WebhookPolicy};
use futures_util::{Stream, StreamExt};
use serde_json::json;
use std::pin::Pin;

pub const REASON_WEBHOOK_NOT_CONFIGURED: &str = "webhook_not_configured";
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Ordered events of one streamed run. Always ends with `Done`.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Everything a run needs, already loaded and authorized by the caller.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub app: &'a App,
    pub conversation: &'a Conversation,
    pub user_message: &'a str,
    /// Persisted form of `user_message`. `None` sends the minimal payload.
    pub message: Option<&'a Message>,
    /// Oldest first.
    pub history: &'a [Message],
}

#[derive(Debug, Clone)]
pub struct ChatOrchestrator {
    policy: WebhookPolicy,
    chunk_size: usize,
}

impl ChatOrchestrator {
    pub fn new(policy: WebhookPolicy, chunk_size: usize) -> Self {
        Self { policy, chunk_size }
    }

    pub fn policy(&self) -> &WebhookPolicy {
        &self.policy
    }

    pub fn route(&self, app: &App) -> Integration {
        Integration::resolve(
            &app.config,
            app.webhook_target(),
            self.policy.default_timeout,
        )
    }

    pub async fn run(&self, request: RunRequest<'_>) -> RunResult {
        match self.route(request.app) {
            Integration::Webhook { url, settings } => {
                let outcome = match self.prepare(&request, &url, settings.timeout) {
                    Ok((gateway, outbound)) => gateway.send_sync(&outbound).await,
                    Err(e) => Err(e),
                };
                outcome.unwrap_or_else(|e| {
                    tracing::error!(app_id = %request.app.id, error = %e, "webhook run failed");
                    RunResult::failed(ReplySource::Webhook, e.to_string())
                })
            }
            Integration::Simulator {
                settings,
                webhook_not_configured,
            } => {
                let mut result = SimulatorHandler::new(settings)
                    .generate(request.user_message)
                    .await;
                if webhook_not_configured {
                    result
                        .metadata
                        .insert("source".into(), json!(ReplySource::Simulator));
                    result
                        .metadata
                        .insert("reason".into(), json!(REASON_WEBHOOK_NOT_CONFIGURED));
                }
                result
            }
        }
    }

    /// Streamed variant of [`run`](Self::run).
    ///
    /// Webhook output is forwarded as `Raw` chunks in arrival order. Simulator
    /// output is sliced into `Delta` events of `chunk_size` characters. The
    /// stream is lazy: nothing is sent until it is first polled, and dropping
    /// it closes any open webhook connection.
    pub fn run_stream(&self, request: RunRequest<'_>) -> EventStream {
        match self.route(request.app) {
            Integration::Webhook { url, settings } => {
                let prepared = self.prepare(&request, &url, settings.timeout);
                let app_id = request.app.id.clone();

                Box::pin(async_stream::stream! {
                    yield StreamEvent::Meta {
                        source: ReplySource::Webhook,
                        reason: None,
                    };

                    let opened = match prepared {
                        Ok((gateway, outbound)) => gateway.send_stream(&outbound).await,
                        Err(e) => Err(e),
                    };

                    let mut failure = None;
                    match opened {
                        Ok(mut chunks) => {
                            while let Some(chunk) = chunks.next().await {
                                match chunk {
                                    Ok(bytes) => {
                                        yield StreamEvent::Raw { bytes };
                                    }
                                    Err(e) => {
                                        failure = Some(e);
                                        break;
                                    }
                                }
                            }
                        }
                        Err(e) => failure = Some(e),
                    }

                    match failure {
                        Some(e) => {
                            tracing::error!(app_id = %app_id, error = %e, "webhook stream failed");
                            yield StreamEvent::Error {
                                message: e.to_string(),
                            };
                            yield StreamEvent::Done {
                                status: StreamStatus::Error,
                                full_text: None,
                            };
                        }
                        None => {
                            yield StreamEvent::Done {
                                status: StreamStatus::Completed,
                                full_text: None,
                            };
                        }
                    }
                })
            }
            Integration::Simulator {
                settings,
                webhook_not_configured,
            } => {
                let reason =
                    webhook_not_configured.then(|| REASON_WEBHOOK_NOT_CONFIGURED.to_string());
                let handler = SimulatorHandler::new(settings);
                let user_message = request.user_message.to_string();
                let chunk_size = self.chunk_size;

                Box::pin(async_stream::stream! {
                    yield StreamEvent::Meta {
                        source: ReplySource::Simulator,
                        reason,
                    };

                    let text = handler
                        .generate(&user_message)
                        .await
                        .reply_text
                        .unwrap_or_default();
                    for piece in char_chunks(&text, chunk_size) {
                        yield StreamEvent::Delta {
                            text: piece.to_string(),
                        };
                    }

                    yield StreamEvent::Done {
                        status: StreamStatus::Completed,
                        full_text: Some(text),
                    };
                })
            }
        }
    }

    fn prepare(
        &self,
        request: &RunRequest<'_>,
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<(WebhookGateway, OutboundRequest), WebhookError> {
        let gateway = WebhookGateway::new(url, timeout, &self.policy)?;
        let payload = OutboundPayload::build(
            request.app,
            request.conversation,
            request.user_message,
            request.message,
            request.history,
            self.policy.history_limit,
        );
        let outbound = OutboundRequest::new(&payload, request.app.signing_secret())?;
        Ok((gateway, outbound))
    }
}

impl Default for ChatOrchestrator {
    fn default() -> Self {
        Self::new(WebhookPolicy::default(), DEFAULT_CHUNK_SIZE)
    }
}
