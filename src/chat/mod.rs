//! Run endpoints' core: load state, run the orchestrator, persist the reply.

use crate::error::{ChatError, StoreError};
use crate::orchestrator::{
    ChatOrchestrator, EventStream, ReplySource, RunRequest, StreamEvent, StreamStatus,
};
use crate::store::{App, Conversation, Message, MessageRole, SqliteChatStore};
use crate::webhook::{ProbeReport, WebhookGateway};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use std::pin::Pin;
use std::sync::Arc;

pub const DEFAULT_PROBE_MESSAGE: &str = "Hello";

/// SSE-framed body of a streamed run.
pub type SseStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResponse {
    pub status: StreamStatus,
    pub assistant_message: Option<Message>,
    pub error: Option<String>,
}

struct RunContext {
    app: App,
    conversation: Conversation,
    last_user: Message,
    history: Vec<Message>,
}

#[derive(Clone)]
pub struct ChatService {
    store: SqliteChatStore,
    orchestrator: Arc<ChatOrchestrator>,
}

impl ChatService {
    pub fn new(store: SqliteChatStore, orchestrator: ChatOrchestrator) -> Self {
        Self {
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn store(&self) -> &SqliteChatStore {
        &self.store
    }

    /// Append a customer message to a conversation of `app_id`.
    pub async fn post_user_message(
        &self,
        app_id: &str,
        conversation_id: &str,
        content: &str,
        content_json: Value,
    ) -> Result<Message, ChatError> {
        let conversation = self.store.get_conversation(app_id, conversation_id).await?;
        Ok(self
            .store
            .append_message(
                &conversation.id,
                MessageRole::User,
                Some(content),
                content_json,
            )
            .await?)
    }

    /// Reply to the latest user message and persist the reply on success.
    pub async fn run(&self, app_id: &str, conversation_id: &str) -> Result<RunResponse, ChatError> {
        let ctx = self.load(app_id, conversation_id).await?;
        let result = self.orchestrator.run(ctx.request()).await;

        let Some(reply) = result.reply_text.as_deref() else {
            return Ok(RunResponse {
                status: StreamStatus::Error,
                assistant_message: None,
                error: Some(result.error().unwrap_or("no reply").to_string()),
            });
        };

        let message = self
            .store
            .persist_assistant_message(
                &ctx.conversation.id,
                reply,
                reply_content_json(result.source, result.reason()),
            )
            .await?;

        Ok(RunResponse {
            status: StreamStatus::Completed,
            assistant_message: Some(message),
            error: None,
        })
    }

    /// Streamed run as SSE bytes.
    ///
    /// Partner bytes pass through untouched. A completed reply with text is
    /// persisted by a detached task, so a client that disconnects mid-stream
    /// cannot abort the commit.
    pub async fn run_stream(
        &self,
        app_id: &str,
        conversation_id: &str,
    ) -> Result<SseStream, ChatError> {
        let ctx = self.load(app_id, conversation_id).await?;
        let events = self.orchestrator.run_stream(ctx.request());
        Ok(frame_events(
            events,
            self.store.clone(),
            ctx.conversation.id.clone(),
        ))
    }

    /// Test `webhook_url` with the fixed sample payload for `app_id`.
    pub async fn probe_webhook(
        &self,
        app_id: &str,
        webhook_url: &str,
        sample_message: Option<&str>,
    ) -> Result<ProbeReport, ChatError> {
        let app = self.store.get_app(app_id).await?;
        let sample = sample_message
            .filter(|sample| !sample.is_empty())
            .unwrap_or(DEFAULT_PROBE_MESSAGE);

        Ok(WebhookGateway::probe(webhook_url, &app, sample, self.orchestrator.policy()).await)
    }

    async fn load(&self, app_id: &str, conversation_id: &str) -> Result<RunContext, ChatError> {
        let app = self.store.get_app(app_id).await?;
        let conversation = self.store.get_conversation(app_id, conversation_id).await?;
        let last_user = self
            .store
            .last_user_message(&conversation.id)
            .await?
            .ok_or_else(|| ChatError::NoUserMessages(conversation.id.clone()))?;
        let history = self
            .store
            .history(&conversation.id, self.orchestrator.policy().history_limit)
            .await?;

        Ok(RunContext {
            app,
            conversation,
            last_user,
            history,
        })
    }
}

impl RunContext {
    fn request(&self) -> RunRequest<'_> {
        RunRequest {
            app: &self.app,
            conversation: &self.conversation,
            user_message: self.last_user.content.as_deref().unwrap_or_default(),
            message: Some(&self.last_user),
            history: &self.history,
        }
    }
}

fn reply_content_json(source: ReplySource, reason: Option<&str>) -> Value {
    let mut content = json!({ "source": source });
    if let Some(reason) = reason {
        content["reason"] = json!(reason);
    }
    content
}

/// `event: <name>\ndata: <json>\n\n`
pub fn sse_frame(name: &str, data: &Value) -> Bytes {
    Bytes::from(format!("event: {name}\ndata: {data}\n\n"))
}

/// Last bytes of pass-through output, kept to tell whether the partner left
/// an SSE event unterminated.
#[derive(Debug, Default)]
struct RawTail(Vec<u8>);

impl RawTail {
    fn observe(&mut self, chunk: &[u8]) {
        self.0
            .extend_from_slice(&chunk[chunk.len().saturating_sub(2)..]);
        let excess = self.0.len().saturating_sub(2);
        self.0.drain(..excess);
    }

    /// Bytes that end an open partner event, so the next frame stands alone.
    fn close(&mut self) -> Option<Bytes> {
        let boundary: &'static [u8] = match std::mem::take(&mut self.0).as_slice() {
            [] | [.., b'\n', b'\n'] => return None,
            [.., b'\n'] => b"\n",
            _ => b"\n\n",
        };
        Some(Bytes::from_static(boundary))
    }
}

fn frame_events(
    mut events: EventStream,
    store: SqliteChatStore,
    conversation_id: String,
) -> SseStream {
    Box::pin(async_stream::stream! {
        let mut full_text = String::new();
        let mut source = ReplySource::Simulator;
        let mut reason: Option<String> = None;
        let mut raw_tail = RawTail::default();

        while let Some(event) = events.next().await {
            if let StreamEvent::Raw { bytes } = &event {
                raw_tail.observe(bytes);
                yield bytes.clone();
                continue;
            }
            if let Some(boundary) = raw_tail.close() {
                yield boundary;
            }

            match &event {
                StreamEvent::Meta { source: s, reason: r } => {
                    source = *s;
                    reason.clone_from(r);
                }
                StreamEvent::Delta { text } => full_text.push_str(text),
                StreamEvent::Done {
                    status: StreamStatus::Completed,
                    ..
                } if !full_text.is_empty() => {
                    let content_json = reply_content_json(source, reason.as_deref());
                    let persisted = tokio::spawn(persist_reply(
                        store.clone(),
                        conversation_id.clone(),
                        full_text.clone(),
                        content_json,
                    ))
                    .await;

                    match persisted {
                        Ok(Ok(message)) => {
                            yield sse_frame(
                                "done",
                                &json!({
                                    "status": StreamStatus::Completed,
                                    "message_id": message.id,
                                    "seq": message.seq,
                                }),
                            );
                        }
                        Ok(Err(e)) => {
                            tracing::error!(
                                conversation_id = %conversation_id,
                                error = %e,
                                "persisting streamed reply failed"
                            );
                            yield sse_frame("error", &json!({ "message": e.to_string() }));
                            yield sse_frame("done", &json!({ "status": StreamStatus::Error }));
                        }
                        Err(e) => {
                            tracing::error!(
                                conversation_id = %conversation_id,
                                error = %e,
                                "persist task aborted"
                            );
                            yield sse_frame("error", &json!({ "message": e.to_string() }));
                            yield sse_frame("done", &json!({ "status": StreamStatus::Error }));
                        }
                    }
                    break;
                }
                StreamEvent::Raw { .. } | StreamEvent::Error { .. } | StreamEvent::Done { .. } => {}
            }

            if let Some(data) = event.data() {
                yield sse_frame(event.name(), &data);
            }
            if event.is_terminal() {
                break;
            }
        }
    })
}

async fn persist_reply(
    store: SqliteChatStore,
    conversation_id: String,
    text: String,
    content_json: Value,
) -> Result<Message, StoreError> {
    store
        .persist_assistant_message(&conversation_id, &text, content_json)
        .await
}
