use super::WebhookPolicy;
use super::payload::{OutboundPayload, canonical_json};
use crate::config::WebhookHeaderNames;
use crate::error::WebhookError;
use crate::orchestrator::{ReplySource, RunResult};
use crate::security::{sign, validate_webhook_url};
use crate::utils::text::truncate_chars;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde_json::{Value, json};
use std::pin::Pin;
use std::time::Duration;

const ERROR_BODY_MAX_CHARS: usize = 200;
const EVENT_STREAM: &str = "text/event-stream";

/// Partner response body, chunk by chunk, exactly as received.
/// Dropping it closes the underlying connection.
pub type WebhookByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, WebhookError>> + Send>>;

/// A serialized payload plus what is needed to address and sign it.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Exact bytes sent and signed.
    pub body: String,
    pub app_id: String,
    pub conversation_id: String,
    pub secret: Option<String>,
}

impl OutboundRequest {
    pub fn new(payload: &OutboundPayload, secret: Option<&str>) -> Result<Self, WebhookError> {
        let body = canonical_json(payload)
            .map_err(|e| WebhookError::RequestFailed(format!("serialize payload: {e}")))?;

        Ok(Self {
            body,
            app_id: payload.app.id.clone(),
            conversation_id: payload.thread.id.clone(),
            secret: secret.filter(|s| !s.is_empty()).map(ToString::to_string),
        })
    }
}

/// HTTP client bound to one validated partner URL.
#[derive(Debug, Clone)]
pub struct WebhookGateway {
    client: Client,
    url: url::Url,
    timeout: Duration,
    idle_timeout: Option<Duration>,
    headers: WebhookHeaderNames,
}

impl WebhookGateway {
    /// Validates `url` against the policy's host rules. Nothing is sent.
    pub fn new(url: &str, timeout: Duration, policy: &WebhookPolicy) -> Result<Self, WebhookError> {
        let url = validate_webhook_url(url, &policy.url_rules)?;
        let client = Client::builder()
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::RequestFailed(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            timeout,
            idle_timeout: policy.stream_idle_timeout,
            headers: policy.headers.clone(),
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST the request and expect a JSON object with a `reply` field.
    pub async fn send_sync(&self, request: &OutboundRequest) -> Result<RunResult, WebhookError> {
        tracing::debug!(url = %self.url, app_id = %request.app_id, "dispatching webhook");

        let response = self
            .post(request)?
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if status != StatusCode::OK {
            return Err(self.bad_status(status, &text));
        }

        let data: Value =
            serde_json::from_str(&text).map_err(|e| WebhookError::InvalidJson(e.to_string()))?;

        let reply = match data.get("reply") {
            None | Some(Value::Null) => return Err(WebhookError::MissingReply),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };

        let mut result = RunResult::reply(ReplySource::Webhook, reply);
        result
            .metadata
            .insert("status_code".into(), json!(status.as_u16()));
        if let Some(metadata) = data.get("metadata") {
            result
                .metadata
                .insert("webhook_metadata".into(), metadata.clone());
        }
        Ok(result)
    }

    /// POST the request and hand back the partner's SSE body untouched.
    ///
    /// Status and content type are checked before the first chunk. After
    /// that every chunk must arrive within the policy's idle timeout.
    pub async fn send_stream(
        &self,
        request: &OutboundRequest,
    ) -> Result<WebhookByteStream, WebhookError> {
        tracing::debug!(url = %self.url, app_id = %request.app_id, "opening webhook stream");

        let send = self
            .post(request)?
            .header(header::ACCEPT, EVENT_STREAM)
            .send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| self.timed_out("no response"))?
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = tokio::time::timeout(self.timeout, response.text())
                .await
                .map_err(|_| self.timed_out("reading error body"))?
                .unwrap_or_default();
            return Err(self.bad_status(status, &body));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains(EVENT_STREAM) {
            tracing::warn!(
                url = %self.url,
                content_type = %content_type,
                "webhook did not answer with SSE"
            );
            return Err(WebhookError::UnexpectedContentType(content_type));
        }

        let idle_timeout = self.idle_timeout;
        let url = self.url.clone();
        let mut body = response.bytes_stream();

        let stream = async_stream::try_stream! {
            loop {
                let next = match idle_timeout {
                    Some(limit) => tokio::time::timeout(limit, body.next()).await.map_err(|_| {
                        tracing::warn!(url = %url, "webhook stream idle timeout");
                        WebhookError::TimedOut(format!(
                            "no data from webhook for {}ms",
                            limit.as_millis()
                        ))
                    })?,
                    None => body.next().await,
                };
                let Some(chunk) = next else {
                    break;
                };
                let chunk = chunk.map_err(|e| {
                    tracing::warn!(url = %url, error = %e, "webhook stream broke");
                    classify_transport_error(&e)
                })?;
                yield chunk;
            }
        };

        Ok(Box::pin(stream))
    }

    /// Request with the JSON body and the app, conversation and signature headers.
    pub(super) fn post(&self, request: &OutboundRequest) -> Result<RequestBuilder, WebhookError> {
        let mut builder = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(self.headers.app_id.as_str(), request.app_id.as_str())
            .header(
                self.headers.conversation_id.as_str(),
                request.conversation_id.as_str(),
            );

        if let Some(secret) = request.secret.as_deref() {
            let signed = sign(secret, &request.body, None)
                .map_err(|e| WebhookError::RequestFailed(format!("sign payload: {e}")))?;
            builder = builder
                .header(self.headers.timestamp.as_str(), signed.timestamp.to_string())
                .header(self.headers.signature.as_str(), signed.signature);
        }

        Ok(builder.body(request.body.clone()))
    }

    fn transport_error(&self, error: &reqwest::Error) -> WebhookError {
        let mapped = classify_transport_error(error);
        tracing::warn!(url = %self.url, error = %error, "webhook request failed");
        mapped
    }

    fn timed_out(&self, stage: &str) -> WebhookError {
        tracing::warn!(url = %self.url, stage, "webhook timed out");
        WebhookError::TimedOut(format!("{stage} within {}ms", self.timeout.as_millis()))
    }

    fn bad_status(&self, status: StatusCode, body: &str) -> WebhookError {
        let body = truncate_chars(body, ERROR_BODY_MAX_CHARS).to_string();
        tracing::warn!(
            url = %self.url,
            status = status.as_u16(),
            body = %body,
            "webhook returned error status"
        );
        WebhookError::BadStatus {
            status: status.as_u16(),
            body,
        }
    }
}

fn classify_transport_error(error: &reqwest::Error) -> WebhookError {
    if error.is_timeout() {
        WebhookError::TimedOut(error.to_string())
    } else {
        WebhookError::RequestFailed(error.to_string())
    }
}
