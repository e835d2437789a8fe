use super::gateway::{OutboundRequest, WebhookGateway};
use super::payload::OutboundPayload;
use super::WebhookPolicy;
use crate::store::App;
use crate::utils::text::truncate_chars;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

const RESPONSE_TEXT_MAX_CHARS: usize = 2_000;

/// What a one-off test call to a webhook URL returned. Nothing is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeReport {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub response_json: Option<Value>,
    pub response_text: Option<String>,
    pub signature_sent: bool,
}

impl ProbeReport {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl WebhookGateway {
    /// Send the fixed sample payload for `app` to `url`, signed with the
    /// app's secret when it has one, and describe the outcome.
    pub async fn probe(
        url: &str,
        app: &App,
        sample_message: &str,
        policy: &WebhookPolicy,
    ) -> ProbeReport {
        let gateway = match Self::new(url, policy.default_timeout, policy) {
            Ok(gateway) => gateway,
            Err(e) => return ProbeReport::failed(e.to_string()),
        };

        let payload = OutboundPayload::probe(app, sample_message);
        let request = match OutboundRequest::new(&payload, app.signing_secret()) {
            Ok(request) => request,
            Err(e) => return ProbeReport::failed(e.to_string()),
        };
        let signature_sent = request.secret.is_some();

        let started = Instant::now();
        let sent = match gateway.post(&request) {
            Ok(builder) => builder.timeout(gateway.timeout()).send().await,
            Err(e) => return ProbeReport::failed(e.to_string()),
        };
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    "Request timed out".to_string()
                } else {
                    format!("Connection error: {e}")
                };
                tracing::warn!(url, error = %e, "webhook probe failed");
                return ProbeReport {
                    latency_ms: Some(elapsed_ms(started)),
                    error: Some(error),
                    signature_sent,
                    ..ProbeReport::default()
                };
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let latency_ms = Some(elapsed_ms(started));
        let response_json = serde_json::from_str::<Value>(&text).ok();

        let mut report = ProbeReport {
            ok: false,
            status_code: Some(status.as_u16()),
            latency_ms,
            error: None,
            response_json,
            response_text: None,
            signature_sent,
        };

        if status != StatusCode::OK {
            report.error = Some(format!("Webhook returned HTTP {}", status.as_u16()));
            report.response_text = Some(truncate_chars(&text, RESPONSE_TEXT_MAX_CHARS).to_string());
        } else if report.response_json.is_none() {
            report.error = Some("Response is not valid JSON".into());
            report.response_text = Some(truncate_chars(&text, RESPONSE_TEXT_MAX_CHARS).to_string());
        } else if report
            .response_json
            .as_ref()
            .and_then(|json| json.get("reply"))
            .is_none()
        {
            report.error = Some("Response missing required 'reply' field".into());
        } else {
            report.ok = true;
        }

        report
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
