use crate::integration::SimulatorSettings;
use crate::orchestrator::{ReplySource, RunResult};
use serde_json::json;
use std::time::Duration;

pub const SCENARIO_ECOMMERCE: &str = "ecommerce_support";

/// Deterministic canned replies driven by an app's simulator settings.
#[derive(Debug, Clone)]
pub struct SimulatorHandler {
    settings: SimulatorSettings,
}

impl SimulatorHandler {
    pub fn new(settings: SimulatorSettings) -> Self {
        Self { settings }
    }

    pub async fn generate(&self, user_message: &str) -> RunResult {
        if self.settings.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.latency_ms)).await;
        }

        let mut result = RunResult::reply(ReplySource::Simulator, self.reply_text(user_message));
        result
            .metadata
            .insert("scenario".into(), json!(self.settings.scenario));
        result
    }

    pub fn reply_text(&self, user_message: &str) -> String {
        let reply = if self.settings.scenario == SCENARIO_ECOMMERCE {
            ecommerce_reply(user_message)
        } else {
            generic_reply(user_message)
        };

        if self.settings.disclaimer {
            t!("simulator.disclaimer_prefix", reply = reply).into_owned()
        } else {
            reply
        }
    }
}

fn generic_reply(user_message: &str) -> String {
    if user_message.is_empty() {
        return t!("simulator.generic_empty").into_owned();
    }
    t!("simulator.generic_echo", message = user_message).into_owned()
}

// Keyed on character count so the same message always gets the same reply.
fn ecommerce_reply(user_message: &str) -> String {
    let reply = match user_message.chars().count() % 5 {
        0 => t!("simulator.ecommerce_1"),
        1 => t!("simulator.ecommerce_2"),
        2 => t!("simulator.ecommerce_3"),
        3 => t!("simulator.ecommerce_4"),
        _ => t!("simulator.ecommerce_5"),
    };
    reply.into_owned()
}
