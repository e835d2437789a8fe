use crate::cli::commands::{AppCommands, Cli, Commands, ThreadCommands};
use anyhow::{Context, Result};
use relaydesk::Config;
use relaydesk::security::sign;
use relaydesk::store::NewApp;
use relaydesk::transport::gateway::{build_chat_service, run_gateway};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

fn app_config(mode: &str, scenario: Option<&str>) -> Value {
    let mut config = json!({ "integration": { "mode": mode } });
    if let Some(scenario) = scenario {
        config["simulator"] = json!({ "scenario": scenario });
    }
    config
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("render JSON output")?
    );
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Arc<Config>) -> Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = (*config).clone();
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            info!(
                host = %config.gateway.host,
                port = config.gateway.port,
                "starting relaydesk gateway"
            );
            run_gateway(Arc::new(config)).await
        }

        Commands::App { app_command } => {
            let chat = build_chat_service(&config).await?;
            match app_command {
                AppCommands::Create {
                    name,
                    webhook_url,
                    webhook_secret,
                    mode,
                    scenario,
                } => {
                    let app = chat
                        .store()
                        .create_app(NewApp {
                            name,
                            webhook_url,
                            webhook_secret,
                            config: app_config(&mode, scenario.as_deref()),
                        })
                        .await?;
                    print_json(&app)
                }
                AppCommands::Show { app_id } => {
                    let app = chat.store().get_app(&app_id).await?;
                    print_json(&app)
                }
            }
        }

        Commands::Thread { thread_command } => {
            let chat = build_chat_service(&config).await?;
            match thread_command {
                ThreadCommands::Create {
                    app_id,
                    customer_id,
                } => {
                    let conversation = chat
                        .store()
                        .create_conversation(&app_id, customer_id.as_deref())
                        .await?;
                    print_json(&conversation)
                }
            }
        }

        Commands::Sign {
            secret,
            body,
            timestamp,
        } => {
            let signed = sign(&secret, &body, timestamp)
                .map_err(|e| anyhow::anyhow!("sign request body: {e}"))?;
            println!("{}: {}", config.webhook.header_timestamp, signed.timestamp);
            println!("{}: {}", config.webhook.header_signature, signed.signature);
            Ok(())
        }

        Commands::Probe {
            app_id,
            url,
            message,
        } => {
            let chat = build_chat_service(&config).await?;
            let report = chat
                .probe_webhook(&app_id, &url, message.as_deref())
                .await?;
            print_json(&report)
        }
    }
}
