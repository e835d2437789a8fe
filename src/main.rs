#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::{Context, Result};
use clap::Parser;
use relaydesk::Config;
use std::sync::Arc;
use tracing_subscriber::FmtSubscriber;

mod app;
mod cli;

use cli::commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_init()?;

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log.tracing_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let locale = config.apply_locale();
    tracing::debug!(locale = %locale, "locale selected");

    app::dispatch::dispatch(cli, Arc::new(config)).await
}
