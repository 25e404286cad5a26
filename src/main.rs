//! zapin - pay-to-pin messages on a world map
//!
//! Architecture:
//! - SeaORM for database access (SQLite)
//! - Axum for the HTTP API and websocket push channel
//! - phoenixd for Lightning invoices and payment notifications
//! - Tokio for async runtime

mod entity;
mod error;
mod hub;
mod plugins;
mod prelude;
mod state;
mod sv;
mod utils;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::{App, cron, server},
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "zapin=debug,tower_http=debug,axum=trace,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;

  info!("Starting zapin v{}", env!("CARGO_PKG_VERSION"));

  let app_state = Arc::new(AppState::new(config).await?);

  App::new()
    .register(server::Plugin)
    .register(cron::Reconcile)
    .register(cron::Expiry)
    .run(app_state)
    .await;

  tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
  info!("Shutting down");

  Ok(())
}
