mod handlers;
mod ws;

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

pub fn router(app: Arc<AppState>) -> Router {
  let mut router = Router::new()
    .route("/", get(handlers::root))
    .route("/health", get(handlers::health))
    .route("/new-invoice", post(handlers::new_invoice))
    .route("/invoices", get(handlers::invoices))
    .route("/invoices/deactivated", get(handlers::deactivated))
    .route("/invoices/count", get(handlers::count))
    .route("/ws", get(ws::upgrade));

  if app.config.phoenix_webhook_secret.is_some() {
    router =
      router.route("/phoenixd/webhook", post(handlers::phoenixd_webhook));
  } else {
    warn!("PHOENIX_WEBHOOK_SECRET not set, relying on reconciliation only");
  }

  router.with_state(app)
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        governor_limiter.retain_recent();
      }
    });

    let port = app.config.port;
    let service = router(app)
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Server running on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, service).await.context("Server error")?;

    Ok(())
  }
}
