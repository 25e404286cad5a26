use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  hub::Event,
  plugins::Plugin,
  prelude::*,
  state::AppState,
  sv::Pin,
};

/// Polls the provider for invoices that are still waiting for payment, in
/// case a webhook notification was missed.
pub struct Reconcile;

#[async_trait]
impl Plugin for Reconcile {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let every = app.config.reconcile_interval;
    if every.is_zero() {
      info!("Reconcile disabled via config (0 interval)");
      return Ok(());
    }

    info!("Reconcile started (interval: {})", humantime::format_duration(every));

    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
      interval.tick().await;

      if let Err(err) = reconcile(&app).await {
        error!("Reconcile failed: {err}");
      }
    }
  }
}

async fn reconcile(app: &AppState) -> Result<()> {
  let expiry = TimeDelta::from_std(app.config.invoice_expiry)
    .map_err(|e| Error::Internal(e.to_string()))?;
  let since = Utc::now().naive_utc() - expiry;

  let waiting = app.sv().invoice.waiting_since(since).await?;
  if waiting.is_empty() {
    return Ok(());
  }

  debug!("Reconciling {} waiting invoice(s)", waiting.len());

  let mut settled = 0;
  for invoice in waiting {
    match app.process_payment(&invoice.payment_hash).await {
      Ok(Some(_)) => settled += 1,
      Ok(None) => {}
      Err(err) => warn!("Could not check invoice #{}: {err}", invoice.id),
    }
  }

  if settled > 0 {
    info!("Reconcile settled {settled} missed payment(s)");
  }

  Ok(())
}

/// Tells connected clients when pins drop off the map.
pub struct Expiry;

#[async_trait]
impl Plugin for Expiry {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let every = app.config.expiry_interval;
    if every.is_zero() {
      info!("Expiry announcements disabled via config (0 interval)");
      return Ok(());
    }

    let mut interval = time::interval(every);
    let mut last = Utc::now().timestamp();

    loop {
      interval.tick().await;

      let now = Utc::now().timestamp();
      match announce_expired(&app, last, now).await {
        Ok(_) => last = now,
        Err(err) => error!("Expiry sweep failed: {err}"),
      }
    }
  }
}

async fn announce_expired(app: &AppState, from: i64, to: i64) -> Result<usize> {
  if to <= from {
    return Ok(0);
  }

  let expired = app.sv().invoice.expired_between(from, to).await?;

  for invoice in &expired {
    debug!("Pin #{} expired", invoice.id);
    app.hub.emit_all(Event::expired(&Pin::new(invoice, to)));
  }

  Ok(expired.len())
}
