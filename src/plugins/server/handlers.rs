use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Query, State},
  http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use crate::{
  prelude::*,
  state::AppState,
  sv::{
    Phoenixd, Pin,
    invoice::{Counts, NewPin, PinQuery},
    phoenixd::{CreateInvoice, InvoiceResponse, PaymentReceived},
  },
  utils,
};

const SIGNATURE_HEADER: &str = "x-phoenix-signature";

pub async fn root() -> Json<json::Value> {
  Json(json::json!({ "message": "Hello World!" }))
}

pub async fn health() -> &'static str {
  "OK"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoiceRes {
  pub invoice_data: InvoiceResponse,
  /// How long the pin stays up once paid
  pub active_for: String,
}

pub async fn new_invoice(
  State(app): State<Arc<AppState>>,
  Json(pin): Json<NewPin>,
) -> Result<Json<NewInvoiceRes>> {
  pin.validate(&app.config)?;

  let seconds_per_sat = app.config.seconds_per_sat;
  let params = CreateInvoice {
    description: "zapin.me".into(),
    amount_sat: pin.amount,
    external_id: Some(pin.websocket_id.clone()),
    expiry_seconds: Some(app.config.invoice_expiry.as_secs()),
    webhook_url: app.config.phoenix_webhook_url.clone(),
  };

  let invoice_data = app.phoenixd.create_invoice(&params).await?;
  let invoice =
    app.sv().invoice.create(&pin, &invoice_data, seconds_per_sat).await?;

  info!(
    "Invoice #{} created for {} sats (socket {})",
    invoice.id, invoice.amount, invoice.websocket_id
  );

  Ok(Json(NewInvoiceRes {
    invoice_data,
    active_for: utils::describe_duration(
      pin.amount.saturating_mul(seconds_per_sat),
    ),
  }))
}

#[derive(Debug, Serialize)]
pub struct PinsRes {
  pub invoices: Vec<Pin>,
}

pub async fn invoices(
  State(app): State<Arc<AppState>>,
  Query(query): Query<PinQuery>,
) -> Result<Json<PinsRes>> {
  let now = Utc::now().timestamp();
  let pins =
    app.sv().invoice.active(&query, app.config.max_page_limit, now).await?;

  Ok(Json(PinsRes {
    invoices: pins.iter().map(|invoice| Pin::new(invoice, now)).collect(),
  }))
}

pub async fn deactivated(
  State(app): State<Arc<AppState>>,
  Query(query): Query<PinQuery>,
) -> Result<Json<PinsRes>> {
  let now = Utc::now().timestamp();
  let pins = app
    .sv()
    .invoice
    .deactivated(&query, app.config.max_page_limit, now)
    .await?;

  Ok(Json(PinsRes {
    invoices: pins.iter().map(|invoice| Pin::new(invoice, now)).collect(),
  }))
}

pub async fn count(State(app): State<Arc<AppState>>) -> Result<Json<Counts>> {
  let counts = app.sv().invoice.count(Utc::now().timestamp()).await?;
  Ok(Json(counts))
}

pub async fn phoenixd_webhook(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<StatusCode> {
  let Some(secret) = app.config.phoenix_webhook_secret.as_deref() else {
    return Err(Error::InvalidSignature);
  };

  let signature = headers
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok())
    .unwrap_or_default();

  if !Phoenixd::verify_signature(secret, &body, signature) {
    warn!("Rejected webhook with invalid signature");
    return Err(Error::InvalidSignature);
  }

  let event = PaymentReceived::parse(&body)?;
  if !event.is_payment() {
    debug!("Ignoring `{}` notification", event.kind);
    return Ok(StatusCode::OK);
  }

  match app.process_payment(&event.payment_hash).await {
    Ok(_) => Ok(StatusCode::OK),
    Err(Error::InvoiceNotFound) => {
      // paid to the node but not through a pin
      warn!("Invoice not found for payment {}", event.payment_hash);
      Ok(StatusCode::OK)
    }
    Err(err) => Err(err),
  }
}
