//! phoenixd HTTP API client
//! API docs: https://phoenix.acinq.co/server/api
//!
//! Only the calls needed to take payments for pins are wrapped:
//! invoice creation, incoming payment lookup, and webhook verification.

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::prelude::*;

/// Parameters for `POST /createinvoice`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
  pub description: String,
  pub amount_sat: i64,
  /// Echoed back in payment notifications
  #[serde(skip_serializing_if = "Option::is_none")]
  pub external_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expiry_seconds: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
  pub amount_sat: i64,
  pub payment_hash: String,
  /// bolt11
  pub serialized: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct IncomingPayment {
  pub payment_hash: String,
  pub preimage: Option<String>,
  pub external_id: Option<String>,
  pub description: Option<String>,
  /// bolt11 the payment was made to
  pub invoice: Option<String>,
  pub is_paid: bool,
  #[serde(default)]
  pub received_sat: i64,
  /// Millisatoshis
  #[serde(default)]
  pub fees: i64,
  pub completed_at: Option<i64>,
  pub created_at: Option<i64>,
}

/// Webhook and websocket notification body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct PaymentReceived {
  #[serde(rename = "type")]
  pub kind: String,
  pub timestamp: Option<i64>,
  #[serde(default)]
  pub amount_sat: i64,
  pub payment_hash: String,
  pub external_id: Option<String>,
}

impl PaymentReceived {
  pub const KIND: &'static str = "payment_received";

  pub fn parse(body: &[u8]) -> Result<Self> {
    json::from_slice(body)
      .map_err(|e| Error::InvalidArgs(format!("Malformed notification: {e}")))
  }

  pub fn is_payment(&self) -> bool {
    self.kind == Self::KIND
  }
}

#[derive(Clone)]
pub struct Phoenixd {
  client: Client,
  host: String,
  token: String,
}

impl Phoenixd {
  pub fn new(host: String, token: String) -> Self {
    Self { client: Client::new(), host, token }
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.host.trim_end_matches('/'), path)
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
    let response = request
      .basic_auth("", Some(&self.token))
      .send()
      .await
      .map_err(|e| Error::Phoenixd(format!("Request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Phoenixd(format!("{status}: {body}")));
    }

    response
      .json()
      .await
      .map_err(|e| Error::Phoenixd(format!("Failed to parse response: {e}")))
  }

  pub async fn create_invoice(
    &self,
    params: &CreateInvoice,
  ) -> Result<InvoiceResponse> {
    let request = self.client.post(self.url("createinvoice")).form(params);
    self.send(request).await
  }

  pub async fn incoming_payment(
    &self,
    payment_hash: &str,
  ) -> Result<IncomingPayment> {
    let path = format!("payments/incoming/{payment_hash}");
    self.send(self.client.get(self.url(&path))).await
  }

  /// Checks `X-Phoenix-Signature`: hex HMAC-SHA256 of the raw body
  pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let Ok(expected) = hex::decode(signature.trim()) else {
      return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
      return false;
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
  }
}

#[cfg(test)]
mod tests {
  use hmac::{Hmac, Mac};
  use sha2::Sha256;

  use super::*;

  fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
  }

  #[test]
  fn test_verify_signature() {
    let body = br#"{"type":"payment_received","paymentHash":"abc"}"#;
    let signature = sign("secret", body);

    assert!(Phoenixd::verify_signature("secret", body, &signature));
    assert!(!Phoenixd::verify_signature("other", body, &signature));
    assert!(!Phoenixd::verify_signature("secret", b"{}", &signature));
    assert!(!Phoenixd::verify_signature("secret", body, "not-hex"));
  }

  #[test]
  fn test_parse_payment_received() {
    let body = br#"{"type":"payment_received","timestamp":1712785550079,"amountSat":360,"paymentHash":"f0a1","externalId":"sock-1"}"#;
    let event = PaymentReceived::parse(body).unwrap();

    assert!(event.is_payment());
    assert_eq!(event.amount_sat, 360);
    assert_eq!(event.payment_hash, "f0a1");
    assert_eq!(event.external_id.as_deref(), Some("sock-1"));
  }

  #[test]
  fn test_parse_malformed_notification() {
    assert!(matches!(
      PaymentReceived::parse(b"not json"),
      Err(Error::InvalidArgs(_))
    ));
  }

  #[test]
  fn test_parse_incoming_payment() {
    let body = r#"{"paymentHash":"f0a1","preimage":"00","externalId":"sock-1","description":"new-invoice","invoice":"lnbc3600n1...","isPaid":true,"receivedSat":360,"fees":0,"completedAt":1712785550079,"createdAt":1712785500000}"#;
    let payment: IncomingPayment = json::from_str(body).unwrap();

    assert!(payment.is_paid);
    assert_eq!(payment.received_sat, 360);
    assert_eq!(payment.invoice.as_deref(), Some("lnbc3600n1..."));
  }

  #[test]
  fn test_create_invoice_form_fields() {
    let params = CreateInvoice {
      description: "new-invoice".into(),
      amount_sat: 360,
      external_id: Some("sock-1".into()),
      expiry_seconds: None,
      webhook_url: None,
    };

    let value = json::to_value(&params).unwrap();
    assert_eq!(value["amountSat"], 360);
    assert_eq!(value["externalId"], "sock-1");
    assert!(value.get("expirySeconds").is_none());
  }

  #[test]
  fn test_url_join() {
    let client = Phoenixd::new("http://localhost:9740/".into(), "t".into());
    assert_eq!(
      client.url("createinvoice"),
      "http://localhost:9740/createinvoice"
    );
  }
}
