//! Registry of connected websocket clients.
//!
//! Each client gets an id on connect and an unbounded channel that its
//! session task drains into the socket. Events are JSON envelopes of the form
//! `{"event": "...", "data": ...}`.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::{entity::invoice, prelude::*, sv::Pin};

pub type ClientId = String;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
  pub event: &'static str,
  pub data: json::Value,
}

impl Event {
  pub fn connected(id: &str) -> Self {
    Self { event: "connected", data: json::json!({ "id": id }) }
  }

  pub fn users_connected(count: usize) -> Self {
    Self { event: "users-connected", data: json::json!(count) }
  }

  pub fn paid(invoice: &invoice::Model) -> Self {
    Self { event: "paid", data: Self::value(invoice) }
  }

  pub fn new_message(pin: &Pin) -> Self {
    Self { event: "new-message", data: Self::value(pin) }
  }

  pub fn expired(pin: &Pin) -> Self {
    Self { event: "expired", data: Self::value(pin) }
  }

  fn value<T: Serialize>(data: &T) -> json::Value {
    json::to_value(data).unwrap_or(json::Value::Null)
  }
}

#[derive(Default)]
pub struct Hub {
  clients: DashMap<ClientId, UnboundedSender<Event>>,
}

impl Hub {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn connect(&self) -> (ClientId, UnboundedReceiver<Event>) {
    let id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel();

    self.clients.insert(id.clone(), tx);
    info!("a user connected {id}");

    (id, rx)
  }

  pub fn disconnect(&self, id: &str) {
    if self.clients.remove(id).is_some() {
      info!("User disconnected: {id}");
    }
  }

  pub fn len(&self) -> usize {
    self.clients.len()
  }

  /// Sends `event` to a single client. Returns `false` if it is gone.
  pub fn emit(&self, id: &str, event: Event) -> bool {
    let Some(client) = self.clients.get(id) else {
      debug!("Socket {id} not found");
      return false;
    };

    if client.send(event).is_err() {
      drop(client);
      self.clients.remove(id);
      return false;
    }

    debug!("Message sent to {id}");
    true
  }

  /// Sends `event` to every client, dropping the ones whose session ended.
  pub fn emit_all(&self, event: Event) -> usize {
    let mut delivered = 0;

    self.clients.retain(|_, client| {
      let alive = client.send(event.clone()).is_ok();
      delivered += alive as usize;
      alive
    });

    delivered
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_connect_assigns_unique_ids() {
    let hub = Hub::new();

    let (a, _rx_a) = hub.connect();
    let (b, _rx_b) = hub.connect();

    assert_ne!(a, b);
    assert_eq!(hub.len(), 2);

    hub.disconnect(&a);
    assert_eq!(hub.len(), 1);
  }

  #[tokio::test]
  async fn test_emit_targets_single_client() {
    let hub = Hub::new();
    let (a, mut rx_a) = hub.connect();
    let (_b, mut rx_b) = hub.connect();

    assert!(hub.emit(&a, Event::users_connected(2)));

    assert_eq!(rx_a.recv().await.unwrap(), Event::users_connected(2));
    assert!(rx_b.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_emit_unknown_client() {
    let hub = Hub::new();
    assert!(!hub.emit("missing", Event::users_connected(0)));
  }

  #[tokio::test]
  async fn test_emit_all_drops_closed_clients() {
    let hub = Hub::new();
    let (_a, mut rx_a) = hub.connect();
    let (_b, rx_b) = hub.connect();

    drop(rx_b);

    assert_eq!(hub.emit_all(Event::users_connected(1)), 1);
    assert_eq!(hub.len(), 1);
    assert_eq!(rx_a.recv().await.unwrap().event, "users-connected");
  }

  #[test]
  fn test_event_envelope() {
    let event = Event::connected("abc");
    let text = json::to_string(&event).unwrap();
    assert_eq!(text, r#"{"event":"connected","data":{"id":"abc"}}"#);
  }
}
