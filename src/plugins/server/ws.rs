//! Websocket push channel.
//!
//! The first frame a client receives is `connected` carrying its id, which it
//! passes back as `websocket_id` when asking for an invoice.

use std::sync::Arc;

use axum::{
  extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::{hub::Event, prelude::*, state::AppState};

pub async fn upgrade(
  ws: WebSocketUpgrade,
  State(app): State<Arc<AppState>>,
) -> Response {
  ws.on_upgrade(move |socket| session(socket, app))
}

async fn session(socket: WebSocket, app: Arc<AppState>) {
  let (id, mut events) = app.hub.connect();
  let (mut sink, mut stream) = socket.split();

  app.hub.emit(&id, Event::connected(&id));
  app.broadcast_users();

  let mut send = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      let text = match json::to_string(&event) {
        Ok(text) => text,
        Err(err) => {
          error!("Failed to encode `{}` event: {err}", event.event);
          continue;
        }
      };

      if sink.send(Message::Text(text.into())).await.is_err() {
        break;
      }
    }
  });

  // Inbound frames carry nothing; read them only to notice the close
  let mut recv = tokio::spawn(async move {
    while let Some(Ok(message)) = stream.next().await {
      if let Message::Close(_) = message {
        break;
      }
    }
  });

  tokio::select! {
    _ = &mut send => recv.abort(),
    _ = &mut recv => send.abort(),
  }

  app.hub.disconnect(&id);
  app.broadcast_users();
}
