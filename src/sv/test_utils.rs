//! Shared test utilities: database setup and a fake payment provider

#[cfg(test)]
pub mod test_db {
  use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema,
  };

  use crate::entity::*;

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(invoice::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }
}

/// Local stand-in for the phoenixd HTTP API
#[cfg(test)]
pub mod phoenixd_stub {
  use axum::{Json, Router, extract::Path, routing};
  use tokio::net::TcpListener;

  pub const PAYMENT_HASH: &str = "h1";
  pub const BOLT11: &str = "lnbc3600n1stub";

  /// Serves `createinvoice` and `payments/incoming/{hash}` on a random port,
  /// reporting every payment as `is_paid`. Returns the base url.
  pub async fn spawn(is_paid: bool) -> String {
    let router = Router::new()
      .route(
        "/createinvoice",
        routing::post(|| async {
          Json(json::json!({
            "amountSat": 360,
            "paymentHash": PAYMENT_HASH,
            "serialized": BOLT11,
          }))
        }),
      )
      .route(
        "/payments/incoming/{hash}",
        routing::get(move |Path(hash): Path<String>| async move {
          Json(json::json!({
            "paymentHash": hash,
            "invoice": BOLT11,
            "isPaid": is_paid,
            "receivedSat": 360,
          }))
        }),
      );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

    format!("http://{addr}")
  }
}
