//! Error types for the pin server

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("{0}")]
  InvalidArgs(String),

  #[error("Invoice not found")]
  InvoiceNotFound,

  #[error("Payment provider error: {0}")]
  Phoenixd(String),

  #[error("Invalid webhook signature")]
  InvalidSignature,

  #[error("Internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  fn status(&self) -> StatusCode {
    match self {
      Error::Database(_) | Error::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
      Error::InvoiceNotFound => StatusCode::NOT_FOUND,
      Error::Phoenixd(_) => StatusCode::BAD_GATEWAY,
      Error::InvalidSignature => StatusCode::UNAUTHORIZED,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();

    // Internal details stay in the logs
    let message = match &self {
      Error::Database(_) => "Database error".to_string(),
      Error::Internal(_) => "Internal error".to_string(),
      Error::Phoenixd(_) => "Payment provider unavailable".to_string(),
      other => other.to_string(),
    };

    if status.is_server_error() {
      tracing::error!("{self}");
    }

    (status, axum::Json(json::json!({ "error": message }))).into_response()
  }
}
