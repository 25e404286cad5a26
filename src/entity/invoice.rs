use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
  #[sea_orm(string_value = "waiting_payment")]
  #[default]
  WaitingPayment,
  #[sea_orm(string_value = "paid")]
  Paid,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  /// Websocket client that requested the invoice
  pub websocket_id: String,
  #[sea_orm(column_type = "Text")]
  pub message: String,
  #[sea_orm(unique)]
  pub invoice_bolt11: String,
  pub payment_hash: String,
  /// Provider response, serialized as JSON
  #[sea_orm(column_type = "Text")]
  pub invoice: String,
  /// Satoshis
  pub amount: i64,
  pub status: InvoiceStatus,
  pub lat_long: Option<String>,
  /// Unix seconds
  pub deactivate_at: i64,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
