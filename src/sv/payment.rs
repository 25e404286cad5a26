use sea_orm::sea_query::Expr;

use crate::{
  entity::{InvoiceStatus, invoice},
  prelude::*,
  sv::invoice::deactivate_at,
};

pub struct Payment<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
  /// Marked paid by this call
  Fresh(invoice::Model),
  /// Was paid before; left untouched
  Already(invoice::Model),
}

impl<'a> Payment<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Marks the invoice behind `payment_hash` as paid. The visibility window
  /// restarts from the moment of settlement.
  pub async fn settle(
    &self,
    payment_hash: &str,
    seconds_per_sat: i64,
  ) -> Result<Settled> {
    let invoice = invoice::Entity::find()
      .filter(invoice::Column::PaymentHash.eq(payment_hash))
      .one(self.db)
      .await?
      .ok_or(Error::InvoiceNotFound)?;

    if invoice.status == InvoiceStatus::Paid {
      return Ok(Settled::Already(invoice));
    }

    let now = Utc::now();
    let deactivate_at =
      deactivate_at(now.timestamp(), invoice.amount, seconds_per_sat);

    // Only the caller that flips the status wins; concurrent confirmations
    // for the same payment see zero affected rows.
    let result = invoice::Entity::update_many()
      .col_expr(invoice::Column::Status, Expr::value(InvoiceStatus::Paid))
      .col_expr(invoice::Column::DeactivateAt, Expr::value(deactivate_at))
      .col_expr(invoice::Column::UpdatedAt, Expr::value(now.naive_utc()))
      .filter(invoice::Column::Id.eq(invoice.id))
      .filter(invoice::Column::Status.eq(InvoiceStatus::WaitingPayment))
      .exec(self.db)
      .await?;

    let invoice = invoice::Entity::find_by_id(invoice.id)
      .one(self.db)
      .await?
      .ok_or(Error::InvoiceNotFound)?;

    if result.rows_affected == 1 {
      Ok(Settled::Fresh(invoice))
    } else {
      Ok(Settled::Already(invoice))
    }
  }
}
