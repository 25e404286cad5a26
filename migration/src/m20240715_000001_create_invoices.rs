use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Invoices::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Invoices::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Invoices::WebsocketId).string().not_null())
          .col(ColumnDef::new(Invoices::Message).text().not_null())
          .col(
            ColumnDef::new(Invoices::InvoiceBolt11)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(ColumnDef::new(Invoices::PaymentHash).string().not_null())
          .col(ColumnDef::new(Invoices::Invoice).text().not_null())
          .col(ColumnDef::new(Invoices::Amount).big_integer().not_null())
          .col(
            ColumnDef::new(Invoices::Status)
              .string()
              .not_null()
              .default("waiting_payment"),
          )
          .col(ColumnDef::new(Invoices::LatLong).string().null())
          .col(ColumnDef::new(Invoices::DeactivateAt).big_integer().not_null())
          .col(ColumnDef::new(Invoices::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Invoices::UpdatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_invoices_status_deactivate_at")
          .table(Invoices::Table)
          .col(Invoices::Status)
          .col(Invoices::DeactivateAt)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_invoices_payment_hash")
          .table(Invoices::Table)
          .col(Invoices::PaymentHash)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Invoices::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Invoices {
  Table,
  Id,
  WebsocketId,
  Message,
  InvoiceBolt11,
  PaymentHash,
  Invoice,
  Amount,
  Status,
  LatLong,
  DeactivateAt,
  CreatedAt,
  UpdatedAt,
}
