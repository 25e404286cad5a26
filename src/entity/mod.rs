pub mod invoice;

pub use invoice::InvoiceStatus;
