pub mod invoice;
pub mod payment;
pub mod phoenixd;
#[cfg(test)]
pub mod test_utils;

pub use invoice::{Invoice, Pin};
pub use payment::{Payment, Settled};
pub use phoenixd::Phoenixd;
