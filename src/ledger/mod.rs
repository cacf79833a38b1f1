pub mod balance;
pub mod luhn;
#[cfg(test)]
pub mod memory;
pub mod models;
pub mod orders;
pub mod repository;
pub mod store;

pub use balance::BalanceLedger;
pub use orders::OrderLedger;
pub use repository::LedgerRepository;
pub use store::LedgerStore;
