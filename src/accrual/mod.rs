//! Accrual oracle: the external authority that decides how many points an order earns.

pub mod client;
#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::ledger::models::AccrualStatus;

pub use client::AccrualClient;

/// Body of a `200` answer from the oracle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub accrual: Option<Decimal>,
}

/// What one oracle query means for the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleOutcome {
    /// Unknown to the oracle; leave the order as it is.
    NotRegistered,
    /// Stop querying until `retry_after` has elapsed.
    RateLimited { retry_after: Duration },
    /// The oracle's verdict for this order.
    Accrual(AccrualResponse),
    /// Network error, timeout, unexpected status or undecodable body.
    TransientFailure(String),
}

#[async_trait]
pub trait AccrualOracle: Send + Sync {
    async fn query(&self, order_number: &str) -> OracleOutcome;
}
