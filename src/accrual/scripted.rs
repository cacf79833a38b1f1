use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

use super::{AccrualOracle, AccrualResponse, OracleOutcome};
use crate::ledger::models::AccrualStatus;

/// Oracle double that replays queued outcomes per order number.
///
/// An order with nothing queued answers `NotRegistered`.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<HashMap<String, VecDeque<OracleOutcome>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, number: &str, outcome: OracleOutcome) {
        self.script
            .lock()
            .entry(number.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn result(number: &str, status: AccrualStatus, accrual: Option<Decimal>) -> OracleOutcome {
        OracleOutcome::Accrual(AccrualResponse {
            order: number.to_string(),
            status,
            accrual,
        })
    }

    pub fn processed(number: &str, accrual: Decimal) -> OracleOutcome {
        Self::result(number, AccrualStatus::Processed, Some(accrual))
    }
}

#[async_trait]
impl AccrualOracle for ScriptedOracle {
    async fn query(&self, order_number: &str) -> OracleOutcome {
        self.calls.lock().push(order_number.to_string());
        self.script
            .lock()
            .get_mut(order_number)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(OracleOutcome::NotRegistered)
    }
}
