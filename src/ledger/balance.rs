use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::luhn;
use super::models::*;
use super::store::LedgerStore;
use crate::error::{AppError, AppResult, BalanceError};

/// Balance ledger - sole owner of balance and withdrawn mutation
#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn LedgerStore>,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<Balance> {
        self.store
            .get_balance(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))
    }

    /// Credit owed for moving `order` through `transition`.
    ///
    /// Only a first move into `Processed` with a positive accrual earns one.
    /// The credit is applied by the order ledger inside the same unit as the
    /// guarded status write, so an order is credited at most once.
    pub fn credit(&self, order: &Order, transition: &OrderTransition) -> Option<Credit> {
        if !order.is_pending() || transition.status() != OrderStatus::Processed {
            return None;
        }

        match transition.accrual() {
            Some(amount) if amount > Decimal::ZERO => Some(Credit {
                user_id: order.user_id,
                order_id: order.id,
                amount,
            }),
            _ => None,
        }
    }

    /// Withdraw `sum` points against reference `order_number`.
    ///
    /// Balance decrease, withdrawn increase and the withdrawal record are one
    /// unit; nothing is written when funds are insufficient.
    pub async fn debit(&self, user_id: Uuid, order_number: &str, sum: Decimal) -> AppResult<Withdrawal> {
        if sum <= Decimal::ZERO {
            return Err(BalanceError::NonPositiveSum(sum.to_string()).into());
        }
        if !luhn::is_valid(order_number) {
            return Err(BalanceError::InvalidReference(order_number.to_string()).into());
        }

        match self.store.withdraw(user_id, order_number, sum).await? {
            Some(withdrawal) => {
                info!("💸 User {} withdrew {} against {}", user_id, sum, order_number);
                Ok(withdrawal)
            }
            None => {
                let available = self.balance(user_id).await?.current;
                warn!(
                    "User {} withdrawal of {} rejected, balance {}",
                    user_id, sum, available
                );
                Err(BalanceError::InsufficientFunds {
                    required: sum.to_string(),
                    available: available.to_string(),
                }
                .into())
            }
        }
    }

    pub async fn withdrawals(&self, user_id: Uuid) -> AppResult<Vec<Withdrawal>> {
        self.store.list_withdrawals(user_id).await
    }
}
