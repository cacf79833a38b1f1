use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::*;
use super::store::LedgerStore;
use crate::error::{AppError, AppResult, AuthError};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    // insertion order, upload times strictly increasing
    orders: Vec<Order>,
    withdrawals: Vec<Withdrawal>,
}

/// In-memory ledger store used by the test suite.
///
/// A single mutex makes each method one atomic unit, mirroring the
/// transactions of the PostgreSQL repository.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an order by number and returns a snapshot.
    pub async fn order(&self, number: &str) -> Option<Order> {
        let state = self.state.lock().await;
        state.orders.iter().find(|o| o.number == number).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.login == login) {
            return Err(AppError::Auth(AuthError::LoginTaken(login.to_string())));
        }

        let user = User {
            id: Uuid::new_v4(),
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            balance: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.login == login).cloned())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn get_balance(&self, user_id: Uuid) -> AppResult<Option<Balance>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).map(|u| Balance {
            current: u.balance,
            withdrawn: u.withdrawn,
        }))
    }

    async fn insert_order(&self, user_id: Uuid, number: &str) -> AppResult<Option<Order>> {
        let mut state = self.state.lock().await;
        if state.orders.iter().any(|o| o.number == number) {
            return Ok(None);
        }

        // strictly increasing upload times keep the scan order equal to
        // insertion order
        let mut uploaded_at = Utc::now();
        if let Some(last) = state.orders.last() {
            uploaded_at = uploaded_at.max(last.uploaded_at + Duration::microseconds(1));
        }

        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            number: number.to_string(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at,
        };
        state.orders.push(order.clone());
        Ok(Some(order))
    }

    async fn get_order_by_number(&self, number: &str) -> AppResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.number == number).cloned())
    }

    async fn list_orders_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(orders)
    }

    async fn list_pending_orders(&self, after: Option<ScanKey>, limit: i64) -> AppResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| o.is_pending())
            .filter(|o| after.map_or(true, |key| o.scan_key() > key))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.scan_key());
        orders.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(orders)
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        transition: OrderTransition,
        credit: Option<Credit>,
    ) -> AppResult<TransitionOutcome> {
        let mut state = self.state.lock().await;

        let owner = match state.orders.iter().find(|o| o.id == order_id) {
            Some(order) if order.is_pending() && order.status != transition.status() => {
                order.user_id
            }
            Some(_) => return Ok(TransitionOutcome::Unchanged),
            None => return Err(AppError::NotFound(format!("Order {}", order_id))),
        };

        if let Some(credit) = credit {
            if credit.user_id != owner || credit.order_id != order_id {
                return Err(AppError::Internal(format!(
                    "Credit for order {} does not match owner {}",
                    order_id, owner
                )));
            }
            if !state.users.contains_key(&credit.user_id) {
                return Err(AppError::NotFound(format!("User {}", credit.user_id)));
            }
        }

        if let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) {
            order.status = transition.status();
            order.accrual = transition.accrual();
        }

        let mut credited = None;
        if let Some(credit) = credit {
            if let Some(user) = state.users.get_mut(&credit.user_id) {
                user.balance += credit.amount;
                credited = Some(credit.amount);
            }
        }

        Ok(TransitionOutcome::Applied { credited })
    }

    async fn withdraw(
        &self,
        user_id: Uuid,
        order_number: &str,
        sum: Decimal,
    ) -> AppResult<Option<Withdrawal>> {
        let mut state = self.state.lock().await;

        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        if user.balance < sum {
            return Ok(None);
        }
        user.balance -= sum;
        user.withdrawn += sum;

        let withdrawal = Withdrawal {
            id: Uuid::new_v4(),
            user_id,
            order_number: order_number.to_string(),
            sum,
            processed_at: Utc::now(),
        };
        state.withdrawals.push(withdrawal.clone());
        Ok(Some(withdrawal))
    }

    async fn list_withdrawals(&self, user_id: Uuid) -> AppResult<Vec<Withdrawal>> {
        let state = self.state.lock().await;
        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(withdrawals)
    }
}
