use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::models::*;
use crate::error::AppResult;

/// Storage collaborator behind the order and balance ledgers.
///
/// Every mutating method is one atomic unit. Implementations must not expose a
/// read-then-write balance update: credit and debit are single conditional
/// writes so concurrent callers cannot lose updates.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fails with `AuthError::LoginTaken` when the login exists.
    async fn create_user(&self, login: &str, password_hash: &str) -> AppResult<User>;

    async fn get_user_by_login(&self, login: &str) -> AppResult<Option<User>>;

    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;

    async fn get_balance(&self, user_id: Uuid) -> AppResult<Option<Balance>>;

    /// Inserts a `NEW` order unless the number is already claimed.
    /// Returns `None` when another row owns the number.
    async fn insert_order(&self, user_id: Uuid, number: &str) -> AppResult<Option<Order>>;

    async fn get_order_by_number(&self, number: &str) -> AppResult<Option<Order>>;

    /// Newest upload first.
    async fn list_orders_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>>;

    /// Orders in `NEW` or `PROCESSING` strictly after `after` in
    /// `(uploaded_at, id)` order, oldest first, at most `limit`.
    async fn list_pending_orders(&self, after: Option<ScanKey>, limit: i64) -> AppResult<Vec<Order>>;

    /// Writes `transition` only if the order is still pending and the write
    /// changes it; applies `credit` in the same unit, only when the write
    /// happened.
    async fn apply_transition(
        &self,
        order_id: Uuid,
        transition: OrderTransition,
        credit: Option<Credit>,
    ) -> AppResult<TransitionOutcome>;

    /// Debits `sum` and records the withdrawal in one unit. Returns `None`
    /// without writing anything when the balance is below `sum`.
    async fn withdraw(
        &self,
        user_id: Uuid,
        order_number: &str,
        sum: Decimal,
    ) -> AppResult<Option<Withdrawal>>;

    /// Newest first.
    async fn list_withdrawals(&self, user_id: Uuid) -> AppResult<Vec<Withdrawal>>;
}
