use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::luhn;
use super::models::*;
use super::store::LedgerStore;
use crate::error::{AppError, AppResult, OrderError};

/// Order ledger - sole owner of order status transitions
#[derive(Clone)]
pub struct OrderLedger {
    store: Arc<dyn LedgerStore>,
}

impl OrderLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Claim `number` for `user_id`.
    ///
    /// Re-submitting an owned number is accepted without a new row; a number
    /// owned by someone else is a conflict.
    pub async fn submit(&self, user_id: Uuid, number: &str) -> AppResult<OrderSubmission> {
        let number = number.trim();
        if number.is_empty() {
            return Err(OrderError::EmptyNumber.into());
        }
        if !luhn::is_valid(number) {
            return Err(OrderError::InvalidNumber(number.to_string()).into());
        }

        if let Some(order) = self.store.insert_order(user_id, number).await? {
            info!("📥 Order {} uploaded by user {}", number, user_id);
            return Ok(OrderSubmission::Accepted(order));
        }

        // Lost the insert: someone (maybe this user) already holds the number.
        let existing = self
            .store
            .get_order_by_number(number)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Order {} vanished after conflict", number)))?;

        if existing.user_id == user_id {
            debug!("Order {} already uploaded by user {}", number, user_id);
            Ok(OrderSubmission::AlreadyUploaded(existing))
        } else {
            Err(OrderError::OwnedByAnotherUser(number.to_string()).into())
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        self.store.list_orders_by_user(user_id).await
    }

    /// Pending orders after `after` (from the start when `None`), oldest
    /// upload first, at most `limit`.
    pub async fn list_pending(&self, after: Option<ScanKey>, limit: i64) -> AppResult<Vec<Order>> {
        self.store.list_pending_orders(after, limit).await
    }

    /// Guarded status write.
    ///
    /// Terminal orders are left alone and reported as `Unchanged` rather than
    /// failing, so replayed or overlapping cycles are harmless. `credit`, when
    /// given, lands in the same atomic unit as the write.
    pub async fn apply_transition(
        &self,
        order: &Order,
        transition: OrderTransition,
        credit: Option<Credit>,
    ) -> AppResult<TransitionOutcome> {
        if !Self::is_allowed(order.status, transition.status()) {
            debug!(
                "Order {} transition {} -> {} not allowed, skipping",
                order.number,
                order.status,
                transition.status()
            );
            return Ok(TransitionOutcome::Unchanged);
        }

        self.store.apply_transition(order.id, transition, credit).await
    }

    /// Valid transitions:
    /// - New → Processing, Processed, Invalid
    /// - Processing → Processed, Invalid
    /// - Terminal states (Processed, Invalid) → NO TRANSITIONS ALLOWED
    pub fn is_allowed(from: OrderStatus, to: OrderStatus) -> bool {
        match from {
            OrderStatus::New => matches!(
                to,
                OrderStatus::Processing | OrderStatus::Processed | OrderStatus::Invalid
            ),
            OrderStatus::Processing => {
                matches!(to, OrderStatus::Processed | OrderStatus::Invalid)
            }
            OrderStatus::Processed | OrderStatus::Invalid => false,
        }
    }
}
