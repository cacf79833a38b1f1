use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::models::*;
use super::store::LedgerStore;
use crate::error::{AppError, AppResult, AuthError};

/// Ledger repository - PostgreSQL source of truth for users, orders and withdrawals
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    // ========== USER OPERATIONS ==========

    async fn create_user(&self, login: &str, password_hash: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (login, password_hash)
            VALUES ($1, $2)
            RETURNING id, login, password_hash, balance, withdrawn, created_at
            "#,
        )
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Auth(AuthError::LoginTaken(login.to_string()))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(user)
    }

    async fn get_user_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password_hash, balance, withdrawn, created_at
            FROM users
            WHERE login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password_hash, balance, withdrawn, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    // ========== BALANCE OPERATIONS ==========

    async fn get_balance(&self, user_id: Uuid) -> AppResult<Option<Balance>> {
        let balance = sqlx::query_as::<_, Balance>(
            "SELECT balance AS current, withdrawn FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance)
    }

    // ========== ORDER OPERATIONS ==========

    async fn insert_order(&self, user_id: Uuid, number: &str) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (user_id, number)
            VALUES ($1, $2)
            ON CONFLICT (number) DO NOTHING
            RETURNING id, user_id, number, status, accrual, uploaded_at
            "#,
        )
        .bind(user_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn get_order_by_number(&self, number: &str) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, number, status, accrual, uploaded_at
            FROM orders
            WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn list_orders_by_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, number, status, accrual, uploaded_at
            FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_pending_orders(&self, after: Option<ScanKey>, limit: i64) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, number, status, accrual, uploaded_at
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
              AND ($1::timestamptz IS NULL OR (uploaded_at, id) > ($1::timestamptz, $2::uuid))
            ORDER BY uploaded_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(after.map(|k| k.uploaded_at))
        .bind(after.map(|k| k.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        transition: OrderTransition,
        credit: Option<Credit>,
    ) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        // Terminal guard: only pending rows match, and re-writing the same
        // pending status is not a transition.
        let owner: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $2, accrual = $3
            WHERE id = $1 AND status IN ('NEW', 'PROCESSING') AND status <> $2
            RETURNING user_id
            "#,
        )
        .bind(order_id)
        .bind(transition.status())
        .bind(transition.accrual())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(owner) = owner else {
            debug!("Order {} not pending or unchanged, skipping write", order_id);
            return Ok(TransitionOutcome::Unchanged);
        };

        let mut credited = None;
        if let Some(credit) = credit {
            if credit.user_id != owner || credit.order_id != order_id {
                return Err(AppError::Internal(format!(
                    "Credit for order {} does not match owner {}",
                    order_id, owner
                )));
            }

            let result = sqlx::query(
                r#"
                UPDATE users
                SET balance = balance + $2
                WHERE id = $1
                "#,
            )
            .bind(credit.user_id)
            .bind(credit.amount)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != 1 {
                return Err(AppError::NotFound(format!("User {}", credit.user_id)));
            }
            credited = Some(credit.amount);
        }

        tx.commit().await?;

        Ok(TransitionOutcome::Applied { credited })
    }

    // ========== WITHDRAWAL OPERATIONS ==========

    async fn withdraw(
        &self,
        user_id: Uuid,
        order_number: &str,
        sum: Decimal,
    ) -> AppResult<Option<Withdrawal>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance - $2, withdrawn = withdrawn + $2
            WHERE id = $1 AND balance >= $2
            "#,
        )
        .bind(user_id)
        .bind(sum)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (user_id, order_number, sum)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, order_number, sum, processed_at
            "#,
        )
        .bind(user_id)
        .bind(order_number)
        .bind(sum)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(withdrawal))
    }

    async fn list_withdrawals(&self, user_id: Uuid) -> AppResult<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT id, user_id, order_number, sum, processed_at
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }
}
