//! Drives pending orders to their oracle verdict.

pub mod backoff;
pub mod scheduler;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::accrual::{AccrualOracle, AccrualResponse, OracleOutcome};
use crate::error::{AppError, AppResult};
use crate::ledger::models::{Order, OrderTransition, ScanKey, TransitionOutcome};
use crate::ledger::{BalanceLedger, OrderLedger};

pub use backoff::BackoffGate;
pub use scheduler::ReconciliationScheduler;

/// What one cycle did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub pending: usize,
    pub queried: usize,
    pub updated: usize,
    pub credited: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Cut short by a rate limit, ours or a concurrent cycle's.
    pub rate_limited: bool,
    /// Not started because the backoff deadline was still in the future.
    pub deferred: bool,
}

impl CycleReport {
    /// True when the oracle asked us to back off before the scan finished.
    pub fn needs_resume(&self) -> bool {
        self.rate_limited || self.deferred
    }
}

/// One routine behind both the timer and the upload trigger.
///
/// Overlapping cycles are allowed. The guarded transition in the order
/// ledger keeps them from double-crediting.
///
/// Each cycle picks up the pending scan where the last one stopped and wraps
/// back to the oldest order once it runs off the end, so a full batch of
/// orders the oracle does not know yet cannot hide newer ones forever.
pub struct Reconciler {
    orders: OrderLedger,
    balances: BalanceLedger,
    oracle: Arc<dyn AccrualOracle>,
    backoff: BackoffGate,
    batch_size: i64,
    // last order queried in the current pass, `None` to start from the oldest
    cursor: Mutex<Option<ScanKey>>,
}

impl Reconciler {
    pub fn new(
        orders: OrderLedger,
        balances: BalanceLedger,
        oracle: Arc<dyn AccrualOracle>,
        batch_size: i64,
    ) -> Self {
        Self {
            orders,
            balances,
            oracle,
            backoff: BackoffGate::new(),
            batch_size,
            cursor: Mutex::new(None),
        }
    }

    pub fn backoff(&self) -> &BackoffGate {
        &self.backoff
    }

    /// Spawn a cycle in the background (upload trigger).
    pub fn trigger(self: &Arc<Self>) -> JoinHandle<CycleReport> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move { reconciler.run_cycle().await })
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        if let Some(remaining) = self.backoff.remaining() {
            debug!("Reconciliation deferred, oracle backoff for another {:?}", remaining);
            report.deferred = true;
            return report;
        }

        let pending = match self.load_window().await {
            Ok(pending) => pending,
            Err(e) => {
                error!("❌ Failed to load pending orders: {:?}", e);
                report.failed += 1;
                return report;
            }
        };
        report.pending = pending.len();

        for order in &pending {
            if let Some(remaining) = self.backoff.remaining() {
                info!(
                    "⏸️ Oracle backoff active ({:?} left), leaving {} orders for later",
                    remaining,
                    report.pending - report.queried
                );
                report.rate_limited = true;
                break;
            }

            report.queried += 1;
            let outcome = self.oracle.query(&order.number).await;
            // a rate-limited order is retried first once the gate opens
            if !matches!(outcome, OracleOutcome::RateLimited { .. }) {
                self.advance(order.scan_key());
            }

            match outcome {
                OracleOutcome::Accrual(body) => match self.settle(order, body).await {
                    Ok(TransitionOutcome::Applied { credited }) => {
                        report.updated += 1;
                        if credited.is_some() {
                            report.credited += 1;
                        }
                    }
                    Ok(TransitionOutcome::Unchanged) => {}
                    Err(e) => {
                        error!("❌ Failed to settle order {}: {:?}", order.number, e);
                        report.failed += 1;
                    }
                },
                OracleOutcome::NotRegistered => {
                    debug!("Order {} not registered with the oracle yet", order.number);
                    report.skipped += 1;
                }
                OracleOutcome::TransientFailure(reason) => {
                    warn!("⚠️ Oracle query for order {} failed: {}", order.number, reason);
                    report.skipped += 1;
                }
                OracleOutcome::RateLimited { retry_after } => {
                    let until = self.backoff.hold_for(retry_after);
                    warn!(
                        "🚦 Oracle rate limit on order {}, backing off {:?} (until {:?}), {} orders left",
                        order.number,
                        retry_after,
                        until,
                        report.pending - report.queried + 1
                    );
                    report.rate_limited = true;
                    break;
                }
            }
        }

        // a short window reached the end of the scan
        if !report.rate_limited && (report.pending as i64) < self.batch_size {
            *self.cursor.lock() = None;
        }

        if report.pending == 0 {
            debug!("Reconciliation cycle: nothing pending");
        } else {
            info!(
                "✓ Reconciliation cycle: {} pending, {} queried, {} updated, {} credited, {} skipped, {} failed{}",
                report.pending,
                report.queried,
                report.updated,
                report.credited,
                report.skipped,
                report.failed,
                if report.rate_limited { ", rate limited" } else { "" }
            );
        }

        report
    }

    /// Next window of the pending scan, wrapping to the oldest order when the
    /// cursor has run past the last one.
    async fn load_window(&self) -> AppResult<Vec<Order>> {
        let after = *self.cursor.lock();
        let pending = self.orders.list_pending(after, self.batch_size).await?;
        if !pending.is_empty() || after.is_none() {
            return Ok(pending);
        }

        debug!("Pending scan wrapped around to the oldest order");
        *self.cursor.lock() = None;
        self.orders.list_pending(None, self.batch_size).await
    }

    fn advance(&self, key: ScanKey) {
        let mut cursor = self.cursor.lock();
        if cursor.map_or(true, |current| key > current) {
            *cursor = Some(key);
        }
    }

    async fn settle(&self, order: &Order, body: AccrualResponse) -> AppResult<TransitionOutcome> {
        let status = body.status.to_order_status();
        let transition = OrderTransition::new(status, body.accrual).ok_or_else(|| {
            AppError::ExternalError(format!(
                "Oracle verdict {:?} with accrual {:?} for order {} is not a valid transition",
                body.status, body.accrual, order.number
            ))
        })?;

        let credit = self.balances.credit(order, &transition);
        let outcome = self.orders.apply_transition(order, transition, credit).await?;

        if let TransitionOutcome::Applied { credited } = &outcome {
            match credited {
                Some(amount) => info!(
                    "🪙 Order {} {} -> {}, credited {} to user {}",
                    order.number, order.status, status, amount, order.user_id
                ),
                None => info!("📦 Order {} {} -> {}", order.number, order.status, status),
            }
        }
        Ok(outcome)
    }
}
