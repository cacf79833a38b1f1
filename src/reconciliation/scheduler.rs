use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use super::Reconciler;

/// Pause before resuming when a rate-limited cycle left no deadline to wait on.
const MIN_RESUME_DELAY: Duration = Duration::from_secs(1);

/// Reconciliation scheduler - runs a cycle on a fixed interval
pub struct ReconciliationScheduler {
    period: Duration,
    reconciler: Arc<Reconciler>,
}

impl ReconciliationScheduler {
    pub fn new(period: Duration, reconciler: Arc<Reconciler>) -> Self {
        Self { period, reconciler }
    }

    /// Start the scheduler (runs in background)
    pub fn start(&self) -> JoinHandle<()> {
        let period = self.period;
        let reconciler = self.reconciler.clone();

        tokio::spawn(async move { Self::run(period, &reconciler).await })
    }

    async fn run(period: Duration, reconciler: &Arc<Reconciler>) {
        info!("⏰ Reconciliation scheduler started, every {:?}", period);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            // A rate-limited cycle is resumed as soon as the backoff lapses,
            // not at the next tick.
            while reconciler.run_cycle().await.needs_resume() {
                let waited = reconciler.backoff().wait().await;
                if waited.is_zero() {
                    tokio::time::sleep(MIN_RESUME_DELAY).await;
                }
                info!("🔄 Oracle backoff over after {:?}, resuming reconciliation", waited);
            }
        }
    }
}
