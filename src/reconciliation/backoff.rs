use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

/// Shared "do not query the oracle before" deadline.
///
/// Every cycle, concurrent or not, consults the same gate. The lock is only
/// held to read or write the deadline, never across an await.
#[derive(Debug, Default)]
pub struct BackoffGate {
    deadline: Mutex<Option<Instant>>,
}

impl BackoffGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left until the oracle may be queried again, `None` when open.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = (*self.deadline.lock())?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Close the gate for `retry_after` from now and return the deadline in force.
    ///
    /// A later deadline extends the current one; an earlier one never shortens it.
    pub fn hold_for(&self, retry_after: Duration) -> Instant {
        let until = Instant::now() + retry_after;
        let mut deadline = self.deadline.lock();
        match *deadline {
            Some(current) if current >= until => current,
            _ => {
                *deadline = Some(until);
                until
            }
        }
    }

    /// Sleep until the gate opens. Returns how long it slept.
    pub async fn wait(&self) -> Duration {
        match self.remaining() {
            Some(remaining) => {
                tokio::time::sleep(remaining).await;
                remaining
            }
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_starts_open() {
        let gate = BackoffGate::new();
        assert_eq!(gate.remaining(), None);
    }

    #[tokio::test]
    async fn test_hold_closes_then_reopens() {
        let gate = BackoffGate::new();
        gate.hold_for(Duration::from_millis(80));
        assert!(gate.remaining().is_some());

        let slept = gate.wait().await;
        assert!(slept > Duration::ZERO);
        assert_eq!(gate.remaining(), None);
        assert_eq!(gate.wait().await, Duration::ZERO);
    }

    #[test]
    fn test_earlier_deadline_never_shortens() {
        let gate = BackoffGate::new();
        let long = gate.hold_for(Duration::from_secs(60));
        let kept = gate.hold_for(Duration::from_secs(1));
        assert_eq!(long, kept);
        assert!(gate.remaining().unwrap() > Duration::from_secs(30));

        let extended = gate.hold_for(Duration::from_secs(120));
        assert!(extended > long);
    }
}
