//! Deadline enforcement.
//!
//! # Responsibilities
//! - Hold the single wall-clock budget of one logical operation
//! - Report the remaining budget to retry and hedging decisions
//! - Cancel the wrapped work when the budget runs out
//!
//! # Design Decisions
//! - Uses Tokio's timer (`timeout_at`), so paused test time drives it
//! - Cancellation is structural: the wrapped future is dropped, which drops
//!   every in-flight attempt and its connection future
//! - Timed-out operations return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::error::GatewayError;

/// Absolute deadline of one logical operation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started_at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start the clock now.
    pub fn start(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn expires_at(&self) -> Instant {
        self.started_at + self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at().saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Run `work` until it completes or the deadline passes.
    pub async fn run<T, F>(&self, work: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match timeout_at(self.expires_at(), work).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout { budget: self.budget }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_budget_shrinks() {
        let deadline = Deadline::start(Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(deadline.remaining(), Duration::from_secs(20));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_secs(25)).await;
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_and_cancels_work() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let deadline = Deadline::start(Duration::from_millis(100));

        let result: Result<(), _> = deadline
            .run(async move {
                let _flag = flag;
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Timeout { budget }) if budget == Duration::from_millis(100)));
        assert!(dropped.load(Ordering::SeqCst), "in-flight work must be dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_through_result() {
        let deadline = Deadline::start(Duration::from_secs(1));
        let result = deadline.run(async { Ok::<_, GatewayError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
