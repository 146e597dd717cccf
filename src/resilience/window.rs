//! Rolling time window of outcomes.
//!
//! A fixed-capacity ring buffer of `(timestamp, failed)` samples. Samples older
//! than the window are pruned lazily when the window is read or written. The
//! buffer is allocated once; when full, the oldest sample is overwritten.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    failed: bool,
}

/// Totals over the samples currently inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub total: usize,
    pub failures: usize,
}

impl Tally {
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

#[derive(Debug)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
    duration: Duration,
}

impl SampleWindow {
    pub fn new(duration: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            duration,
        }
    }

    pub fn record(&mut self, at: Instant, failed: bool) {
        self.prune(at);
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { at, failed });
    }

    pub fn tally(&mut self, now: Instant) -> Tally {
        self.prune(now);
        let failures = self.samples.iter().filter(|s| s.failed).count();
        Tally {
            total: self.samples.len(),
            failures,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.saturating_duration_since(front.at) > self.duration {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_old_samples_expire() {
        let mut window = SampleWindow::new(Duration::from_secs(10), 16);
        let start = Instant::now();
        window.record(start, true);
        window.record(start + Duration::from_secs(4), false);
        window.record(start + Duration::from_secs(8), true);

        assert_eq!(window.tally(start + Duration::from_secs(9)), Tally { total: 3, failures: 2 });
        assert_eq!(window.tally(start + Duration::from_secs(13)), Tally { total: 2, failures: 1 });
        assert_eq!(window.tally(start + Duration::from_secs(30)), Tally::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_overwrites_oldest() {
        let mut window = SampleWindow::new(Duration::from_secs(60), 3);
        let now = Instant::now();
        window.record(now, true);
        window.record(now, false);
        window.record(now, false);
        window.record(now, false);

        let tally = window.tally(now);
        assert_eq!(tally, Tally { total: 3, failures: 0 });
        assert_eq!(tally.failure_ratio(), 0.0);
    }

    #[test]
    fn test_ratio() {
        let tally = Tally { total: 4, failures: 3 };
        assert_eq!(tally.failure_ratio(), 0.75);
    }
}
