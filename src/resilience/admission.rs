//! Admission control.
//!
//! # Responsibilities
//! - Bound the number of logical operations in flight
//! - Queue callers FIFO when every permit is taken, up to a queue limit
//! - Reject immediately when the queue is full, or after a queued caller's timeout
//!
//! # Design Decisions
//! - Permits come from a Tokio semaphore, which serves waiters in FIFO order
//!   and hands released permits to the oldest waiter first
//! - A slot is an RAII lease: dropping it releases the permit exactly once,
//!   on success, failure, cancellation and unwinding alike. The in-flight
//!   gauge moves with the lease
//! - The queue length is tracked separately so the queue bound is enforced
//!   before a caller starts waiting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::AdmissionConfig;
use crate::error::RejectReason;
use crate::observability::metrics;

/// Bounded-concurrency gate with a bounded wait queue.
#[derive(Debug)]
pub struct AdmissionLimiter {
    permits: Arc<Semaphore>,
    permit_limit: usize,
    queue_limit: usize,
    queued: AtomicUsize,
}

impl AdmissionLimiter {
    pub fn new(permit_limit: usize, queue_limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(permit_limit)),
            permit_limit,
            queue_limit,
            queued: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(config.permit_limit, config.queue_limit)
    }

    /// Acquire a slot, waiting at most `timeout` in the queue.
    pub async fn acquire(&self, timeout: Duration) -> Result<AdmissionSlot, RejectReason> {
        if let Ok(permit) = self.permits.clone().try_acquire_owned() {
            return Ok(AdmissionSlot::new(permit));
        }

        let _position = self.enqueue().ok_or(RejectReason::QueueFull)?;

        match tokio::time::timeout(timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(AdmissionSlot::new(permit)),
            // The semaphore is never closed; treat it like a timeout if it ever is.
            Ok(Err(_)) | Err(_) => Err(RejectReason::QueueTimeout),
        }
    }

    fn enqueue(&self) -> Option<QueuePosition<'_>> {
        let mut current = self.queued.load(Ordering::Relaxed);
        loop {
            if current >= self.queue_limit {
                return None;
            }
            match self.queued.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(QueuePosition { queued: &self.queued }),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn permit_limit(&self) -> usize {
        self.permit_limit
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.permit_limit - self.available_permits()
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }
}

/// Decrements the queue length when the waiter leaves the queue, for any reason.
struct QueuePosition<'a> {
    queued: &'a AtomicUsize,
}

impl Drop for QueuePosition<'_> {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A lease on the concurrency budget.
///
/// When dropped, the permit is returned to the limiter.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionSlot {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        metrics::admission_acquired();
        Self { _permit: permit }
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        metrics::admission_released();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Recorder that keeps only the admission gauge.
    #[derive(Default)]
    struct InFlightGauge(Arc<GaugeValue>);

    #[derive(Default)]
    struct GaugeValue(Mutex<f64>);

    impl GaugeFn for GaugeValue {
        fn increment(&self, value: f64) {
            *self.0.lock().unwrap() += value;
        }

        fn decrement(&self, value: f64) {
            *self.0.lock().unwrap() -= value;
        }

        fn set(&self, value: f64) {
            *self.0.lock().unwrap() = value;
        }
    }

    impl InFlightGauge {
        fn value(&self) -> f64 {
            *self.0 .0.lock().unwrap()
        }
    }

    impl Recorder for InFlightGauge {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            if key.name() == crate::observability::metrics::ADMISSION_IN_FLIGHT {
                Gauge::from_arc(self.0.clone())
            } else {
                Gauge::noop()
            }
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_in_flight_gauge_follows_slots() {
        let recorder = InFlightGauge::default();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let limiter = AdmissionLimiter::new(2, 1);
                let a = limiter.acquire(Duration::from_millis(10)).await.unwrap();
                let b = limiter.acquire(Duration::from_millis(10)).await.unwrap();
                assert_eq!(recorder.value(), 2.0);

                drop(a);
                assert_eq!(recorder.value(), 1.0);
                drop(b);
                assert_eq!(recorder.value(), 0.0);

                // A rejected caller never moves the gauge.
                let _held = limiter.acquire(Duration::from_millis(10)).await.unwrap();
                let _other = limiter.acquire(Duration::from_millis(10)).await.unwrap();
                assert!(limiter.acquire(Duration::from_millis(10)).await.is_err());
                assert_eq!(recorder.value(), 2.0);
            })
        });
    }

    #[tokio::test]
    async fn test_immediate_acquire_and_release() {
        let limiter = AdmissionLimiter::new(2, 1);
        let a = limiter.acquire(Duration::from_millis(10)).await.unwrap();
        let b = limiter.acquire(Duration::from_millis(10)).await.unwrap();
        assert_eq!(limiter.in_flight(), 2);

        drop(a);
        assert_eq!(limiter.available_permits(), 1);
        drop(b);
        assert_eq!(limiter.available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_full_rejects_immediately() {
        let limiter = Arc::new(AdmissionLimiter::new(1, 1));
        let _held = limiter.acquire(Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire(Duration::from_secs(5)).await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        assert_eq!(limiter.queued(), 1);

        let rejected = limiter.acquire(Duration::from_secs(5)).await;
        assert_eq!(rejected.unwrap_err(), RejectReason::QueueFull);

        drop(_held);
        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_timeout() {
        let limiter = AdmissionLimiter::new(1, 5);
        let _held = limiter.acquire(Duration::from_secs(1)).await.unwrap();

        let result = limiter.acquire(Duration::from_millis(200)).await;
        assert_eq!(result.unwrap_err(), RejectReason::QueueTimeout);
        assert_eq!(limiter.queued(), 0, "timed out waiter leaves the queue");
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_callers_served_in_order() {
        let limiter = Arc::new(AdmissionLimiter::new(1, 10));
        let held = limiter.acquire(Duration::from_secs(1)).await.unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for i in 0..3 {
            let limiter = limiter.clone();
            let order = order.clone();
            tasks.push(tokio::spawn(async move {
                let _slot = limiter.acquire(Duration::from_secs(10)).await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }));
            tokio::task::yield_now().await;
        }

        drop(held);
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_permit_limit_and_no_leak() {
        let limiter = Arc::new(AdmissionLimiter::new(8, 1000));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..200 {
            let limiter = limiter.clone();
            let active = active.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                let _slot = limiter.acquire(Duration::from_secs(30)).await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 8);
        assert_eq!(limiter.available_permits(), 8);
        assert_eq!(limiter.queued(), 0);
    }
}
