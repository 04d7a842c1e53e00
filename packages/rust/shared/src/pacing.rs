//! Request pacing and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between successive outbound requests.
///
/// The first call to [`Pacer::wait`] returns immediately; each later call
/// sleeps for whatever remains of the interval since the previous one.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// The configured minimum interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request may be sent, then record it.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// A shared flag set once when the user interrupts the run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_wait_is_immediate() {
        let pacer = Pacer::new(Duration::from_secs(5));
        let start = std::time::Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn later_waits_respect_interval() {
        let pacer = Pacer::new(Duration::from_millis(40));
        let start = std::time::Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn zero_interval_never_sleeps() {
        let pacer = Pacer::new(Duration::ZERO);
        let start = std::time::Instant::now();
        for _ in 0..50 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
