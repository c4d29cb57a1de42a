//! Cooperative cancellation for the poll loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    wake: Notify,
}

/// Shared stop flag. The loop checks it at each cycle boundary, so an
/// in-flight cycle (and any order submission in it) always completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<Inner>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake the loop if it is sleeping between cycles.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until stopped, whichever comes first.
    pub async fn sleep(&self, duration: Duration) {
        if self.is_stopped() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.inner.wake.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_wakes_sleeper() {
        let handle = StopHandle::new();
        let sleeper = handle.clone();

        let task = tokio::spawn(async move {
            sleeper.sleep(Duration::from_secs(3600)).await;
            sleeper.is_stopped()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();

        let stopped = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(stopped);
    }

    #[tokio::test]
    async fn test_sleep_returns_immediately_when_stopped() {
        let handle = StopHandle::new();
        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle.sleep(Duration::from_secs(3600)))
            .await
            .unwrap();
    }
}
