//! Process-wide shutdown broadcast.
//!
//! Heartbeat streams never finish on their own, so a graceful shutdown that
//! waits for in-flight responses would wait forever. Every heartbeat session
//! observes this broadcast and ends its stream once it fires.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Single-fire signal shared by the host server and all heartbeat sessions.
///
/// Cloning yields another handle to the same signal.
#[derive(Clone, Debug, Default)]
pub struct ShutdownBroadcast {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl ShutdownBroadcast {
    /// Create an armed broadcast.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the broadcast.
    ///
    /// Returns `true` for the call that moved it from armed to fired and
    /// `false` for every later call.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::info!("Shutdown broadcast fired, closing live reload streams");
        self.token.cancel();
        true
    }

    /// Whether the broadcast has fired.
    ///
    /// True as soon as any `fire()` call has run, including while the
    /// winning call is still waking waiters.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the broadcast fires. Completes immediately if it already has.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Wrap a host shutdown signal so the broadcast fires when it completes.
    ///
    /// Pass the result to `axum::serve(..).with_graceful_shutdown(..)`: the
    /// broadcast fires first, heartbeat streams end, then axum drains.
    pub fn fire_after<F>(&self, signal: F) -> impl Future<Output = ()> + Send + use<F>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let broadcast = self.clone();
        async move {
            signal.await;
            broadcast.fire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_armed() {
        assert!(!ShutdownBroadcast::new().is_fired());
    }

    #[test]
    fn test_fire_is_idempotent() {
        let broadcast = ShutdownBroadcast::new();
        assert!(broadcast.fire());
        assert!(!broadcast.fire());
        assert!(broadcast.is_fired());
    }

    #[test]
    fn test_clones_share_state() {
        let broadcast = ShutdownBroadcast::new();
        let other = broadcast.clone();
        other.fire();
        assert!(broadcast.is_fired());
    }

    #[tokio::test]
    async fn test_wait_after_fire_does_not_block() {
        let broadcast = ShutdownBroadcast::new();
        broadcast.fire();
        tokio::time::timeout(Duration::from_millis(100), broadcast.wait())
            .await
            .expect("wait must complete once fired");
    }

    #[tokio::test]
    async fn test_fire_wakes_all_waiters() {
        let broadcast = ShutdownBroadcast::new();
        let waiters: Vec<_> = (0..16)
            .map(|_| {
                let broadcast = broadcast.clone();
                tokio::spawn(async move { broadcast.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        broadcast.fire();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter must wake")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_concurrent_fire_and_wait_never_hang() {
        for _ in 0..64 {
            let broadcast = ShutdownBroadcast::new();
            let firer = {
                let broadcast = broadcast.clone();
                tokio::spawn(async move { broadcast.fire() })
            };
            let waiter = {
                let broadcast = broadcast.clone();
                tokio::spawn(async move { broadcast.wait().await })
            };

            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter registered concurrently with fire must wake")
                .unwrap();
            assert!(firer.await.unwrap());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_firer_observes_fired_state() {
        for _ in 0..64 {
            let broadcast = ShutdownBroadcast::new();
            let firers: Vec<_> = (0..4)
                .map(|_| {
                    let broadcast = broadcast.clone();
                    tokio::spawn(async move { (broadcast.fire(), broadcast.is_fired()) })
                })
                .collect();

            let mut winners = 0;
            for firer in firers {
                let (won, fired) = firer.await.unwrap();
                assert!(fired);
                winners += usize::from(won);
            }
            assert_eq!(winners, 1);
        }
    }

    #[tokio::test]
    async fn test_fire_after_signal() {
        let broadcast = ShutdownBroadcast::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let guarded = tokio::spawn(broadcast.fire_after(async move {
            let _ = rx.await;
        }));

        tokio::task::yield_now().await;
        assert!(!broadcast.is_fired());

        tx.send(()).unwrap();
        guarded.await.unwrap();
        assert!(broadcast.is_fired());
    }
}
