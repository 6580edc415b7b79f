use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use tokio_util::sync::CancellationToken;

/// Cancels in-flight calls of either client.
///
/// Clones share state: cancelling one clone cancels every call using any of
/// them. A cancelled call fails with
/// [`PxshotError::Cancelled`](crate::PxshotError::Cancelled).
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    token: CancellationToken,
    signal: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
        let (lock, condvar) = &*self.signal;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Blocks for up to `timeout`. Returns `true` if cancelled meanwhile.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, condvar) = &*self.signal;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use super::CancelToken;

    #[test]
    fn wait_times_out_when_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_a_blocked_waiter() {
        let token = CancelToken::new();
        let remote = token.clone();
        let started = Instant::now();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(token.is_cancelled());
        canceller.join().unwrap();
    }

    #[tokio::test]
    async fn async_waiters_observe_cancel() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
        assert!(token.wait_timeout(Duration::ZERO));
    }
}
