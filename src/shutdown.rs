// src/shutdown.rs
//! Level-triggered shutdown flag shared between the orchestrator and the worker.

use log::*;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cooperative cancellation signal.
///
/// Raised at most once and never cleared. Cloning yields another handle to
/// the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let (lock, cvar) = &*self.inner;
        let mut raised = Self::lock(lock);
        if !*raised {
            info!("ShutdownSignal: raised");
            *raised = true;
        }
        cvar.notify_all();
    }

    #[cfg(test)]
    pub fn is_raised(&self) -> bool {
        *Self::lock(&self.inner.0)
    }

    /// Block for at most `timeout`, returning early once the signal is raised.
    ///
    /// Returns `true` if the signal is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut raised = Self::lock(lock);
        while !*raised {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            raised = match cvar.wait_timeout(raised, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *raised
    }

    // A panicking holder cannot leave the bool half-written.
    fn lock(lock: &Mutex<bool>) -> MutexGuard<'_, bool> {
        lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use test_log::test;

    #[test]
    fn starts_lowered_and_times_out() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!signal.is_raised());
    }

    #[test]
    fn stays_raised() {
        let signal = ShutdownSignal::new();
        signal.raise();
        signal.raise();
        assert!(signal.is_raised());
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        assert!(signal.is_raised());
    }

    #[test]
    fn raise_from_another_thread_wakes_waiter_early() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.raise();
        });

        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        raiser.join().unwrap();
    }
}
