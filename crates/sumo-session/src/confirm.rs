use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One-shot value set by one thread and awaited, with a bound, by another.
///
/// The first [`resolve`](Confirmation::resolve) wins; later ones are ignored.
#[derive(Debug)]
pub struct Confirmation<T> {
    slot: Mutex<Option<T>>,
    resolved: Condvar,
}

impl<T> Default for Confirmation<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            resolved: Condvar::new(),
        }
    }
}

impl<T: Clone> Confirmation<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and wake all waiters. Returns `false` if already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.resolved.notify_all();
        true
    }

    /// Wait up to `timeout` for the value.
    pub fn wait(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        while slot.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = self
                .resolved
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        slot.clone()
    }

    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn wait_returns_value_resolved_by_other_thread() {
        let confirmation = Arc::new(Confirmation::new());
        let resolver = {
            let confirmation = Arc::clone(&confirmation);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                confirmation.resolve("2014-08-02".to_string())
            })
        };

        let value = confirmation.wait(Duration::from_secs(1));
        assert!(resolver.join().expect("resolver should complete"));
        assert_eq!(value.as_deref(), Some("2014-08-02"));
    }

    #[test]
    fn wait_times_out() {
        let confirmation: Confirmation<()> = Confirmation::new();
        assert!(confirmation.wait(Duration::from_millis(10)).is_none());
        assert!(!confirmation.is_resolved());
    }

    #[test]
    fn first_resolution_wins() {
        let confirmation = Confirmation::new();
        assert!(confirmation.resolve(1));
        assert!(!confirmation.resolve(2));
        assert_eq!(confirmation.get(), Some(1));
        assert_eq!(confirmation.wait(Duration::ZERO), Some(1));
    }
}
