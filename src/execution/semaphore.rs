use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A small, blocking counting semaphore.
///
/// Bounds the number of requests reshaped at the same time.
pub(crate) struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

/// A held permit; released on drop.
pub(crate) struct Permit<'a> {
    sem: &'a Semaphore,
}

impl Semaphore {
    pub(crate) fn new(permits: usize) -> Self {
        assert!(permits > 0, "permits must be > 0");
        Self {
            permits: Mutex::new(permits),
            cv: Condvar::new(),
        }
    }

    /// Acquire one permit, blocking until available.
    ///
    /// Also returns the time spent waiting (zero if no wait was required).
    pub(crate) fn acquire(&self) -> (Permit<'_>, Duration) {
        let start = Instant::now();
        let mut waited = false;
        let mut g = self.permits.lock().expect("semaphore mutex poisoned");
        while *g == 0 {
            waited = true;
            g = self.cv.wait(g).expect("semaphore mutex poisoned");
        }
        *g -= 1;
        let waited = if waited { start.elapsed() } else { Duration::ZERO };
        (Permit { sem: self }, waited)
    }

    fn release(&self) {
        let mut g = self.permits.lock().expect("semaphore mutex poisoned");
        *g += 1;
        self.cv.notify_one();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}
