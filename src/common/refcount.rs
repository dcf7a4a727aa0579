use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

type Cleanup = Box<dyn FnOnce() + Send>;

/// A thread-safe reference counter with a one-shot cleanup hook.
///
/// The count starts at one for the creating owner. [`decr`](RefCount::decr)
/// runs the cleanup exactly once, when the count reaches zero. The type is
/// deliberately move-only: shared use goes through `&RefCount` (typically
/// behind an `Arc`), never through copies of the counter itself.
pub struct RefCount {
    count: AtomicUsize,
    cleanup: Mutex<Option<Cleanup>>,
}

impl RefCount {
    pub fn new<F: FnOnce() + Send + 'static>(cleanup: F) -> Self {
        RefCount {
            count: AtomicUsize::new(1),
            cleanup: Mutex::new(Some(Box::new(cleanup))),
        }
    }

    /// Current count, for diagnostics.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Add a reference.
    pub fn incr(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop a reference. Returns true when this call released the last one
    /// and ran the cleanup. The count never underflows: calls on an
    /// already-zero counter are no-ops returning false.
    pub fn decr(&self) -> bool {
        let mut current = self.count.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        if current == 1 {
            if let Some(cleanup) = self.cleanup.lock().unwrap().take() {
                cleanup();
            }
            true
        } else {
            false
        }
    }
}
