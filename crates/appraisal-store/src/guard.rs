use std::sync::atomic::{AtomicBool, Ordering};

/// Non-reentrant in-flight flag owned by one store instance.
///
/// A second `try_enter` while a token is alive fails instead of waiting.
#[derive(Debug, Default)]
pub struct RecursionGuard {
    busy: AtomicBool,
}

/// Releases the guard when dropped.
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a RecursionGuard,
}

impl RecursionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&self) -> Option<GuardToken<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GuardToken { guard: self })
    }
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}
