use std::sync::atomic::{AtomicBool, Ordering};

/// Identity/session collaborator consulted before every update.
pub trait SessionProvider: Send + Sync {
    fn is_session_valid(&self) -> bool;
}

/// Session that never expires.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysValid;

impl SessionProvider for AlwaysValid {
    fn is_session_valid(&self) -> bool {
        true
    }
}

/// Session validity toggled by the host, e.g. on login and token expiry.
#[derive(Debug)]
pub struct SessionFlag {
    valid: AtomicBool,
}

impl SessionFlag {
    pub fn new(valid: bool) -> Self {
        Self {
            valid: AtomicBool::new(valid),
        }
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }
}

impl SessionProvider for SessionFlag {
    fn is_session_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

impl<F> SessionProvider for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_session_valid(&self) -> bool {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_report_validity() {
        assert!(AlwaysValid.is_session_valid());
        let flag = SessionFlag::new(true);
        flag.set_valid(false);
        assert!(!flag.is_session_valid());
        let closure = || false;
        assert!(!closure.is_session_valid());
    }
}
