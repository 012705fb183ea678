//! Single-slot in-flight request guard.
//!
//! At most one chat request may be outstanding. The guard hands out a token
//! when a send is accepted and only that token can complete it.

/// Identifies one accepted send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestGuard {
    in_flight: Option<RequestToken>,
    issued: u64,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot. Returns `None` if a request is already outstanding.
    pub fn try_acquire(&mut self) -> Option<RequestToken> {
        if self.in_flight.is_some() {
            return None;
        }
        self.issued += 1;
        let token = RequestToken(self.issued);
        self.in_flight = Some(token);
        Some(token)
    }

    /// Whether `token` is the request currently holding the slot
    pub fn holds(&self, token: RequestToken) -> bool {
        self.in_flight == Some(token)
    }

    /// Free the slot if `token` holds it. Stale tokens are ignored.
    pub fn release(&mut self, token: RequestToken) -> bool {
        if self.holds(token) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let mut guard = RequestGuard::new();
        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.try_acquire().is_none());
        assert!(guard.is_busy());
    }

    #[test]
    fn test_release_with_stale_token_is_ignored() {
        let mut guard = RequestGuard::new();
        let first = guard.try_acquire().unwrap();
        assert!(guard.release(first));

        let second = guard.try_acquire().unwrap();
        assert_ne!(first, second);
        assert!(!guard.release(first));
        assert!(guard.holds(second));
        assert!(guard.release(second));
        assert!(!guard.is_busy());
    }
}
