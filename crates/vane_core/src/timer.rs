//! Revocable timer handles
//!
//! Widget timers run on the document clock. Each widget carries one
//! [`CancelToken`]; it is revoked at dispose and checked when a callback
//! fires, so a timer that outlives its widget does nothing.

use std::cell::Cell;
use std::rc::Rc;

/// Shared revocation flag
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    revoked: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self) {
        self.revoked.set(true);
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_revocation() {
        let token = CancelToken::new();
        let held_by_callback = token.clone();
        assert!(!held_by_callback.is_revoked());
        token.revoke();
        assert!(held_by_callback.is_revoked());
    }
}
