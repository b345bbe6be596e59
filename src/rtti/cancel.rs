// Wed Feb 11 2026 - Alex

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::rtti::RttiError;

/// Cooperative cancellation token shared with long-running scans.
///
/// Scans check the token at fixed granularity (per range, per reference) and
/// unwind with [`RttiError::Cancelled`]; in-flight results are simply
/// discarded since all parsed objects are immutable once constructed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), RttiError> {
        if self.is_cancelled() {
            Err(RttiError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(RttiError::Cancelled)));
        // Clones share the flag.
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
