//! Live reload state shared by the rebuild worker and the dev server.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Millisecond timestamp of the last successful rebuild.
///
/// Readers poll it lock-free; it only moves forward.
#[derive(Debug, Clone, Default)]
pub struct LiveReload {
    rebuilt_at: Arc<AtomicU64>,
}

impl LiveReload {
    pub fn new() -> Self {
        let state = Self::default();
        state.mark_rebuilt();
        state
    }

    /// Record a successful rebuild.
    pub fn mark_rebuilt(&self) {
        let now = now_millis();
        // Two rebuilds within the same millisecond still advance.
        let _ = self
            .rebuilt_at
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| Some(now.max(prev + 1)));
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.rebuilt_at.load(Ordering::Acquire)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_nonzero() {
        assert!(LiveReload::new().timestamp() > 0);
    }

    #[test]
    fn test_mark_rebuilt_advances() {
        let state = LiveReload::new();
        let clone = state.clone();

        let mut last = state.timestamp();
        for _ in 0..5 {
            state.mark_rebuilt();
            let now = clone.timestamp();
            assert!(now > last);
            last = now;
        }
    }
}
