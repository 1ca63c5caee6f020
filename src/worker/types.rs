use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Phase of the integration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleState {
    Idle,
    RefreshingMap,
    FetchingPending,
    Dispatching,
    Awaiting,
    Done,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RefreshingMap => "refreshing_map",
            Self::FetchingPending => "fetching_pending",
            Self::Dispatching => "dispatching",
            Self::Awaiting => "awaiting",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative cancellation for one item's blocking work.
///
/// Raised by the cycle when the item's deadline passes; checked between
/// remote attempts and before each attachment.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Successful result of processing one pending item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ItemOutcome {
    /// No mapping yet. Retried next cycle, neither counted nor audited.
    Deferred,
    /// Content retrieved; `document_ids` are newly attached, `skipped`
    /// artifacts were already present.
    Attached {
        remote_key: String,
        document_ids: Vec<i64>,
        skipped: usize,
    },
}

/// Counters of one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleOutcome {
    pub processed: u32,
    pub errors: u32,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());
        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn cycle_state_display() {
        assert_eq!(CycleState::RefreshingMap.to_string(), "refreshing_map");
        assert_eq!(CycleState::Idle.as_str(), "idle");
    }
}
