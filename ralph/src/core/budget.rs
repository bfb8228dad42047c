//! Termination bounds and the cancellation token shared with the invoker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Stopping condition for a run that never reports completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Wall-clock budget for the whole loop, measured from loop start.
    Duration(Duration),
    /// Maximum number of tool invocations.
    Iterations(u32),
}

impl Bound {
    /// Token for a loop starting at `start`. Only the duration bound carries a deadline.
    ///
    /// A budget too large to represent as an `Instant` yields a token without a deadline.
    pub fn cancel_token(&self, start: Instant) -> CancelToken {
        match *self {
            Self::Duration(budget) => start
                .checked_add(budget)
                .map_or_else(CancelToken::new, CancelToken::with_deadline),
            Self::Iterations(_) => CancelToken::new(),
        }
    }

    /// Whether `completed` invocations already exhaust a count bound.
    pub fn iterations_exhausted(&self, completed: u32) -> bool {
        match *self {
            Self::Iterations(max) => completed >= max,
            Self::Duration(_) => false,
        }
    }
}

/// Cooperative cancellation: fires when the deadline passes or `cancel` is called.
///
/// Clones share the cancel flag, so any clone can cancel an in-flight invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, or `None` when the token has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| {
            deadline
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::ZERO)
        })
    }
}
