use core_types::{Duration, Instant};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Why a piece of work was cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    /// The caller asked for it
    Requested,
    /// A newer request replaced this one
    Superseded,
    /// The node the work targeted was unmounted
    TargetUnmounted,
    /// The owning runtime is shutting down
    Shutdown,
    /// Custom reason with description
    Custom(String),
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::Requested => f.write_str("cancellation requested"),
            CancellationReason::Superseded => f.write_str("superseded by a newer request"),
            CancellationReason::TargetUnmounted => f.write_str("target unmounted"),
            CancellationReason::Shutdown => f.write_str("shutdown"),
            CancellationReason::Custom(msg) => f.write_str(msg),
        }
    }
}

type Flag = Rc<RefCell<Option<CancellationReason>>>;

/// Read side of a cancellation flag
///
/// Cheap to clone; every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Flag,
}

impl CancellationToken {
    /// A token nobody can cancel
    pub fn none() -> Self {
        Self::default()
    }

    /// Checks if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.borrow().is_some()
    }

    /// Returns the reason for cancellation, if cancelled
    pub fn reason(&self) -> Option<CancellationReason> {
        self.flag.borrow().clone()
    }

    /// Fails with [`LifecycleError::Cancelled`] once cancelled
    pub fn check(&self) -> Result<(), LifecycleError> {
        match self.reason() {
            Some(reason) => Err(LifecycleError::Cancelled { reason }),
            None => Ok(()),
        }
    }
}

/// Write side of a cancellation flag
///
/// ```
/// use lifecycle::{CancellationReason, CancellationSource};
///
/// let source = CancellationSource::new();
/// let token = source.token();
/// source.cancel(CancellationReason::Superseded);
/// assert_eq!(token.reason(), Some(CancellationReason::Superseded));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    flag: Flag,
}

impl CancellationSource {
    /// Creates an uncancelled source
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token observing this source
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Rc::clone(&self.flag),
        }
    }

    /// Cancels every token from this source
    ///
    /// The first reason wins; later calls are ignored.
    pub fn cancel(&self, reason: CancellationReason) {
        let mut flag = self.flag.borrow_mut();
        if flag.is_none() {
            *flag = Some(reason);
        }
    }

    /// Checks if this source has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.flag.borrow().is_some()
    }
}

/// Absolute point in time at which pending work becomes due
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
    /// Creates a deadline at `instant`
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Creates a deadline `delay` after `now`
    pub fn after(now: Instant, delay: Duration) -> Self {
        Self(now + delay)
    }

    /// The instant of this deadline
    pub fn instant(&self) -> Instant {
        self.0
    }

    /// True once `now` reaches the deadline
    pub fn has_passed(&self, now: Instant) -> bool {
        now >= self.0
    }

    /// Time left before the deadline, `None` once it has passed
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        if now < self.0 {
            Some(self.0.saturating_since(now))
        } else {
            None
        }
    }
}

/// Errors related to lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("operation was cancelled: {reason}")]
    Cancelled { reason: CancellationReason },
}
