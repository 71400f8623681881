//! Cancellation and deadline propagation for store operations.
//!
//! A [`Context`] is created per request by the transport and passed to
//! every store call. Clones share the same cancellation flag, so a handler
//! can keep one clone and cancel an operation running on another thread.
//! Engines are expected to poll [`Context::is_done`] while a statement runs
//! and abort promptly once it returns `true`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a [`Context`] stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Done {
    /// [`Context::cancel`] was called.
    #[error("context cancelled")]
    Cancelled,
    /// The context's deadline has passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Caller-supplied cancellation flag plus optional deadline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use autotable_core::{Context, Done};
///
/// let ctx = Context::with_timeout(Duration::from_secs(3));
/// assert!(ctx.check().is_ok());
///
/// let handle = ctx.clone();
/// handle.cancel();
/// assert_eq!(ctx.check(), Err(Done::Cancelled));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never done unless cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason this context is done, if it is.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn done(&self) -> Option<Done> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Some(Done::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Done::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done().is_some()
    }

    /// `Ok(())` while the context is live, otherwise the reason it is done.
    pub fn check(&self) -> Result<(), Done> {
        match self.done() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}
