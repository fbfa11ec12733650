//! Cancellation of a transport's outstanding asynchronous operation.
//!
//! A transport owns a [`CancelHandle`] and arms it with the calling chain's
//! environment for the duration of each async operation. Clones of the handle
//! can be kept elsewhere on the same thread (typically by a sibling chain)
//! and used to abort the wait: the descriptor is cancelled, the completion
//! signal fires, and the waiting chain ascends with
//! [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled).
//!
//! Cancelling when nothing is outstanding does nothing.

use crate::error::Result;
use crate::runtime::{CompletionEnvironment, WeakEnvironment};
use crate::tracing_compat::debug;
use std::cell::RefCell;
use std::rc::Rc;

/// Aborts a transport's outstanding asynchronous operation.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    armed: Rc<RefCell<Option<WeakEnvironment>>>,
}

impl CancelHandle {
    /// A handle with nothing to cancel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the outstanding operation, if any.
    ///
    /// Returns whether a waiting chain was interrupted.
    pub fn cancel(&self) -> Result<bool> {
        let env = self.armed.borrow().as_ref().and_then(WeakEnvironment::upgrade);
        let Some(env) = env else {
            return Ok(false);
        };
        let interrupted = env.interrupt_wait()?;
        debug!(env = env.id(), interrupted, "cancel handle fired");
        Ok(interrupted)
    }

    /// True while an async operation of the owning transport is outstanding.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
            .borrow()
            .as_ref()
            .is_some_and(|weak| weak.upgrade().is_some())
    }

    /// Arms the handle with `env` until the returned guard drops.
    pub(crate) fn arm(&self, env: &CompletionEnvironment) -> Armed {
        *self.armed.borrow_mut() = Some(env.downgrade());
        Armed {
            armed: Rc::clone(&self.armed),
        }
    }
}

/// Disarms a [`CancelHandle`] on drop.
#[derive(Debug)]
pub(crate) struct Armed {
    armed: Rc<RefCell<Option<WeakEnvironment>>>,
}

impl Drop for Armed {
    fn drop(&mut self) {
        self.armed.borrow_mut().take();
    }
}
