//! Asynchronous operation descriptor.
//!
//! Each completion environment owns one [`Operation`] bound to its self
//! signal. A collaborator issuing a completion-style operation calls
//! [`begin`](Operation::begin), hands the returned [`Completer`] to whatever
//! performs the work (a kernel queue, a helper thread, a lab timer), and
//! suspends on the environment. The worker calls
//! [`Completer::complete`], which stores the result and sets the signal; the
//! resumed frame collects it with [`take_result`](Operation::take_result).

use crate::error::{Error, ErrorKind, Result};
use crate::sys::Event;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Marker payload of the `io::Error` a cancelled operation completes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationCancelled;

impl fmt::Display for OperationCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation cancelled")
    }
}

impl std::error::Error for OperationCancelled {}

/// The error stored in a descriptor when its operation is cancelled.
#[must_use]
pub fn cancelled_io_error() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, OperationCancelled)
}

#[derive(Debug)]
enum OpState {
    Idle,
    Pending(u64),
    Complete(io::Result<usize>),
}

#[derive(Debug)]
struct Slot {
    state: OpState,
    issued: u64,
}

#[derive(Debug)]
struct OperationInner {
    event: Event,
    slot: Mutex<Slot>,
}

impl OperationInner {
    fn finish(&self, seq: Option<u64>, result: io::Result<usize>) -> bool {
        let mut slot = self.slot.lock();
        match slot.state {
            OpState::Pending(pending) if seq.is_none_or(|s| s == pending) => {
                slot.state = OpState::Complete(result);
            }
            _ => return false,
        }
        drop(slot);
        if let Err(err) = self.event.set() {
            crate::tracing_compat::error!(error = %err, "failed to signal operation completion");
        }
        true
    }
}

/// Descriptor of the single outstanding asynchronous operation of a chain.
#[derive(Debug, Clone)]
pub struct Operation {
    inner: Arc<OperationInner>,
}

impl Operation {
    pub(crate) fn new(event: Event) -> Self {
        Self {
            inner: Arc::new(OperationInner {
                event,
                slot: Mutex::new(Slot {
                    state: OpState::Idle,
                    issued: 0,
                }),
            }),
        }
    }

    /// Marks an operation as outstanding and returns the handle that
    /// completes it.
    ///
    /// Fails with [`ErrorKind::OperationInFlight`] if one already is.
    pub fn begin(&self) -> Result<Completer> {
        let mut slot = self.inner.slot.lock();
        if matches!(slot.state, OpState::Pending(_)) {
            return Err(Error::new(ErrorKind::OperationInFlight));
        }
        slot.issued += 1;
        let seq = slot.issued;
        slot.state = OpState::Pending(seq);
        Ok(Completer {
            inner: Arc::clone(&self.inner),
            seq,
        })
    }

    /// Completes an outstanding operation with the cancellation error.
    ///
    /// Returns false if nothing was outstanding.
    pub fn cancel(&self) -> bool {
        self.inner.finish(None, Err(cancelled_io_error()))
    }

    /// Returns true while an operation is outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.slot.lock().state, OpState::Pending(_))
    }

    /// Collects the result of a completed operation, returning the
    /// descriptor to idle. `None` if the operation has not completed.
    pub fn take_result(&self) -> Option<io::Result<usize>> {
        let mut slot = self.inner.slot.lock();
        match std::mem::replace(&mut slot.state, OpState::Idle) {
            OpState::Complete(result) => Some(result),
            other => {
                slot.state = other;
                None
            }
        }
    }

    /// Collects the result once the chain has resumed from
    /// [`completion`](crate::runtime::completion).
    ///
    /// A cancelled operation yields [`ErrorKind::Cancelled`].
    pub fn collect(&self) -> Result<usize> {
        match self.take_result() {
            Some(result) => result.map_err(Error::io),
            None => Err(Error::new(ErrorKind::OperationInFlight)
                .with_message("operation has not completed")),
        }
    }

    /// Drops a stored result, if any, without reporting it.
    pub(crate) fn discard(&self) {
        let mut slot = self.inner.slot.lock();
        if matches!(slot.state, OpState::Complete(_)) {
            slot.state = OpState::Idle;
        }
    }

    /// The event this descriptor signals on completion.
    #[must_use]
    pub fn event(&self) -> &Event {
        &self.inner.event
    }
}

/// Completes one specific issued operation.
///
/// A completer whose operation was cancelled (or superseded by a later
/// `begin`) completes nothing.
#[derive(Debug)]
pub struct Completer {
    inner: Arc<OperationInner>,
    seq: u64,
}

impl Completer {
    /// Stores the result and sets the bound signal.
    ///
    /// Returns false if the operation is no longer outstanding.
    pub fn complete(self, result: io::Result<usize>) -> bool {
        self.inner.finish(Some(self.seq), result)
    }
}
