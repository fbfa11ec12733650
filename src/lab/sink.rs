//! An in-memory writer with an optional capacity.

use super::fault::{self, Fault};
use crate::cancel::CancelHandle;
use crate::error::{Error, Result};
use crate::io::{AsyncWrite, SyncWrite, TransferResult};
use crate::runtime::{completion, current_env, Task};
use std::io;

/// Collects everything written to it.
///
/// With a capacity, the sink ends its stream once full: the write that
/// fills it reports end of stream along with the bytes that fit.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    capacity: Option<usize>,
    fault: Option<Fault>,
    cancel: CancelHandle,
}

impl MemorySink {
    /// An unbounded sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that accepts `capacity` bytes, then ends.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Fails writes with `kind` once `after` bytes have been accepted.
    #[must_use]
    pub fn fail_after(mut self, after: usize, kind: io::ErrorKind) -> Self {
        self.fault = Some(Fault::new(after, kind));
        self
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the sink, returning its contents.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Aborts an outstanding asynchronous write.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.data.len() >= cap)
    }

    fn accept(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self
            .capacity
            .map_or(buf.len(), |cap| cap.saturating_sub(self.data.len()).min(buf.len()));
        let n = fault::limit(self.fault.as_ref(), self.data.len(), room)?;
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn transfer(&self, n: usize) -> TransferResult<usize> {
        TransferResult::new(n, self.is_full())
    }
}

impl SyncWrite for MemorySink {
    fn write_from(&mut self, buf: &[u8]) -> Result<TransferResult<usize>> {
        let n = self.accept(buf).map_err(Error::io)?;
        Ok(self.transfer(n))
    }
}

impl AsyncWrite for MemorySink {
    fn write_async_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<usize>> {
        Task::new(async move {
            let env = current_env().await?;
            let _armed = self.cancel.arm(&env);
            let completer = env.operation().begin()?;
            completer.complete(self.accept(buf));
            completion().await?;
            let n = env.operation().collect()?;
            Ok(self.transfer(n))
        })
    }
}
