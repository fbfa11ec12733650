//! Completion-style sources that finish on a helper thread after a delay.
//!
//! These model an operation the kernel completes later: the chain issues the
//! operation, suspends, and the helper thread completes the descriptor from
//! outside the scheduler thread.

use crate::cancel::CancelHandle;
use crate::error::Result;
use crate::io::{AsyncRead, SyncRead, TransferResult};
use crate::runtime::{completion, current_env, Completer, Task};
use std::time::Duration;

fn complete_later(completer: Completer, delay: Duration, n: usize) {
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        completer.complete(Ok(n));
    });
}

/// Suspends the calling chain for `delay`.
pub fn delay(delay: Duration) -> Task<'static, ()> {
    Task::new(async move {
        let env = current_env().await?;
        complete_later(env.operation().begin()?, delay, 0);
        completion().await?;
        env.operation().collect()?;
        Ok(())
    })
}

/// Serves a payload in chunks, each read completing after a fixed delay.
#[derive(Debug)]
pub struct DelayedSource {
    data: Vec<u8>,
    pos: usize,
    delay: Duration,
    chunk: usize,
    cancel: CancelHandle,
}

impl DelayedSource {
    /// A source over `data` whose reads each take `delay`.
    #[must_use]
    pub fn new(data: Vec<u8>, delay: Duration) -> Self {
        Self {
            data,
            pos: 0,
            delay,
            chunk: usize::MAX,
            cancel: CancelHandle::new(),
        }
    }

    /// Caps every read at `chunk` bytes (at least one).
    #[must_use]
    pub fn chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// Aborts an outstanding asynchronous read.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn next_len(&self, buf: &[u8]) -> usize {
        (self.data.len() - self.pos).min(buf.len()).min(self.chunk)
    }

    fn copy_out(&mut self, buf: &mut [u8], n: usize) -> TransferResult<usize> {
        let n = n.min(self.next_len(buf));
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        TransferResult::new(n, self.pos == self.data.len())
    }
}

impl SyncRead for DelayedSource {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>> {
        std::thread::sleep(self.delay);
        let n = self.next_len(buf);
        Ok(self.copy_out(buf, n))
    }
}

impl AsyncRead for DelayedSource {
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>> {
        Task::new(async move {
            let env = current_env().await?;
            let _armed = self.cancel.arm(&env);
            complete_later(env.operation().begin()?, self.delay, self.next_len(buf));
            completion().await?;
            let n = env.operation().collect()?;
            Ok(self.copy_out(buf, n))
        })
    }
}
