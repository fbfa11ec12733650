//! A reader that delivers its data in scripted increments.

use super::fault::{self, Fault};
use crate::cancel::CancelHandle;
use crate::error::{Error, Result};
use crate::io::{AsyncRead, SyncRead, TransferResult};
use crate::runtime::{completion, current_env, Task};
use std::io;

/// Serves a fixed payload, each read returning at most the next scripted
/// increment (cycling through the script).
///
/// Asynchronous reads go through the chain's operation descriptor and
/// complete immediately, so every read still suspends and resumes once.
#[derive(Debug)]
pub struct ScriptedReader {
    data: Vec<u8>,
    pos: usize,
    increments: Vec<usize>,
    next: usize,
    fault: Option<Fault>,
    reads: usize,
    cancel: CancelHandle,
}

impl ScriptedReader {
    /// A reader over `data`. Zero increments count as one; an empty script
    /// serves everything at once.
    pub fn new(data: Vec<u8>, increments: impl IntoIterator<Item = usize>) -> Self {
        let mut increments: Vec<usize> = increments.into_iter().map(|n| n.max(1)).collect();
        if increments.is_empty() {
            increments.push(usize::MAX);
        }
        Self {
            data,
            pos: 0,
            increments,
            next: 0,
            fault: None,
            reads: 0,
            cancel: CancelHandle::new(),
        }
    }

    /// Fails reads with `kind` once `after` bytes have been served.
    #[must_use]
    pub fn fail_after(mut self, after: usize, kind: io::ErrorKind) -> Self {
        self.fault = Some(Fault::new(after, kind));
        self
    }

    /// Bytes not yet served.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Number of reads performed.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Aborts an outstanding asynchronous read.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn serve(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        if buf.is_empty() || self.pos == self.data.len() {
            return Ok(0);
        }
        let increment = self.increments[self.next % self.increments.len()];
        self.next += 1;
        let wanted = increment.min(self.remaining()).min(buf.len());
        let n = fault::limit(self.fault.as_ref(), self.pos, wanted)?;
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn transfer(&self, n: usize) -> TransferResult<usize> {
        TransferResult::new(n, self.pos == self.data.len())
    }
}

impl SyncRead for ScriptedReader {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>> {
        let n = self.serve(buf).map_err(Error::io)?;
        Ok(self.transfer(n))
    }
}

impl AsyncRead for ScriptedReader {
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>> {
        Task::new(async move {
            let env = current_env().await?;
            let _armed = self.cancel.arm(&env);
            let completer = env.operation().begin()?;
            completer.complete(self.serve(buf));
            completion().await?;
            let n = env.operation().collect()?;
            Ok(self.transfer(n))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::block_on;

    #[test]
    fn increments_cycle() {
        let mut reader = ScriptedReader::new(b"abcdefg".to_vec(), [0, 2]);
        let mut buf = [0u8; 8];
        let sizes: Vec<_> = std::iter::from_fn(|| {
            let result = reader.read_into(&mut buf).unwrap();
            (result.bytes() > 0).then_some(result.bytes())
        })
        .collect();
        assert_eq!(sizes, vec![1, 2, 1, 2, 1]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn fault_fires_after_threshold() {
        let mut reader =
            ScriptedReader::new(vec![7; 10], [4]).fail_after(6, io::ErrorKind::ConnectionAborted);
        let mut buf = [0u8; 10];
        assert_eq!(reader.read_into(&mut buf).unwrap().bytes(), 4);
        assert_eq!(reader.read_into(&mut buf).unwrap().bytes(), 2);
        let err = reader.read_into(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn async_reads_suspend_once_each() {
        let (bytes, resumes) = block_on(Task::new(async {
            let env = current_env().await?;
            let mut reader = ScriptedReader::new(b"xyz".to_vec(), [1]);
            let mut buf = [0u8; 3];
            let mut bytes = Vec::new();
            loop {
                let result = reader.read_async_into(&mut buf).await?;
                bytes.extend_from_slice(&buf[..result.bytes()]);
                if result.is_end_of_stream() {
                    break;
                }
            }
            Ok((bytes, env.generation()))
        }))
        .unwrap();
        assert_eq!(bytes, b"xyz");
        // One resume to start the root, one per read.
        assert_eq!(resumes, 4);
    }
}
