//! Read capabilities.

use super::TransferResult;
use crate::error::Result;
use crate::runtime::Task;

/// Blocking read.
pub trait SyncRead {
    /// Reads some bytes into `buf`, returning how many and whether the
    /// stream has ended.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>>;
}

/// Read that suspends the calling chain instead of blocking.
pub trait AsyncRead {
    /// Reads some bytes into `buf`. The returned task runs when awaited.
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>>;
}

impl<R: SyncRead + ?Sized> SyncRead for &mut R {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>> {
        (**self).read_into(buf)
    }
}

impl<R: SyncRead + ?Sized> SyncRead for Box<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>> {
        (**self).read_into(buf)
    }
}

impl<R: AsyncRead + ?Sized> AsyncRead for &mut R {
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>> {
        (**self).read_async_into(buf)
    }
}

impl<R: AsyncRead + ?Sized> AsyncRead for Box<R> {
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>> {
        (**self).read_async_into(buf)
    }
}

/// Reading from a slice advances it; an exhausted slice is end of stream.
impl SyncRead for &[u8] {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>> {
        let n = buf.len().min(self.len());
        let (head, tail) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = tail;
        Ok(TransferResult::new(n, self.is_empty()))
    }
}

impl AsyncRead for &[u8] {
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>> {
        Task::ready(self.read_into(buf))
    }
}
