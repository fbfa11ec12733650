//! Write capabilities.
//!
//! A successful write transfers the entire buffer. A shorter count is only
//! reported together with end of stream.

use super::TransferResult;
use crate::error::Result;
use crate::runtime::Task;

/// Blocking write.
pub trait SyncWrite {
    /// Writes all of `buf`, or as much as fits before the stream ends.
    fn write_from(&mut self, buf: &[u8]) -> Result<TransferResult<usize>>;
}

/// Write that suspends the calling chain instead of blocking.
pub trait AsyncWrite {
    /// Writes all of `buf`. The returned task runs when awaited.
    fn write_async_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<usize>>;
}

impl<W: SyncWrite + ?Sized> SyncWrite for &mut W {
    fn write_from(&mut self, buf: &[u8]) -> Result<TransferResult<usize>> {
        (**self).write_from(buf)
    }
}

impl<W: SyncWrite + ?Sized> SyncWrite for Box<W> {
    fn write_from(&mut self, buf: &[u8]) -> Result<TransferResult<usize>> {
        (**self).write_from(buf)
    }
}

impl<W: AsyncWrite + ?Sized> AsyncWrite for &mut W {
    fn write_async_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<usize>> {
        (**self).write_async_from(buf)
    }
}

impl<W: AsyncWrite + ?Sized> AsyncWrite for Box<W> {
    fn write_async_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<usize>> {
        (**self).write_async_from(buf)
    }
}

impl SyncWrite for Vec<u8> {
    fn write_from(&mut self, buf: &[u8]) -> Result<TransferResult<usize>> {
        self.extend_from_slice(buf);
        Ok(TransferResult::more(buf.len()))
    }
}

impl AsyncWrite for Vec<u8> {
    fn write_async_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<usize>> {
        Task::ready(self.write_from(buf))
    }
}
