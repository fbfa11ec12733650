//! Read extension methods.

use super::premature_eof;
use crate::error::Result;
use crate::io::{AsyncRead, SyncRead, TransferResult};
use crate::runtime::Task;

/// Extension trait for [`SyncRead`].
pub trait SyncReadExt: SyncRead {
    /// Reads until `buf` is full.
    ///
    /// Fails with [`PrematureEof`](crate::error::ErrorKind::PrematureEof) if
    /// the stream ends first. The flag of the returned result is that of the
    /// last read.
    fn read_full_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<()>> {
        let mut filled = 0;
        let mut last = TransferResult::more(0);
        while filled < buf.len() {
            last = self.read_into(&mut buf[filled..])?;
            filled += last.bytes().min(buf.len() - filled);
            if last.is_end_of_stream() || last.bytes() == 0 {
                break;
            }
        }
        if filled < buf.len() {
            return Err(premature_eof(filled, buf.len()));
        }
        Ok(last.discard_value())
    }

    /// Reads up to `size` bytes into a fresh buffer.
    ///
    /// With `exact`, reads until `size` bytes arrived (see
    /// [`read_full_into`](Self::read_full_into)); otherwise performs one read
    /// and truncates the buffer to what it returned.
    fn read(&mut self, size: usize, exact: bool) -> Result<TransferResult<Vec<u8>>> {
        let mut data = vec![0u8; size];
        if exact {
            let result = self.read_full_into(&mut data)?;
            return Ok(result.map(|()| data));
        }
        let result = self.read_into(&mut data)?;
        data.truncate(result.bytes());
        Ok(result.map(|_| data))
    }
}

impl<R: SyncRead + ?Sized> SyncReadExt for R {}

/// Extension trait for [`AsyncRead`].
pub trait AsyncReadExt: AsyncRead {
    /// Suspending counterpart of [`SyncReadExt::read_full_into`].
    fn read_async_full_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<()>> {
        Task::new(async move {
            let mut filled = 0;
            let mut last = TransferResult::more(0);
            while filled < buf.len() {
                last = self.read_async_into(&mut buf[filled..]).await?;
                filled += last.bytes().min(buf.len() - filled);
                if last.is_end_of_stream() || last.bytes() == 0 {
                    break;
                }
            }
            if filled < buf.len() {
                return Err(premature_eof(filled, buf.len()));
            }
            Ok(last.discard_value())
        })
    }

    /// Suspending counterpart of [`SyncReadExt::read`].
    fn read_async(&mut self, size: usize, exact: bool) -> Task<'_, TransferResult<Vec<u8>>> {
        Task::new(async move {
            let mut data = vec![0u8; size];
            if exact {
                let result = self.read_async_full_into(&mut data).await?;
                return Ok(result.map(|()| data));
            }
            let result = self.read_async_into(&mut data).await?;
            data.truncate(result.bytes());
            Ok(result.map(|_| data))
        })
    }
}

impl<R: AsyncRead + ?Sized> AsyncReadExt for R {}
