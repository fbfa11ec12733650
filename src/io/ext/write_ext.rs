//! Write extension methods.

use super::premature_eof;
use crate::error::Result;
use crate::io::{AsyncWrite, SyncWrite, TransferResult};
use crate::runtime::Task;

/// Extension trait for [`SyncWrite`].
pub trait SyncWriteExt: SyncWrite {
    /// Writes all of `buf`.
    ///
    /// Fails with [`PrematureEof`](crate::error::ErrorKind::PrematureEof) if
    /// the stream ends before everything was accepted.
    fn write_full_from(&mut self, buf: &[u8]) -> Result<TransferResult<()>> {
        let mut written = 0;
        let mut last = TransferResult::more(0);
        while written < buf.len() {
            last = self.write_from(&buf[written..])?;
            written += last.bytes().min(buf.len() - written);
            if last.is_end_of_stream() || last.bytes() == 0 {
                break;
            }
        }
        if written < buf.len() {
            return Err(premature_eof(written, buf.len()));
        }
        Ok(last.discard_value())
    }
}

impl<W: SyncWrite + ?Sized> SyncWriteExt for W {}

/// Extension trait for [`AsyncWrite`].
pub trait AsyncWriteExt: AsyncWrite {
    /// Suspending counterpart of [`SyncWriteExt::write_full_from`].
    fn write_async_full_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<()>> {
        Task::new(async move {
            let mut written = 0;
            let mut last = TransferResult::more(0);
            while written < buf.len() {
                last = self.write_async_from(&buf[written..]).await?;
                written += last.bytes().min(buf.len() - written);
                if last.is_end_of_stream() || last.bytes() == 0 {
                    break;
                }
            }
            if written < buf.len() {
                return Err(premature_eof(written, buf.len()));
            }
            Ok(last.discard_value())
        })
    }
}

impl<W: AsyncWrite + ?Sized> AsyncWriteExt for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lab::MemorySink;
    use crate::runtime::block_on;

    #[test]
    fn full_write_into_vec() {
        let mut sink = Vec::new();
        let result = sink.write_full_from(b"payload").unwrap();
        assert!(!result.is_end_of_stream());
        assert_eq!(sink, b"payload");
    }

    #[test]
    fn full_write_fails_when_sink_closes() {
        let mut sink = MemorySink::with_capacity(4);
        let err = sink.write_full_from(b"too long").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEof);
        assert_eq!(sink.contents(), b"too ");

        let mut exact = MemorySink::with_capacity(4);
        let result = exact.write_full_from(b"four").unwrap();
        assert!(result.is_end_of_stream());
    }

    #[test]
    fn async_full_write() {
        let contents = block_on(Task::new(async {
            let mut sink = MemorySink::new();
            sink.write_async_full_from(b"chained").await?;
            Ok(sink.contents().to_vec())
        }))
        .unwrap();
        assert_eq!(contents, b"chained");
    }
}
