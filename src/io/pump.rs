//! Moving a stream from a reader to a writer.
//!
//! A pump reads one chunk, writes all of it, and repeats until either side
//! reports end of stream. Any error aborts the pump immediately. The bytes
//! of a read that also reports end of stream are still written.

use super::{AsyncRead, AsyncWrite, SyncRead, SyncWrite, TransferResult};
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::{SchedulerConfig, Task};
use crate::tracing_compat::trace;
use std::io;

fn check_chunk(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::new(ErrorKind::InvalidArgument).with_message("pump chunk size is zero"));
    }
    Ok(())
}

fn write_zero() -> Error {
    Error::io(io::Error::new(
        io::ErrorKind::WriteZero,
        "destination accepted no bytes without ending the stream",
    ))
}

/// Applies one write to the chunk cursor. Returns true once the
/// destination has ended.
fn account_write(written: TransferResult<usize>, chunk: &mut &[u8], total: &mut u64) -> Result<bool> {
    let n = written.bytes().min(chunk.len());
    *chunk = &chunk[n..];
    *total += n as u64;
    if written.is_end_of_stream() {
        return Ok(true);
    }
    if n == 0 {
        return Err(write_zero());
    }
    Ok(false)
}

/// Pumps `source` into `destination` in chunks of `chunk_size` bytes.
///
/// Resolves with the number of bytes written.
pub fn pump<'a, R, W>(source: &'a mut R, destination: &'a mut W, chunk_size: usize) -> Task<'a, u64>
where
    R: AsyncRead + ?Sized,
    W: AsyncWrite + ?Sized,
{
    Task::new(async move {
        check_chunk(chunk_size)?;
        let mut buf = vec![0u8; chunk_size];
        let mut total = 0u64;
        loop {
            let read = source.read_async_into(&mut buf).await?;
            let mut chunk = &buf[..read.bytes().min(chunk_size)];
            while !chunk.is_empty() {
                let written = destination.write_async_from(chunk).await?;
                if account_write(written, &mut chunk, &mut total)? {
                    trace!(total, "pump: destination ended");
                    return Ok(total);
                }
            }
            if read.is_end_of_stream() || read.bytes() == 0 {
                trace!(total, "pump: source ended");
                return Ok(total);
            }
        }
    })
}

/// [`pump`] with the chunk size from `config`.
pub fn pump_configured<'a, R, W>(
    source: &'a mut R,
    destination: &'a mut W,
    config: &SchedulerConfig,
) -> Task<'a, u64>
where
    R: AsyncRead + ?Sized,
    W: AsyncWrite + ?Sized,
{
    pump(source, destination, config.pump_chunk_size)
}

/// Blocking counterpart of [`pump`].
pub fn pump_sync<R, W>(source: &mut R, destination: &mut W, chunk_size: usize) -> Result<u64>
where
    R: SyncRead + ?Sized,
    W: SyncWrite + ?Sized,
{
    check_chunk(chunk_size)?;
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let read = source.read_into(&mut buf)?;
        let mut chunk = &buf[..read.bytes().min(chunk_size)];
        while !chunk.is_empty() {
            let written = destination.write_from(chunk)?;
            if account_write(written, &mut chunk, &mut total)? {
                return Ok(total);
            }
        }
        if read.is_end_of_stream() || read.bytes() == 0 {
            return Ok(total);
        }
    }
}
