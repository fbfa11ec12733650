//! A transport over any owned file descriptor.
//!
//! [`FdStream`] wraps files, pipe ends and other stream descriptors. Blocking
//! reads and writes wait for readiness when the descriptor is non-blocking.
//! Asynchronous ones try the syscall first and suspend the chain on the
//! descriptor's readiness when it would block. On a blocking descriptor they
//! wait for readiness before each syscall and write at most `PIPE_BUF` bytes
//! per call, so the thread never stalls inside the kernel.
//!
//! The readiness loops here are shared with [`Socket`](super::Socket).

#![allow(unsafe_code)]

use super::signal::Signal;
use crate::cancel::CancelHandle;
use crate::error::{Error, Result};
use crate::io::{AsyncRead, AsyncWrite, SyncRead, SyncWrite, TransferResult};
use crate::runtime::{current_env, signaled, Task};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

/// Classifies errors that mean the other side is gone.
pub(crate) type EndOfStream = fn(&io::Error) -> bool;

pub(crate) fn broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

/// Reads the `O_NONBLOCK` flag of `fd`.
pub(crate) fn is_nonblocking(fd: BorrowedFd<'_>) -> io::Result<bool> {
    // SAFETY: F_GETFL takes no pointer argument; `fd` is a live descriptor.
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & libc::O_NONBLOCK != 0)
}

/// Sets or clears `O_NONBLOCK` on `fd`.
pub(crate) fn set_nonblocking(fd: BorrowedFd<'_>, nonblocking: bool) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: F_GETFL/F_SETFL take integer arguments only; `fd` is live.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: as above.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn read_blocking<S>(source: &S, buf: &mut [u8], ends: EndOfStream) -> Result<TransferResult<usize>>
where
    S: AsFd,
    for<'s> &'s S: Read,
{
    loop {
        match (&*source).read(buf) {
            Ok(n) => return Ok(TransferResult::new(n, n == 0 && !buf.is_empty())),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                Signal::readable(source).wait(None)?;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if ends(&err) => return Ok(TransferResult::end(0)),
            Err(err) => return Err(Error::io(err)),
        }
    }
}

pub(crate) fn write_blocking<S>(sink: &S, buf: &[u8], ends: EndOfStream) -> Result<TransferResult<usize>>
where
    S: AsFd,
    for<'s> &'s S: Write,
{
    let mut written = 0;
    while written < buf.len() {
        match (&*sink).write(&buf[written..]) {
            Ok(0) => return Ok(TransferResult::end(written)),
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                Signal::writable(sink).wait(None)?;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if ends(&err) => return Ok(TransferResult::end(written)),
            Err(err) => return Err(Error::io(err)),
        }
    }
    Ok(TransferResult::more(written))
}

pub(crate) async fn read_ready<S>(
    source: &S,
    buf: &mut [u8],
    nonblocking: bool,
    cancel: &CancelHandle,
    ends: EndOfStream,
) -> Result<TransferResult<usize>>
where
    S: AsFd,
    for<'s> &'s S: Read,
{
    let env = current_env().await?;
    let _armed = cancel.arm(&env);
    if !nonblocking {
        signaled(Signal::readable(source)).await?;
    }
    loop {
        match (&*source).read(buf) {
            Ok(n) => return Ok(TransferResult::new(n, n == 0 && !buf.is_empty())),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                signaled(Signal::readable(source)).await?;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if ends(&err) => return Ok(TransferResult::end(0)),
            Err(err) => return Err(Error::io(err)),
        }
    }
}

pub(crate) async fn write_ready<S>(
    sink: &S,
    buf: &[u8],
    nonblocking: bool,
    cancel: &CancelHandle,
    ends: EndOfStream,
) -> Result<TransferResult<usize>>
where
    S: AsFd,
    for<'s> &'s S: Write,
{
    let env = current_env().await?;
    let _armed = cancel.arm(&env);
    let mut written = 0;
    while written < buf.len() {
        let mut end = buf.len();
        if !nonblocking {
            signaled(Signal::writable(sink)).await?;
            // Writability only promises room for PIPE_BUF bytes.
            end = end.min(written + libc::PIPE_BUF);
        }
        match (&*sink).write(&buf[written..end]) {
            Ok(0) => return Ok(TransferResult::end(written)),
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                signaled(Signal::writable(sink)).await?;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if ends(&err) => return Ok(TransferResult::end(written)),
            Err(err) => return Err(Error::io(err)),
        }
    }
    Ok(TransferResult::more(written))
}

/// A stream over an owned file descriptor.
#[derive(Debug)]
pub struct FdStream {
    file: File,
    nonblocking: bool,
    cancel: CancelHandle,
}

impl FdStream {
    /// Takes ownership of `fd`.
    pub fn from_owned(fd: OwnedFd) -> io::Result<Self> {
        Self::from_file(File::from(fd))
    }

    /// Takes ownership of an open file.
    pub fn from_file(file: File) -> io::Result<Self> {
        let nonblocking = is_nonblocking(file.as_fd())?;
        Ok(Self {
            file,
            nonblocking,
            cancel: CancelHandle::new(),
        })
    }

    /// Sets or clears non-blocking mode.
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        set_nonblocking(self.file.as_fd(), nonblocking)?;
        self.nonblocking = nonblocking;
        Ok(())
    }

    /// True if the descriptor is in non-blocking mode.
    #[must_use]
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// Aborts an outstanding asynchronous operation.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Releases the descriptor.
    #[must_use]
    pub fn into_owned(self) -> OwnedFd {
        self.file.into()
    }
}

impl AsFd for FdStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl SyncRead for FdStream {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>> {
        read_blocking(&self.file, buf, broken_pipe)
    }
}

impl SyncWrite for FdStream {
    fn write_from(&mut self, buf: &[u8]) -> Result<TransferResult<usize>> {
        write_blocking(&self.file, buf, broken_pipe)
    }
}

impl AsyncRead for FdStream {
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>> {
        Task::new(read_ready(&self.file, buf, self.nonblocking, &self.cancel, broken_pipe))
    }
}

impl AsyncWrite for FdStream {
    fn write_async_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<usize>> {
        Task::new(write_ready(&self.file, buf, self.nonblocking, &self.cancel, broken_pipe))
    }
}
