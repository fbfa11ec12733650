//! Anonymous pipes.

#![allow(unsafe_code)]

use super::fd::FdStream;
use crate::error::Result;
use crate::tracing_compat::trace;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Both ends of an anonymous pipe.
#[derive(Debug)]
pub struct Pipe {
    /// The read end.
    pub read: FdStream,
    /// The write end.
    pub write: FdStream,
}

/// Options for [`Pipe::with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipeOptions {
    /// Leave the ends open across `exec` in child processes.
    pub inheritable: bool,
    /// Put both ends in non-blocking mode.
    pub nonblocking: bool,
    /// Requested kernel buffer size, if not the default.
    pub buffer_size: Option<usize>,
}

impl Pipe {
    /// A blocking, inheritable pipe.
    pub fn create() -> Result<Self> {
        Self::with_options(PipeOptions {
            inheritable: true,
            ..PipeOptions::default()
        })
    }

    /// A non-blocking pipe for use from chains. Neither end is inherited.
    pub fn create_async() -> Result<Self> {
        Self::with_options(PipeOptions {
            nonblocking: true,
            ..PipeOptions::default()
        })
    }

    /// A pipe with explicit options.
    pub fn with_options(options: PipeOptions) -> Result<Self> {
        let mut flags = 0;
        if !options.inheritable {
            flags |= libc::O_CLOEXEC;
        }
        if options.nonblocking {
            flags |= libc::O_NONBLOCK;
        }

        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: `fds` is a valid array of two ints for pipe2 to fill.
        if unsafe { libc::pipe2(fds.as_mut_ptr(), flags) } < 0 {
            return Err(io::Error::last_os_error().into());
        }
        // SAFETY: pipe2 succeeded, so both descriptors are open and owned by
        // nobody else.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        if let Some(size) = options.buffer_size {
            let size = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);
            // SAFETY: F_SETPIPE_SZ takes an integer argument; the fd is open.
            if unsafe { libc::fcntl(write.as_raw_fd(), libc::F_SETPIPE_SZ, size) } < 0 {
                return Err(io::Error::last_os_error().into());
            }
        }

        trace!(read = read.as_raw_fd(), write = write.as_raw_fd(), ?options, "pipe created");
        Ok(Self {
            read: FdStream::from_owned(read)?,
            write: FdStream::from_owned(write)?,
        })
    }

    /// Splits the pipe into its ends.
    #[must_use]
    pub fn into_ends(self) -> (FdStream, FdStream) {
        (self.read, self.write)
    }
}
