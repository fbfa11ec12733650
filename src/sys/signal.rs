//! OS waitables: manual-reset events and borrowed readiness signals.
//!
//! An [`Event`] is an owned eventfd used as a manual-reset event: once set it
//! stays signaled until explicitly reset. A [`Signal`] is a borrowed view of
//! any file descriptor paired with the readiness that counts as "signaled", so
//! events, pipes and sockets can all sit in one [`wait_any`] call.
//!
//! NOTE: eventfd creation and `poll(2)` go through libc; the safety
//! invariants are documented inline.

#![allow(unsafe_code)]

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which readiness of a descriptor counts as signaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readiness {
    /// Data can be read, or the peer hung up.
    Readable,
    /// Data can be written, or the peer hung up.
    Writable,
}

impl Readiness {
    const fn poll_events(self) -> libc::c_short {
        match self {
            Self::Readable => libc::POLLIN,
            Self::Writable => libc::POLLOUT,
        }
    }
}

/// A borrowed waitable.
///
/// Holds the raw descriptor only; the owner of the descriptor must keep it
/// open for as long as the signal is waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal {
    fd: RawFd,
    readiness: Readiness,
}

impl Signal {
    /// Signaled when `source` is readable.
    #[must_use]
    pub fn readable(source: &impl AsFd) -> Self {
        Self {
            fd: source.as_fd().as_raw_fd(),
            readiness: Readiness::Readable,
        }
    }

    /// Signaled when `source` is writable.
    #[must_use]
    pub fn writable(source: &impl AsFd) -> Self {
        Self {
            fd: source.as_fd().as_raw_fd(),
            readiness: Readiness::Writable,
        }
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(fd: RawFd, readiness: Readiness) -> Self {
        Self { fd, readiness }
    }

    /// The borrowed descriptor.
    #[must_use]
    pub const fn raw_fd(&self) -> RawFd {
        self.fd
    }

    /// The readiness this signal waits for.
    #[must_use]
    pub const fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Tells if the signal is set without waiting.
    pub fn is_signaled(&self) -> io::Result<bool> {
        Ok(wait_any(&[*self], Some(Duration::ZERO))?.is_some())
    }

    /// Blocks until the signal is set or `timeout` elapses.
    ///
    /// Returns false on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> io::Result<bool> {
        Ok(wait_any(&[*self], timeout)?.is_some())
    }
}

/// Blocks until any of `signals` is set or `timeout` elapses.
///
/// Returns the index of the first signaled entry, or `None` on timeout.
/// `None` as the timeout waits indefinitely; an empty set with no timeout is
/// rejected since it could never return.
pub fn wait_any(signals: &[Signal], timeout: Option<Duration>) -> io::Result<Option<usize>> {
    if signals.is_empty() && timeout.is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "waiting on an empty set without a timeout",
        ));
    }

    let mut fds: Vec<libc::pollfd> = signals
        .iter()
        .map(|s| libc::pollfd {
            fd: s.fd,
            events: s.readiness.poll_events(),
            revents: 0,
        })
        .collect();
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let timeout_ms = deadline.map_or(-1, |d| {
            let left = d.saturating_duration_since(Instant::now());
            i32::try_from(left.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX)
        });

        // SAFETY: `fds` is a live, exclusively borrowed array of `fds.len()`
        // pollfd structs for the whole call.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(None);
        }

        for (index, pfd) in fds.iter().enumerate() {
            if pfd.revents & libc::POLLNVAL != 0 {
                return Err(io::Error::from_raw_os_error(libc::EBADF));
            }
            if pfd.revents != 0 {
                return Ok(Some(index));
            }
        }
        return Ok(None);
    }
}

/// An owned manual-reset event.
///
/// Clones share the same underlying eventfd, so an operation descriptor can
/// hold a clone and complete from another thread.
#[derive(Debug, Clone)]
pub struct Event {
    file: Arc<File>,
}

impl Event {
    /// Creates an event in the idle (unsignaled) state.
    pub fn new() -> io::Result<Self> {
        // SAFETY: eventfd has no pointer arguments; the result is checked below.
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` was just returned by eventfd and is owned by nobody else.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self {
            file: Arc::new(File::from(owned)),
        })
    }

    /// Creates an event that starts signaled.
    pub fn new_signaled() -> io::Result<Self> {
        let event = Self::new()?;
        event.set()?;
        Ok(event)
    }

    /// Sets the event. It stays signaled until [`reset`](Self::reset).
    pub fn set(&self) -> io::Result<()> {
        match (&*self.file).write(&1u64.to_ne_bytes()) {
            Ok(_) => Ok(()),
            // Counter saturated: already signaled.
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Returns the event to the idle state.
    pub fn reset(&self) -> io::Result<()> {
        let mut buf = [0u8; 8];
        match (&*self.file).read(&mut buf) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Tells if the event is set without waiting.
    pub fn is_set(&self) -> io::Result<bool> {
        self.as_signal().is_signaled()
    }

    /// The event as a borrowed waitable.
    #[must_use]
    pub fn as_signal(&self) -> Signal {
        Signal::readable(&*self.file)
    }
}

impl AsFd for Event {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test;

    #[test]
    fn event_is_manual_reset() {
        init_test("event_is_manual_reset");
        let event = Event::new().unwrap();
        assert!(!event.is_set().unwrap());

        event.set().unwrap();
        assert!(event.is_set().unwrap());
        // Observing it does not consume it.
        assert!(event.is_set().unwrap());

        event.set().unwrap();
        event.reset().unwrap();
        assert!(!event.is_set().unwrap());

        // Resetting an idle event is fine.
        event.reset().unwrap();
        crate::test_complete!("event_is_manual_reset");
    }

    #[test]
    fn clones_share_state() {
        init_test("clones_share_state");
        let event = Event::new().unwrap();
        let other = event.clone();
        other.set().unwrap();
        assert!(event.is_set().unwrap());
        crate::test_complete!("clones_share_state");
    }

    #[test]
    fn wait_any_reports_first_signaled_index() {
        init_test("wait_any_reports_first_signaled_index");
        let a = Event::new().unwrap();
        let b = Event::new().unwrap();
        let c = Event::new().unwrap();
        c.set().unwrap();

        let fired = wait_any(
            &[a.as_signal(), b.as_signal(), c.as_signal()],
            Some(Duration::from_millis(50)),
        )
        .unwrap();
        crate::assert_with_log!(fired == Some(2), "fired index", Some(2), fired);
        crate::test_complete!("wait_any_reports_first_signaled_index");
    }

    #[test]
    fn wait_any_times_out() {
        init_test("wait_any_times_out");
        let a = Event::new().unwrap();
        let start = Instant::now();
        let fired = wait_any(&[a.as_signal()], Some(Duration::from_millis(20))).unwrap();
        assert_eq!(fired, None);
        assert!(start.elapsed() >= Duration::from_millis(15));
        crate::test_complete!("wait_any_times_out");
    }

    #[test]
    fn wait_any_wakes_on_cross_thread_set() {
        init_test("wait_any_wakes_on_cross_thread_set");
        let event = Event::new().unwrap();
        let remote = event.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.set().unwrap();
        });
        let fired = wait_any(&[event.as_signal()], Some(Duration::from_secs(5))).unwrap();
        handle.join().unwrap();
        assert_eq!(fired, Some(0));
        crate::test_complete!("wait_any_wakes_on_cross_thread_set");
    }

    #[test]
    fn empty_infinite_wait_is_rejected() {
        init_test("empty_infinite_wait_is_rejected");
        let err = wait_any(&[], None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(wait_any(&[], Some(Duration::ZERO)).unwrap(), None);
        crate::test_complete!("empty_infinite_wait_is_rejected");
    }
}
