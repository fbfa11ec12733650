//! Fault injection for lab transports.

use std::io;

/// Fails a lab transport once a byte threshold is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Bytes transferred before the fault fires.
    pub after: usize,
    /// The error the transfer fails with.
    pub kind: io::ErrorKind,
}

impl Fault {
    /// A fault firing after `after` bytes.
    #[must_use]
    pub const fn new(after: usize, kind: io::ErrorKind) -> Self {
        Self { after, kind }
    }

    /// Caps a transfer of `wanted` bytes at position `pos`, or returns the
    /// injected error if the threshold has been reached.
    pub(crate) fn limit(&self, pos: usize, wanted: usize) -> io::Result<usize> {
        if pos >= self.after {
            return Err(io::Error::new(self.kind, "injected fault"));
        }
        Ok(wanted.min(self.after - pos))
    }
}

/// Applies an optional fault.
pub(crate) fn limit(fault: Option<&Fault>, pos: usize, wanted: usize) -> io::Result<usize> {
    fault.map_or(Ok(wanted), |f| f.limit(pos, wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_then_fires() {
        let fault = Fault::new(10, io::ErrorKind::BrokenPipe);
        assert_eq!(fault.limit(0, 4).unwrap(), 4);
        assert_eq!(fault.limit(8, 4).unwrap(), 2);
        assert_eq!(fault.limit(10, 4).unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(limit(None, 100, 7).unwrap(), 7);
    }
}
