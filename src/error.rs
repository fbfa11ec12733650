//! Error types and error handling strategy for chainio.
//!
//! Errors fall into two families:
//!
//! - **Protocol**: defects in how the caller uses the executor or a transport
//!   (nonlinear environment use, a full-transfer helper hitting end of stream,
//!   a second operation issued while one is in flight). These are never
//!   recovered; the executor's own bookkeeping treats them as fatal.
//! - **Transport**: an OS operation failed. These surface as the terminal
//!   error of the task that issued the operation and are re-raised to the
//!   awaiting frame when it asks for the result.
//!
//! Nothing in this crate retries automatically. [`Recoverability`] exists so
//! callers can decide for themselves.

use core::fmt;
use std::io;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Protocol ===
    /// A frame transition did not match the environment's current frame.
    NonlinearUse,
    /// A stream ended before a full-transfer helper got all expected bytes.
    PrematureEof,
    /// An operation was issued while another one was still outstanding.
    OperationInFlight,
    /// A suspension request was made outside of any completion environment.
    NoEnvironment,
    /// An argument was outside its valid range.
    InvalidArgument,
    /// The wait set is larger than the configured wait-object ceiling.
    WaitLimitExceeded,

    // === Transport ===
    /// The operation was cancelled before it completed.
    Cancelled,
    /// The underlying OS call failed.
    Io,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NonlinearUse
            | Self::PrematureEof
            | Self::OperationInFlight
            | Self::NoEnvironment
            | Self::InvalidArgument
            | Self::WaitLimitExceeded => ErrorCategory::Protocol,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Io => ErrorCategory::Transport,
        }
    }

    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            Self::NonlinearUse
            | Self::PrematureEof
            | Self::OperationInFlight
            | Self::NoEnvironment
            | Self::InvalidArgument
            | Self::WaitLimitExceeded
            | Self::Cancelled => Recoverability::Permanent,
            Self::Io => Recoverability::Unknown,
        }
    }

    const fn describe(&self) -> &'static str {
        match self {
            Self::NonlinearUse => "nonlinear use of completion environment",
            Self::PrematureEof => "stream ended before expected data arrived",
            Self::OperationInFlight => "an operation is already outstanding",
            Self::NoEnvironment => "no completion environment is active",
            Self::InvalidArgument => "invalid argument",
            Self::WaitLimitExceeded => "too many waitables for one wait",
            Self::Cancelled => "operation cancelled",
            Self::Io => "I/O error",
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller defects. Never recovered.
    Protocol,
    /// Cancellation requested by the owner of a chain.
    Cancellation,
    /// Failures reported by the OS for a transport.
    Transport,
}

/// Classification of error recoverability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Permanent failure that will not succeed on retry.
    Permanent,
    /// Depends on the underlying OS error.
    Unknown,
}

impl Recoverability {
    /// Returns true if this error should never be retried.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent)
    }
}

/// The main error type for chainio operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<io::Error>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Wraps an OS error.
    ///
    /// The error a cancelled operation descriptor completes with maps to
    /// [`ErrorKind::Cancelled`].
    #[must_use]
    pub fn io(err: io::Error) -> Self {
        let kind = if err
            .get_ref()
            .is_some_and(|inner| inner.is::<crate::runtime::operation::OperationCancelled>())
        {
            ErrorKind::Cancelled
        } else {
            ErrorKind::Io
        };
        Self {
            kind,
            message: None,
            source: Some(Arc::new(err)),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the OS error this error wraps, if any.
    #[must_use]
    pub fn io_error(&self) -> Option<&io::Error> {
        self.source.as_deref()
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.describe())?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::io(err)
    }
}

/// A specialized Result type for chainio operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Reports a defect and stops the current thread.
///
/// Used for protocol errors the executor cannot continue past, such as a
/// frame transition that breaks the single-current-frame invariant.
#[track_caller]
pub(crate) fn fatal(err: &Error) -> ! {
    crate::tracing_compat::error!(error = %err, "fatal executor defect");
    panic!("{err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_kinds_are_permanent() {
        for kind in [
            ErrorKind::NonlinearUse,
            ErrorKind::PrematureEof,
            ErrorKind::OperationInFlight,
            ErrorKind::WaitLimitExceeded,
        ] {
            assert_eq!(kind.category(), ErrorCategory::Protocol);
            assert!(kind.recoverability().is_permanent());
        }
    }

    #[test]
    fn display_includes_message_and_source() {
        let err = Error::io(io::Error::new(io::ErrorKind::Other, "boom")).with_message("read");
        let text = err.to_string();
        assert!(text.starts_with("I/O error: read"), "{text}");
        assert!(text.contains("boom"), "{text}");
        assert_eq!(err.category(), ErrorCategory::Transport);
    }

    #[test]
    fn cancelled_descriptor_error_maps_to_cancelled() {
        let err = Error::io(crate::runtime::operation::cancelled_io_error());
        assert!(err.is_cancelled());
        let plain = Error::io(io::Error::from(io::ErrorKind::Interrupted));
        assert_eq!(plain.kind(), ErrorKind::Io);
    }

    #[test]
    fn source_chain_is_exposed() {
        use std::error::Error as _;
        let err = Error::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(err.source().is_some());
        assert!(Error::new(ErrorKind::NonlinearUse).source().is_none());
    }
}
