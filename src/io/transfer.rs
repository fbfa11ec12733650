//! The result of one read or write.

/// A payload paired with an end-of-stream flag.
///
/// `end_of_stream` means the transport will never produce or accept more
/// data. The value is still meaningful on the call that discovers it: a read
/// may return its last bytes and the flag together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransferResult<T> {
    value: T,
    end_of_stream: bool,
}

impl<T> TransferResult<T> {
    /// Creates a result.
    pub const fn new(value: T, end_of_stream: bool) -> Self {
        Self {
            value,
            end_of_stream,
        }
    }

    /// A result with more data to come.
    pub const fn more(value: T) -> Self {
        Self::new(value, false)
    }

    /// A result that ends the stream.
    pub const fn end(value: T) -> Self {
        Self::new(value, true)
    }

    /// The payload.
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Consumes the result, returning the payload.
    pub fn into_value(self) -> T {
        self.value
    }

    /// True if the transport has reached end of stream.
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Converts the payload, keeping the flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TransferResult<U> {
        TransferResult::new(f(self.value), self.end_of_stream)
    }

    /// Drops the payload, keeping the flag.
    pub fn discard_value(self) -> TransferResult<()> {
        TransferResult::new((), self.end_of_stream)
    }
}

impl TransferResult<usize> {
    /// Bytes transferred.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.value
    }
}
