//! Transfer results, I/O capabilities, and the algorithms built on them.
//!
//! Every transport exposes some of four capabilities:
//!
//! - [`SyncRead::read_into`] / [`SyncWrite::write_from`] block the thread.
//! - [`AsyncRead::read_async_into`] / [`AsyncWrite::write_async_from`]
//!   return a [`Task`](crate::runtime::Task) that suspends the calling chain
//!   until the transfer completes.
//!
//! Each returns a [`TransferResult`] carrying the byte count and an
//! end-of-stream flag. The helpers in [`ext`] and [`pump`] only use these
//! capabilities, so they work over any transport.
//!
//! # End of stream
//!
//! - A read reports end of stream when the source will produce nothing more;
//!   it may carry the last bytes at the same time.
//! - A successful write transfers the whole buffer. A shorter count is only
//!   ever reported together with end of stream.
//! - The full-transfer helpers turn an end of stream before the buffer is
//!   done into [`ErrorKind::PrematureEof`](crate::error::ErrorKind::PrematureEof).

pub mod ext;
mod pump;
mod read;
mod transfer;
mod write;

pub use ext::{AsyncReadExt, AsyncWriteExt, SyncReadExt, SyncWriteExt};
pub use pump::{pump, pump_configured, pump_sync};
pub use read::{AsyncRead, SyncRead};
pub use transfer::TransferResult;
pub use write::{AsyncWrite, SyncWrite};
