//! Simulated transports for deterministic tests.
//!
//! - [`ScriptedReader`]: serves a payload in scripted increments
//! - [`DelayedSource`] / [`delay`]: operations completed by a helper thread
//!   after a delay, like a kernel completing an overlapped read
//! - [`MemorySink`]: collects writes, optionally ending the stream when full
//! - [`Fault`]: fails a transfer with a chosen OS error after N bytes
//!
//! All of them implement both the blocking and the suspending capabilities,
//! and their asynchronous operations go through the chain's operation
//! descriptor exactly as a real transport would.

pub mod delayed;
pub mod fault;
pub mod scripted;
pub mod sink;

pub use delayed::{delay, DelayedSource};
pub use fault::Fault;
pub use scripted::ScriptedReader;
pub use sink::MemorySink;
