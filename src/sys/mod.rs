//! OS-facing primitives for Linux.
//!
//! - [`signal`]: eventfd-backed events, borrowed readiness signals, `wait_any`
//! - [`fd`]: a transport over any owned file descriptor
//! - [`pipe`]: anonymous pipes, blocking or async-capable
//! - [`net`]: TCP sockets and listeners

pub mod fd;
pub mod net;
pub mod pipe;
pub mod signal;

pub use fd::FdStream;
pub use net::{Listener, Socket};
pub use pipe::Pipe;
pub use signal::{wait_any, Event, Readiness, Signal};
