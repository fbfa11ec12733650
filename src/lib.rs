//! chainio: a single-threaded proactor that drives nested completion chains.
//!
//! # Overview
//!
//! Many independent computations ("chains") share one thread. Each chain is a
//! tree of suspendable [`Task`]s that runs synchronously until it depends on
//! an outstanding OS operation, then suspends. The [`Scheduler`] blocks in a
//! single wait over the governing waitable of every chain and resumes exactly
//! the chains whose operations completed.
//!
//! # Core Guarantees
//!
//! - **One environment per chain**: nested tasks share their root's
//!   [`CompletionEnvironment`] and its frame stack
//! - **Linear suspension**: frames descend and ascend strictly as a stack;
//!   anything else is reported as [`ErrorKind::NonlinearUse`]
//! - **Errors walk back up**: a failing task stores its error, and the
//!   awaiting frame receives it when it asks for the result
//! - **One outstanding operation**: each environment issues at most one OS
//!   operation at a time
//! - **No silent teardown**: live chains are cancelled and drained before the
//!   scheduler goes away
//!
//! # Module Structure
//!
//! - [`runtime`]: environments, tasks, suspension, the scheduler and its config
//! - [`io`]: [`TransferResult`], the read/write capabilities, full-transfer
//!   helpers and [`pump`](io::pump)
//! - [`sys`]: OS waitables, file-descriptor transports, pipes, TCP sockets
//! - [`cancel`]: cancel handles for outstanding transport operations
//! - [`lab`]: simulated transports for deterministic tests
//! - [`error`]: error types
//! - [`tracing_compat`]: logging that compiles away without `tracing`
//!
//! # Platform
//!
//! Linux only: waitables are eventfds and file descriptors multiplexed with
//! `poll(2)`.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod cancel;
pub mod error;
pub mod io;
pub mod lab;
pub mod runtime;
pub mod sys;
pub mod tracing_compat;

#[cfg(test)]
mod test_utils;

// Re-exports for convenient access to core types
pub use cancel::CancelHandle;
pub use error::{Error, ErrorCategory, ErrorKind, Recoverability, Result};
pub use io::{
    pump, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, SyncRead, SyncReadExt, SyncWrite,
    SyncWriteExt, TransferResult,
};
pub use runtime::{
    block_on, completion, current_env, signaled, CompletionEnvironment, EnvHandle, Operation,
    Scheduler, SchedulerConfig, Task,
};
pub use sys::{Event, FdStream, Listener, Pipe, Signal, Socket};
