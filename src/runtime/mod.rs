//! The completion-driven executor.
//!
//! - [`env`]: per-chain completion environments and the frame protocol
//! - [`task`]: suspendable tasks and [`block_on`]
//! - [`suspend`]: the suspension requests a task body can await
//! - [`scheduler`]: drives many independent chains with one wait per step
//! - [`operation`]: the completion descriptor bound to an environment
//! - [`config`] / [`env_config`]: scheduler configuration
//!
//! # Model
//!
//! Everything runs on the calling thread. Each root task gets its own
//! [`CompletionEnvironment`]; tasks awaited from inside it share that
//! environment and push frames onto its stack. A chain runs synchronously
//! until it awaits [`completion`] or [`signaled`], at which point control
//! returns to the [`Scheduler`], which blocks in a single wait over every
//! chain's governing waitable.
//!
//! ```ignore
//! use chainio::runtime::{Scheduler, Task};
//!
//! let mut scheduler = Scheduler::new([
//!     Task::new(async { /* chain one */ Ok(()) }),
//!     Task::new(async { /* chain two */ Ok(()) }),
//! ])?;
//! scheduler.run()?;
//! ```

mod context;

pub mod config;
pub mod env;
pub mod env_config;
pub mod operation;
pub mod scheduler;
pub mod suspend;
pub mod task;

pub use config::SchedulerConfig;
pub use env::{
    CompletionEnvironment, EnvHandle, FrameId, FrameRecord, FrameState, WaitSource,
    WeakEnvironment,
};
pub use env_config::ConfigError;
pub use operation::{Completer, Operation};
pub use scheduler::{Scheduler, Wakeup};
pub use suspend::{completion, current_env, signaled, CurrentEnv, Wait};
pub use task::{block_on, Task, TaskState};
