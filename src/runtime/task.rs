//! Suspendable tasks.
//!
//! A [`Task`] wraps a future producing `Result<T>`. It does nothing until it
//! is first driven: either as the root of a chain (attached to an
//! environment and resumed by [`advance`](super::CompletionEnvironment::advance))
//! or by being awaited from inside another task's body.
//!
//! Awaiting a task descends into a fresh frame of the caller's environment
//! and runs the nested body synchronously until it finishes or suspends. On
//! finishing, the task ascends back to the frame that awaited it and stores
//! its result. An error is handed back only when the awaiting frame collects
//! the result, so failures unwind exactly the nesting the calls walked down.
//!
//! ```ignore
//! let task = Task::new(async {
//!     let env = current_env().await?;
//!     let completer = env.operation().begin()?;
//!     start_read(completer);
//!     completion().await?;
//!     Ok(env.operation().take_result())
//! });
//! ```

use super::context;
use super::env::{CompletionEnvironment, FrameId};
use crate::error::{fatal, Error, ErrorKind, Result};
use crate::sys::wait_any;
use crate::tracing_compat::{debug, error};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

type Body<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a>>;

/// Lifecycle of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not yet driven.
    Created,
    /// Driven at least once and waiting to be resumed.
    Suspended,
    /// Finished with a value.
    Completed,
    /// Finished with an error.
    Failed,
    /// The result has been handed to the awaiting frame.
    Consumed,
}

enum Outcome<T> {
    Pending,
    Ready(Result<T>),
    Taken,
}

#[derive(Clone)]
struct Link {
    env: CompletionEnvironment,
    frame: FrameId,
    parent: Option<FrameId>,
}

/// A suspendable computation producing `Result<T>`.
#[must_use = "tasks do nothing unless awaited or attached to a scheduler"]
pub struct Task<'a, T> {
    body: Option<Body<'a, T>>,
    outcome: Outcome<T>,
    link: Option<Link>,
}

impl<'a, T> Task<'a, T> {
    /// Wraps `body`. Nothing runs until the task is driven.
    pub fn new<F>(body: F) -> Self
    where
        F: Future<Output = Result<T>> + 'a,
    {
        Self {
            body: Some(Box::pin(body)),
            outcome: Outcome::Pending,
            link: None,
        }
    }

    /// A task that is already terminal with `result`.
    ///
    /// Awaiting it never touches the environment; synchronous adapters use it
    /// to satisfy an async signature.
    pub fn ready(result: Result<T>) -> Self {
        Self {
            body: None,
            outcome: Outcome::Ready(result),
            link: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        match (&self.outcome, &self.link) {
            (Outcome::Pending, None) => TaskState::Created,
            (Outcome::Pending, Some(_)) => TaskState::Suspended,
            (Outcome::Ready(Ok(_)), _) => TaskState::Completed,
            (Outcome::Ready(Err(_)), _) => TaskState::Failed,
            (Outcome::Taken, _) => TaskState::Consumed,
        }
    }

    /// True once the body has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.body.is_none()
    }

    /// The frame this task runs in, once bound to a chain.
    #[must_use]
    pub fn frame(&self) -> Option<FrameId> {
        self.link.as_ref().map(|link| link.frame)
    }

    /// The stored result, if terminal and not yet taken.
    #[must_use]
    pub fn result(&self) -> Option<&Result<T>> {
        match &self.outcome {
            Outcome::Ready(result) => Some(result),
            _ => None,
        }
    }

    /// Takes the stored result, if terminal and not yet taken.
    pub fn take_result(&mut self) -> Option<Result<T>> {
        match std::mem::replace(&mut self.outcome, Outcome::Taken) {
            Outcome::Ready(result) => Some(result),
            other => {
                self.outcome = other;
                None
            }
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.link.is_some()
    }

    pub(crate) fn bind_root(&mut self, env: CompletionEnvironment, frame: FrameId) {
        self.link = Some(Link {
            env,
            frame,
            parent: None,
        });
    }

    /// Drives the root of a chain once.
    pub(crate) fn resume(&mut self) {
        let mut cx = Context::from_waker(Waker::noop());
        let _ = self.drive(&mut cx);
    }

    fn drive(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(body) = self.body.as_mut() else {
            return Poll::Ready(());
        };

        let link = match &self.link {
            Some(link) => link.clone(),
            None => {
                let Some(caller) = context::current() else {
                    fatal(
                        &Error::new(ErrorKind::NoEnvironment)
                            .with_message("task driven outside of a chain"),
                    );
                };
                let frame = caller.env.new_frame();
                if let Err(err) = caller.env.update_current(Some(caller.frame), Some(frame)) {
                    fatal(&err);
                }
                let link = Link {
                    env: caller.env,
                    frame,
                    parent: Some(caller.frame),
                };
                self.link = Some(link.clone());
                link
            }
        };

        let polled = {
            let _entered = context::enter(link.env.clone(), link.frame);
            body.as_mut().poll(cx)
        };
        let Poll::Ready(result) = polled else {
            return Poll::Pending;
        };

        self.body = None;
        if let Err(err) = &result {
            debug!(env = link.env.id(), frame = %link.frame, error = %err, "task failed");
        }
        self.outcome = Outcome::Ready(result);
        if let Err(err) = link.env.update_current(Some(link.frame), link.parent) {
            fatal(&err);
        }
        Poll::Ready(())
    }
}

impl<T> Future for Task<'_, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let this = self.get_mut();
        if this.drive(cx).is_pending() {
            return Poll::Pending;
        }
        match this.take_result() {
            Some(result) => Poll::Ready(result),
            None => panic!("`Task` polled after completion"),
        }
    }
}

// The body is boxed and `T` is only ever moved out by value.
impl<T> Unpin for Task<'_, T> {}

impl<T> Drop for Task<'_, T> {
    fn drop(&mut self) {
        if self.body.is_none() {
            return;
        }
        if let Some(link) = &self.link {
            if link.env.contains(link.frame) {
                error!(
                    env = link.env.id(),
                    frame = %link.frame,
                    "task dropped while in flight; abandoning its frame"
                );
                link.env.abandon(link.frame);
            }
        }
    }
}

impl<T> fmt::Debug for Task<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state())
            .field("frame", &self.frame())
            .finish_non_exhaustive()
    }
}

/// Drives `task` to completion as the only chain of a fresh environment.
pub fn block_on<T>(mut task: Task<'_, T>) -> Result<T> {
    let env = CompletionEnvironment::new()?;
    env.attach(&mut task)?;
    while !env.is_finished() {
        wait_any(&[env.governing()], None)?;
        env.advance(&mut task)?;
    }
    task.take_result().unwrap_or_else(|| {
        Err(Error::new(ErrorKind::InvalidArgument).with_message("task result already taken"))
    })
}
