//! Suspension requests a task body can await.
//!
//! - [`current_env`]: resolves immediately to the chain's environment.
//! - [`completion`]: suspends until the environment's operation completes.
//! - [`signaled`]: suspends until some other waitable is signaled.
//!
//! All three must be awaited from inside a [`Task`](super::Task) body;
//! elsewhere they resolve with [`ErrorKind::NoEnvironment`].

use super::context;
use super::env::{EnvHandle, FrameId, WaitSource};
use crate::error::{fatal, Error, ErrorKind, Result};
use crate::sys::Signal;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

fn no_environment() -> Error {
    Error::new(ErrorKind::NoEnvironment).with_message("suspension requested outside of a task")
}

/// Future returned by [`current_env`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct CurrentEnv {
    _priv: (),
}

impl Future for CurrentEnv {
    type Output = Result<EnvHandle>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        Poll::Ready(context::current().map(|cx| cx.env).ok_or_else(no_environment))
    }
}

/// The environment of the calling chain, for issuing its next operation.
pub fn current_env() -> CurrentEnv {
    CurrentEnv { _priv: () }
}

enum WaitState {
    Start,
    Suspended {
        env: EnvHandle,
        frame: FrameId,
        generation: u64,
    },
    Done,
}

/// Future returned by [`completion`] and [`signaled`].
#[must_use = "futures do nothing unless awaited"]
pub struct Wait {
    source: WaitSource,
    state: WaitState,
}

impl std::fmt::Debug for Wait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wait").field("source", &self.source).finish_non_exhaustive()
    }
}

impl Future for Wait {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = self.get_mut();
        match &this.state {
            WaitState::Start => {
                let Some(cx) = context::current() else {
                    return Poll::Ready(Err(no_environment()));
                };
                if let Err(err) = cx.env.update_current(Some(cx.frame), Some(cx.frame)) {
                    fatal(&err);
                }
                if cx.env.is_cancelled() {
                    this.state = WaitState::Done;
                    return Poll::Ready(Err(Error::cancelled()));
                }
                cx.env.suspend(cx.frame, this.source);
                this.state = WaitState::Suspended {
                    generation: cx.env.generation(),
                    env: cx.env,
                    frame: cx.frame,
                };
                Poll::Pending
            }
            WaitState::Suspended {
                env,
                frame,
                generation,
            } => {
                if env.generation() == *generation {
                    return Poll::Pending;
                }
                env.mark_running(*frame);
                let interrupted = env.take_interrupt();
                let result = if interrupted || env.is_cancelled() {
                    Err(Error::cancelled())
                } else {
                    Ok(())
                };
                this.state = WaitState::Done;
                Poll::Ready(result)
            }
            WaitState::Done => panic!("`Wait` polled after completion"),
        }
    }
}

/// Suspends the calling frame until its environment's operation completes.
pub fn completion() -> Wait {
    Wait {
        source: WaitSource::OperationCompletion,
        state: WaitState::Start,
    }
}

/// Suspends the calling frame until `signal` is signaled.
///
/// The signal governs the chain for this one wait only. The caller must keep
/// the underlying descriptor open until the wait resolves.
pub fn signaled(signal: Signal) -> Wait {
    Wait {
        source: WaitSource::ExternalSignal(signal),
        state: WaitState::Start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{block_on, CompletionEnvironment, Task};
    use crate::sys::Event;
    use crate::test_utils::init_test;
    use std::task::Waker;

    #[test]
    fn outside_a_task_there_is_no_environment() {
        init_test("outside_a_task_there_is_no_environment");
        let mut cx = Context::from_waker(Waker::noop());
        let mut env = current_env();
        match Pin::new(&mut env).poll(&mut cx) {
            Poll::Ready(Err(err)) => assert_eq!(err.kind(), ErrorKind::NoEnvironment),
            other => panic!("unexpected {other:?}"),
        }
        let mut wait = completion();
        match Pin::new(&mut wait).poll(&mut cx) {
            Poll::Ready(Err(err)) => assert_eq!(err.kind(), ErrorKind::NoEnvironment),
            _ => panic!("expected NoEnvironment"),
        }
        crate::test_complete!("outside_a_task_there_is_no_environment");
    }

    #[test]
    fn signaled_overrides_until_resumed() {
        init_test("signaled_overrides_until_resumed");
        let env = CompletionEnvironment::new().unwrap();
        let external = Event::new().unwrap();
        let signal = external.as_signal();
        let mut task = Task::new(async move {
            signaled(signal).await?;
            Ok(())
        });
        env.attach(&mut task).unwrap();
        env.advance(&mut task).unwrap();
        assert_eq!(env.governing(), signal);

        // The self signal no longer governs the chain.
        env.self_signal().set().unwrap();
        assert!(!env.advance(&mut task).unwrap());

        external.set().unwrap();
        assert!(env.advance(&mut task).unwrap());
        assert!(env.is_finished());
        assert_eq!(env.wait_source(), WaitSource::OperationCompletion);
        // External signals are never reset by the executor.
        assert!(external.is_set().unwrap());
        crate::test_complete!("signaled_overrides_until_resumed");
    }

    #[test]
    fn waits_after_cancel_fail_immediately() {
        init_test("waits_after_cancel_fail_immediately");
        let env = CompletionEnvironment::new().unwrap();
        let mut attempts = 0u32;
        let mut task = Task::new(async {
            for _ in 0..3 {
                attempts += 1;
                if let Err(err) = completion().await {
                    assert!(err.is_cancelled());
                }
            }
            Ok(())
        });
        env.attach(&mut task).unwrap();
        env.advance(&mut task).unwrap();
        env.cancel().unwrap();
        assert!(env.advance(&mut task).unwrap());
        assert!(env.is_finished());
        drop(task);
        assert_eq!(attempts, 3);
        crate::test_complete!("waits_after_cancel_fail_immediately");
    }

    #[test]
    fn interrupt_cancels_one_wait_only() {
        init_test("interrupt_cancels_one_wait_only");
        let outcome = block_on(Task::new(async {
            let env = current_env().await?;
            let first = {
                let mut wait = completion();
                let mut cx = Context::from_waker(Waker::noop());
                assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
                assert!(env.interrupt_wait()?);
                wait.await
            };
            let second = {
                env.self_signal().set()?;
                completion().await
            };
            Ok((first.is_err(), second.is_ok()))
        }))
        .unwrap();
        assert_eq!(outcome, (true, true));
        crate::test_complete!("interrupt_cancels_one_wait_only");
    }
}
