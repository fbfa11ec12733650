//! Completion environments.
//!
//! A [`CompletionEnvironment`] is the per-chain half of the executor. It owns
//! the self signal the scheduler waits on, the operation descriptor bound to
//! that signal, the wait source currently governing the chain, and the
//! explicit stack of frames the chain has descended through.
//!
//! # Frame protocol
//!
//! Exactly one frame of a chain is current at any time: the top of the
//! stack. Every transition names the frame it expects to be current, and
//! [`update_current`](CompletionEnvironment::update_current) accepts only
//!
//! - a self-check (`expected == next == top`),
//! - a descend (push a frame that has never been on the stack), or
//! - an ascend (pop back to the parent, or to empty).
//!
//! Anything else is [`ErrorKind::NonlinearUse`].

use super::operation::Operation;
use super::task::Task;
use crate::error::{Error, ErrorKind, Result};
use crate::sys::{Event, Signal};
use crate::tracing_compat::{debug, trace, warn};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENV_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one frame of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

impl FrameId {
    /// The frame's serial number within its environment.
    #[must_use]
    pub const fn serial(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// The waitable that resumes a suspended chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSource {
    /// The environment's own signal, set when its operation completes.
    OperationCompletion,
    /// Some other waitable. Never reset by the executor.
    ExternalSignal(Signal),
}

/// What a frame on the stack is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Executing, or waiting on a nested frame above it.
    Running,
    /// Suspended on a wait source.
    Awaiting(WaitSource),
}

/// One entry of an environment's frame stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    /// The frame.
    pub id: FrameId,
    /// Its state.
    pub state: FrameState,
}

struct EnvShared {
    id: u64,
    self_signal: Event,
    operation: Operation,
    source: Cell<WaitSource>,
    frames: RefCell<Vec<FrameRecord>>,
    next_frame: Cell<u64>,
    last_pushed: Cell<u64>,
    generation: Cell<u64>,
    cancelled: Cell<bool>,
    interrupted: Cell<bool>,
}

/// Per-chain completion state.
///
/// Cloning yields another handle to the same environment.
#[derive(Clone)]
pub struct CompletionEnvironment {
    shared: Rc<EnvShared>,
}

/// Handle returned by [`current_env`](super::current_env).
pub type EnvHandle = CompletionEnvironment;

impl CompletionEnvironment {
    /// Creates an environment with an idle self signal and an empty stack.
    pub fn new() -> Result<Self> {
        let self_signal = Event::new()?;
        let operation = Operation::new(self_signal.clone());
        Ok(Self {
            shared: Rc::new(EnvShared {
                id: NEXT_ENV_ID.fetch_add(1, Ordering::Relaxed),
                self_signal,
                operation,
                source: Cell::new(WaitSource::OperationCompletion),
                frames: RefCell::new(Vec::new()),
                next_frame: Cell::new(1),
                last_pushed: Cell::new(0),
                generation: Cell::new(0),
                cancelled: Cell::new(false),
                interrupted: Cell::new(false),
            }),
        })
    }

    /// Process-unique identifier, used in logs.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Allocates a frame identity. It is not current until descended into.
    #[must_use]
    pub fn new_frame(&self) -> FrameId {
        let serial = self.shared.next_frame.get();
        self.shared.next_frame.set(serial + 1);
        FrameId(serial)
    }

    /// The current frame: the top of the stack.
    #[must_use]
    pub fn current(&self) -> Option<FrameId> {
        self.shared.frames.borrow().last().map(|f| f.id)
    }

    /// Number of frames on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.shared.frames.borrow().len()
    }

    /// Snapshot of the frame stack, root first.
    #[must_use]
    pub fn frames(&self) -> Vec<FrameRecord> {
        self.shared.frames.borrow().clone()
    }

    /// True once the chain has ascended out of its root frame (or never
    /// entered one).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.frames.borrow().is_empty()
    }

    /// The wait source governing the chain.
    #[must_use]
    pub fn wait_source(&self) -> WaitSource {
        self.shared.source.get()
    }

    /// The waitable the scheduler should wait on for this chain.
    #[must_use]
    pub fn governing(&self) -> Signal {
        match self.shared.source.get() {
            WaitSource::ExternalSignal(signal) => signal,
            WaitSource::OperationCompletion => self.shared.self_signal.as_signal(),
        }
    }

    /// The descriptor for issuing the next operation of this chain.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.shared.operation
    }

    /// The environment's own completion signal.
    #[must_use]
    pub fn self_signal(&self) -> &Event {
        &self.shared.self_signal
    }

    /// Makes `signal` govern the chain until it next resumes.
    pub fn install_override(&self, signal: Signal) {
        self.shared.source.set(WaitSource::ExternalSignal(signal));
    }

    /// Transitions the current frame from `expected` to `next`.
    pub fn update_current(&self, expected: Option<FrameId>, next: Option<FrameId>) -> Result<()> {
        let mut frames = self.shared.frames.borrow_mut();
        let top = frames.last().map(|f| f.id);
        if top != expected {
            return Err(nonlinear(format!(
                "expected current frame {}, found {}",
                show(expected),
                show(top)
            )));
        }
        if expected == next {
            return Ok(());
        }

        let parent = frames.len().checked_sub(2).map(|i| frames[i].id);
        match next {
            Some(id) if id.0 > self.shared.last_pushed.get() && id.0 < self.shared.next_frame.get() => {
                self.shared.last_pushed.set(id.0);
                frames.push(FrameRecord {
                    id,
                    state: FrameState::Running,
                });
                debug!(env = self.shared.id, from = %show(expected), to = %id, depth = frames.len(), "descend");
                Ok(())
            }
            _ if expected.is_some() && next == parent => {
                frames.pop();
                if let Some(top) = frames.last_mut() {
                    top.state = FrameState::Running;
                }
                debug!(env = self.shared.id, from = %show(expected), to = %show(next), depth = frames.len(), "ascend");
                Ok(())
            }
            _ => Err(nonlinear(format!(
                "{} -> {} is neither a descend nor an ascend",
                show(expected),
                show(next)
            ))),
        }
    }

    /// Starts driving `root` in this environment.
    ///
    /// The root becomes the bottom frame and the self signal is set, so the
    /// first [`advance`](Self::advance) runs the root until its first
    /// suspension. An already-terminal task is left alone.
    pub fn attach<T>(&self, root: &mut Task<'_, T>) -> Result<()> {
        if root.is_terminal() {
            return Ok(());
        }
        if root.is_bound() {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("task is already bound to a chain"));
        }
        let frame = self.new_frame();
        self.update_current(None, Some(frame))?;
        root.bind_root(self.clone(), frame);
        self.shared.self_signal.set()?;
        debug!(env = self.shared.id, root = %frame, "attached root");
        Ok(())
    }

    /// Resumes the chain if its governing waitable is signaled.
    ///
    /// The self signal is reset before resuming; an external signal is left
    /// as is and the wait source reverts to the operation completion.
    /// Returns whether a resume happened.
    pub fn advance<T>(&self, root: &mut Task<'_, T>) -> Result<bool> {
        let bottom = self.shared.frames.borrow().first().map(|f| f.id);
        let Some(bottom) = bottom else {
            return Ok(false);
        };
        if root.frame() != Some(bottom) {
            return Err(nonlinear(format!(
                "advance called with a task that is not the root {bottom}"
            )));
        }

        match self.shared.source.get() {
            WaitSource::OperationCompletion => {
                if !self.shared.self_signal.is_set()? {
                    return Ok(false);
                }
                self.shared.self_signal.reset()?;
            }
            WaitSource::ExternalSignal(signal) => {
                if !signal.is_signaled()? {
                    return Ok(false);
                }
                self.shared.source.set(WaitSource::OperationCompletion);
            }
        }

        let generation = self.shared.generation.get() + 1;
        self.shared.generation.set(generation);
        trace!(env = self.shared.id, generation, current = %show(self.current()), "resume");
        root.resume();
        Ok(true)
    }

    /// Cancels the chain.
    ///
    /// Sticky: any outstanding operation completes as cancelled, the chain
    /// is resumed, and every wait from now on resolves with
    /// [`ErrorKind::Cancelled`].
    pub fn cancel(&self) -> Result<()> {
        if self.shared.cancelled.replace(true) {
            return Ok(());
        }
        warn!(env = self.shared.id, current = %show(self.current()), "cancelling chain");
        self.shared.operation.cancel();
        self.shared.source.set(WaitSource::OperationCompletion);
        self.shared.self_signal.set()?;
        Ok(())
    }

    /// True once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.get()
    }

    /// Resolves the wait the current frame is suspended on with
    /// [`ErrorKind::Cancelled`]. Later waits are unaffected.
    ///
    /// Returns false if the current frame is not waiting.
    pub fn interrupt_wait(&self) -> Result<bool> {
        let waiting = matches!(
            self.shared.frames.borrow().last(),
            Some(FrameRecord {
                state: FrameState::Awaiting(_),
                ..
            })
        );
        if !waiting {
            return Ok(false);
        }
        debug!(env = self.shared.id, current = %show(self.current()), "interrupting wait");
        self.shared.interrupted.set(true);
        self.shared.operation.cancel();
        self.shared.source.set(WaitSource::OperationCompletion);
        self.shared.self_signal.set()?;
        Ok(true)
    }

    /// A handle that does not keep the environment alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment(Rc::downgrade(&self.shared))
    }

    pub(crate) fn generation(&self) -> u64 {
        self.shared.generation.get()
    }

    pub(crate) fn take_interrupt(&self) -> bool {
        self.shared.interrupted.replace(false)
    }

    /// Marks the current frame as suspended on `source`.
    pub(crate) fn suspend(&self, frame: FrameId, source: WaitSource) {
        if let Some(top) = self.shared.frames.borrow_mut().last_mut() {
            if top.id == frame {
                top.state = FrameState::Awaiting(source);
            }
        }
        if let WaitSource::ExternalSignal(signal) = source {
            self.install_override(signal);
        }
        trace!(env = self.shared.id, %frame, ?source, "suspend");
    }

    pub(crate) fn mark_running(&self, frame: FrameId) {
        if let Some(top) = self.shared.frames.borrow_mut().last_mut() {
            if top.id == frame {
                top.state = FrameState::Running;
            }
        }
    }

    pub(crate) fn contains(&self, frame: FrameId) -> bool {
        self.shared.frames.borrow().iter().any(|f| f.id == frame)
    }

    /// Truncates the stack back to `frame`'s parent after its task was
    /// dropped in flight. Any outstanding operation is cancelled and its
    /// result discarded.
    pub(crate) fn abandon(&self, frame: FrameId) {
        {
            let mut frames = self.shared.frames.borrow_mut();
            let Some(pos) = frames.iter().position(|f| f.id == frame) else {
                return;
            };
            frames.truncate(pos);
            if let Some(top) = frames.last_mut() {
                top.state = FrameState::Running;
            }
        }
        if self.shared.operation.cancel() {
            self.shared.operation.discard();
        }
        self.shared.source.set(WaitSource::OperationCompletion);
        if let Err(err) = self.shared.self_signal.reset() {
            warn!(env = self.shared.id, error = %err, "failed to reset self signal");
        }
    }
}

impl fmt::Debug for CompletionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionEnvironment")
            .field("id", &self.shared.id)
            .field("source", &self.shared.source.get())
            .field("frames", &*self.shared.frames.borrow())
            .field("cancelled", &self.shared.cancelled.get())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to a [`CompletionEnvironment`].
#[derive(Debug, Clone, Default)]
pub struct WeakEnvironment(Weak<EnvShared>);

impl WeakEnvironment {
    /// The environment, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<CompletionEnvironment> {
        self.0.upgrade().map(|shared| CompletionEnvironment { shared })
    }
}

fn nonlinear(message: String) -> Error {
    Error::new(ErrorKind::NonlinearUse).with_message(message)
}

fn show(frame: Option<FrameId>) -> String {
    frame.map_or_else(|| "<none>".to_owned(), |f| f.to_string())
}
