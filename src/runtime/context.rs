//! Thread-local record of the frame being driven.
//!
//! While a [`Task`](super::Task) polls its body it publishes its environment
//! and frame here. Suspension requests and nested tasks created inside that
//! body read it to learn which chain they belong to.

use super::env::{CompletionEnvironment, FrameId};
use std::cell::RefCell;

#[derive(Clone)]
pub(crate) struct Cx {
    pub(crate) env: CompletionEnvironment,
    pub(crate) frame: FrameId,
}

thread_local! {
    static CURRENT: RefCell<Option<Cx>> = const { RefCell::new(None) };
}

/// Restores the previously driven frame on drop.
pub(crate) struct EnterGuard {
    prev: Option<Cx>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|slot| *slot.borrow_mut() = prev);
    }
}

/// Publishes `frame` of `env` as the frame being driven.
pub(crate) fn enter(env: CompletionEnvironment, frame: FrameId) -> EnterGuard {
    let prev = CURRENT.with(|slot| slot.borrow_mut().replace(Cx { env, frame }));
    EnterGuard { prev }
}

/// The frame being driven on this thread, if any.
pub(crate) fn current() -> Option<Cx> {
    CURRENT.with(|slot| slot.borrow().clone())
}
