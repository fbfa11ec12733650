//! Multi-root scheduler.
//!
//! A [`Scheduler`] drives a fixed set of independent root tasks, each in its
//! own [`CompletionEnvironment`]. One iteration is a [`wait_step`] (block
//! until the cancellation signal or any unfinished chain's governing
//! waitable fires) followed by a [`step`] (advance every chain whose
//! waitable is signaled).
//!
//! There is no ordering between chains beyond "whoever is signaled gets
//! resumed in the next step".
//!
//! [`wait_step`]: Scheduler::wait_step
//! [`step`]: Scheduler::step

use super::config::SchedulerConfig;
use super::env::CompletionEnvironment;
use super::task::Task;
use crate::error::{Error, ErrorKind, Result};
use crate::sys::{wait_any, Signal};
use crate::tracing_compat::{debug, debug_span, info, trace, warn};
use std::time::Duration;

/// What ended a [`Scheduler::wait_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// The cancellation signal fired.
    Cancellation,
    /// The governing waitable of root `i` fired.
    Root(usize),
    /// The timeout elapsed.
    Timeout,
}

/// Drives independent chains until all finish or cancellation fires.
pub struct Scheduler<'a> {
    roots: Vec<Task<'a, ()>>,
    envs: Vec<CompletionEnvironment>,
    cancellation: Option<Signal>,
    config: SchedulerConfig,
}

impl<'a> Scheduler<'a> {
    /// Attaches every root to a fresh environment with the default config.
    pub fn new(roots: impl IntoIterator<Item = Task<'a, ()>>) -> Result<Self> {
        Self::with_config(roots, SchedulerConfig::default())
    }

    /// Attaches every root to a fresh environment.
    ///
    /// Fails with [`ErrorKind::WaitLimitExceeded`] if the roots alone
    /// exceed `config.max_wait_objects`.
    pub fn with_config(
        roots: impl IntoIterator<Item = Task<'a, ()>>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate().map_err(|err| {
            Error::new(ErrorKind::InvalidArgument).with_message(err.to_string())
        })?;
        let mut roots: Vec<_> = roots.into_iter().collect();
        check_wait_limit(roots.len(), &config)?;

        let mut envs = Vec::with_capacity(roots.len());
        for root in &mut roots {
            let env = CompletionEnvironment::new()?;
            env.attach(root)?;
            envs.push(env);
        }
        debug!(roots = roots.len(), "scheduler created");
        Ok(Self {
            roots,
            envs,
            cancellation: None,
            config,
        })
    }

    /// Finishes the run as soon as `cancellation` is signaled.
    ///
    /// The cancellation signal takes one slot of the wait set.
    pub fn until(mut self, cancellation: Signal) -> Result<Self> {
        check_wait_limit(self.roots.len() + 1, &self.config)?;
        self.cancellation = Some(cancellation);
        Ok(self)
    }

    /// Number of roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// True if there are no roots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The configuration the scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The environment of root `index`.
    #[must_use]
    pub fn environment(&self, index: usize) -> Option<&CompletionEnvironment> {
        self.envs.get(index)
    }

    /// Blocks until the cancellation signal or any unfinished chain's
    /// governing waitable is signaled, or `timeout` elapses.
    pub fn wait_step(&self, timeout: Option<Duration>) -> Result<Wakeup> {
        let mut signals = Vec::with_capacity(self.envs.len() + 1);
        let mut owners = Vec::with_capacity(self.envs.len() + 1);
        if let Some(cancellation) = self.cancellation {
            signals.push(cancellation);
            owners.push(Wakeup::Cancellation);
        }
        for (index, env) in self.envs.iter().enumerate() {
            if !env.is_finished() {
                signals.push(env.governing());
                owners.push(Wakeup::Root(index));
            }
        }
        if signals.is_empty() {
            return Ok(Wakeup::Timeout);
        }

        let fired = wait_any(&signals, timeout)?;
        let wakeup = fired.map_or(Wakeup::Timeout, |i| owners[i]);
        trace!(?wakeup, waiting = signals.len(), "wait step");
        Ok(wakeup)
    }

    /// Advances every chain once. Chains whose waitable is not signaled,
    /// and finished chains, are left alone.
    ///
    /// A chain whose signal cannot be checked does not hold back the others;
    /// the first such error is returned after every chain had its turn.
    pub fn step(&mut self) -> Result<usize> {
        let mut resumed = 0;
        let mut first_err = None;
        for (index, (env, root)) in self.envs.iter().zip(self.roots.iter_mut()).enumerate() {
            match env.advance(root) {
                Ok(true) => resumed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(root = index, error = %err, "advance failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        trace!(resumed, "step");
        first_err.map_or(Ok(resumed), Err)
    }

    /// True if cancellation is signaled or every chain has finished.
    pub fn is_finished(&self) -> Result<bool> {
        if let Some(cancellation) = self.cancellation {
            if cancellation.is_signaled()? {
                return Ok(true);
            }
        }
        Ok(self.all_chains_finished())
    }

    /// Alternates [`wait_step`](Self::wait_step) and [`step`](Self::step)
    /// until [`is_finished`](Self::is_finished).
    ///
    /// Chains still in flight when cancellation fires are left as they are;
    /// call [`shutdown`](Self::shutdown) to cancel and drain them.
    pub fn run(&mut self) -> Result<()> {
        let span = debug_span!("scheduler_run", roots = self.roots.len());
        let _entered = span.enter();
        while !self.is_finished()? {
            if self.wait_step(None)? == Wakeup::Cancellation {
                info!("cancellation signaled");
                continue;
            }
            self.step()?;
        }
        debug!(
            live = self.envs.iter().filter(|e| !e.is_finished()).count(),
            "run finished"
        );
        Ok(())
    }

    /// The terminal result of root `index`, if it has finished and the
    /// result was not taken.
    #[must_use]
    pub fn root_result(&self, index: usize) -> Option<&Result<()>> {
        self.roots.get(index).and_then(Task::result)
    }

    /// Takes the terminal results of all roots, in order. `None` for roots
    /// that have not finished.
    pub fn take_results(&mut self) -> Vec<Option<Result<()>>> {
        self.roots.iter_mut().map(Task::take_result).collect()
    }

    /// Cancels every unfinished chain and drives them until all are
    /// terminal.
    pub fn shutdown(&mut self) -> Result<()> {
        let live = self.envs.iter().filter(|e| !e.is_finished()).count();
        if live == 0 {
            return Ok(());
        }
        warn!(live, "shutting down live chains");
        for env in self.envs.iter().filter(|e| !e.is_finished()) {
            env.cancel()?;
        }
        while !self.all_chains_finished() {
            if self.step()? == 0 {
                return Err(Error::new(ErrorKind::Cancelled)
                    .with_message("a cancelled chain stopped making progress"));
            }
        }
        Ok(())
    }

    fn all_chains_finished(&self) -> bool {
        self.envs.iter().all(CompletionEnvironment::is_finished)
    }
}

impl Drop for Scheduler<'_> {
    fn drop(&mut self) {
        if self.all_chains_finished() {
            return;
        }
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "failed to drain chains on drop");
        }
    }
}

impl std::fmt::Debug for Scheduler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("roots", &self.roots)
            .field("cancellation", &self.cancellation)
            .field("config", &self.config)
            .finish()
    }
}

fn check_wait_limit(waitables: usize, config: &SchedulerConfig) -> Result<()> {
    if waitables > config.max_wait_objects {
        return Err(Error::new(ErrorKind::WaitLimitExceeded).with_message(format!(
            "{waitables} waitables, limit is {}",
            config.max_wait_objects
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{completion, current_env};
    use crate::sys::Event;
    use crate::test_utils::init_test;
    use std::cell::Cell;

    fn sleeper<'a>(delay: Duration, done: &'a Cell<u32>) -> Task<'a, ()> {
        Task::new(async move {
            let env = current_env().await?;
            let completer = env.operation().begin()?;
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                completer.complete(Ok(0));
            });
            completion().await?;
            env.operation().take_result().transpose()?;
            done.set(done.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn all_roots_finish() {
        init_test("all_roots_finish");
        let done = Cell::new(0);
        let roots = (0..4).map(|i| sleeper(Duration::from_millis(2 * i), &done));
        let mut scheduler = Scheduler::new(roots).unwrap();
        scheduler.run().unwrap();
        assert_eq!(done.get(), 4);
        for result in scheduler.take_results() {
            assert!(matches!(result, Some(Ok(()))));
        }
        crate::test_complete!("all_roots_finish");
    }

    #[test]
    fn wait_limit_is_enforced() {
        init_test("wait_limit_is_enforced");
        let config = SchedulerConfig::default().max_wait_objects(2);
        let roots = (0..3).map(|_| Task::new(async { Ok(()) }));
        let err = Scheduler::with_config(roots, config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WaitLimitExceeded);

        let cancel = Event::new().unwrap();
        let roots = (0..2).map(|_| Task::new(async { Ok(()) }));
        let err = Scheduler::with_config(roots, config)
            .unwrap()
            .until(cancel.as_signal())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WaitLimitExceeded);
        crate::test_complete!("wait_limit_is_enforced");
    }

    #[test]
    fn cancellation_short_circuits_and_shutdown_drains() {
        init_test("cancellation_short_circuits_and_shutdown_drains");
        let cancel = Event::new().unwrap();
        let roots = (0..2).map(|_| {
            Task::new(async {
                completion().await?;
                Ok(())
            })
        });
        let mut scheduler = Scheduler::new(roots)
            .unwrap()
            .until(cancel.as_signal())
            .unwrap();
        // Let both roots reach their first suspension.
        scheduler.step().unwrap();
        cancel.set().unwrap();
        scheduler.run().unwrap();
        assert!(scheduler.is_finished().unwrap());
        assert!(scheduler.root_result(0).is_none());

        scheduler.shutdown().unwrap();
        for result in scheduler.take_results() {
            let err = result.unwrap().unwrap_err();
            assert!(err.is_cancelled());
        }
        crate::test_complete!("cancellation_short_circuits_and_shutdown_drains");
    }

    #[test]
    fn wait_step_reports_timeout_and_root() {
        init_test("wait_step_reports_timeout_and_root");
        let external = Event::new().unwrap();
        let signal = external.as_signal();
        let mut scheduler = Scheduler::new([Task::new(async move {
            crate::runtime::signaled(signal).await?;
            Ok(())
        })])
        .unwrap();
        assert_eq!(scheduler.wait_step(None).unwrap(), Wakeup::Root(0));
        scheduler.step().unwrap();
        assert_eq!(
            scheduler.wait_step(Some(Duration::from_millis(5))).unwrap(),
            Wakeup::Timeout
        );
        external.set().unwrap();
        assert_eq!(scheduler.wait_step(None).unwrap(), Wakeup::Root(0));
        scheduler.step().unwrap();
        assert!(scheduler.is_finished().unwrap());
        crate::test_complete!("wait_step_reports_timeout_and_root");
    }

    #[test]
    fn a_failing_root_does_not_hold_back_the_others() {
        init_test("a_failing_root_does_not_hold_back_the_others");
        // No process can have a descriptor this large open.
        let dangling = crate::sys::Signal::from_raw(i32::MAX - 1, crate::sys::Readiness::Readable);
        let broken = Task::new(async move {
            crate::runtime::signaled(dangling).await?;
            Ok(())
        });
        let healthy = Task::new(async {
            let env = current_env().await?;
            assert!(env.operation().begin()?.complete(Ok(3)));
            completion().await?;
            assert_eq!(env.operation().collect()?, 3);
            Ok(())
        });
        let mut scheduler = Scheduler::new([broken, healthy]).unwrap();
        assert_eq!(scheduler.step().unwrap(), 2);

        let err = scheduler.step().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        crate::assert_with_log!(
            matches!(scheduler.root_result(1), Some(Ok(()))),
            "healthy root resumed",
            "Some(Ok(()))",
            scheduler.root_result(1)
        );
        assert!(scheduler.root_result(0).is_none());

        scheduler.shutdown().unwrap();
        let mut results = scheduler.take_results();
        let err = results.remove(0).unwrap().unwrap_err();
        assert!(err.is_cancelled());
        crate::test_complete!("a_failing_root_does_not_hold_back_the_others");
    }

    #[test]
    fn drop_drains_live_chains() {
        init_test("drop_drains_live_chains");
        let observed = Cell::new(false);
        {
            let mut scheduler = Scheduler::new([Task::new(async {
                let outcome = completion().await;
                observed.set(outcome.as_ref().is_err_and(|e| e.is_cancelled()));
                outcome
            })])
            .unwrap();
            scheduler.step().unwrap();
        }
        assert!(observed.get());
        crate::test_complete!("drop_drains_live_chains");
    }
}
