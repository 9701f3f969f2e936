//! Side effects tied to an element's life cycle.
//!
//! An effect runs after the render that (re)created it. Its cleanup runs before
//! the effect runs again and when the element unmounts.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use futures::FutureExt;
use tokio::task::JoinHandle;

use super::deps::Dependencies;
use super::life_cycle::{current_hook, Effect, EffectEvent};
use crate::error::HookError;

/// What an effect leaves behind to undo itself.
#[derive(Default)]
#[must_use]
pub struct Cleanup {
    f: Option<Box<dyn FnOnce()>>,
}

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self {
            f: Some(Box::new(f)),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("present", &self.f.is_some())
            .finish()
    }
}

/// Handed to [`use_effect`] callbacks.
#[derive(Clone, Copy, Debug, Default)]
pub struct EffectScope;

impl EffectScope {
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) -> Cleanup {
        Cleanup::new(f)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    CompletedOk,
    CompletedErr,
    Cancelled,
}

/// A spawned async effect.
///
/// Finishing the task cancels it if it is still running, and re-raises its
/// error if it failed.
pub struct EffectTask {
    state: TaskState,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
    error: Option<anyhow::Error>,
}

impl EffectTask {
    /// Spawns `future` on the current `LocalSet`.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self {
            state: TaskState::Pending,
            handle: Some(tokio::task::spawn_local(future)),
            error: None,
        }
    }

    pub fn state(&mut self) -> TaskState {
        self.poll_outcome();
        self.state
    }

    fn poll_outcome(&mut self) {
        if self.state != TaskState::Pending {
            return;
        }
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if !handle.is_finished() {
            return;
        }
        let Some(outcome) = tokio::task::unconstrained(handle).now_or_never() else {
            return;
        };
        self.handle = None;
        self.state = match outcome {
            Ok(Ok(())) => TaskState::CompletedOk,
            Ok(Err(err)) => {
                self.error = Some(err);
                TaskState::CompletedErr
            }
            Err(join_error) if join_error.is_cancelled() => TaskState::Cancelled,
            Err(join_error) => {
                self.error = Some(anyhow::anyhow!("async effect panicked: {join_error}"));
                TaskState::CompletedErr
            }
        };
    }

    pub fn cancel(&mut self) {
        self.poll_outcome();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.state = TaskState::Cancelled;
        }
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.cancel();
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for EffectTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for EffectTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectTask").field("state", &self.state).finish()
    }
}

enum PendingCleanup {
    Sync(Box<dyn FnOnce()>),
    Task(EffectTask),
}

impl PendingCleanup {
    fn run(self) -> anyhow::Result<()> {
        match self {
            PendingCleanup::Sync(f) => {
                f();
                Ok(())
            }
            PendingCleanup::Task(task) => task.finish(),
        }
    }
}

#[derive(Default)]
struct EffectState {
    fingerprint: Option<u64>,
    has_run: bool,
    cleanup: Option<PendingCleanup>,
}

impl EffectState {
    fn is_stale(&self, fingerprint: Option<u64>) -> bool {
        !self.has_run || fingerprint.is_none() || fingerprint != self.fingerprint
    }
}

impl Drop for EffectState {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            if let Err(err) = cleanup.run() {
                log::error!("effect cleanup failed while dropping: {err:#}");
            }
        }
    }
}

type EffectSlot = RefCell<EffectState>;

fn run_cleanup(slot: &EffectSlot) -> anyhow::Result<()> {
    let cleanup = slot.borrow_mut().cleanup.take();
    cleanup.map_or(Ok(()), PendingCleanup::run)
}

/// Registers the did-render and will-unmount effects shared by both effect hooks.
fn schedule_effect<D: Dependencies>(
    deps: D,
    launch: impl FnOnce() -> Option<PendingCleanup> + 'static,
) -> Result<(), HookError> {
    let hook = current_hook()?;
    let slot = hook.use_state(EffectSlot::default)?;
    let fingerprint = deps.fingerprint();

    if slot.borrow().is_stale(fingerprint) {
        let state = slot.clone();
        let effect = Effect::new(move || {
            let cleaned = run_cleanup(&state);
            let cleanup = launch();
            {
                let mut state = state.borrow_mut();
                state.fingerprint = fingerprint;
                state.has_run = true;
                state.cleanup = cleanup;
            }
            cleaned
        });
        hook.use_effect(effect, &[EffectEvent::DidRender]);
    }

    let state = slot.clone();
    hook.use_effect(
        Effect::new(move || run_cleanup(&state)),
        &[EffectEvent::WillUnmount],
    );
    Ok(())
}

/// Runs `effect` after the render, again whenever `deps` changes, and every
/// render when `deps` is `()` or empty.
///
/// The returned [`Cleanup`] runs after the next render whose `deps` differ, right
/// before the replacement effect, and when the element unmounts. A render with
/// unchanged `deps` runs neither.
pub fn use_effect<F, D>(effect: F, deps: D) -> Result<(), HookError>
where
    F: FnOnce(EffectScope) -> Cleanup + 'static,
    D: Dependencies,
{
    schedule_effect(deps, move || effect(EffectScope).f.map(PendingCleanup::Sync))
}

/// Like [`use_effect`] for an async effect, which is spawned on the current
/// `LocalSet`. Its cleanup cancels it if still running and surfaces its error.
pub fn use_async_effect<F, Fut, D>(effect: F, deps: D) -> Result<(), HookError>
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
    D: Dependencies,
{
    schedule_effect(deps, move || {
        Some(PendingCleanup::Task(EffectTask::spawn(effect())))
    })
}

/// Runs `effect` once, after the element's first render. Its cleanup runs when
/// the element unmounts.
pub fn use_mount_effect<F>(effect: F) -> Result<(), HookError>
where
    F: FnOnce(EffectScope) -> Cleanup + 'static,
{
    use_effect(effect, (MountOnly,))
}

#[derive(Hash)]
struct MountOnly;
