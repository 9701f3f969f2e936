//! Per-element render state: hook slots, effect queues, and render scheduling.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::mem;
use std::rc::{Rc, Weak};

use crate::element::{Element, ElementRef};
use crate::error::HookError;
use crate::ids::ElementId;

tokio::task_local! {
    static CURRENT_HOOK: LifeCycleHook;
}

/// The hook of the element currently rendering.
pub fn current_hook() -> Result<LifeCycleHook, HookError> {
    CURRENT_HOOK
        .try_with(LifeCycleHook::clone)
        .map_err(|_| HookError::NoActiveHook)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EffectEvent {
    WillRender,
    DidRender,
    WillUnmount,
}

type EffectFn = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// A one-shot callback that may be queued for several events; it runs on the
/// first of them and is a no-op afterwards.
#[derive(Clone)]
pub struct Effect(Rc<RefCell<Option<EffectFn>>>);

impl Effect {
    pub fn new(effect: impl FnOnce() -> anyhow::Result<()> + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(effect)))))
    }

    pub fn from_fn(effect: impl FnOnce() + 'static) -> Self {
        Self::new(move || {
            effect();
            Ok(())
        })
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let effect = self.0.borrow_mut().take();
        match effect {
            Some(effect) => effect(),
            None => Ok(()),
        }
    }

    pub fn has_run(&self) -> bool {
        self.0.borrow().is_none()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("has_run", &self.has_run()).finish()
    }
}

#[derive(Default)]
struct EventEffects {
    will_render: Vec<Effect>,
    did_render: Vec<Effect>,
    will_unmount: Vec<Effect>,
}

impl EventEffects {
    fn list_mut(&mut self, event: EffectEvent) -> &mut Vec<Effect> {
        match event {
            EffectEvent::WillRender => &mut self.will_render,
            EffectEvent::DidRender => &mut self.did_render,
            EffectEvent::WillUnmount => &mut self.will_unmount,
        }
    }
}

type ScheduleRender = Box<dyn Fn(&ElementRef)>;

struct HookInner {
    element_id: ElementId,
    element: Weak<dyn Element>,
    schedule_render: ScheduleRender,
    slots: RefCell<Vec<Rc<dyn Any>>>,
    slot_index: Cell<usize>,
    render_is_scheduled: Cell<bool>,
    is_rendering: Cell<bool>,
    schedule_render_later: Cell<bool>,
    unmounted: Cell<bool>,
    effects: RefCell<EventEffects>,
}

/// Tracks one element across renders.
///
/// Hook slots are matched to hook calls by position, so an element must call its
/// hooks in the same order on every render.
#[derive(Clone)]
pub struct LifeCycleHook {
    inner: Rc<HookInner>,
}

impl LifeCycleHook {
    pub fn new(element: &ElementRef, schedule_render: impl Fn(&ElementRef) + 'static) -> Self {
        Self {
            inner: Rc::new(HookInner {
                element_id: element.id(),
                element: Rc::downgrade(element),
                schedule_render: Box::new(schedule_render),
                slots: RefCell::new(Vec::new()),
                slot_index: Cell::new(0),
                render_is_scheduled: Cell::new(false),
                is_rendering: Cell::new(false),
                schedule_render_later: Cell::new(false),
                unmounted: Cell::new(false),
                effects: RefCell::new(EventEffects::default()),
            }),
        }
    }

    pub fn element_id(&self) -> ElementId {
        self.inner.element_id
    }

    pub fn element(&self) -> Option<ElementRef> {
        self.inner.element.upgrade()
    }

    pub fn is_rendering(&self) -> bool {
        self.inner.is_rendering.get()
    }

    pub fn render_is_scheduled(&self) -> bool {
        self.inner.render_is_scheduled.get()
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.unmounted.get()
    }

    pub fn downgrade(&self) -> WeakHook {
        WeakHook(Rc::downgrade(&self.inner))
    }

    /// Requests a render of the element. Coalesces with an already pending
    /// request, and defers until the current render finishes when called mid-render.
    pub fn schedule_render(&self) {
        let inner = &self.inner;
        if inner.unmounted.get() {
            log::debug!("ignoring render request for unmounted element {}", inner.element_id);
        } else if inner.is_rendering.get() {
            inner.schedule_render_later.set(true);
        } else if !inner.render_is_scheduled.get() {
            self.schedule_now();
        }
    }

    fn schedule_now(&self) {
        let inner = &self.inner;
        match inner.element.upgrade() {
            Some(element) => {
                inner.render_is_scheduled.set(true);
                (inner.schedule_render)(&element);
            }
            None => log::debug!("element {} was dropped before it could render", inner.element_id),
        }
    }

    /// Returns the value held by the next hook slot, creating it with `init` on the
    /// first render. `init` must not call hooks itself.
    pub fn use_state<T: 'static>(&self, init: impl FnOnce() -> T) -> Result<Rc<T>, HookError> {
        let index = self.inner.slot_index.get();
        self.inner.slot_index.set(index + 1);
        let existing = self.inner.slots.borrow().get(index).cloned();
        match existing {
            Some(slot) => slot.downcast::<T>().map_err(|_| HookError::SlotTypeMismatch {
                index,
                expected: type_name::<T>(),
            }),
            None => {
                let value = Rc::new(init());
                let mut slots = self.inner.slots.borrow_mut();
                debug_assert_eq!(slots.len(), index, "hook slot initializer called hooks");
                slots.push(value.clone());
                Ok(value)
            }
        }
    }

    /// Queues `effect` to run at the next occurrence of each of `events`.
    pub fn use_effect(&self, effect: Effect, events: &[EffectEvent]) {
        let mut effects = self.inner.effects.borrow_mut();
        for &event in events {
            effects.list_mut(event).push(effect.clone());
        }
    }

    pub fn element_will_render(&self) -> anyhow::Result<()> {
        let inner = &self.inner;
        inner.render_is_scheduled.set(false);
        inner.is_rendering.set(true);
        inner.slot_index.set(0);
        let will_render = {
            let mut effects = inner.effects.borrow_mut();
            effects.will_unmount.clear();
            mem::take(&mut effects.will_render)
        };
        run_effects(inner.element_id, will_render)
    }

    pub fn element_did_render(&self) -> anyhow::Result<()> {
        let did_render = mem::take(&mut self.inner.effects.borrow_mut().did_render);
        let result = run_effects(self.inner.element_id, did_render);
        self.finish_render();
        result
    }

    /// Ends a render that failed: effects queued for after the render are dropped.
    pub fn element_render_aborted(&self) {
        self.inner.effects.borrow_mut().did_render.clear();
        self.finish_render();
    }

    pub fn element_will_unmount(&self) -> anyhow::Result<()> {
        let will_unmount = mem::take(&mut self.inner.effects.borrow_mut().will_unmount);
        run_effects(self.inner.element_id, will_unmount)
    }

    /// Marks the element as removed from its layout; later render requests are ignored.
    pub fn mark_unmounted(&self) {
        self.inner.unmounted.set(true);
        self.inner.schedule_render_later.set(false);
    }

    fn finish_render(&self) {
        let inner = &self.inner;
        inner.is_rendering.set(false);
        inner.slot_index.set(0);
        if inner.schedule_render_later.replace(false) && !inner.unmounted.get() {
            self.schedule_now();
        }
    }

    /// Runs `future` with this hook installed as the current one.
    pub async fn scope<F: Future>(&self, future: F) -> F::Output {
        CURRENT_HOOK.scope(self.clone(), future).await
    }

    /// Runs `f` with this hook installed as the current one.
    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT_HOOK.sync_scope(self.clone(), f)
    }
}

fn run_effects(element: ElementId, effects: Vec<Effect>) -> anyhow::Result<()> {
    let mut first_error = None;
    for effect in effects {
        if let Err(err) = effect.run() {
            if first_error.is_some() {
                log::error!("life cycle effect of element {element} failed: {err:#}");
            } else {
                first_error = Some(err);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

impl fmt::Debug for LifeCycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifeCycleHook")
            .field("element", &self.inner.element_id)
            .field("slots", &self.inner.slots.borrow().len())
            .field("is_rendering", &self.inner.is_rendering.get())
            .field("render_is_scheduled", &self.inner.render_is_scheduled.get())
            .finish()
    }
}

/// A non-owning reference to a [`LifeCycleHook`], held by setters and callbacks.
#[derive(Clone)]
pub struct WeakHook(Weak<HookInner>);

impl WeakHook {
    pub fn upgrade(&self) -> Option<LifeCycleHook> {
        self.0.upgrade().map(|inner| LifeCycleHook { inner })
    }

    pub fn schedule_render(&self) {
        if let Some(hook) = self.upgrade() {
            hook.schedule_render();
        }
    }
}

impl fmt::Debug for WeakHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakHook")
    }
}

#[cfg(test)]
#[path = "tests/life_cycle_tests.rs"]
mod tests;
