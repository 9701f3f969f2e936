//! State-holding hooks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::life_cycle::{current_hook, WeakHook};
use crate::error::HookError;

/// Returns the element's state and a setter. `initial` is only used on the
/// first render.
pub fn use_state<T>(initial: T) -> Result<(T, SetState<T>), HookError>
where
    T: Clone + PartialEq + 'static,
{
    use_state_with(move || initial)
}

/// Like [`use_state`], computing the initial value lazily.
pub fn use_state_with<T, F>(init: F) -> Result<(T, SetState<T>), HookError>
where
    T: Clone + PartialEq + 'static,
    F: FnOnce() -> T,
{
    let hook = current_hook()?;
    let cell = hook.use_state(|| RefCell::new(init()))?;
    let current = cell.borrow().clone();
    Ok((
        current,
        SetState {
            cell,
            hook: hook.downgrade(),
        },
    ))
}

/// Replaces a [`use_state`] value and schedules a render when it changed.
pub struct SetState<T> {
    cell: Rc<RefCell<T>>,
    hook: WeakHook,
}

impl<T: Clone + PartialEq + 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.commit(value);
    }

    /// Computes the next value from the latest committed one, which may be newer
    /// than the value the element last rendered with.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.cell.borrow().clone();
        self.commit(f(&current));
    }

    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }

    fn commit(&self, next: T) {
        {
            let mut current = self.cell.borrow_mut();
            if *current == next {
                return;
            }
            *current = next;
        }
        self.hook.schedule_render();
    }
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<T> PartialEq for SetState<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: fmt::Debug> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetState").field(&*self.cell.borrow()).finish()
    }
}

/// A mutable box that survives renders. Writing to it does not schedule a render.
pub struct Ref<T> {
    cell: Rc<RefCell<T>>,
}

impl<T> Ref<T> {
    pub fn current(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }

    /// Stores `value`, returning the previous one.
    pub fn set_current(&self, value: T) -> T {
        self.cell.replace(value)
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.cell.borrow_mut())
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&*self.cell.borrow()).finish()
    }
}

pub fn use_ref<T: 'static>(initial: T) -> Result<Ref<T>, HookError> {
    let hook = current_hook()?;
    let cell = hook.use_state(|| RefCell::new(initial))?;
    Ok(Ref { cell })
}

/// Sends actions through a [`use_reducer`] reducer.
pub struct Dispatch<S, A> {
    set_state: SetState<S>,
    reducer: Rc<dyn Fn(&S, A) -> S>,
}

impl<S: Clone + PartialEq + 'static, A> Dispatch<S, A> {
    pub fn dispatch(&self, action: A) {
        let reducer = self.reducer.clone();
        self.set_state.update(move |state| reducer(state, action));
    }
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            set_state: self.set_state.clone(),
            reducer: self.reducer.clone(),
        }
    }
}

pub fn use_reducer<S, A, R>(reducer: R, initial: S) -> Result<(S, Dispatch<S, A>), HookError>
where
    S: Clone + PartialEq + 'static,
    R: Fn(&S, A) -> S + 'static,
{
    let (state, set_state) = use_state(initial)?;
    Ok((
        state,
        Dispatch {
            set_state,
            reducer: Rc::new(reducer),
        },
    ))
}

/// Forces a render of the element that created it.
#[derive(Clone, Debug)]
pub struct Update {
    hook: WeakHook,
}

impl Update {
    pub fn schedule(&self) {
        self.hook.schedule_render();
    }
}

pub fn use_update() -> Result<Update, HookError> {
    let hook = current_hook()?;
    Ok(Update {
        hook: hook.downgrade(),
    })
}
