//! Event handlers and the events clients send back to a layout.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::HandlerId;

/// What a handler callback may return: nothing, or a result.
pub trait HandlerOutput {
    fn into_result(self) -> anyhow::Result<()>;
}

impl HandlerOutput for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> HandlerOutput for Result<(), E> {
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

type SyncCallback = Rc<dyn Fn(&[Value]) -> anyhow::Result<()>>;
type AsyncCallback = Rc<dyn Fn(Vec<Value>) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

#[derive(Clone)]
enum Callback {
    Sync(SyncCallback),
    Async(AsyncCallback),
}

struct HandlerInner {
    id: HandlerId,
    callbacks: RefCell<Vec<Callback>>,
}

/// A set of callbacks registered under one opaque id.
///
/// Cloning shares the callback list. Equality is identity.
#[derive(Clone)]
pub struct EventHandler {
    inner: Rc<HandlerInner>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HandlerInner {
                id: HandlerId::next(),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn from_fn<F, R>(callback: F) -> Self
    where
        F: Fn(&[Value]) -> R + 'static,
        R: HandlerOutput + 'static,
    {
        let handler = Self::new();
        handler.add(callback);
        handler
    }

    pub fn from_async<F, Fut, R>(callback: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: HandlerOutput + 'static,
    {
        let handler = Self::new();
        handler.add_async(callback);
        handler
    }

    /// A new handler that invokes every callback of `handlers`, in order.
    pub fn merged<'a>(handlers: impl IntoIterator<Item = &'a EventHandler>) -> Self {
        let merged = Self::new();
        {
            let mut callbacks = merged.inner.callbacks.borrow_mut();
            for handler in handlers {
                callbacks.extend(handler.inner.callbacks.borrow().iter().cloned());
            }
        }
        merged
    }

    pub fn add<F, R>(&self, callback: F) -> &Self
    where
        F: Fn(&[Value]) -> R + 'static,
        R: HandlerOutput + 'static,
    {
        let callback: SyncCallback = Rc::new(move |data| callback(data).into_result());
        self.inner.callbacks.borrow_mut().push(Callback::Sync(callback));
        self
    }

    pub fn add_async<F, Fut, R>(&self, callback: F) -> &Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: HandlerOutput + 'static,
    {
        let callback: AsyncCallback =
            Rc::new(move |data| callback(data).map(HandlerOutput::into_result).boxed_local());
        self.inner.callbacks.borrow_mut().push(Callback::Async(callback));
        self
    }

    pub fn clear(&self) {
        self.inner.callbacks.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn id(&self) -> HandlerId {
        self.inner.id
    }

    /// The string a client echoes back as [`LayoutEvent::target`].
    pub fn descriptor(&self) -> String {
        self.inner.id.to_string()
    }

    /// Invokes every callback with `data`. All callbacks run even when one fails;
    /// the first failure is returned.
    pub async fn call(&self, data: Vec<Value>) -> anyhow::Result<()> {
        let callbacks = self.inner.callbacks.borrow().clone();
        let mut first_error = None;
        for callback in callbacks {
            let result = match callback {
                Callback::Sync(callback) => callback(&data),
                Callback::Async(callback) => callback(data.clone()).await,
            };
            if let Err(err) = result {
                if first_error.is_some() {
                    log::error!("event handler {} failed: {err:#}", self.inner.id);
                } else {
                    first_error = Some(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EventHandler {}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("id", &self.inner.id)
            .field("callbacks", &self.len())
            .finish()
    }
}

/// An event sent by a client: the handler descriptor it targets and its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEvent {
    pub target: String,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl LayoutEvent {
    pub fn new(target: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::executor::block_on;
    use serde_json::json;

    use super::*;

    #[test]
    fn every_callback_runs_even_after_a_failure() {
        let calls = Rc::new(Cell::new(0));
        let handler = EventHandler::new();
        handler.add(|_| Err::<(), _>(anyhow::anyhow!("first")));
        let seen = calls.clone();
        handler.add(move |data: &[Value]| {
            assert_eq!(data, &[json!(1)]);
            seen.set(seen.get() + 1);
        });
        let seen = calls.clone();
        handler.add_async(move |_| {
            let seen = seen.clone();
            async move { seen.set(seen.get() + 1) }
        });

        let err = block_on(handler.call(vec![json!(1)])).unwrap_err();
        assert_eq!(err.to_string(), "first");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn merged_handler_invokes_both_sources() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let a = EventHandler::from_fn(move |_| seen.set(seen.get() + 1));
        let seen = calls.clone();
        let b = EventHandler::from_fn(move |_| seen.set(seen.get() + 10));
        let merged = EventHandler::merged([&a, &b]);
        assert_ne!(merged.id(), a.id());
        block_on(merged.call(Vec::new())).unwrap();
        assert_eq!(calls.get(), 11);
    }

    #[test]
    fn event_payload_defaults_to_empty() {
        let event: LayoutEvent = serde_json::from_value(json!({ "target": "a1" })).unwrap();
        assert_eq!(event, LayoutEvent::new("a1", Vec::new()));
    }
}
