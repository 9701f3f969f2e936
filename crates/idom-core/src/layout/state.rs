//! Bookkeeping for mounted elements and the handlers their models publish.

use std::rc::{Rc, Weak};

use crate::collections::{map::HashMap, IdSet};
use crate::element::{Element, ElementRef};
use crate::events::EventHandler;
use crate::hooks::LifeCycleHook;
use crate::ids::ElementId;

pub(crate) struct ElementState {
    pub(crate) parent: Option<ElementId>,
    pub(crate) name: String,
    /// Elements referenced by this element's current model.
    pub(crate) inner_elements: IdSet,
    /// Descriptors registered by this element's current model.
    pub(crate) event_handlers: Vec<String>,
    pub(crate) element: Weak<dyn Element>,
    pub(crate) hook: LifeCycleHook,
}

impl ElementState {
    pub(crate) fn new(element: &ElementRef, parent: Option<ElementId>, hook: LifeCycleHook) -> Self {
        Self {
            parent,
            name: element.name().into_owned(),
            inner_elements: IdSet::default(),
            event_handlers: Vec::new(),
            element: Rc::downgrade(element),
            hook,
        }
    }
}

struct RegisteredHandler {
    handler: EventHandler,
    owners: usize,
}

/// Handlers reachable from the current models, by descriptor.
///
/// The same handler may appear in several models; it stays registered until the
/// last of them is gone.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: HashMap<String, RegisteredHandler>,
}

impl HandlerRegistry {
    pub(crate) fn register(&mut self, handler: &EventHandler) -> String {
        let descriptor = handler.descriptor();
        self.handlers
            .entry(descriptor.clone())
            .or_insert_with(|| RegisteredHandler {
                handler: handler.clone(),
                owners: 0,
            })
            .owners += 1;
        descriptor
    }

    pub(crate) fn unregister_all(&mut self, descriptors: &[String]) {
        for descriptor in descriptors {
            if let Some(entry) = self.handlers.get_mut(descriptor) {
                entry.owners -= 1;
                if entry.owners == 0 {
                    self.handlers.remove(descriptor);
                }
            }
        }
    }

    pub(crate) fn get(&self, descriptor: &str) -> Option<EventHandler> {
        self.handlers
            .get(descriptor)
            .map(|entry| entry.handler.clone())
    }

    pub(crate) fn contains(&self, descriptor: &str) -> bool {
        self.handlers.contains_key(descriptor)
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}
