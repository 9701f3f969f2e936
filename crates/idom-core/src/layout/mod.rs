//! Reconciles a tree of elements into serialized models.
//!
//! A [`Layout`] owns the state of every mounted element. Each call to
//! [`Layout::render`] waits for queued elements, renders them (and any new or
//! changed nested elements) and reports the result as a [`LayoutUpdate`].

mod queue;
mod state;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::collections::VecDeque;
use std::mem;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::collections::{IdMap, IdSet};
use crate::config::Config;
use crate::element::ElementRef;
use crate::error::{LayoutError, RenderError};
use crate::events::LayoutEvent;
use crate::hooks::LifeCycleHook;
use crate::ids::ElementId;
use crate::model::{into_root_container, prepare_tree, Container};
use crate::vdom::{self, validate_vdom, VdomJson};

use queue::RenderQueue;
use state::{ElementState, HandlerRegistry};

/// The outcome of one render pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutUpdate {
    /// The shallowest element rendered in the pass.
    pub src: ElementId,
    /// Fresh models of every element rendered in the pass.
    pub new: IndexMap<ElementId, VdomJson>,
    /// Elements removed from the tree during the pass.
    pub old: Vec<ElementId>,
}

impl LayoutUpdate {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.old.is_empty()
    }

    pub fn model(&self, id: ElementId) -> Option<&VdomJson> {
        self.new.get(&id)
    }
}

pub(crate) struct LayoutInner {
    root: ElementRef,
    config: Config,
    states: RefCell<IdMap<ElementState>>,
    handlers: RefCell<HandlerRegistry>,
    queue: RenderQueue,
    rendering: Cell<bool>,
    closed: Cell<bool>,
}

impl LayoutInner {
    fn update(&self, element: &ElementRef) -> bool {
        if self.closed.get() {
            log::debug!("not rendering {} ({}); layout is closed", element.name(), element.id());
            return false;
        }
        let queued = self.queue.put(element);
        if queued {
            log::trace!("queued render of {} ({})", element.name(), element.id());
        }
        queued
    }
}

/// A non-owning handle elements use to request renders from their layout.
#[derive(Clone)]
pub struct LayoutHandle(Weak<LayoutInner>);

impl LayoutHandle {
    /// Queues `element` for the next render pass. Returns `false` if it was already
    /// queued or the layout is closed or gone.
    pub fn update(&self, element: &ElementRef) -> bool {
        match self.0.upgrade() {
            Some(inner) => inner.update(element),
            None => {
                log::debug!("not rendering {}; layout was dropped", element.id());
                false
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.upgrade().is_some_and(|inner| !inner.closed.get())
    }
}

impl fmt::Debug for LayoutHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

struct RenderGuard<'a>(&'a Cell<bool>);

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct RenderPass<'a> {
    layout: &'a Layout,
    /// Queued roots not rendered yet.
    roots: VecDeque<ElementRef>,
    new: IndexMap<ElementId, VdomJson>,
    rendered: Vec<LifeCycleHook>,
    visited: IdSet,
    failure: Option<RenderError>,
}

impl RenderPass<'_> {
    fn fail(&mut self, err: RenderError) {
        if self.failure.is_none() {
            self.failure = Some(err);
        } else {
            log::error!("{err}: {:#}", err.cause());
        }
    }
}

impl Drop for RenderPass<'_> {
    // Both lists are empty once a pass completes.
    fn drop(&mut self) {
        for hook in self.rendered.drain(..) {
            hook.element_render_aborted();
        }
        for element in self.roots.drain(..) {
            self.layout.inner.queue.put(&element);
        }
    }
}

/// What an element published before the render in progress replaced it.
#[derive(Default)]
struct Previous {
    children: IdSet,
    handlers: Vec<String>,
}

enum Stage {
    /// The body has not produced a model yet.
    Rendering(Previous),
    /// The new model is published; these old children are not released yet.
    Children(IdSet),
    Done,
}

/// An element whose render is in progress. Dropping it early puts the element's
/// record back so every mounted element stays reachable from the root.
struct Entered<'a> {
    layout: &'a Layout,
    id: ElementId,
    hook: LifeCycleHook,
    stage: Stage,
}

impl Entered<'_> {
    fn abort(&mut self) {
        match mem::replace(&mut self.stage, Stage::Done) {
            Stage::Rendering(previous) => {
                self.hook.element_render_aborted();
                self.layout.restore_element(self.id, previous);
            }
            Stage::Children(leftovers) => self.layout.restore_children(self.id, leftovers),
            Stage::Done => {}
        }
    }

    /// Ends the body stage; the element's model is about to be published.
    fn take_previous(&mut self) -> Previous {
        match mem::replace(&mut self.stage, Stage::Done) {
            Stage::Rendering(previous) => previous,
            _ => Previous::default(),
        }
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.abort();
    }
}

fn link_parent(states: &mut IdMap<ElementState>, id: ElementId, parent: Option<ElementId>) {
    let old_parent = states.get(&id).and_then(|state| state.parent);
    if old_parent != parent {
        if let Some(old_parent) = old_parent {
            if let Some(state) = states.get_mut(&old_parent) {
                state.inner_elements.remove(&id);
            }
        }
        if let Some(state) = states.get_mut(&id) {
            state.parent = parent;
        }
    }
    if let Some(parent) = parent {
        if let Some(state) = states.get_mut(&parent) {
            state.inner_elements.insert(id);
        }
    }
}

fn depth(states: &IdMap<ElementState>, id: ElementId) -> usize {
    let mut depth = 0;
    let mut cursor = states.get(&id).and_then(|state| state.parent);
    while let Some(parent) = cursor {
        depth += 1;
        cursor = states.get(&parent).and_then(|state| state.parent);
    }
    depth
}

#[derive(Clone)]
pub struct Layout {
    inner: Rc<LayoutInner>,
}

impl Layout {
    pub fn new(root: ElementRef) -> Self {
        Self::with_config(root, Config::from_env())
    }

    pub fn with_config(root: ElementRef, config: Config) -> Self {
        let inner = Rc::new(LayoutInner {
            root,
            config,
            states: RefCell::new(IdMap::default()),
            handlers: RefCell::new(HandlerRegistry::default()),
            queue: RenderQueue::new(),
            rendering: Cell::new(false),
            closed: Cell::new(false),
        });
        inner.queue.put(&inner.root);
        Self { inner }
    }

    pub fn root(&self) -> &ElementRef {
        &self.inner.root
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn handle(&self) -> LayoutHandle {
        LayoutHandle(Rc::downgrade(&self.inner))
    }

    /// Queues `element` for the next render pass.
    pub fn update(&self, element: &ElementRef) -> bool {
        self.inner.update(element)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    pub fn is_mounted(&self, id: ElementId) -> bool {
        self.inner.states.borrow().contains_key(&id)
    }

    pub fn mounted_count(&self) -> usize {
        self.inner.states.borrow().len()
    }

    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.inner.states.borrow().get(&id).and_then(|state| state.parent)
    }

    pub fn children_of(&self, id: ElementId) -> Vec<ElementId> {
        let mut children: Vec<_> = self
            .inner
            .states
            .borrow()
            .get(&id)
            .map(|state| state.inner_elements.iter().copied().collect())
            .unwrap_or_default();
        children.sort();
        children
    }

    pub fn hook_of(&self, id: ElementId) -> Option<LifeCycleHook> {
        self.inner.states.borrow().get(&id).map(|state| state.hook.clone())
    }

    pub fn has_handler(&self, descriptor: &str) -> bool {
        self.inner.handlers.borrow().contains(descriptor)
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    pub fn pending_renders(&self) -> usize {
        self.inner.queue.len()
    }

    /// Waits for queued elements and renders them.
    ///
    /// Only one render may be in flight at a time; a second concurrent call fails
    /// with [`LayoutError::AlreadyRendering`].
    pub async fn render(&self) -> Result<LayoutUpdate, LayoutError> {
        let _guard = self.begin_render()?;
        loop {
            let batch = self.inner.queue.next_batch().await;
            if self.inner.closed.get() {
                return Err(LayoutError::Closed);
            }
            let roots = self.renderable_roots(batch);
            if !roots.is_empty() {
                return self.render_pass(roots).await;
            }
        }
    }

    /// Delivers `event` to the handler it targets. Events for handlers that are no
    /// longer published are dropped.
    pub async fn trigger(&self, event: LayoutEvent) -> Result<(), LayoutError> {
        let handler = self.inner.handlers.borrow().get(&event.target);
        match handler {
            Some(handler) => handler
                .call(event.data)
                .await
                .map_err(|source| LayoutError::Handler {
                    target: event.target,
                    source,
                }),
            None => {
                log::debug!("ignored event for unknown handler {}", event.target);
                Ok(())
            }
        }
    }

    /// Unmounts every element. Later updates are ignored and renders fail with
    /// [`LayoutError::Closed`].
    pub fn close(&self) -> Result<(), LayoutError> {
        if self.inner.closed.get() {
            return Ok(());
        }
        if self.inner.rendering.get() {
            return Err(LayoutError::AlreadyRendering);
        }
        self.inner.closed.set(true);
        self.inner.queue.close();
        let root = self.inner.root.id();
        let mounted = self.is_mounted(root);
        if mounted {
            self.delete_element_state(root)
                .map_err(LayoutError::Unmount)?;
        }
        log::debug!("closed layout rooted at {root}");
        Ok(())
    }

    fn begin_render(&self) -> Result<RenderGuard<'_>, LayoutError> {
        if self.inner.closed.get() {
            return Err(LayoutError::Closed);
        }
        if self.inner.rendering.replace(true) {
            return Err(LayoutError::AlreadyRendering);
        }
        Ok(RenderGuard(&self.inner.rendering))
    }

    /// Drops unmounted elements from `batch` and orders the rest ancestors first.
    fn renderable_roots(&self, batch: Vec<ElementRef>) -> Vec<ElementRef> {
        let states = self.inner.states.borrow();
        let root_id = self.inner.root.id();
        let mut roots: Vec<(usize, ElementRef)> = batch
            .into_iter()
            .filter_map(|element| {
                let id = element.id();
                if states.contains_key(&id) {
                    Some((depth(&states, id), element))
                } else if id == root_id {
                    Some((0, element))
                } else {
                    log::debug!("skipped render of {} ({id}); it is not mounted", element.name());
                    None
                }
            })
            .collect();
        roots.sort_by_key(|(depth, _)| *depth);
        roots.into_iter().map(|(_, element)| element).collect()
    }

    async fn render_pass(&self, roots: Vec<ElementRef>) -> Result<LayoutUpdate, LayoutError> {
        let before: Vec<ElementId> = self.inner.states.borrow().keys().copied().collect();
        let src = roots[0].id();
        let mut pass = RenderPass {
            layout: self,
            roots: roots.into(),
            new: IndexMap::new(),
            rendered: Vec::new(),
            visited: IdSet::default(),
            failure: None,
        };

        while let Some(element) = pass.roots.pop_front() {
            let id = element.id();
            if pass.visited.contains(&id) {
                continue;
            }
            let parent = match self.inner.states.borrow().get(&id) {
                Some(state) => state.parent,
                None if id == self.inner.root.id() => None,
                None => continue,
            };
            if let Err(err) = self.render_element(&mut pass, element, parent).await {
                pass.fail(err);
            }
        }

        for hook in mem::take(&mut pass.rendered) {
            if let Err(source) = hook.element_did_render() {
                let err = self.hook_error(&hook, source);
                pass.fail(err);
            }
        }

        let old = {
            let states = self.inner.states.borrow();
            let mut old: Vec<ElementId> = before
                .into_iter()
                .filter(|id| !states.contains_key(id))
                .collect();
            old.sort();
            old
        };
        let update = LayoutUpdate {
            src,
            new: mem::take(&mut pass.new),
            old,
        };
        if self.inner.config.debug_mode {
            self.check_update(&update);
        }

        match pass.failure.take() {
            Some(source) => {
                log::error!("{source}: {:#}", source.cause());
                Err(LayoutError::Render { source, update })
            }
            None => Ok(update),
        }
    }

    /// Renders `element` and the elements its model references. A failing element
    /// keeps its last model; its siblings and the rest of the pass still render.
    fn render_element<'a, 'p>(
        &'a self,
        pass: &'a mut RenderPass<'p>,
        element: ElementRef,
        parent: Option<ElementId>,
    ) -> LocalBoxFuture<'a, Result<(), RenderError>> {
        async move {
            let id = element.id();
            if !pass.visited.insert(id) {
                link_parent(&mut self.inner.states.borrow_mut(), id, parent);
                return Ok(());
            }
            let mut entered = self.enter_element(&element, parent);
            let hook = entered.hook.clone();
            let fail = |source: anyhow::Error| RenderError::new(id, element.name(), source);

            if let Err(source) = hook.element_will_render() {
                entered.abort();
                return Err(fail(source));
            }
            // `render()` itself may run the element's body, so call it inside the scope.
            let rendered = hook.scope(async { element.render().await }).await.and_then(|node| {
                let mut root = into_root_container(node)?;
                let children = prepare_tree(&mut root)?;
                Ok((root, children))
            });
            let (root, children) = match rendered {
                Ok(rendered) => rendered,
                Err(source) => {
                    entered.abort();
                    return Err(fail(source));
                }
            };

            let previous = entered.take_previous();
            pass.rendered.push(hook);
            let model = self.load_model(id, &root);
            self.inner
                .handlers
                .borrow_mut()
                .unregister_all(&previous.handlers);
            pass.new.insert(id, model);

            let mut leftovers = previous.children;
            self.keep_children(id, &children, &mut leftovers);
            entered.stage = Stage::Children(leftovers);
            for child in children {
                if let Err(err) = self.render_element(&mut *pass, child, Some(id)).await {
                    pass.fail(err);
                }
            }
            let leftovers = match mem::replace(&mut entered.stage, Stage::Done) {
                Stage::Children(leftovers) => leftovers,
                _ => IdSet::default(),
            };
            self.release_children(id, leftovers)
        }
        .boxed_local()
    }

    /// Creates (and mounts) the element's state, or takes what its last render
    /// published so the render in progress can replace it.
    fn enter_element(&self, element: &ElementRef, parent: Option<ElementId>) -> Entered<'_> {
        let id = element.id();
        let mut states = self.inner.states.borrow_mut();
        if let Some(state) = states.get_mut(&id) {
            let previous = Previous {
                children: mem::take(&mut state.inner_elements),
                handlers: mem::take(&mut state.event_handlers),
            };
            let hook = state.hook.clone();
            link_parent(&mut states, id, parent);
            return Entered {
                layout: self,
                id,
                hook,
                stage: Stage::Rendering(previous),
            };
        }

        let handle = self.handle();
        let hook = LifeCycleHook::new(element, move |element: &ElementRef| {
            handle.update(element);
        });
        states.insert(id, ElementState::new(element, parent, hook.clone()));
        link_parent(&mut states, id, parent);
        drop(states);

        log::debug!("mounting {} ({id})", element.name());
        element.mount(self.handle());
        Entered {
            layout: self,
            id,
            hook,
            stage: Stage::Rendering(Previous::default()),
        }
    }

    /// Puts back what a failed render took, so the element's last model stays valid.
    fn restore_element(&self, id: ElementId, previous: Previous) {
        if let Some(state) = self.inner.states.borrow_mut().get_mut(&id) {
            state.inner_elements.extend(previous.children);
            state.event_handlers = previous.handlers;
        }
    }

    /// Re-attaches old children whose release was interrupted.
    fn restore_children(&self, id: ElementId, leftovers: IdSet) {
        let mut states = self.inner.states.borrow_mut();
        let kept: Vec<ElementId> = leftovers
            .into_iter()
            .filter(|child| states.get(child).is_some_and(|state| state.parent == Some(id)))
            .collect();
        if let Some(state) = states.get_mut(&id) {
            state.inner_elements.extend(kept);
        }
    }

    /// Re-links mounted children that the new model still references, and removes
    /// every referenced child from `leftovers`.
    fn keep_children(&self, id: ElementId, children: &[ElementRef], leftovers: &mut IdSet) {
        let mut states = self.inner.states.borrow_mut();
        for child in children {
            let child_id = child.id();
            leftovers.remove(&child_id);
            let still_ours = states
                .get(&child_id)
                .is_some_and(|state| state.parent == Some(id));
            if still_ours {
                link_parent(&mut states, child_id, Some(id));
            }
        }
    }

    fn load_model(&self, id: ElementId, root: &Container) -> VdomJson {
        let mut descriptors = Vec::new();
        let model = {
            let mut registry = self.inner.handlers.borrow_mut();
            vdom::load(root, &mut |handler| {
                let descriptor = registry.register(handler);
                descriptors.push(descriptor.clone());
                descriptor
            })
        };
        if let Some(state) = self.inner.states.borrow_mut().get_mut(&id) {
            state.event_handlers = descriptors;
        }
        model
    }

    /// Deletes the children `owner` no longer references. Children that moved under
    /// another element during the pass are left alone.
    fn release_children(&self, owner: ElementId, leftovers: IdSet) -> Result<(), RenderError> {
        let mut first_error = None;
        for id in leftovers {
            let owned = self
                .inner
                .states
                .borrow()
                .get(&id)
                .is_some_and(|state| state.parent == Some(owner));
            if !owned {
                continue;
            }
            if let Err(err) = self.delete_element_state(id) {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    log::error!("{err}: {:#}", err.cause());
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Removes the element and all of its descendants, unregistering their handlers
    /// and running their unmount effects.
    fn delete_element_state(&self, id: ElementId) -> Result<(), RenderError> {
        let removed = {
            let mut states = self.inner.states.borrow_mut();
            if let Some(parent) = states.get(&id).and_then(|state| state.parent) {
                if let Some(state) = states.get_mut(&parent) {
                    state.inner_elements.remove(&id);
                }
            }
            let mut removed = Vec::new();
            let mut pending = vec![id];
            while let Some(next) = pending.pop() {
                if let Some(state) = states.remove(&next) {
                    pending.extend(state.inner_elements.iter().copied());
                    removed.push((next, state));
                }
            }
            removed
        };

        let mut first_error = None;
        for (id, state) in removed {
            self.inner
                .handlers
                .borrow_mut()
                .unregister_all(&state.event_handlers);
            state.hook.mark_unmounted();
            let unmounted = state.hook.element_will_unmount();
            if let Some(element) = state.element.upgrade() {
                element.unmount();
            }
            log::debug!("unmounted {} ({id})", state.name);
            if let Err(source) = unmounted {
                let err = RenderError::new(id, state.name, source);
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    log::error!("{err}: {:#}", err.cause());
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn hook_error(&self, hook: &LifeCycleHook, source: anyhow::Error) -> RenderError {
        let name = hook
            .element()
            .map(|element| element.name().into_owned())
            .unwrap_or_else(|| "<dropped element>".to_owned());
        RenderError::new(hook.element_id(), name, source)
    }

    fn check_update(&self, update: &LayoutUpdate) {
        for (id, model) in &update.new {
            let checked = serde_json::to_value(model)
                .map_err(anyhow::Error::from)
                .and_then(|value| validate_vdom(&value).map_err(anyhow::Error::from));
            if let Err(err) = checked {
                log::error!("model of element {id} is invalid: {err}");
            }
        }
        log::debug!(
            "update from {}: {} new, {} old",
            update.src,
            update.new.len(),
            update.old.len()
        );
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("root", &self.inner.root)
            .field("mounted", &self.mounted_count())
            .field("handlers", &self.handler_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/layout_tests.rs"]
mod tests;
