use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures::future::{self, FutureExt};
use serde_json::Value;

use idom_core::{
    current_hook, Element, ElementId, ElementRef, EventHandler, HandlerOutput, Layout,
    LayoutError, LayoutEvent, LayoutHandle, LayoutUpdate, LifeCycleHook, Node, RenderFuture,
};

/// Runs `future` on a current-thread runtime with a `LocalSet`, panicking if the
/// runtime cannot be built.
pub fn run_local<F: Future>(future: F) -> F::Output {
    init_logging();
    idom_runtime::run_local(future).expect("failed to build a local runtime")
}

/// Routes `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Lets spawned local tasks (async effects, for example) make progress.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Drives a [`Layout`] and panics with context when it misbehaves.
pub struct LayoutTester {
    layout: Layout,
}

impl LayoutTester {
    pub fn new(root: ElementRef) -> Self {
        init_logging();
        Self {
            layout: Layout::new(root),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub async fn render(&self) -> LayoutUpdate {
        match self.layout.render().await {
            Ok(update) => update,
            Err(err) => panic!("render failed: {err:?}"),
        }
    }

    pub async fn render_err(&self) -> LayoutError {
        match self.layout.render().await {
            Ok(update) => panic!("expected the render to fail, got {update:?}"),
            Err(err) => err,
        }
    }

    /// Whether a render pass is ready without waiting for new updates.
    pub fn has_pending_render(&self) -> bool {
        self.layout.pending_renders() > 0
    }

    pub async fn trigger(&self, target: impl Into<String>, data: Vec<Value>) {
        let event = LayoutEvent::new(target, data);
        if let Err(err) = self.layout.trigger(event).await {
            panic!("event handler failed: {err:?}");
        }
    }

    pub async fn trigger_err(&self, target: impl Into<String>, data: Vec<Value>) -> LayoutError {
        match self.layout.trigger(LayoutEvent::new(target, data)).await {
            Ok(()) => panic!("expected the event handler to fail"),
            Err(err) => err,
        }
    }
}

/// Captures the [`LifeCycleHook`] of the element whose render calls [`capture`].
///
/// [`capture`]: HookCatcher::capture
#[derive(Clone, Default)]
pub struct HookCatcher {
    hook: Rc<RefCell<Option<LifeCycleHook>>>,
}

impl HookCatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&self) -> anyhow::Result<()> {
        let hook = current_hook()?;
        self.hook.replace(Some(hook));
        Ok(())
    }

    pub fn current(&self) -> LifeCycleHook {
        self.hook
            .borrow()
            .clone()
            .expect("no hook captured; call HookCatcher::capture while rendering")
    }

    pub fn schedule_render(&self) {
        self.current().schedule_render();
    }
}

/// A reusable handler whose callbacks are swapped on each capture, so a test can
/// target it by a stable descriptor.
#[derive(Clone, Default)]
pub struct EventCatcher {
    handler: EventHandler,
}

impl EventCatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> String {
        self.handler.descriptor()
    }

    pub fn capture<F, R>(&self, callback: F) -> EventHandler
    where
        F: Fn(&[Value]) -> R + 'static,
        R: HandlerOutput + 'static,
    {
        self.handler.clear();
        self.handler.add(callback);
        self.handler.clone()
    }
}

/// An element that renders a fixed node and counts its life cycle calls.
pub struct StaticElement {
    id: ElementId,
    name: Cow<'static, str>,
    build: Box<dyn Fn() -> Node>,
    renders: Cell<usize>,
    mounts: Cell<usize>,
    unmounts: Cell<usize>,
    layout: RefCell<Option<LayoutHandle>>,
}

impl StaticElement {
    pub fn new(name: impl Into<Cow<'static, str>>, build: impl Fn() -> Node + 'static) -> Rc<Self> {
        Rc::new(Self {
            id: ElementId::new(),
            name: name.into(),
            build: Box::new(build),
            renders: Cell::new(0),
            mounts: Cell::new(0),
            unmounts: Cell::new(0),
            layout: RefCell::new(None),
        })
    }

    pub fn renders(&self) -> usize {
        self.renders.get()
    }

    pub fn mounts(&self) -> usize {
        self.mounts.get()
    }

    pub fn unmounts(&self) -> usize {
        self.unmounts.get()
    }

    pub fn schedule_update(self: &Rc<Self>) -> bool {
        let handle = self.layout.borrow().clone();
        let element: ElementRef = self.clone();
        handle.is_some_and(|handle| handle.update(&element))
    }
}

impl Element for StaticElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn render(&self) -> RenderFuture<'_> {
        self.renders.set(self.renders.get() + 1);
        future::ready(Ok((self.build)())).boxed_local()
    }

    fn mount(&self, layout: LayoutHandle) {
        self.mounts.set(self.mounts.get() + 1);
        self.layout.replace(Some(layout));
    }

    fn unmount(&self) {
        self.unmounts.set(self.unmounts.get() + 1);
        self.layout.replace(None);
    }
}
