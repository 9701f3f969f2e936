//! The renderable unit of a layout.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::ids::ElementId;
use crate::layout::LayoutHandle;
use crate::model::Node;

pub type RenderFuture<'a> = LocalBoxFuture<'a, anyhow::Result<Node>>;

/// Something a [`Layout`](crate::Layout) can render into a model.
///
/// Rendering may suspend; the layout awaits it with the element's life cycle hook
/// installed, so the hooks API works anywhere inside the returned future.
pub trait Element: 'static {
    fn id(&self) -> ElementId;

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    fn render(&self) -> RenderFuture<'_>;

    /// Called once, just before the element first renders inside `layout`.
    fn mount(&self, _layout: LayoutHandle) {}

    /// Called once, after the element leaves the tree.
    fn unmount(&self) {}
}

pub type ElementRef = Rc<dyn Element>;

impl fmt::Debug for dyn Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}

type RenderFn = Box<dyn Fn() -> RenderFuture<'static>>;

/// An element backed by a render closure. This is what `#[component]` produces.
pub struct FnElement {
    id: ElementId,
    name: Cow<'static, str>,
    render_fn: RenderFn,
    layout: RefCell<Option<LayoutHandle>>,
}

impl FnElement {
    pub fn new<F, Fut, N>(name: impl Into<Cow<'static, str>>, render: F) -> Rc<Self>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<N>> + 'static,
        N: Into<Node> + 'static,
    {
        Self::from_render_fn(name, move || {
            render().map(|result| result.map(Into::into)).boxed_local()
        })
    }

    pub fn from_render_fn<F>(name: impl Into<Cow<'static, str>>, render: F) -> Rc<Self>
    where
        F: Fn() -> RenderFuture<'static> + 'static,
    {
        Rc::new(Self {
            id: ElementId::new(),
            name: name.into(),
            render_fn: Box::new(render),
            layout: RefCell::new(None),
        })
    }

    pub fn is_mounted(&self) -> bool {
        self.layout.borrow().is_some()
    }

    /// Asks the owning layout to render this element again. Returns `false` when
    /// the element is not mounted or the layout is gone.
    pub fn schedule_update(self: &Rc<Self>) -> bool {
        let handle = self.layout.borrow().clone();
        match handle {
            Some(handle) => {
                let element: ElementRef = self.clone();
                handle.update(&element)
            }
            None => false,
        }
    }
}

impl Element for FnElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn render(&self) -> RenderFuture<'_> {
        (self.render_fn)()
    }

    fn mount(&self, layout: LayoutHandle) {
        self.layout.replace(Some(layout));
    }

    fn unmount(&self) {
        self.layout.replace(None);
    }
}

impl fmt::Debug for FnElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnElement")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// Builds a render-closure element and erases it to an [`ElementRef`].
pub fn component<F, Fut, N>(name: impl Into<Cow<'static, str>>, render: F) -> ElementRef
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<N>> + 'static,
    N: Into<Node> + 'static,
{
    FnElement::new(name, render)
}

/// Plumbing for `#[component]` expansions.
#[doc(hidden)]
pub mod __private {
    use std::future::Future;

    use futures::future::{self, FutureExt};

    use super::RenderFuture;
    use crate::model::Node;

    pub fn ready_render<N, E>(result: Result<N, E>) -> RenderFuture<'static>
    where
        N: Into<Node>,
        E: Into<anyhow::Error>,
    {
        future::ready(result.map(Into::into).map_err(Into::into)).boxed_local()
    }

    pub fn boxed_render<Fut, N, E>(render: Fut) -> RenderFuture<'static>
    where
        Fut: Future<Output = Result<N, E>> + 'static,
        N: Into<Node> + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        render
            .map(|result| result.map(Into::into).map_err(Into::into))
            .boxed_local()
    }
}
