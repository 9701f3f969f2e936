#![doc = r"Core runtime for IDOM: elements, hooks and the layout that reconciles them into serialized models."]

extern crate self as idom_core;

pub mod collections;
pub mod config;
pub mod element;
pub mod error;
pub mod events;
pub mod hash;
pub mod hooks;
pub mod html;
pub mod ids;
pub mod layout;
pub mod model;
pub mod vdom;

pub use config::{Config, DEBUG_MODE_VAR};
pub use element::{component, Element, ElementRef, FnElement, RenderFuture};
pub use error::{HookError, LayoutError, RenderError, VdomError};
pub use events::{EventHandler, HandlerOutput, LayoutEvent};
pub use hooks::{
    current_hook, use_async_effect, use_callback, use_effect, use_lru_cache, use_memo,
    use_mount_effect, use_reducer, use_ref, use_state, use_state_with, use_update, Cleanup,
    Dependencies, Dispatch, Effect, EffectEvent, EffectScope, EffectTask, LifeCycleHook, LruCache,
    Ref, SetState, TaskState, Update,
};
pub use ids::{ElementId, HandlerId, ParseIdError};
pub use layout::{Layout, LayoutHandle, LayoutUpdate};
pub use model::{Attribute, Container, Node};
pub use vdom::{validate_vdom, vdom, ChildItem, VdomJson};

#[doc(hidden)]
pub use element::__private;

pub mod prelude {
    pub use crate::html;
    pub use crate::{
        component, use_async_effect, use_callback, use_effect, use_memo, use_reducer, use_ref,
        use_state, use_state_with, Cleanup, Container, Element, ElementRef, EventHandler, Layout,
        LayoutEvent, Node,
    };
}
