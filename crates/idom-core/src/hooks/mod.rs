//! The hooks API.
//!
//! Hooks are plain functions that read the [`LifeCycleHook`] of the element
//! currently rendering. Calling one outside a render returns
//! [`HookError::NoActiveHook`](crate::HookError::NoActiveHook).

mod deps;
mod effect;
mod life_cycle;
mod memo;
mod state;

pub use deps::Dependencies;
pub use effect::{
    use_async_effect, use_effect, use_mount_effect, Cleanup, EffectScope, EffectTask, TaskState,
};
pub use life_cycle::{current_hook, Effect, EffectEvent, LifeCycleHook, WeakHook};
pub use memo::{use_callback, use_lru_cache, use_memo, LruCache};
pub use state::{
    use_reducer, use_ref, use_state, use_state_with, use_update, Dispatch, Ref, SetState, Update,
};

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod api_tests;
