use thiserror::Error;

use crate::ids::ElementId;
use crate::layout::LayoutUpdate;

/// Misuse of the hooks API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("no life cycle hook is active; hooks may only be called while a layout renders an element")]
    NoActiveHook,
    #[error("hook slot {index} does not hold a `{expected}`; hooks must be called in the same order on every render")]
    SlotTypeMismatch { index: usize, expected: &'static str },
}

/// An element failed while rendering, or one of its life cycle effects failed.
#[derive(Debug, Error)]
#[error("failed to render {name} ({id})")]
pub struct RenderError {
    id: ElementId,
    name: String,
    source: anyhow::Error,
}

impl RenderError {
    pub(crate) fn new(id: ElementId, name: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            id,
            name: name.into(),
            source,
        }
    }

    pub fn element_id(&self) -> ElementId {
        self.id
    }

    pub fn element_name(&self) -> &str {
        &self.name
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout is already awaiting a render")]
    AlreadyRendering,
    #[error("layout is closed")]
    Closed,
    /// The pass stopped at a failing element. `update` holds whatever models were
    /// produced before the failure so a transport can still deliver them.
    #[error("render pass failed")]
    Render {
        #[source]
        source: RenderError,
        update: LayoutUpdate,
    },
    #[error("failed to unmount the layout")]
    Unmount(#[source] RenderError),
    #[error("event handler `{target}` failed")]
    Handler {
        target: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LayoutError {
    pub fn partial_update(&self) -> Option<&LayoutUpdate> {
        match self {
            LayoutError::Render { update, .. } => Some(update),
            _ => None,
        }
    }

    pub fn into_partial_update(self) -> Option<LayoutUpdate> {
        match self {
            LayoutError::Render { update, .. } => Some(update),
            _ => None,
        }
    }
}

/// A JSON value could not be read as a VDOM node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VdomError {
    #[error("expected a JSON object for a VDOM node, found {found}")]
    NotAnObject { found: &'static str },
    #[error("VDOM node is missing a string `tagName`")]
    MissingTagName,
    #[error("`{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("at {path}: {reason}")]
    Invalid { path: String, reason: String },
}
