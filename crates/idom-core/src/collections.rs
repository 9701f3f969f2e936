//! Maps keyed by element identity, used by the layout's bookkeeping.

use crate::ids::ElementId;

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

pub(crate) type IdMap<V> = map::HashMap<ElementId, V>;
pub(crate) type IdSet = map::HashSet<ElementId>;
