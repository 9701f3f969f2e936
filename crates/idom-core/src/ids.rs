//! Opaque identifiers for elements and event handlers.
//!
//! Both are process-unique counters rendered as lowercase hex on the wire, so a
//! client only ever sees short strings such as `"1f"`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a hexadecimal identifier")]
pub struct ParseIdError(String);

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            fn allocate() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:x}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:x})"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                u64::from_str_radix(s, 16)
                    .map(Self)
                    .map_err(|_| ParseIdError(s.to_owned()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

opaque_id!(
    /// Identity of an [`Element`](crate::Element); stable for the element's lifetime.
    ElementId,
    NEXT_ELEMENT_ID
);

opaque_id!(
    /// Identity of an [`EventHandler`](crate::EventHandler).
    HandlerId,
    NEXT_HANDLER_ID
);

impl ElementId {
    /// Allocates a fresh id. Custom [`Element`](crate::Element) implementations
    /// call this once at construction and return the same value forever after.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::allocate()
    }
}

impl HandlerId {
    pub(crate) fn next() -> Self {
        Self::allocate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = ElementId::new();
        let b = ElementId::new();
        assert!(b > a);
        assert_ne!(HandlerId::next(), HandlerId::next());
    }

    #[test]
    fn display_and_parse_agree() {
        let id = ElementId::new();
        let text = id.to_string();
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(text.parse::<ElementId>(), Ok(id));
        assert!("not-hex".parse::<ElementId>().is_err());
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = ElementId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(format!("{:x}", id.as_u64())));
        let back: ElementId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}
