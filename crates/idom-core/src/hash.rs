//! Fingerprints for hook dependency lists.

use std::hash::{Hash, Hasher};

#[cfg(feature = "std-hash")]
type DepsHasher = std::collections::hash_map::DefaultHasher;

// `AHasher::default()` uses fixed keys, so fingerprints are stable across renders.
#[cfg(not(feature = "std-hash"))]
type DepsHasher = ahash::AHasher;

/// Fingerprint of a hook dependency list.
///
/// Two renders that pass equal dependencies produce equal fingerprints, which is
/// all the memo and effect hooks compare.
pub fn deps_fingerprint<T: Hash + ?Sized>(deps: &T) -> u64 {
    let mut hasher = DepsHasher::default();
    deps.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::deps_fingerprint;

    #[test]
    fn equal_dependencies_share_a_fingerprint() {
        assert_eq!(deps_fingerprint(&(1, "a")), deps_fingerprint(&(1, "a")));
        assert_ne!(deps_fingerprint(&(1, "a")), deps_fingerprint(&(2, "a")));
        assert_eq!(deps_fingerprint(&[1u8, 2][..]), deps_fingerprint(&vec![1u8, 2][..]));
    }
}
