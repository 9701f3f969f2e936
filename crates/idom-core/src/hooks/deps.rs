use std::hash::Hash;

use crate::hash::deps_fingerprint;

/// A dependency list for memoizing hooks.
///
/// `()` and empty lists mean "no dependencies": the value is recomputed (or the
/// effect re-run) on every render. Anything else is fingerprinted, and the hook
/// reuses its previous result while the fingerprint is unchanged.
pub trait Dependencies {
    fn fingerprint(&self) -> Option<u64>;
}

impl Dependencies for () {
    fn fingerprint(&self) -> Option<u64> {
        None
    }
}

impl<T: Hash> Dependencies for [T] {
    fn fingerprint(&self) -> Option<u64> {
        (!self.is_empty()).then(|| deps_fingerprint(self))
    }
}

impl<T: Hash, const N: usize> Dependencies for [T; N] {
    fn fingerprint(&self) -> Option<u64> {
        self.as_slice().fingerprint()
    }
}

impl<T: Hash> Dependencies for Vec<T> {
    fn fingerprint(&self) -> Option<u64> {
        self.as_slice().fingerprint()
    }
}

impl<D: Dependencies + ?Sized> Dependencies for &D {
    fn fingerprint(&self) -> Option<u64> {
        (**self).fingerprint()
    }
}

macro_rules! tuple_dependencies {
    ($(($($name:ident),+)),* $(,)?) => {
        $(
            impl<$($name: Hash),+> Dependencies for ($($name,)+) {
                fn fingerprint(&self) -> Option<u64> {
                    Some(deps_fingerprint(self))
                }
            }
        )*
    };
}

tuple_dependencies!(
    (A),
    (A, B),
    (A, B, C),
    (A, B, C, D),
    (A, B, C, D, E),
    (A, B, C, D, E, F),
    (A, B, C, D, E, F, G),
    (A, B, C, D, E, F, G, H),
);

#[cfg(test)]
mod tests {
    use super::Dependencies;

    #[test]
    fn empty_lists_always_recompute() {
        assert_eq!(().fingerprint(), None);
        assert_eq!(Vec::<u8>::new().fingerprint(), None);
        assert_eq!([0u8; 0].fingerprint(), None);
    }

    #[test]
    fn equal_lists_share_fingerprints() {
        assert_eq!((1, "x").fingerprint(), (1, "x").fingerprint());
        assert_ne!((1, "x").fingerprint(), (2, "x").fingerprint());
        assert_eq!(vec![1, 2].fingerprint(), [1, 2].fingerprint());
        assert!((&(3,)).fingerprint().is_some());
    }
}
