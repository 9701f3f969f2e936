use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::deps::Dependencies;
use super::life_cycle::current_hook;
use crate::error::HookError;

type MemoCache<T> = RefCell<Option<(u64, T)>>;

/// Returns `compute()`, reusing the previous result while `deps` is unchanged.
/// Only the most recent result is kept.
pub fn use_memo<T, F, D>(compute: F, deps: D) -> Result<T, HookError>
where
    T: Clone + 'static,
    F: FnOnce() -> T,
    D: Dependencies,
{
    let hook = current_hook()?;
    let cache = hook.use_state(MemoCache::<T>::default)?;
    let Some(fingerprint) = deps.fingerprint() else {
        return Ok(compute());
    };
    if let Some((cached, value)) = &*cache.borrow() {
        if *cached == fingerprint {
            return Ok(value.clone());
        }
    }
    let value = compute();
    cache.replace(Some((fingerprint, value.clone())));
    Ok(value)
}

/// Returns `callback` as it was when `deps` last changed.
pub fn use_callback<F, D>(callback: F, deps: D) -> Result<F, HookError>
where
    F: Clone + 'static,
    D: Dependencies,
{
    use_memo(move || callback, deps)
}

/// A bounded least-recently-used cache around a function, returned by
/// [`use_lru_cache`]. Clones share the same entries.
pub struct LruCache<A, T> {
    inner: Rc<LruInner<A, T>>,
}

struct LruInner<A, T> {
    function: Box<dyn Fn(&A) -> T>,
    max_size: Option<usize>,
    entries: RefCell<IndexMap<A, T>>,
}

impl<A, T> LruCache<A, T>
where
    A: Hash + Eq,
    T: Clone,
{
    /// Returns the cached result for `arg`, computing it on a miss. A hit makes
    /// the entry the most recently used one; a miss on a full cache evicts the
    /// least recently used entry.
    pub fn call(&self, arg: A) -> T {
        let inner = &*self.inner;
        {
            let mut entries = inner.entries.borrow_mut();
            if let Some(index) = entries.get_index_of(&arg) {
                let last = entries.len() - 1;
                entries.move_index(index, last);
                return entries[last].clone();
            }
        }
        let value = (inner.function)(&arg);
        match inner.max_size {
            Some(0) => {}
            max_size => {
                let mut entries = inner.entries.borrow_mut();
                if max_size.is_some_and(|max| entries.len() >= max) {
                    entries.shift_remove_index(0);
                }
                entries.insert(arg, value.clone());
            }
        }
        value
    }

    pub fn contains(&self, arg: &A) -> bool {
        self.inner.entries.borrow().contains_key(arg)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.entries.borrow_mut().clear();
    }
}

impl<A, T> Clone for LruCache<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, T> fmt::Debug for LruCache<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.inner.entries.borrow().len())
            .field("max_size", &self.inner.max_size)
            .finish()
    }
}

/// Wraps `function` in a cache of at most `max_size` results (`None` for no
/// limit) that lives as long as the element. The function given on the first
/// render is kept; later ones are ignored.
pub fn use_lru_cache<A, T, F>(
    function: F,
    max_size: Option<usize>,
) -> Result<LruCache<A, T>, HookError>
where
    A: Hash + Eq + 'static,
    T: Clone + 'static,
    F: Fn(&A) -> T + 'static,
{
    let hook = current_hook()?;
    let inner = hook.use_state(move || LruInner {
        function: Box::new(function),
        max_size,
        entries: RefCell::new(IndexMap::new()),
    })?;
    Ok(LruCache { inner })
}
