use std::cell::{Cell, RefCell};

use indexmap::IndexMap;
use tokio::sync::Notify;

use crate::element::ElementRef;
use crate::ids::ElementId;

/// Elements waiting to render, deduplicated by id in arrival order.
pub(crate) struct RenderQueue {
    pending: RefCell<IndexMap<ElementId, ElementRef>>,
    notify: Notify,
    closed: Cell<bool>,
}

impl RenderQueue {
    pub(crate) fn new() -> Self {
        Self {
            pending: RefCell::new(IndexMap::new()),
            notify: Notify::new(),
            closed: Cell::new(false),
        }
    }

    /// Returns `false` when the element was already queued or the queue is closed.
    pub(crate) fn put(&self, element: &ElementRef) -> bool {
        if self.closed.get() {
            return false;
        }
        let inserted = {
            let mut pending = self.pending.borrow_mut();
            let id = element.id();
            if pending.contains_key(&id) {
                false
            } else {
                pending.insert(id, element.clone());
                true
            }
        };
        if inserted {
            self.notify.notify_one();
        }
        inserted
    }

    /// Waits until at least one element is queued, then takes them all. Returns an
    /// empty batch once the queue is closed.
    pub(crate) async fn next_batch(&self) -> Vec<ElementRef> {
        loop {
            if self.closed.get() {
                return Vec::new();
            }
            let batch: Vec<ElementRef> = self
                .pending
                .borrow_mut()
                .drain(..)
                .map(|(_, element)| element)
                .collect();
            if !batch.is_empty() {
                return batch;
            }
            self.notify.notified().await;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub(crate) fn close(&self) {
        self.closed.set(true);
        self.pending.borrow_mut().clear();
        self.notify.notify_one();
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::element::FnElement;

    fn element(name: &'static str) -> ElementRef {
        FnElement::new(name, || async { Ok::<_, anyhow::Error>("") })
    }

    #[test]
    fn duplicate_puts_are_dropped() {
        let queue = RenderQueue::new();
        let a = element("A");
        let b = element("B");
        assert!(queue.put(&a));
        assert!(!queue.put(&a));
        assert!(queue.put(&b));
        assert_eq!(queue.len(), 2);

        let batch = block_on(queue.next_batch());
        let ids: Vec<_> = batch.iter().map(|e| e.id()).collect();
        assert_eq!(ids, [a.id(), b.id()]);
        assert_eq!(queue.len(), 0);
        assert!(queue.put(&a), "a drained element may be queued again");
    }

    #[test]
    fn closed_queue_yields_empty_batches() {
        let queue = RenderQueue::new();
        queue.put(&element("A"));
        queue.close();
        assert!(!queue.put(&element("B")));
        assert!(block_on(queue.next_batch()).is_empty());
    }
}
