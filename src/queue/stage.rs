use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Unbounded FIFO hand-off channel between the dispatch side and the worker.
///
/// Every critical section is a single `VecDeque` operation, so a poisoned lock
/// still guards a consistent queue and is recovered rather than propagated.
#[derive(Debug)]
pub struct StageQueue<T> {
    name: &'static str,
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> StageQueue<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append to the back; never blocks on consumers
    pub fn push(&self, item: T) {
        let len = {
            let mut items = self.lock();
            items.push_back(item);
            items.len()
        };
        trace!(queue = self.name, len, "Pushed");
        self.available.notify_one();
    }

    /// Remove the front item, waiting until one exists
    pub fn pop_blocking(&self) -> T {
        self.pop_blocking_with(|item| item)
    }

    /// Like [`pop_blocking`](Self::pop_blocking), but runs `f` on the item
    /// before this queue's lock is released.
    ///
    /// Used to hand an item to another queue without a window in which it is
    /// visible in neither.
    pub fn pop_blocking_with<R>(&self, f: impl FnOnce(T) -> R) -> R {
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return f(item);
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the front item if there is one
    pub fn pop_nonblocking(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Inspect the front item without removing it
    pub fn peek_front<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().front().map(f)
    }

    /// Read-only view over every queued item, front to back
    pub fn snapshot<R>(&self, f: impl FnOnce(&VecDeque<T>) -> R) -> R {
        f(&self.lock())
    }

    /// Remove the first item matching `predicate`
    pub fn take_first(&self, predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let mut items = self.lock();
        let index = items.iter().position(predicate)?;
        items.remove(index)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
