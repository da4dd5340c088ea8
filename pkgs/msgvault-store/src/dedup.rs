//! Session memory of message ids already ingested.
//!
//! Decides whether an inbound message takes the insert path or the update
//! path. Nothing here is persisted: after a restart every id is new again and
//! the insert path's upsert keeps the row count at one.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// Outcome of [`DedupGuard::check_and_mark`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First time this id is seen in this process
    First,
    /// The id was seen before: redelivery or edit
    Repeat,
}

#[derive(Debug, Default)]
struct Seen {
    ids: HashSet<String>,
    /// Insertion order, only tracked when bounded
    order: VecDeque<String>,
}

#[derive(Debug)]
pub struct DedupGuard {
    seen: Mutex<Seen>,
    capacity: Option<usize>,
}

impl DedupGuard {
    /// Guard that remembers every id for the lifetime of the process
    pub fn unbounded() -> Self {
        Self {
            seen: Mutex::new(Seen::default()),
            capacity: None,
        }
    }

    /// Guard that forgets the oldest ids once `capacity` is exceeded
    pub fn bounded(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(Seen::default()),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::unbounded(),
        }
    }

    /// Atomically check whether `id` was seen and mark it seen
    pub fn check_and_mark(&self, id: &str) -> Sighting {
        let mut seen = self.seen.lock();
        if seen.ids.contains(id) {
            return Sighting::Repeat;
        }

        seen.ids.insert(id.to_string());
        if let Some(capacity) = self.capacity {
            seen.order.push_back(id.to_string());
            while seen.order.len() > capacity {
                if let Some(oldest) = seen.order.pop_front() {
                    seen.ids.remove(&oldest);
                }
            }
        }
        Sighting::First
    }

    pub fn seen(&self, id: &str) -> bool {
        self.seen.lock().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_then_repeat() {
        let guard = DedupGuard::unbounded();
        assert!(!guard.seen("m1"));
        assert_eq!(guard.check_and_mark("m1"), Sighting::First);
        assert!(guard.seen("m1"));
        assert_eq!(guard.check_and_mark("m1"), Sighting::Repeat);
        assert_eq!(guard.check_and_mark("m2"), Sighting::First);
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_bounded_forgets_oldest() {
        let guard = DedupGuard::bounded(2);
        guard.check_and_mark("a");
        guard.check_and_mark("b");
        guard.check_and_mark("c");

        assert_eq!(guard.len(), 2);
        assert!(!guard.seen("a"));
        assert!(guard.seen("b"));
        assert!(guard.seen("c"));
        // Forgotten ids are classified as new again
        assert_eq!(guard.check_and_mark("a"), Sighting::First);
    }

    #[test]
    fn test_repeat_does_not_refresh_order() {
        let guard = DedupGuard::bounded(2);
        guard.check_and_mark("a");
        guard.check_and_mark("b");
        guard.check_and_mark("a");
        guard.check_and_mark("c");
        assert!(!guard.seen("a"));
    }

    #[test]
    fn test_concurrent_marks_yield_single_first() {
        let guard = Arc::new(DedupGuard::unbounded());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || guard.check_and_mark("same") == Sighting::First)
            })
            .collect();

        let firsts = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|first| *first)
            .count();
        assert_eq!(firsts, 1);
    }
}
