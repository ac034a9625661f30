//! Round-trip sequence numbers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, monotonically increasing round-trip counter.
///
/// Clones share the same underlying value. The first id handed out is 1.
/// Wraps on overflow.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    value: Arc<AtomicU64>,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next id.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Last id handed out (0 before the first round trip).
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_counter_starts_at_one() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let a = SequenceCounter::new();
        let b = a.clone();
        assert_eq!(a.next(), 1);
        assert_eq!(b.next(), 2);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let counter = SequenceCounter::new();
        let threads = 8;
        let per_thread = 1_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || (0..per_thread).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }

        let total = (threads * per_thread) as u64;
        assert_eq!(seen.len() as u64, total);
        assert_eq!(seen.iter().min(), Some(&1));
        assert_eq!(seen.iter().max(), Some(&total));
    }
}
