//! Bounded rolling history
//!
//! Fixed-capacity FIFO used for every per-session rolling window. Pushing
//! past capacity evicts the oldest entry.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity FIFO queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    /// Create an empty history holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, returning the evicted oldest item when full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The newest `n` items, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    /// Drop items from the front while `predicate` holds
    pub fn evict_while(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        while let Some(front) = self.items.front() {
            if predicate(front) {
                self.items.pop_front();
            } else {
                break;
            }
        }
    }
}

impl<T: Clone> History<T> {
    /// Copy of the newest `n` items, oldest first
    pub fn recent_vec(&self, n: usize) -> Vec<T> {
        self.recent(n).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl History<f64> {
    /// Mean of the stored values, `None` when empty
    pub fn mean(&self) -> Option<f64> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.items.iter().sum::<f64>() / self.items.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut history = History::new(3);
        assert_eq!(history.push(1), None);
        assert_eq!(history.push(2), None);
        assert_eq!(history.push(3), None);
        assert!(history.is_full());

        assert_eq!(history.push(4), Some(1));
        assert_eq!(history.len(), 3);
        assert_eq!(history.to_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn test_recent_window() {
        let mut history = History::new(10);
        for i in 0..6 {
            history.push(i);
        }
        assert_eq!(history.recent_vec(3), vec![3, 4, 5]);
        assert_eq!(history.recent_vec(20), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_evict_while() {
        let mut history = History::new(10);
        for t in [1.0, 2.0, 30.0, 40.0] {
            history.push(t);
        }
        history.evict_while(|&t| t < 10.0);
        assert_eq!(history.to_vec(), vec![30.0, 40.0]);
    }

    #[test]
    fn test_mean() {
        let mut history: History<f64> = History::new(2);
        assert!(history.mean().is_none());
        history.push(1.0);
        history.push(2.0);
        history.push(4.0);
        assert!((history.mean().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut history = History::new(0);
        history.push('a');
        history.push('b');
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.to_vec(), vec!['b']);
    }
}
