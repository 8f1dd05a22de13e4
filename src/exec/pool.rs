// src/exec/pool.rs

//! Bounded pool of abstract execution slots.
//!
//! The executor acquires one slot per dispatched node and releases it when
//! the node's process completes (or a cache hit makes execution unnecessary).
//! Acquisition is non-blocking: a refusal is backpressure, handled by the
//! scheduler leaving the node at the head of its ready queue. Fairness is
//! not this type's concern.

use tracing::trace;

#[derive(Debug)]
pub struct ResourcePool {
    capacity: usize,
    allocated: usize,
}

impl ResourcePool {
    /// `capacity` must be at least 1; `config::loader::validate` enforces
    /// that for configuration-sourced values.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            allocated: 0,
        }
    }

    /// Try to take one slot. Never oversubscribes: the sum of granted slots
    /// stays within capacity.
    pub fn try_acquire(&mut self) -> bool {
        if self.allocated < self.capacity {
            self.allocated += 1;
            trace!(allocated = self.allocated, capacity = self.capacity, "slot acquired");
            true
        } else {
            trace!(capacity = self.capacity, "pool exhausted");
            false
        }
    }

    pub fn release(&mut self) {
        debug_assert!(self.allocated > 0, "release without matching acquire");
        self.allocated = self.allocated.saturating_sub(1);
        trace!(allocated = self.allocated, capacity = self.capacity, "slot released");
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn available(&self) -> usize {
        self.capacity - self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_up_to_capacity_and_no_further() {
        let mut pool = ResourcePool::new(2);

        assert!(pool.try_acquire());
        assert!(pool.try_acquire());
        assert!(!pool.try_acquire());
        assert_eq!(pool.allocated(), 2);

        pool.release();
        assert!(pool.try_acquire());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn release_makes_slots_reusable() {
        let mut pool = ResourcePool::new(1);

        for _ in 0..10 {
            assert!(pool.try_acquire());
            assert!(!pool.try_acquire());
            pool.release();
        }
        assert_eq!(pool.allocated(), 0);
    }
}
