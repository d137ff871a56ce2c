//! Deduplicating FIFO queue with a concurrency cap.
//!
//! The queue itself never spawns anything: `enqueue` and `settle` return the
//! identities that just moved to in-flight, and the caller starts their
//! pipelines inside the same critical section.

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;

use crate::identity::ResourceIdentity;

/// Pending identities plus in-flight accounting.
#[derive(Debug)]
pub struct ResourceQueue {
    pending: VecDeque<ResourceIdentity>,
    in_flight: HashSet<ResourceIdentity>,
    max_concurrency: NonZeroUsize,
}

impl ResourceQueue {
    /// Empty queue running at most `max_concurrency` pipelines.
    #[must_use]
    pub fn new(max_concurrency: NonZeroUsize) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: HashSet::new(),
            max_concurrency,
        }
    }

    /// Queue `id` unless it is already pending or in flight, then advance.
    ///
    /// Returns the identities that must be started now.
    pub fn enqueue(&mut self, id: ResourceIdentity) -> Vec<ResourceIdentity> {
        if self.contains(&id) {
            tracing::trace!(identity = %id, "identity already queued or in flight");
            return Vec::new();
        }
        self.pending.push_back(id);
        self.try_advance()
    }

    /// Move pending identities to in-flight while slots are free.
    ///
    /// The only place the in-flight count grows.
    pub fn try_advance(&mut self) -> Vec<ResourceIdentity> {
        let mut started = Vec::new();
        while self.in_flight.len() < self.max_concurrency.get() {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            self.in_flight.insert(id.clone());
            started.push(id);
        }
        started
    }

    /// Mark `id`'s pipeline as settled and advance.
    ///
    /// Settling an identity that is not in flight (e.g. after [`clear`]) only
    /// advances.
    ///
    /// [`clear`]: Self::clear
    pub fn settle(&mut self, id: &ResourceIdentity) -> Vec<ResourceIdentity> {
        if !self.in_flight.remove(id) {
            tracing::debug!(identity = %id, "settled identity was not in flight");
        }
        self.try_advance()
    }

    /// Whether `id` is pending or in flight.
    #[must_use]
    pub fn contains(&self, id: &ResourceIdentity) -> bool {
        self.in_flight.contains(id) || self.pending.contains(id)
    }

    /// Whether `id`'s pipeline is running.
    #[must_use]
    pub fn is_in_flight(&self, id: &ResourceIdentity) -> bool {
        self.in_flight.contains(id)
    }

    /// Number of running pipelines.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of identities waiting for a slot.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending identities in processing order.
    pub fn pending(&self) -> impl Iterator<Item = &ResourceIdentity> {
        self.pending.iter()
    }

    /// Concurrency cap.
    #[must_use]
    pub fn max_concurrency(&self) -> NonZeroUsize {
        self.max_concurrency
    }

    /// Drop every pending and in-flight identity; returns them, pending first.
    pub fn clear(&mut self) -> Vec<ResourceIdentity> {
        let mut dropped: Vec<ResourceIdentity> = self.pending.drain(..).collect();
        dropped.extend(self.in_flight.drain());
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ResourceIdentity {
        ResourceIdentity::parse(&format!("https://x/{name}.png")).unwrap()
    }

    fn queue(max: usize) -> ResourceQueue {
        ResourceQueue::new(NonZeroUsize::new(max).unwrap())
    }

    #[test]
    fn first_enqueue_starts_immediately() {
        let mut q = queue(3);
        assert_eq!(q.enqueue(id("a")), vec![id("a")]);
        assert_eq!(q.in_flight_count(), 1);
        assert_eq!(q.pending_len(), 0);
    }

    #[test]
    fn duplicate_enqueue_is_noop_while_pending_or_in_flight() {
        let mut q = queue(1);
        q.enqueue(id("a"));
        assert!(q.enqueue(id("a")).is_empty());
        q.enqueue(id("b"));
        assert!(q.enqueue(id("b")).is_empty());
        assert_eq!(q.pending_len(), 1);
        assert_eq!(q.in_flight_count(), 1);
    }

    #[test]
    fn cap_bounds_in_flight() {
        let mut q = queue(3);
        let started: Vec<_> = (0..10).flat_map(|n| q.enqueue(id(&n.to_string()))).collect();
        assert_eq!(started.len(), 3);
        assert_eq!(q.in_flight_count(), 3);
        assert_eq!(q.pending_len(), 7);
    }

    #[test]
    fn settle_starts_next_in_fifo_order() {
        let mut q = queue(1);
        q.enqueue(id("a"));
        q.enqueue(id("b"));
        q.enqueue(id("c"));
        assert_eq!(q.settle(&id("a")), vec![id("b")]);
        assert_eq!(q.settle(&id("b")), vec![id("c")]);
        assert!(q.settle(&id("c")).is_empty());
        assert_eq!(q.in_flight_count(), 0);
    }

    #[test]
    fn settled_identity_can_be_enqueued_again() {
        let mut q = queue(2);
        q.enqueue(id("a"));
        q.settle(&id("a"));
        assert!(!q.contains(&id("a")));
        assert_eq!(q.enqueue(id("a")), vec![id("a")]);
    }

    #[test]
    fn settling_unknown_identity_only_advances() {
        let mut q = queue(1);
        q.enqueue(id("a"));
        q.enqueue(id("b"));
        assert!(q.settle(&id("zzz")).is_empty());
        assert_eq!(q.in_flight_count(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut q = queue(1);
        q.enqueue(id("a"));
        q.enqueue(id("b"));
        assert_eq!(q.clear(), vec![id("b"), id("a")]);
        assert_eq!(q.in_flight_count(), 0);
        assert_eq!(q.pending_len(), 0);
    }
}
