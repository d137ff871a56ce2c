//! Job registry: which consumers wait on which identity.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::consumer::{ConsumerId, ImageConsumer, RequestCycle};
use crate::identity::ResourceIdentity;

/// A live consumer and the request cycle it registered in.
#[derive(Debug, Clone)]
pub struct Waiter {
    /// The waiting consumer.
    pub consumer: Arc<ImageConsumer>,
    /// Cycle the registration belongs to.
    pub cycle: RequestCycle,
}

impl Waiter {
    /// Whether the consumer is still in the cycle it registered in.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.consumer.cycle() == self.cycle
    }
}

#[derive(Debug)]
struct Registration {
    consumer: ConsumerId,
    cycle: RequestCycle,
    handle: Weak<ImageConsumer>,
}

/// Consumers waiting on one identity, in registration order.
#[derive(Debug, Default)]
pub struct JobEntry {
    waiters: Vec<Registration>,
}

impl JobEntry {
    /// Consumers still alive, in registration order.
    ///
    /// Dropped consumers are skipped.
    #[must_use]
    pub fn live(&self) -> Vec<Waiter> {
        self.waiters
            .iter()
            .filter_map(|registration| {
                registration.handle.upgrade().map(|consumer| Waiter {
                    consumer,
                    cycle: registration.cycle,
                })
            })
            .collect()
    }

    /// Registered waiters, including stale ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Whether nobody is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Mapping from identity to waiting consumers.
///
/// Holds weak references only: the registry enumerates consumers to notify
/// them and never keeps one alive.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: HashMap<ResourceIdentity, JobEntry>,
}

impl JobRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `consumer`, waiting in `cycle`, to `id`'s entry, creating it if
    /// absent.
    ///
    /// Earlier registrations of the same consumer on `id` move to `cycle`, so
    /// registering the same consumer twice yields two notifications.
    pub fn register(
        &mut self,
        id: ResourceIdentity,
        consumer: &Arc<ImageConsumer>,
        cycle: RequestCycle,
    ) {
        let entry = self.entries.entry(id).or_default();
        for registration in &mut entry.waiters {
            if registration.consumer == consumer.id() {
                registration.cycle = cycle;
            }
        }
        entry.waiters.push(Registration {
            consumer: consumer.id(),
            cycle,
            handle: Arc::downgrade(consumer),
        });
    }

    /// Live waiters for `id` without clearing the entry.
    #[must_use]
    pub fn waiting(&self, id: &ResourceIdentity) -> Option<Vec<Waiter>> {
        self.entries.get(id).map(JobEntry::live)
    }

    /// Remove and return `id`'s entry.
    pub fn take(&mut self, id: &ResourceIdentity) -> Option<JobEntry> {
        self.entries.remove(id)
    }

    /// Remove every registration of `consumer` from `id`'s entry.
    ///
    /// An entry left without waiters stays in place until its result arrives.
    /// Returns `true` if anything was removed.
    pub fn remove_consumer(&mut self, id: &ResourceIdentity, consumer: ConsumerId) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        let before = entry.waiters.len();
        entry
            .waiters
            .retain(|registration| registration.consumer != consumer);
        before != entry.waiters.len()
    }

    /// Remove every entry.
    pub fn drain(&mut self) -> Vec<(ResourceIdentity, JobEntry)> {
        self.entries.drain().collect()
    }

    /// Whether `id` has an entry.
    #[must_use]
    pub fn contains(&self, id: &ResourceIdentity) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of identities with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no identity has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
