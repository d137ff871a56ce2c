//! Shared types for the request coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::AbortHandle;

use crate::collaborators::{Decoder, Fetcher, Painter};
use crate::identity::ResourceIdentity;
use crate::queue::ResourceQueue;
use crate::registry::JobRegistry;

/// The external capabilities a coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Transport.
    pub fetcher: Arc<dyn Fetcher>,
    /// Decode primitive.
    pub decoder: Arc<dyn Decoder>,
    /// Rendering surface.
    pub painter: Arc<dyn Painter>,
}

impl Collaborators {
    /// Bundle the three collaborators.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn Decoder>,
        painter: Arc<dyn Painter>,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            painter,
        }
    }
}

/// Point-in-time view of queue and pipeline accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Identities waiting for a slot.
    pub pending: usize,
    /// Running pipelines.
    pub in_flight: usize,
    /// Identities with registered waiters.
    pub waiting_jobs: usize,
    /// Concurrency cap.
    pub max_concurrency: usize,
    /// Pipelines started since launch.
    pub started: u64,
    /// Pipelines that decoded a bitmap.
    pub succeeded: u64,
    /// Pipelines that failed.
    pub failed: u64,
    /// Whether teardown has run.
    pub shut_down: bool,
}

/// State mutated only inside the coordinator's critical section.
#[derive(Debug)]
pub(super) struct CoordinatorState {
    pub(super) queue: ResourceQueue,
    pub(super) registry: JobRegistry,
    pub(super) pipelines: HashMap<ResourceIdentity, AbortHandle>,
    pub(super) shut_down: bool,
}

#[derive(Debug, Default)]
pub(super) struct PipelineCounters {
    pub(super) started: AtomicU64,
    pub(super) succeeded: AtomicU64,
    pub(super) failed: AtomicU64,
}

impl PipelineCounters {
    pub(super) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
