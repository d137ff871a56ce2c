//! Request coordinator: dedup, bounded concurrency, fan-out, teardown.
//!
//! One [`WorkerCoordinator`] owns a [`ResourceQueue`] and a [`JobRegistry`]
//! behind a single mutex. Requests are serialized through that mutex; pipeline
//! outcomes arrive over an mpsc channel and are applied by one dispatch task,
//! so queue and registry mutations never interleave.
//!
//! The lock is never held while a consumer listener runs or across `.await`.

mod notify;
mod paint;
mod pipeline;
mod types;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use offthread_events::{EventBus, topics};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use self::notify::Notifier;
use self::pipeline::PipelineContext;
use self::types::{CoordinatorState, PipelineCounters};
use crate::config::CoordinatorConfig;
use crate::consumer::{ConsumerId, ImageConsumer, ListenerId, StatusChange};
use crate::error::{ConsumerFailure, CoordinatorError, LoadError};
use crate::identity::{DocumentLocation, ResourceIdentity};
use crate::message::{Outcome, WorkerMessage};
use crate::queue::ResourceQueue;
use crate::registry::JobRegistry;
use crate::status::Status;
use crate::sync::lock;

pub use self::types::{Collaborators, QueueSnapshot};

/// Coordinates image requests between consumers and fetch/decode pipelines.
pub struct WorkerCoordinator {
    state: Mutex<CoordinatorState>,
    collaborators: Collaborators,
    location: DocumentLocation,
    fetch_timeout: Option<Duration>,
    outcomes: mpsc::UnboundedSender<WorkerMessage>,
    runtime: Handle,
    notifier: Notifier,
    counters: PipelineCounters,
}

impl WorkerCoordinator {
    /// Start a coordinator on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero concurrency cap or when called outside a
    /// tokio runtime.
    pub fn start(
        collaborators: Collaborators,
        config: CoordinatorConfig,
    ) -> Result<Arc<Self>, CoordinatorError> {
        Self::launch(collaborators, config, None)
    }

    /// Like [`WorkerCoordinator::start`], mirroring every status change and
    /// failure onto `bus`.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerCoordinator::start`].
    pub fn start_with_bus(
        collaborators: Collaborators,
        config: CoordinatorConfig,
        bus: EventBus,
    ) -> Result<Arc<Self>, CoordinatorError> {
        Self::launch(collaborators, config, Some(bus))
    }

    fn launch(
        collaborators: Collaborators,
        config: CoordinatorConfig,
        bus: Option<EventBus>,
    ) -> Result<Arc<Self>, CoordinatorError> {
        let max_concurrency = config.concurrency()?;
        let runtime =
            Handle::try_current().map_err(|e| CoordinatorError::NoRuntime(e.to_string()))?;
        let (outcomes, rx) = mpsc::unbounded_channel();

        let coordinator = Arc::new(Self {
            state: Mutex::new(CoordinatorState {
                queue: ResourceQueue::new(max_concurrency),
                registry: JobRegistry::new(),
                pipelines: HashMap::new(),
                shut_down: false,
            }),
            collaborators,
            location: config.location,
            fetch_timeout: config.fetch_timeout,
            outcomes,
            runtime,
            notifier: Notifier::new(bus),
            counters: PipelineCounters::default(),
        });
        coordinator.spawn_dispatch_loop(rx);

        tracing::info!(
            max_concurrency = max_concurrency.get(),
            fetch_timeout_ms = config.fetch_timeout.map(|t| t.as_millis()),
            "image coordinator started"
        );
        Ok(coordinator)
    }

    fn spawn_dispatch_loop(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        let coordinator: Weak<Self> = Arc::downgrade(self);
        self.runtime.spawn(async move {
            while let Some(message) = rx.recv().await {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.resolve(&message.identity, message.outcome);
            }
            tracing::debug!("image coordinator dispatch loop stopped");
        });
    }

    /// Request `raw_url` on behalf of `consumer`.
    ///
    /// Normalizes the URL, moves the consumer to [`Status::LoadStarted`],
    /// registers it as a waiter and enqueues the identity. A second request
    /// for an identity already queued or in flight attaches to that pipeline.
    /// A consumer re-targeting a different URL stops waiting on its old one.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::InvalidUrl`] if the URL cannot be normalized (the
    /// consumer is untouched), [`CoordinatorError::ShutDown`] after teardown.
    pub fn request(
        &self,
        consumer: &Arc<ImageConsumer>,
        raw_url: &str,
    ) -> Result<ResourceIdentity, CoordinatorError> {
        let identity = self.location.normalize(raw_url)?;
        if self.is_shut_down() {
            return Err(CoordinatorError::ShutDown);
        }

        let start = self.notifier.begin(consumer, raw_url, identity.clone());

        let mut state = lock(&self.state);
        if state.shut_down {
            drop(state);
            self.notifier.fail(
                consumer,
                start.cycle,
                ConsumerFailure::Load(LoadError::Shutdown),
            );
            return Err(CoordinatorError::ShutDown);
        }
        if let Some(previous) = start
            .previous_identity
            .filter(|previous| *previous != identity)
        {
            state.registry.remove_consumer(&previous, consumer.id());
        }
        state
            .registry
            .register(identity.clone(), consumer, start.cycle);
        let started = state.queue.enqueue(identity.clone());
        tracing::debug!(
            consumer = %consumer.id(),
            identity = %identity,
            pending = state.queue.pending_len(),
            in_flight = state.queue.in_flight_count(),
            "image requested"
        );
        self.start_pipelines(&mut state, started);
        Ok(identity)
    }

    /// Stop `consumer` from waiting on its current identity.
    ///
    /// The pipeline keeps running for other waiters. Returns `true` if the
    /// consumer was registered.
    pub fn cancel(&self, consumer: &ImageConsumer) -> bool {
        let Some(identity) = consumer.identity() else {
            return false;
        };
        lock(&self.state)
            .registry
            .remove_consumer(&identity, consumer.id())
    }

    /// Register a status listener on `consumer`.
    pub fn on_status_change(
        &self,
        consumer: &ImageConsumer,
        callback: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> ListenerId {
        consumer.on_status_change(callback)
    }

    /// Register a failure listener on `consumer`.
    pub fn on_failure(
        &self,
        consumer: &ImageConsumer,
        callback: impl Fn(ConsumerId, &ConsumerFailure) + Send + Sync + 'static,
    ) -> ListenerId {
        consumer.on_failure(callback)
    }

    /// Location relative URLs are resolved against.
    #[must_use]
    pub fn location(&self) -> &DocumentLocation {
        &self.location
    }

    /// Bus mirroring consumer events, if one was attached.
    #[must_use]
    pub fn event_bus(&self) -> Option<&EventBus> {
        self.notifier.bus()
    }

    /// Current queue and pipeline accounting.
    #[must_use]
    pub fn queue_snapshot(&self) -> QueueSnapshot {
        let state = lock(&self.state);
        QueueSnapshot {
            pending: state.queue.pending_len(),
            in_flight: state.queue.in_flight_count(),
            waiting_jobs: state.registry.len(),
            max_concurrency: state.queue.max_concurrency().get(),
            started: PipelineCounters::read(&self.counters.started),
            succeeded: PipelineCounters::read(&self.counters.succeeded),
            failed: PipelineCounters::read(&self.counters.failed),
            shut_down: state.shut_down,
        }
    }

    /// Whether [`WorkerCoordinator::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        lock(&self.state).shut_down
    }

    /// Tear down: drop pending identities, abort running pipelines and fail
    /// every waiting consumer with [`LoadError::Shutdown`].
    ///
    /// Idempotent. Later requests return [`CoordinatorError::ShutDown`].
    pub fn shutdown(&self) {
        let (entries, dropped) = {
            let mut state = lock(&self.state);
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            for (_, pipeline) in state.pipelines.drain() {
                pipeline.abort();
            }
            let dropped = state.queue.clear();
            (state.registry.drain(), dropped.len())
        };

        tracing::info!(
            dropped,
            waiting_jobs = entries.len(),
            "image coordinator shut down"
        );
        self.notifier
            .emit(topics::SYSTEM_SHUTDOWN, json!({ "dropped": dropped }));
        for (_, entry) in entries {
            for waiter in entry.live() {
                self.notifier.fail(
                    &waiter.consumer,
                    waiter.cycle,
                    ConsumerFailure::Load(LoadError::Shutdown),
                );
            }
        }
    }

    fn start_pipelines(&self, state: &mut CoordinatorState, identities: Vec<ResourceIdentity>) {
        for identity in identities {
            PipelineCounters::bump(&self.counters.started);
            tracing::debug!(
                identity = %identity,
                in_flight = state.queue.in_flight_count(),
                "pipeline started"
            );
            self.notifier.emit(
                topics::PIPELINE_STARTED,
                json!({ "url": identity.as_str() }),
            );
            let ctx = PipelineContext {
                fetcher: Arc::clone(&self.collaborators.fetcher),
                decoder: Arc::clone(&self.collaborators.decoder),
                fetch_timeout: self.fetch_timeout,
                outcomes: self.outcomes.clone(),
            };
            let task = self
                .runtime
                .spawn(pipeline::run_pipeline(ctx, identity.clone()));
            state.pipelines.insert(identity, task.abort_handle());
        }
    }

    /// Apply one pipeline outcome to the consumers waiting on `identity`.
    ///
    /// Each waiter is checked against its request cycle at delivery, so a
    /// consumer that re-requests while this fan-out runs (e.g. from one of its
    /// own listeners) skips the rest of it.
    fn resolve(&self, identity: &ResourceIdentity, outcome: Outcome) {
        let waiters = {
            let mut state = lock(&self.state);
            if outcome.is_terminal() {
                let was_running = state.pipelines.remove(identity).is_some();
                let entry = state.registry.take(identity);
                let next = state.queue.settle(identity);
                self.start_pipelines(&mut state, next);
                if was_running {
                    let counter = match &outcome {
                        Outcome::Decoded(_) => &self.counters.succeeded,
                        _ => &self.counters.failed,
                    };
                    PipelineCounters::bump(counter);
                }
                entry.map(|entry| entry.live())
            } else {
                state.registry.waiting(identity)
            }
        };

        let Some(waiters) = waiters else {
            tracing::debug!(
                identity = %identity,
                outcome = outcome.kind(),
                "no job registered; outcome discarded"
            );
            self.notifier.emit(
                topics::REGISTRY_MISS,
                json!({ "url": identity.as_str(), "outcome": outcome.kind() }),
            );
            return;
        };

        let mut stale = 0_usize;
        match outcome {
            Outcome::Loaded => {
                for waiter in &waiters {
                    if !self
                        .notifier
                        .advance(&waiter.consumer, waiter.cycle, Status::Loaded)
                    {
                        stale += 1;
                    }
                }
            }
            Outcome::LoadFailed(error) => {
                tracing::warn!(
                    identity = %identity,
                    error = %error,
                    waiters = waiters.len(),
                    "image load failed"
                );
                for waiter in &waiters {
                    if !self.notifier.fail(
                        &waiter.consumer,
                        waiter.cycle,
                        ConsumerFailure::Load(error.clone()),
                    ) {
                        stale += 1;
                    }
                }
            }
            Outcome::Decoded(bitmap) => {
                tracing::debug!(
                    identity = %identity,
                    width = bitmap.width(),
                    height = bitmap.height(),
                    waiters = waiters.len(),
                    "image decoded"
                );
                for waiter in waiters {
                    let delivered = waiter
                        .consumer
                        .hold_bitmap(waiter.cycle, Arc::clone(&bitmap))
                        && self
                            .notifier
                            .advance(&waiter.consumer, waiter.cycle, Status::Decoded);
                    if !delivered {
                        stale += 1;
                        continue;
                    }
                    self.runtime.spawn(paint::paint_when_idle(
                        Arc::clone(&self.collaborators.painter),
                        self.notifier.clone(),
                        waiter.consumer,
                        waiter.cycle,
                    ));
                }
            }
        }
        if stale > 0 {
            tracing::debug!(identity = %identity, stale, "skipped waiters that re-requested");
        }
    }
}

impl Drop for WorkerCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCoordinator")
            .field("location", &self.location)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("snapshot", &self.queue_snapshot())
            .finish_non_exhaustive()
    }
}
