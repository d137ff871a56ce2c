//! Consumers: entities that request an image and observe its status.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::collaborators::{Bitmap, PaintTarget};
use crate::error::{ConsumerFailure, InvalidStateError};
use crate::identity::ResourceIdentity;
use crate::status::Status;
use crate::sync::lock;

static NEXT_CONSUMER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique consumer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    fn next() -> Self {
        Self(NEXT_CONSUMER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// One `request()` on a consumer.
///
/// Every request starts a new cycle. Results carry the cycle they were
/// requested in and are dropped once the consumer has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RequestCycle(u64);

impl RequestCycle {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The cycle [`ImageConsumer::begin_request`] started and what it replaced.
#[derive(Debug, Clone)]
pub(crate) struct RequestStart {
    pub(crate) cycle: RequestCycle,
    pub(crate) previous_identity: Option<ResourceIdentity>,
    pub(crate) previous_status: Status,
}

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// One status transition, delivered synchronously to status listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Consumer that changed.
    pub consumer: ConsumerId,
    /// Status before the transition.
    pub previous: Status,
    /// Status after the transition.
    pub current: Status,
}

type StatusCallback = Arc<dyn Fn(&StatusChange) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(ConsumerId, &ConsumerFailure) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    status: Vec<(ListenerId, StatusCallback)>,
    failure: Vec<(ListenerId, FailureCallback)>,
}

impl Listeners {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

struct ConsumerState {
    cycle: RequestCycle,
    status: Status,
    src: Option<String>,
    identity: Option<ResourceIdentity>,
    bitmap: Option<Arc<Bitmap>>,
    last_error: Option<ConsumerFailure>,
}

/// An entity waiting on an image, e.g. one display element.
///
/// Created with status [`Status::Inert`]. Shared as `Arc<ImageConsumer>`;
/// the coordinator only keeps weak references, so dropping the last `Arc`
/// turns any pending notification into a no-op.
pub struct ImageConsumer {
    id: ConsumerId,
    target: PaintTarget,
    state: Mutex<ConsumerState>,
    listeners: Mutex<Listeners>,
}

impl ImageConsumer {
    /// New inert consumer painting into `target`.
    pub fn new(target: PaintTarget) -> Arc<Self> {
        Arc::new(Self {
            id: ConsumerId::next(),
            target,
            state: Mutex::new(ConsumerState {
                cycle: RequestCycle::default(),
                status: Status::Inert,
                src: None,
                identity: None,
                bitmap: None,
                last_error: None,
            }),
            listeners: Mutex::new(Listeners::default()),
        })
    }

    /// Consumer id.
    #[must_use]
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Where this consumer's bitmap is painted.
    #[must_use]
    pub fn target(&self) -> &PaintTarget {
        &self.target
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        lock(&self.state).status
    }

    /// URL as last requested, before normalization.
    #[must_use]
    pub fn src(&self) -> Option<String> {
        lock(&self.state).src.clone()
    }

    /// Normalized identity of the last request.
    #[must_use]
    pub fn identity(&self) -> Option<ResourceIdentity> {
        lock(&self.state).identity.clone()
    }

    /// Failure of the current request cycle, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<ConsumerFailure> {
        lock(&self.state).last_error.clone()
    }

    /// Whether a decoded bitmap is waiting to be painted.
    ///
    /// Only true between `Decoded` and the paint call.
    #[must_use]
    pub fn holds_bitmap(&self) -> bool {
        lock(&self.state).bitmap.is_some()
    }

    /// Current request cycle.
    #[must_use]
    pub fn cycle(&self) -> RequestCycle {
        lock(&self.state).cycle
    }

    /// Set the status and notify status listeners; returns the status replaced.
    pub fn set_status(&self, status: Status) -> Status {
        let previous = std::mem::replace(&mut lock(&self.state).status, status);
        self.announce_status(previous, status);
        previous
    }

    /// Set the status from its event name (`"decoded"`, `"painted"`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] for an unknown name; the status is left
    /// unchanged and no listener fires.
    pub fn set_status_named(&self, name: &str) -> Result<(), InvalidStateError> {
        let status = name.parse::<Status>()?;
        self.set_status(status);
        Ok(())
    }

    /// Register a status listener, called synchronously on every transition.
    pub fn on_status_change(
        &self,
        callback: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut listeners = lock(&self.listeners);
        let id = listeners.allocate();
        listeners.status.push((id, Arc::new(callback)));
        id
    }

    /// Register a failure listener (load or paint failures).
    pub fn on_failure(
        &self,
        callback: impl Fn(ConsumerId, &ConsumerFailure) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut listeners = lock(&self.listeners);
        let id = listeners.allocate();
        listeners.failure.push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.status.len() + listeners.failure.len();
        listeners.status.retain(|(id, _)| *id != listener);
        listeners.failure.retain(|(id, _)| *id != listener);
        before != listeners.status.len() + listeners.failure.len()
    }

    /// Start a new request cycle at [`Status::LoadStarted`].
    ///
    /// Drops any held bitmap and error of the previous cycle. Listeners are
    /// not called; the caller announces the transition.
    pub(crate) fn begin_request(&self, src: &str, identity: ResourceIdentity) -> RequestStart {
        let mut state = lock(&self.state);
        state.cycle = state.cycle.next();
        state.src = Some(src.to_string());
        state.bitmap = None;
        state.last_error = None;
        RequestStart {
            cycle: state.cycle,
            previous_identity: state.identity.replace(identity),
            previous_status: std::mem::replace(&mut state.status, Status::LoadStarted),
        }
    }

    /// Set the status if `cycle` is still current; returns the status replaced.
    ///
    /// Listeners are not called; the caller announces the transition.
    pub(crate) fn advance_in(&self, cycle: RequestCycle, status: Status) -> Option<Status> {
        let mut state = lock(&self.state);
        (state.cycle == cycle).then(|| std::mem::replace(&mut state.status, status))
    }

    pub(crate) fn hold_bitmap(&self, cycle: RequestCycle, bitmap: Arc<Bitmap>) -> bool {
        let mut state = lock(&self.state);
        if state.cycle != cycle {
            return false;
        }
        state.bitmap = Some(bitmap);
        true
    }

    pub(crate) fn take_bitmap(&self, cycle: RequestCycle) -> Option<Arc<Bitmap>> {
        let mut state = lock(&self.state);
        if state.cycle != cycle {
            return None;
        }
        state.bitmap.take()
    }

    /// Record a failure of `cycle` as the last error.
    ///
    /// Returns `false` if the consumer has moved on.
    pub(crate) fn record_failure(&self, cycle: RequestCycle, failure: &ConsumerFailure) -> bool {
        let mut state = lock(&self.state);
        if state.cycle != cycle {
            return false;
        }
        state.last_error = Some(failure.clone());
        true
    }

    /// Call failure listeners.
    pub(crate) fn announce_failure(&self, failure: &ConsumerFailure) {
        let callbacks: Vec<FailureCallback> = lock(&self.listeners)
            .failure
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(self.id, failure))).is_err() {
                tracing::error!(consumer = %self.id, error = %failure, "failure listener panicked");
            }
        }
    }

    /// Call status listeners with one transition.
    pub(crate) fn announce_status(&self, previous: Status, current: Status) {
        let change = StatusChange {
            consumer: self.id,
            previous,
            current,
        };
        let callbacks: Vec<StatusCallback> = lock(&self.listeners)
            .status
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&change))).is_err() {
                tracing::error!(
                    consumer = %self.id,
                    status = %change.current,
                    "status listener panicked"
                );
            }
        }
    }
}

impl fmt::Debug for ImageConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ImageConsumer")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("status", &state.status)
            .field("src", &state.src)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::LoadError;

    fn consumer() -> Arc<ImageConsumer> {
        ImageConsumer::new(PaintTarget::new("hero"))
    }

    #[test]
    fn starts_inert() {
        let c = consumer();
        assert_eq!(c.status(), Status::Inert);
        assert!(c.src().is_none());
        assert!(!c.holds_bitmap());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(consumer().id(), consumer().id());
    }

    #[test]
    fn set_status_fires_listeners_with_transition() {
        let c = consumer();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        c.on_status_change(move |change| lock(&sink).push((change.previous, change.current)));

        c.set_status(Status::LoadStarted);
        c.set_status(Status::Loaded);

        assert_eq!(
            *lock(&seen),
            vec![
                (Status::Inert, Status::LoadStarted),
                (Status::LoadStarted, Status::Loaded)
            ]
        );
    }

    #[test]
    fn unknown_status_name_leaves_state_untouched() {
        let c = consumer();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        c.on_status_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        c.set_status(Status::LoadStarted);

        let err = c.set_status_named("exploded").unwrap_err();

        assert_eq!(err.value, "exploded");
        assert_eq!(c.status(), Status::LoadStarted);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_status_is_applied() {
        let c = consumer();
        c.set_status_named("decoded").unwrap();
        assert_eq!(c.status(), Status::Decoded);
    }

    #[test]
    fn removed_listener_stops_firing() {
        let c = consumer();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let id = c.on_status_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(c.remove_listener(id));
        assert!(!c.remove_listener(id));
        c.set_status(Status::LoadStarted);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let c = consumer();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        c.on_status_change(|_| panic!("listener bug"));
        c.on_status_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        c.set_status(Status::LoadStarted);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(c.status(), Status::LoadStarted);
    }

    #[test]
    fn failure_is_recorded_and_reported() {
        let c = consumer();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        c.on_failure(move |_, failure| *lock(&sink) = Some(failure.clone()));

        let failure = ConsumerFailure::Load(LoadError::Shutdown);

        assert!(c.record_failure(c.cycle(), &failure));
        c.announce_failure(&failure);

        assert_eq!(c.last_error(), Some(ConsumerFailure::Load(LoadError::Shutdown)));
        assert_eq!(*lock(&seen), Some(ConsumerFailure::Load(LoadError::Shutdown)));
    }

    #[test]
    fn bitmap_is_held_until_taken() {
        let c = consumer();
        let bitmap = Arc::new(Bitmap::from_rgba8(1, 1, vec![0; 4]).unwrap());
        assert!(c.hold_bitmap(c.cycle(), Arc::clone(&bitmap)));
        assert!(c.holds_bitmap());
        let taken = c.take_bitmap(c.cycle()).unwrap();
        assert!(Arc::ptr_eq(&taken, &bitmap));
        assert!(!c.holds_bitmap());
    }

    #[test]
    fn begin_request_resets_cycle_and_returns_previous_identity() {
        let c = consumer();
        let first = ResourceIdentity::parse("https://x/a.png").unwrap();
        let second = ResourceIdentity::parse("https://x/b.png").unwrap();
        let start = c.begin_request("a.png", first.clone());
        assert!(start.previous_identity.is_none());
        assert_eq!(start.previous_status, Status::Inert);
        c.record_failure(start.cycle, &ConsumerFailure::Load(LoadError::Shutdown));

        let restart = c.begin_request("b.png", second.clone());

        assert_eq!(restart.previous_identity, Some(first));
        assert!(restart.cycle > start.cycle);
        assert_eq!(c.status(), Status::LoadStarted);
        assert!(c.last_error().is_none());
        assert_eq!(c.identity(), Some(second));
        assert_eq!(c.src().as_deref(), Some("b.png"));
    }

    #[test]
    fn results_of_a_superseded_cycle_are_ignored() {
        let c = consumer();
        let stale = c.begin_request("a.png", ResourceIdentity::parse("https://x/a.png").unwrap());
        assert_eq!(c.advance_in(stale.cycle, Status::Loaded), Some(Status::LoadStarted));
        let current = c.begin_request("b.png", ResourceIdentity::parse("https://x/b.png").unwrap());
        assert_eq!(current.previous_status, Status::Loaded);
        let bitmap = Arc::new(Bitmap::from_rgba8(1, 1, vec![0; 4]).unwrap());

        assert!(!c.hold_bitmap(stale.cycle, Arc::clone(&bitmap)));
        assert_eq!(c.advance_in(stale.cycle, Status::Painted), None);
        assert!(!c.record_failure(stale.cycle, &ConsumerFailure::Load(LoadError::Shutdown)));
        assert!(c.hold_bitmap(current.cycle, bitmap));
        assert!(c.take_bitmap(stale.cycle).is_none());
        assert!(c.take_bitmap(current.cycle).is_some());

        assert_eq!(c.status(), Status::LoadStarted);
        assert!(c.last_error().is_none());
    }

    #[test]
    fn set_status_returns_the_replaced_status() {
        let c = consumer();
        assert_eq!(c.set_status(Status::LoadStarted), Status::Inert);
        assert_eq!(c.set_status(Status::Loaded), Status::LoadStarted);
    }
}
