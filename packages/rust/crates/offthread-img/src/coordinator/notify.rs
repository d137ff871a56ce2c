//! Consumer notification plus event-bus mirroring.

use offthread_events::{EventBus, ImageEvent, sources, topics};
use serde_json::Value;

use crate::consumer::{ImageConsumer, RequestCycle, RequestStart};
use crate::error::ConsumerFailure;
use crate::identity::ResourceIdentity;
use crate::status::Status;

/// Applies transitions and failures to consumers and mirrors them on the bus.
#[derive(Debug, Clone, Default)]
pub(super) struct Notifier {
    bus: Option<EventBus>,
}

impl Notifier {
    pub(super) fn new(bus: Option<EventBus>) -> Self {
        Self { bus }
    }

    pub(super) fn bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }

    /// Start a request cycle on `consumer`.
    ///
    /// Each transition is published before listeners run, so events a
    /// listener causes follow it on the bus.
    pub(super) fn begin(
        &self,
        consumer: &ImageConsumer,
        raw_url: &str,
        identity: ResourceIdentity,
    ) -> RequestStart {
        let start = consumer.begin_request(raw_url, identity);
        self.publish_change(consumer, start.previous_status, Status::LoadStarted);
        consumer.announce_status(start.previous_status, Status::LoadStarted);
        start
    }

    /// Move `consumer` to `status` unless it has left `cycle`.
    pub(super) fn advance(
        &self,
        consumer: &ImageConsumer,
        cycle: RequestCycle,
        status: Status,
    ) -> bool {
        let Some(previous) = consumer.advance_in(cycle, status) else {
            return false;
        };
        self.publish_change(consumer, previous, status);
        consumer.announce_status(previous, status);
        true
    }

    /// Report `failure` to `consumer` unless it has left `cycle`.
    pub(super) fn fail(
        &self,
        consumer: &ImageConsumer,
        cycle: RequestCycle,
        failure: ConsumerFailure,
    ) -> bool {
        let (source, topic) = match &failure {
            ConsumerFailure::Load(_) => (sources::COORDINATOR, topics::LOAD_FAILED),
            ConsumerFailure::Paint(_) => (sources::PAINTER, topics::PAINT_FAILED),
        };
        if !consumer.record_failure(cycle, &failure) {
            return false;
        }
        if let Some(bus) = &self.bus {
            let url = consumer.identity();
            bus.publish(ImageEvent::failure(
                source,
                topic,
                consumer.id().get(),
                url.as_ref().map(ResourceIdentity::as_str),
                &failure.to_string(),
            ));
        }
        consumer.announce_failure(&failure);
        true
    }

    fn publish_change(&self, consumer: &ImageConsumer, previous: Status, current: Status) {
        if let Some(bus) = &self.bus {
            let url = consumer.identity();
            bus.publish(ImageEvent::status_change(
                sources::COORDINATOR,
                consumer.id().get(),
                url.as_ref().map(ResourceIdentity::as_str),
                previous.as_str(),
                current.as_str(),
            ));
        }
    }

    pub(super) fn emit(&self, topic: &str, payload: Value) {
        if let Some(bus) = &self.bus {
            bus.emit(sources::COORDINATOR, topic, payload);
        }
    }
}
