//! Deferred paint of a decoded bitmap.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::notify::Notifier;
use super::pipeline::panic_message;
use crate::collaborators::Painter;
use crate::consumer::{ImageConsumer, RequestCycle};
use crate::error::{ConsumerFailure, PaintError};
use crate::status::Status;

/// Paint the bitmap `consumer` holds for `cycle` once the current dispatch
/// turn has finished.
///
/// The bitmap is released before the painter returns. A consumer that starts a
/// new request before or during the paint keeps its new status; the result of
/// the old cycle is dropped.
pub(super) async fn paint_when_idle(
    painter: Arc<dyn Painter>,
    notifier: Notifier,
    consumer: Arc<ImageConsumer>,
    cycle: RequestCycle,
) {
    tokio::task::yield_now().await;
    let Some(bitmap) = consumer.take_bitmap(cycle) else {
        tracing::debug!(consumer = %consumer.id(), "bitmap superseded before paint");
        return;
    };

    let painted = AssertUnwindSafe(painter.paint(bitmap, consumer.target()))
        .catch_unwind()
        .await;

    let error = match painted {
        Ok(Ok(())) => {
            if !notifier.advance(&consumer, cycle, Status::Painted) {
                tracing::debug!(consumer = %consumer.id(), "consumer moved on while painting");
            }
            return;
        }
        Ok(Err(error)) => error,
        Err(payload) => PaintError::Target {
            target: consumer.target().to_string(),
            reason: format!("painter panicked: {}", panic_message(payload.as_ref())),
        },
    };
    tracing::warn!(
        consumer = %consumer.id(),
        target = %consumer.target(),
        error = %error,
        "paint failed"
    );
    notifier.fail(&consumer, cycle, ConsumerFailure::Paint(error));
}
