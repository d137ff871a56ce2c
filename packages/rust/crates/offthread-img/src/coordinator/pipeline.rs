//! Fetch → decode pipeline for one identity.
//!
//! Runs on the tokio runtime, never on the caller's thread. Every step is
//! reported back to the coordinator as a [`WorkerMessage`]; a panic inside a
//! collaborator is converted into a terminal [`LoadError::Panicked`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::collaborators::{Decoder, Fetcher};
use crate::error::{FetchError, LoadError};
use crate::identity::ResourceIdentity;
use crate::message::{Outcome, WorkerMessage};

/// Everything a pipeline needs, cloned per spawn.
#[derive(Clone)]
pub(super) struct PipelineContext {
    pub(super) fetcher: Arc<dyn Fetcher>,
    pub(super) decoder: Arc<dyn Decoder>,
    pub(super) fetch_timeout: Option<Duration>,
    pub(super) outcomes: mpsc::UnboundedSender<WorkerMessage>,
}

impl PipelineContext {
    fn post(&self, identity: &ResourceIdentity, outcome: Outcome) {
        let kind = outcome.kind();
        if self
            .outcomes
            .send(WorkerMessage::new(identity.clone(), outcome))
            .is_err()
        {
            tracing::debug!(identity = %identity, outcome = kind, "coordinator gone; outcome dropped");
        }
    }

    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Vec<u8>, FetchError> {
        let fetch = self.fetcher.fetch(identity);
        match self.fetch_timeout {
            Some(after) => tokio::time::timeout(after, fetch).await.unwrap_or_else(|_| {
                Err(FetchError::TimedOut {
                    url: identity.to_string(),
                    after,
                })
            }),
            None => fetch.await,
        }
    }
}

pub(super) async fn run_pipeline(ctx: PipelineContext, identity: ResourceIdentity) {
    let run = AssertUnwindSafe(execute(&ctx, &identity)).catch_unwind().await;
    if let Err(payload) = run {
        let reason = panic_message(payload.as_ref());
        tracing::error!(identity = %identity, reason = %reason, "image pipeline panicked");
        ctx.post(
            &identity,
            Outcome::LoadFailed(LoadError::Panicked {
                url: identity.to_string(),
                reason,
            }),
        );
    }
}

async fn execute(ctx: &PipelineContext, identity: &ResourceIdentity) {
    tracing::debug!(identity = %identity, "fetching");
    let bytes = match ctx.fetch(identity).await {
        Ok(bytes) => bytes,
        Err(error) => {
            ctx.post(identity, Outcome::LoadFailed(error.into()));
            return;
        }
    };
    ctx.post(identity, Outcome::Loaded);

    tracing::debug!(identity = %identity, bytes = bytes.len(), "decoding");
    let outcome = match ctx.decoder.decode(bytes).await {
        Ok(bitmap) => Outcome::Decoded(Arc::new(bitmap)),
        Err(error) => Outcome::LoadFailed(error.into()),
    };
    ctx.post(identity, outcome);
}

pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
