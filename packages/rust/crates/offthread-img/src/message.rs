//! Messages posted from pipelines back to the coordinator.

use std::sync::Arc;

use crate::collaborators::Bitmap;
use crate::error::LoadError;
use crate::identity::ResourceIdentity;

/// Result of one pipeline step for an identity.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Bytes fetched; decode is starting.
    Loaded,
    /// Pipeline failed. Terminal.
    LoadFailed(LoadError),
    /// Bitmap decoded. Terminal.
    Decoded(Arc<Bitmap>),
}

impl Outcome {
    /// Whether this outcome settles the identity's pipeline.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loaded)
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Loaded => "load",
            Self::LoadFailed(_) => "load_failed",
            Self::Decoded(_) => "decoded",
        }
    }
}

/// Tagged message over the pipeline → coordinator channel.
#[derive(Debug, Clone)]
pub struct WorkerMessage {
    /// Identity the outcome belongs to.
    pub identity: ResourceIdentity,
    /// What happened.
    pub outcome: Outcome,
}

impl WorkerMessage {
    /// Message for `identity`.
    #[must_use]
    pub fn new(identity: ResourceIdentity, outcome: Outcome) -> Self {
        Self { identity, outcome }
    }
}
