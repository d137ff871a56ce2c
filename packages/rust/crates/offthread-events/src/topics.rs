//! Event topic constants for type-safe routing.

/// A consumer moved to a new status.
pub const STATUS_CHANGED: &str = "image/status";
/// A consumer's load failed (fetch, decode or teardown).
pub const LOAD_FAILED: &str = "image/failed";
/// Painting a decoded bitmap failed.
pub const PAINT_FAILED: &str = "image/paint_failed";

/// A pipeline started for an identity.
pub const PIPELINE_STARTED: &str = "queue/started";
/// A result arrived for an identity nobody is waiting on.
pub const REGISTRY_MISS: &str = "queue/registry_miss";

/// Coordinator torn down.
pub const SYSTEM_SHUTDOWN: &str = "system/shutdown";

/// Event source constants
pub mod sources {
    /// The request coordinator.
    pub const COORDINATOR: &str = "coordinator";
    /// The paint scheduler.
    pub const PAINTER: &str = "painter";
}
