//! offthread-img - Off-main-thread image decode coordination
//!
//! Consumers ask for images by URL; the coordinator deduplicates requests for
//! the same normalized identity, runs at most `max_concurrency` fetch/decode
//! pipelines on the tokio runtime, and fans each result out to every consumer
//! waiting on that identity. A consumer walks
//! `inert → loadstarted → load → decoded → painted`.
//!
//! # Architecture
//!
//! ```text
//! offthread-img/src/
//! ├── lib.rs            # Re-exports (this file)
//! ├── error.rs          # Error enums
//! ├── identity.rs       # URL normalization
//! ├── status.rs         # Consumer lifecycle states
//! ├── consumer.rs       # ImageConsumer + listeners
//! ├── collaborators.rs  # Fetcher / Decoder / Painter traits, Bitmap
//! ├── queue.rs          # ResourceQueue (dedup + concurrency cap)
//! ├── registry.rs       # JobRegistry (identity → waiters)
//! ├── message.rs        # Pipeline → coordinator messages
//! ├── config.rs         # CoordinatorConfig
//! ├── global.rs         # Process-wide coordinator
//! └── coordinator/      # WorkerCoordinator, pipelines, paint
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use offthread_img::{Collaborators, CoordinatorConfig, ImageConsumer, PaintTarget, WorkerCoordinator};
//!
//! let coordinator = WorkerCoordinator::start(collaborators, CoordinatorConfig::default())?;
//! let hero = ImageConsumer::new(PaintTarget::new("hero"));
//! coordinator.request(&hero, "https://example.com/hero.png")?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

mod collaborators;
mod config;
mod consumer;
mod coordinator;
mod error;
mod global;
mod identity;
mod message;
mod queue;
mod registry;
mod status;
mod sync;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use collaborators::{Bitmap, Decoder, Fetcher, PaintTarget, Painter};
pub use config::{CoordinatorConfig, DEFAULT_MAX_CONCURRENCY};
pub use consumer::{ConsumerId, ImageConsumer, ListenerId, RequestCycle, StatusChange};
pub use coordinator::{Collaborators, QueueSnapshot, WorkerCoordinator};
pub use error::{
    ConfigError, ConsumerFailure, CoordinatorError, DecodeError, FetchError, InvalidStateError,
    LoadError, PaintError,
};
pub use global::{global, global_or_init, teardown_global};
pub use identity::{DocumentLocation, ResourceIdentity};
pub use message::{Outcome, WorkerMessage};
pub use queue::ResourceQueue;
pub use registry::{JobEntry, JobRegistry, Waiter};
pub use status::Status;

// Lifecycle event bus, re-exported for observers.
pub use offthread_events as events;
