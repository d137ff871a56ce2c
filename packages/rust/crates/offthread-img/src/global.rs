//! Process-wide coordinator, created lazily and torn down explicitly.

use std::sync::{Arc, Mutex};

use crate::coordinator::WorkerCoordinator;
use crate::error::CoordinatorError;
use crate::sync::lock;

static GLOBAL: Mutex<Option<Arc<WorkerCoordinator>>> = Mutex::new(None);

/// Return the shared coordinator, creating it with `init` on first use.
///
/// # Errors
///
/// Propagates the error of `init`; the slot stays empty so a later call can
/// retry.
pub fn global_or_init(
    init: impl FnOnce() -> Result<Arc<WorkerCoordinator>, CoordinatorError>,
) -> Result<Arc<WorkerCoordinator>, CoordinatorError> {
    let mut slot = lock(&GLOBAL);
    if let Some(coordinator) = slot.as_ref() {
        return Ok(Arc::clone(coordinator));
    }
    let coordinator = init()?;
    *slot = Some(Arc::clone(&coordinator));
    Ok(coordinator)
}

/// The shared coordinator, if one exists.
#[must_use]
pub fn global() -> Option<Arc<WorkerCoordinator>> {
    lock(&GLOBAL).clone()
}

/// Shut down and forget the shared coordinator.
///
/// Returns `false` if there was none. The next [`global_or_init`] creates a
/// fresh one.
pub fn teardown_global() -> bool {
    let Some(coordinator) = lock(&GLOBAL).take() else {
        return false;
    };
    coordinator.shutdown();
    true
}
