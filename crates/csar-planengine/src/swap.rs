//! Hot-swappable collaborators.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Holds the current implementation of a collaborator.
///
/// Readers take a cheap `Arc` clone at call time, so a call already in
/// progress keeps the instance it started with.
pub struct Swappable<T: ?Sized> {
    current: RwLock<Arc<T>>,
}

impl<T: ?Sized> Swappable<T> {
    pub fn new(value: Arc<T>) -> Self {
        Self {
            current: RwLock::new(value),
        }
    }

    pub fn current(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replace the implementation used by subsequent calls.
    pub fn replace(&self, value: Arc<T>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = value;
    }
}

impl<T: ?Sized> fmt::Debug for Swappable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Swappable").finish_non_exhaustive()
    }
}
