//! Disposer handles.

use std::fmt;
use std::sync::Arc;

/// A cloneable handle that tears down a reaction.
///
/// The bridge only ever calls it; idempotence is the reactive system's job.
/// [`Disposer::noop`] stands in until a real reaction exists.
#[derive(Clone)]
pub struct Disposer(Arc<dyn Fn() + Send + Sync>);

impl Disposer {
    /// Wrap a teardown function.
    pub fn new<F>(dispose: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(dispose))
    }

    /// A disposer that does nothing.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Invoke the teardown.
    pub fn dispose(&self) {
        (self.0)();
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer").finish_non_exhaustive()
    }
}
