//! External Reactive System Contract
//!
//! The bridge does not implement dependency tracking. It drives whatever
//! fine-grained observable system owns the component's external state through
//! the two traits in this module.
//!
//! # What the Bridge Needs
//!
//! - A predicate telling observable values apart from plain ones.
//! - A named unit of tracked work (a reaction) built around a re-run callback.
//! - `track`, which runs a closure while recording the observables it reads
//!   and arranges for the re-run callback to fire when any of them changes.
//! - A disposer that permanently stops future re-runs.
//!
//! Tracking is synchronous: `track` returns only after the closure has run,
//! and the re-run callback is invoked from whatever call stack mutated the
//! observable.

mod disposer;

use std::sync::Arc;

pub use disposer::Disposer;

/// Callback the reactive system invokes when a tracked dependency changes.
pub type Rerun = Arc<dyn Fn() + Send + Sync>;

/// An external fine-grained reactive system.
///
/// `V` is the field value type shared with the host framework.
pub trait ReactiveSystem<V>: Send + Sync + 'static {
    /// The unit of tracked work produced by [`ReactiveSystem::reaction`].
    type Reaction: Reaction;

    /// Whether the reactive system owns this value.
    fn is_observable(&self, value: &V) -> bool;

    /// Create a reaction labelled `label` that calls `rerun` on change.
    ///
    /// The reaction does nothing until [`Reaction::track`] is first called.
    fn reaction(&self, label: &str, rerun: Rerun) -> Self::Reaction;
}

/// A named, disposable unit of tracked work.
pub trait Reaction: Send + Sync + 'static {
    /// Run `scope`, recording every observable it reads as a dependency.
    ///
    /// After disposal this must not run `scope` and must not schedule re-runs.
    fn track(&self, scope: &mut dyn FnMut());

    /// A handle that permanently stops this reaction.
    ///
    /// Invoking it more than once is a no-op.
    fn disposer(&self) -> Disposer;
}
