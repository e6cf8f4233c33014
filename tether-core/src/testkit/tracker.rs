//! Dependency Tracker
//!
//! A small synchronous tracker in the style of observable-state libraries:
//! atoms hold values, reactions record which atoms they read, and writing an
//! atom re-runs the reactions that depend on it before `set` returns.
//!
//! # How It Works
//!
//! 1. `Reaction::track` pushes an entry onto a thread-local context stack,
//!    runs the closure, and pops the entry.
//!
//! 2. `Atom::get` records its id in the top entry, if there is one. Nested
//!    contexts each collect their own reads.
//!
//! 3. When the closure returns, the reaction's previous subscriptions are
//!    replaced by the atoms it just read.
//!
//! 4. `Atom::set` looks up the subscribed reactions and calls their re-run
//!    callbacks. A reaction that is currently running ignores the change;
//!    a disposed one never runs again.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::value::Value;
use crate::reactive::{Disposer, Reaction, ReactiveSystem, Rerun};

type Dependencies = SmallVec<[AtomId; 8]>;

/// Unique identifier for an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomId(u64);

impl AtomId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Unique identifier for a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReactionId(u64);

impl ReactionId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

// ----------------------------------------------------------------------------
// Tracking context
// ----------------------------------------------------------------------------

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

struct ContextEntry {
    reaction: ReactionId,
    dependencies: Dependencies,
}

/// Guard for one tracked scope. Pops its entry when dropped, even on panic.
struct TrackingContext {
    reaction: ReactionId,
}

impl TrackingContext {
    fn enter(reaction: ReactionId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                reaction,
                dependencies: Dependencies::new(),
            });
        });
        Self { reaction }
    }

    fn record(atom: AtomId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if !entry.dependencies.contains(&atom) {
                    entry.dependencies.push(atom);
                }
            }
        });
    }

    fn dependencies(&self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for TrackingContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.reaction, self.reaction,
                    "tracking context mismatch: expected {:?}, got {:?}",
                    self.reaction, entry.reaction
                );
            }
        });
    }
}

// ----------------------------------------------------------------------------
// Tracker
// ----------------------------------------------------------------------------

#[derive(Default)]
struct TrackerInner {
    /// Atom → reactions that read it during their last run.
    observers: DashMap<AtomId, SmallVec<[ReactionId; 4]>>,

    /// Every reaction that has not been dropped.
    reactions: DashMap<ReactionId, Weak<ReactionInner>>,

    disposer_calls: AtomicUsize,
}

impl TrackerInner {
    fn subscribe(&self, reaction: ReactionId, atoms: &[AtomId]) {
        for atom in atoms {
            let mut observers = self.observers.entry(*atom).or_default();
            if !observers.contains(&reaction) {
                observers.push(reaction);
            }
        }
    }

    fn unsubscribe(&self, reaction: ReactionId, atoms: &[AtomId]) {
        for atom in atoms {
            if let Some(mut observers) = self.observers.get_mut(atom) {
                observers.retain(|id| *id != reaction);
            }
            self.observers.remove_if(atom, |_, observers| observers.is_empty());
        }
    }

    fn notify(&self, atom: AtomId) {
        // Snapshot first: re-runs resubscribe while we iterate.
        let observers = match self.observers.get(&atom) {
            Some(entry) => entry.value().clone(),
            None => return,
        };

        for id in observers {
            let reaction = self.reactions.get(&id).and_then(|entry| entry.upgrade());
            if let Some(reaction) = reaction {
                reaction.invalidate();
            }
        }
    }
}

/// A synchronous dependency tracker.
///
/// Cloning shares the same tracker.
#[derive(Clone, Default)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an observable cell.
    pub fn atom(&self, value: impl Into<Value>) -> Atom {
        Atom {
            id: AtomId::new(),
            value: Arc::new(RwLock::new(value.into())),
            tracker: Arc::clone(&self.inner),
        }
    }

    /// Create an observable cell already wrapped as a field value.
    pub fn observable(&self, value: impl Into<Value>) -> Value {
        Value::Observable(self.atom(value))
    }

    /// Number of reactions that exist and are not disposed.
    pub fn live_reactions(&self) -> usize {
        self.live().len()
    }

    /// Labels of live reactions, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<_> = self.live().iter().map(|r| r.label.clone()).collect();
        labels.sort();
        labels
    }

    /// How many times any disposer handed out by this tracker was called.
    pub fn disposer_calls(&self) -> usize {
        self.inner.disposer_calls.load(Ordering::SeqCst)
    }

    /// Number of reactions subscribed to `atom`.
    pub fn observer_count(&self, atom: &Atom) -> usize {
        self.inner
            .observers
            .get(&atom.id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    fn live(&self) -> Vec<Arc<ReactionInner>> {
        let handles: Vec<Weak<ReactionInner>> = self
            .inner
            .reactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        handles
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|reaction| !reaction.disposed.load(Ordering::SeqCst))
            .collect()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("reactions", &self.inner.reactions.len())
            .field("observed_atoms", &self.inner.observers.len())
            .finish()
    }
}

impl ReactiveSystem<Value> for Tracker {
    type Reaction = TrackedReaction;

    fn is_observable(&self, value: &Value) -> bool {
        matches!(value, Value::Observable(_))
    }

    fn reaction(&self, label: &str, rerun: Rerun) -> TrackedReaction {
        let inner = Arc::new(ReactionInner {
            id: ReactionId::new(),
            label: label.to_string(),
            rerun,
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            runs: AtomicUsize::new(0),
            dependencies: Mutex::new(Dependencies::new()),
            tracker: Arc::downgrade(&self.inner),
        });
        self.inner.reactions.insert(inner.id, Arc::downgrade(&inner));
        TrackedReaction { inner }
    }
}

// ----------------------------------------------------------------------------
// Atom
// ----------------------------------------------------------------------------

/// An observable cell.
///
/// Clones share the cell. Equality is identity.
#[derive(Clone)]
pub struct Atom {
    id: AtomId,
    value: Arc<RwLock<Value>>,
    tracker: Arc<TrackerInner>,
}

impl Atom {
    /// Get the atom's unique ID.
    pub fn id(&self) -> AtomId {
        self.id
    }

    /// Read the value, recording a dependency inside a tracked scope.
    pub fn get(&self) -> Value {
        TrackingContext::record(self.id);
        self.value.read().clone()
    }

    /// Read the value without recording a dependency.
    pub fn get_untracked(&self) -> Value {
        self.value.read().clone()
    }

    /// Write the value and re-run dependent reactions.
    ///
    /// Writing an equal value notifies nobody.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut guard = self.value.write();
            if *guard == value {
                return;
            }
            *guard = value;
        }
        self.tracker.notify(self.id);
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom").field("id", &self.id.0).finish()
    }
}

// ----------------------------------------------------------------------------
// Reaction
// ----------------------------------------------------------------------------

struct ReactionInner {
    id: ReactionId,
    label: String,
    rerun: Rerun,
    disposed: AtomicBool,
    running: AtomicBool,
    runs: AtomicUsize,
    dependencies: Mutex<Dependencies>,
    tracker: Weak<TrackerInner>,
}

impl ReactionInner {
    fn invalidate(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.load(Ordering::SeqCst) {
            tracing::debug!(reaction = %self.label, "change during own run ignored");
            return;
        }
        (self.rerun)();
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.unsubscribe(self.id, &dependencies);
        }
        tracing::debug!(reaction = %self.label, "reaction disposed");
    }
}

impl Drop for ReactionInner {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.upgrade() {
            let dependencies = std::mem::take(self.dependencies.get_mut());
            tracker.unsubscribe(self.id, &dependencies);
            tracker.reactions.remove(&self.id);
        }
    }
}

/// Clears the running flag when a tracked scope ends, even on panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Reaction handed out by [`Tracker`].
pub struct TrackedReaction {
    inner: Arc<ReactionInner>,
}

impl TrackedReaction {
    /// Get the reaction's unique ID.
    pub fn id(&self) -> ReactionId {
        self.inner.id
    }

    /// The label given at creation.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Check if the reaction was disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of completed tracked runs.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }
}

impl Reaction for TrackedReaction {
    fn track(&self, scope: &mut dyn FnMut()) {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        if inner.running.swap(true, Ordering::SeqCst) {
            tracing::debug!(reaction = %inner.label, "nested track of a running reaction ignored");
            return;
        }
        let _running = RunningGuard(&inner.running);

        let Some(tracker) = inner.tracker.upgrade() else {
            scope();
            return;
        };

        let previous = std::mem::take(&mut *inner.dependencies.lock());
        tracker.unsubscribe(inner.id, &previous);

        let collected = {
            let context = TrackingContext::enter(inner.id);
            scope();
            context.dependencies()
        };
        inner.runs.fetch_add(1, Ordering::SeqCst);

        // Disposed from inside the scope: stay unsubscribed.
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        tracker.subscribe(inner.id, &collected);
        *inner.dependencies.lock() = collected;
    }

    fn disposer(&self) -> Disposer {
        let reaction = Arc::downgrade(&self.inner);
        let tracker = self.inner.tracker.clone();
        Disposer::new(move || {
            if let Some(tracker) = tracker.upgrade() {
                tracker.disposer_calls.fetch_add(1, Ordering::SeqCst);
            }
            if let Some(reaction) = reaction.upgrade() {
                reaction.dispose();
            }
        })
    }
}

impl fmt::Debug for TrackedReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedReaction")
            .field("label", &self.inner.label)
            .field("runs", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
