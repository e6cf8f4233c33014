//! Test Doubles
//!
//! In-process stand-ins for both collaborators, small enough to reason about
//! in tests and benchmarks:
//!
//! - [`Tracker`]: a synchronous dependency tracker implementing
//!   [`ReactiveSystem`](crate::ReactiveSystem) over [`Value`], with
//!   [`Atom`] as its observable cell.
//! - [`MockHost`]: a host implementing [`Host`](crate::Host), with a root
//!   class, a ctor cache aware `extend`, state initialization that merges
//!   ancestors root to leaf, and counters for mounts, renders and destroys.
//!
//! Neither is meant as a production reactive system or component framework.

mod value;
mod tracker;
mod host;

pub use value::Value;
pub use tracker::{Atom, AtomId, ReactionId, TrackedReaction, Tracker};
pub use host::{MockHost, HOST_CLASS_NAME, RESERVED_ELEMENT};
