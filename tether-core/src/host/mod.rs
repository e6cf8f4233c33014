//! Host Framework Contract
//!
//! The host is the component framework whose lifecycle the bridge wraps. It
//! owns class extension, instance construction, state initialization and the
//! render cycle; the bridge only needs a handful of seams from it.
//!
//! # Seams
//!
//! - A root [`ComponentClass`] and an `extend(base, definition)` factory
//!   producing subclasses ([`Host`]).
//! - Prototype-level `mount` / `destroy` operations on every class, which can
//!   be read and overridden ([`Lifecycle`]).
//! - A per-instance [`RenderSlot`]: the one-slot indirection cell holding the
//!   function the host calls whenever it re-renders the instance.
//! - An own-property table on each [`Instance`], so external fields can be
//!   exposed as read-only accessors next to the host's plain fields.
//!
//! The concrete types live here rather than behind traits because the bridge
//! must construct and rewire them; the host plugs in through closures.

mod definition;
mod class;
mod instance;

pub use definition::{ComponentDefinition, CtorCache, StateFactory, StateMap, StateSpec};
pub use class::{ClassId, ClassName, ComponentClass, DestroyFn, Lifecycle, MountFn};
pub use instance::{
    DisposerTable, ExternalField, Instance, InstanceId, MountOptions, Property,
    PropertyDescriptor, RenderFn, RenderSlot,
};

/// Bound shared by every field value the host and the reactive system exchange.
pub trait FieldValue: Clone + Send + Sync + 'static {}

impl<T> FieldValue for T where T: Clone + Send + Sync + 'static {}

/// A component framework that can extend classes from definitions.
pub trait Host<V: FieldValue>: Send + Sync + 'static {
    /// The framework's root component class.
    fn root(&self) -> ComponentClass<V>;

    /// Produce a subclass of `base` described by `definition`.
    ///
    /// Hosts may return a previously built class when the definition's
    /// [`CtorCache`] already holds one for `base`.
    fn extend(&self, base: &ComponentClass<V>, definition: ComponentDefinition<V>) -> ComponentClass<V>;
}
