//! Tether Core
//!
//! This crate hands a component's render cycle from its host framework to an
//! external fine-grained reactive system. It provides:
//!
//! - A field classifier that keeps externally observable state out of the
//!   host's own reactivity and exposes it as read-only accessors instead
//! - A lifecycle bridge that runs mount and every later render inside a
//!   reaction owned by the external system
//! - The contracts both collaborators implement ([`Host`], [`ReactiveSystem`])
//! - In-process doubles of both collaborators (`testkit` feature)
//!
//! # Architecture
//!
//! - `host`: component definitions, classes and instances, plus the [`Host`] trait
//! - `reactive`: the [`ReactiveSystem`] and [`Reaction`] traits and [`Disposer`]
//! - `bridge`: the field classifier and the lifecycle bridge
//! - `testkit`: `MockHost` and `Tracker`
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use parking_lot::Mutex;
//! use tether_core::testkit::{MockHost, Tracker, Value};
//! use tether_core::{observer, ComponentDefinition, MountOptions};
//!
//! let host = MockHost::new();
//! let tracker = Tracker::new();
//! let label = tracker.atom("a");
//! let output = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = output.clone();
//! let definition = ComponentDefinition::new()
//!     .with_name("Badge")
//!     .with_static_state([("count", Value::from(0)), ("label", Value::from(label.clone()))])
//!     .with_render(move |instance| {
//!         let label = instance.get("label").map(|v| v.resolve()).unwrap_or_default();
//!         sink.lock().push(label.to_string());
//!         Ok(())
//!     });
//!
//! let class = observer(&host, &tracker, definition);
//! let instance = host.instantiate(&class).unwrap();
//! instance.mount(&MountOptions::default()).unwrap();
//!
//! // The external change re-renders through the reaction
//! label.set("b");
//! assert_eq!(*output.lock(), vec!["a", "b"]);
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod reactive;

#[cfg(feature = "testkit")]
pub mod testkit;

pub use bridge::{classify, observer, resolve, Bridge, Component, Field};
pub use bridge::observer as bridge;
pub use config::BridgeConfig;
pub use error::{BoxError, BridgeError, Result};
pub use host::{
    ClassId, ComponentClass, ComponentDefinition, ExternalField, FieldValue, Host, Instance,
    InstanceId, Lifecycle, MountOptions, Property, PropertyDescriptor, StateMap, StateSpec,
};
pub use reactive::{Disposer, Reaction, ReactiveSystem, Rerun};
