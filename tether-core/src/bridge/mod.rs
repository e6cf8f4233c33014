//! The Reactive Bridge
//!
//! Two pieces hand a component's render cycle over from the host framework
//! to the external reactive system.
//!
//! ## Field Classifier
//!
//! Resolves a component's declared state and splits it. Values the reactive
//! system owns become read-only accessors on the instance; everything else is
//! returned to the host, which never learns the external fields exist.
//!
//! ## Lifecycle Bridge
//!
//! Builds a subclass whose state goes through the classifier and whose mount
//! runs inside a reaction. The first tracked pass calls the host's own mount,
//! then captures the native render function and puts the tracked render in
//! the instance's render slot, so host-triggered and externally triggered
//! updates go through one path. Destroy disposes the reaction before handing
//! over to the host.
//!
//! # Partition
//!
//! External fields never enter host tracking and host fields are never read
//! inside the classifier, so neither system observes the other's state.

mod fields;
mod lifecycle;

pub use fields::{classify, resolve, Field};
pub use lifecycle::{observer, Bridge, Component};
