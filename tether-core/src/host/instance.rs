//! Component instances.
//!
//! An instance carries three things the bridge rewires:
//!
//! - an own-property table, where plain fields live as data properties and
//!   external fields as read-only accessors;
//! - the render slot, the single cell the host calls through on every
//!   re-render;
//! - the disposer table, holding one disposer per bridge layer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::class::{ClassId, ComponentClass};
use super::FieldValue;
use crate::error::{BridgeError, Result};
use crate::reactive::Disposer;

/// Unique identifier for a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Generate a new unique instance ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance render function.
pub type RenderFn<V> = Arc<dyn Fn(&Arc<Instance<V>>) -> Result<()> + Send + Sync>;

/// Arguments forwarded to the host's mount operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Where to mount, in host terms.
    pub target: Option<String>,

    /// Reuse existing output instead of rendering from scratch.
    pub hydrating: bool,
}

impl MountOptions {
    /// Mount onto `target`.
    pub fn target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            hydrating: false,
        }
    }
}

/// Read-only accessor over a value owned by the external reactive system.
///
/// The value is captured when the field is classified. Reads return a clone
/// of that capture; writes are dropped.
#[derive(Clone)]
pub struct ExternalField<V> {
    value: V,
}

impl<V: FieldValue> ExternalField<V> {
    /// Capture `value`.
    pub fn new(value: V) -> Self {
        Self { value }
    }

    /// Read the captured value.
    pub fn get(&self) -> V {
        self.value.clone()
    }

    /// Ignore a write.
    pub fn set(&self, _value: V) {}
}

impl<V> fmt::Debug for ExternalField<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalField").finish_non_exhaustive()
    }
}

/// An own property of an instance.
#[derive(Debug, Clone)]
pub enum Property<V> {
    /// A value stored on the instance.
    Data {
        /// Stored value
        value: V,
        /// Whether writes are accepted
        writable: bool,
        /// Whether the property may be redefined
        configurable: bool,
    },

    /// An accessor over an externally owned value.
    External(ExternalField<V>),
}

impl<V: FieldValue> Property<V> {
    /// A writable, configurable data property.
    pub fn data(value: V) -> Self {
        Self::Data {
            value,
            writable: true,
            configurable: true,
        }
    }

    /// A data property that can be neither written nor redefined.
    pub fn sealed(value: V) -> Self {
        Self::Data {
            value,
            writable: false,
            configurable: false,
        }
    }

    /// An accessor over an externally owned value.
    pub fn external(value: V) -> Self {
        Self::External(ExternalField::new(value))
    }

    /// Whether the property may be redefined.
    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } => *configurable,
            Self::External(_) => true,
        }
    }

    /// Read the property.
    pub fn read(&self) -> V {
        match self {
            Self::Data { value, .. } => value.clone(),
            Self::External(field) => field.get(),
        }
    }

    /// The property's attributes.
    pub fn descriptor(&self) -> PropertyDescriptor {
        match self {
            Self::Data {
                writable,
                configurable,
                ..
            } => PropertyDescriptor {
                writable: *writable,
                enumerable: true,
                configurable: *configurable,
                accessor: false,
            },
            Self::External(_) => PropertyDescriptor {
                writable: false,
                enumerable: true,
                configurable: true,
                accessor: true,
            },
        }
    }
}

/// Attributes of an own property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Writes change the value
    pub writable: bool,
    /// Listed by [`Instance::keys`]
    pub enumerable: bool,
    /// May be redefined
    pub configurable: bool,
    /// Backed by an accessor rather than stored data
    pub accessor: bool,
}

/// One-slot indirection cell for the function the host calls to render.
pub struct RenderSlot<V> {
    current: Mutex<Option<RenderFn<V>>>,
}

impl<V> RenderSlot<V> {
    fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// The function currently installed.
    pub fn current(&self) -> Option<RenderFn<V>> {
        self.current.lock().clone()
    }

    /// Install `render`, returning the previous function.
    pub fn replace(&self, render: RenderFn<V>) -> Option<RenderFn<V>> {
        self.current.lock().replace(render)
    }

    /// Remove the installed function.
    pub fn clear(&self) -> Option<RenderFn<V>> {
        self.current.lock().take()
    }

    /// Check if no function is installed.
    pub fn is_empty(&self) -> bool {
        self.current.lock().is_none()
    }
}

/// Per-instance disposers, one per bridged class layer.
///
/// A layer without an entry behaves as if it held [`Disposer::noop`].
#[derive(Default)]
pub struct DisposerTable {
    slots: Mutex<HashMap<ClassId, Disposer>>,
}

impl DisposerTable {
    /// Store `disposer` for `layer`, returning the one it replaces.
    pub fn install(&self, layer: ClassId, disposer: Disposer) -> Option<Disposer> {
        self.slots.lock().insert(layer, disposer)
    }

    /// The disposer for `layer`.
    pub fn get(&self, layer: ClassId) -> Disposer {
        self.slots.lock().get(&layer).cloned().unwrap_or_default()
    }

    /// Invoke the disposer for `layer`.
    pub fn dispose(&self, layer: ClassId) {
        // Clone out first: the disposer may call back into the instance.
        let disposer = self.get(layer);
        disposer.dispose();
    }

    /// Number of layers with a disposer.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Check if no layer has a disposer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A live component instance.
pub struct Instance<V> {
    id: InstanceId,
    class: ComponentClass<V>,
    properties: RwLock<IndexMap<String, Property<V>>>,
    render_slot: RenderSlot<V>,
    disposers: DisposerTable,
}

impl<V: FieldValue> Instance<V> {
    /// Allocate an instance of `class` with no properties.
    ///
    /// State initialization is the host's job.
    pub fn new(class: ComponentClass<V>) -> Arc<Self> {
        Arc::new(Self {
            id: InstanceId::new(),
            class,
            properties: RwLock::new(IndexMap::new()),
            render_slot: RenderSlot::new(),
            disposers: DisposerTable::default(),
        })
    }

    /// Get the instance's unique ID.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The class this is an instance of.
    pub fn class(&self) -> &ComponentClass<V> {
        &self.class
    }

    /// Define or redefine an own property.
    ///
    /// Fails with [`BridgeError::ConfigurationConflict`] if a property with
    /// this key exists and is not configurable.
    pub fn define_property(&self, key: impl Into<String>, property: Property<V>) -> Result<()> {
        let key = key.into();
        let mut properties = self.properties.write();
        if let Some(existing) = properties.get(&key) {
            if !existing.is_configurable() {
                return Err(BridgeError::ConfigurationConflict {
                    component: self.class.name(),
                    field: key,
                });
            }
        }
        properties.insert(key, property);
        Ok(())
    }

    /// Read an own property.
    pub fn get(&self, key: &str) -> Option<V> {
        self.properties.read().get(key).map(Property::read)
    }

    /// Write an own property.
    ///
    /// Writes to accessors and non-writable data are dropped silently; an
    /// unknown key becomes a new data property. Returns whether the write
    /// was stored.
    pub fn set(&self, key: &str, value: V) -> bool {
        let mut properties = self.properties.write();
        match properties.get_mut(key) {
            Some(Property::Data {
                value: slot,
                writable: true,
                ..
            }) => {
                *slot = value;
                true
            }
            Some(Property::Data { .. }) => false,
            Some(Property::External(field)) => {
                tracing::trace!(field = key, instance = self.id.raw(), "ignoring write to external field");
                field.set(value);
                false
            }
            None => {
                properties.insert(key.to_string(), Property::data(value));
                true
            }
        }
    }

    /// Attributes of an own property.
    pub fn descriptor(&self, key: &str) -> Option<PropertyDescriptor> {
        self.properties.read().get(key).map(Property::descriptor)
    }

    /// Check if an own property exists.
    pub fn has(&self, key: &str) -> bool {
        self.properties.read().contains_key(key)
    }

    /// Keys of all enumerable own properties, in definition order.
    pub fn keys(&self) -> Vec<String> {
        self.properties
            .read()
            .iter()
            .filter(|(_, property)| property.descriptor().enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// The render slot.
    pub fn render_slot(&self) -> &RenderSlot<V> {
        &self.render_slot
    }

    /// The per-layer disposers.
    pub fn disposers(&self) -> &DisposerTable {
        &self.disposers
    }

    /// Call whatever is installed in the render slot.
    ///
    /// Does nothing before the host has installed a renderer.
    pub fn render(self: &Arc<Self>) -> Result<()> {
        match self.render_slot.current() {
            Some(render) => render(self),
            None => Ok(()),
        }
    }

    /// Mount through the class's mount operation.
    pub fn mount(self: &Arc<Self>, options: &MountOptions) -> Result<Arc<Self>> {
        let mount = self.class.mount_fn();
        mount(self, options)?;
        Ok(Arc::clone(self))
    }

    /// Destroy through the class's destroy operation.
    pub fn destroy(self: &Arc<Self>) {
        let destroy = self.class.destroy_fn();
        destroy(self);
    }
}

impl<V> fmt::Debug for Instance<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("properties", &self.properties.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ComponentDefinition, Lifecycle};
    use std::sync::atomic::AtomicUsize;

    fn instance() -> Arc<Instance<i64>> {
        Instance::new(ComponentClass::new(
            "Widget",
            ComponentDefinition::new(),
            None,
            Lifecycle::inert(),
        ))
    }

    #[test]
    fn external_writes_are_ignored() {
        let instance = instance();
        instance.define_property("label", Property::external(7)).unwrap();

        assert!(!instance.set("label", 1));
        assert!(!instance.set("label", 2));
        assert_eq!(instance.get("label"), Some(7));

        let descriptor = instance.descriptor("label").unwrap();
        assert!(descriptor.accessor);
        assert!(!descriptor.writable);
        assert!(descriptor.enumerable);
    }

    #[test]
    fn sealed_property_blocks_redefinition() {
        let instance = instance();
        instance.define_property("$el", Property::sealed(0)).unwrap();

        let err = instance.define_property("$el", Property::external(1)).unwrap_err();
        match err {
            BridgeError::ConfigurationConflict { component, field } => {
                assert_eq!(component, "Widget");
                assert_eq!(field, "$el");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(instance.get("$el"), Some(0));
    }

    #[test]
    fn data_property_can_be_replaced_by_accessor() {
        let instance = instance();
        instance.define_property("count", Property::data(1)).unwrap();
        instance.define_property("count", Property::external(5)).unwrap();
        assert_eq!(instance.get("count"), Some(5));
    }

    #[test]
    fn unknown_key_becomes_data() {
        let instance = instance();
        assert!(instance.set("fresh", 3));
        assert_eq!(instance.get("fresh"), Some(3));
        assert_eq!(instance.keys(), vec!["fresh".to_string()]);
    }

    #[test]
    fn render_goes_through_slot() {
        let instance = instance();
        instance.render().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let render: RenderFn<i64> = Arc::new(move |_: &Arc<Instance<i64>>| -> Result<()> {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(instance.render_slot().replace(render).is_none());

        instance.render().unwrap();
        instance.render().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(instance.render_slot().clear().is_some());
        assert!(instance.render_slot().is_empty());
    }

    #[test]
    fn missing_disposer_is_noop() {
        let table = DisposerTable::default();
        table.dispose(ClassId::new());
        assert!(table.is_empty());
    }

    #[test]
    fn disposer_table_is_per_layer() {
        let table = DisposerTable::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (a, b) = (ClassId::new(), ClassId::new());

        let first_clone = first.clone();
        table.install(a, Disposer::new(move || {
            first_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let second_clone = second.clone();
        table.install(b, Disposer::new(move || {
            second_clone.fetch_add(1, Ordering::SeqCst);
        }));

        table.dispose(a);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(table.len(), 2);
    }
}
