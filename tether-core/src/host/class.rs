//! Component classes.
//!
//! A class is what the host's `extend` produces: a definition, a parent, a
//! `name` property and the prototype-level lifecycle operations. Handles are
//! cheap to clone and compare by identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::definition::ComponentDefinition;
use super::instance::{Instance, MountOptions, RenderFn};
use super::FieldValue;
use crate::error::{BridgeError, Result};

/// Unique identifier for a component class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    /// Generate a new unique class ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ClassId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Prototype-level mount operation.
pub type MountFn<V> = Arc<dyn Fn(&Arc<Instance<V>>, &MountOptions) -> Result<()> + Send + Sync>;

/// Prototype-level destroy operation.
pub type DestroyFn<V> = Arc<dyn Fn(&Arc<Instance<V>>) + Send + Sync>;

/// The lifecycle operations a class exposes to its instances.
pub struct Lifecycle<V> {
    /// Called by [`Instance::mount`].
    pub mount: MountFn<V>,

    /// Called by [`Instance::destroy`].
    pub destroy: DestroyFn<V>,
}

impl<V: FieldValue> Lifecycle<V> {
    /// A lifecycle whose operations do nothing.
    pub fn inert() -> Self {
        Self {
            mount: Arc::new(|_: &Arc<Instance<V>>, _: &MountOptions| -> Result<()> { Ok(()) }),
            destroy: Arc::new(|_: &Arc<Instance<V>>| {}),
        }
    }
}

impl<V> Clone for Lifecycle<V> {
    fn clone(&self) -> Self {
        Self {
            mount: Arc::clone(&self.mount),
            destroy: Arc::clone(&self.destroy),
        }
    }
}

/// The `name` property of a class, with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassName {
    value: String,
    writable: bool,
    configurable: bool,
}

impl ClassName {
    fn open(value: String) -> Self {
        Self {
            value,
            writable: true,
            configurable: true,
        }
    }

    /// The name itself.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the name can be reassigned.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Whether the attributes can still change.
    pub fn is_configurable(&self) -> bool {
        self.configurable
    }
}

struct ClassInner<V> {
    id: ClassId,
    name: RwLock<ClassName>,
    definition: ComponentDefinition<V>,
    parent: Option<ComponentClass<V>>,
    lifecycle: RwLock<Lifecycle<V>>,
}

/// A component class produced by the host.
pub struct ComponentClass<V> {
    inner: Arc<ClassInner<V>>,
}

impl<V: FieldValue> ComponentClass<V> {
    /// Create a class. Hosts call this from `root` and `extend`.
    ///
    /// The name starts out writable and configurable.
    pub fn new(
        name: impl Into<String>,
        definition: ComponentDefinition<V>,
        parent: Option<ComponentClass<V>>,
        lifecycle: Lifecycle<V>,
    ) -> Self {
        Self {
            inner: Arc::new(ClassInner {
                id: ClassId::new(),
                name: RwLock::new(ClassName::open(name.into())),
                definition,
                parent,
                lifecycle: RwLock::new(lifecycle),
            }),
        }
    }

    /// Get the class's unique ID.
    pub fn id(&self) -> ClassId {
        self.inner.id
    }

    /// The current name.
    pub fn name(&self) -> String {
        self.inner.name.read().value.clone()
    }

    /// The name together with its attributes.
    pub fn name_property(&self) -> ClassName {
        self.inner.name.read().clone()
    }

    /// Reassign the name.
    pub fn set_name(&self, name: impl Into<String>) -> Result<()> {
        let mut guard = self.inner.name.write();
        if !guard.writable {
            return Err(BridgeError::ReadOnlyName {
                name: guard.value.clone(),
            });
        }
        guard.value = name.into();
        Ok(())
    }

    /// Set the name and make it non-writable and non-configurable.
    ///
    /// Returns `false` and changes nothing if the name is already locked.
    pub fn harden_name(&self, name: impl Into<String>) -> bool {
        let mut guard = self.inner.name.write();
        if !guard.configurable {
            return false;
        }
        *guard = ClassName {
            value: name.into(),
            writable: false,
            configurable: false,
        };
        true
    }

    /// The definition this class was built from.
    pub fn definition(&self) -> &ComponentDefinition<V> {
        &self.inner.definition
    }

    /// The class this one extends, if any.
    pub fn parent(&self) -> Option<&ComponentClass<V>> {
        self.inner.parent.as_ref()
    }

    /// Check if this is a root class.
    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// All classes from the root down to this one.
    pub fn lineage(&self) -> Vec<ComponentClass<V>> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(class) = current {
            chain.push(class.clone());
            current = class.parent();
        }
        chain.reverse();
        chain
    }

    /// The nearest render function, searching from this class up to the root.
    pub fn renderer(&self) -> Option<RenderFn<V>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(render) = class.definition().render() {
                return Some(Arc::clone(render));
            }
            current = class.parent();
        }
        None
    }

    /// A snapshot of the lifecycle operations.
    pub fn lifecycle(&self) -> Lifecycle<V> {
        self.inner.lifecycle.read().clone()
    }

    /// The current mount operation.
    pub fn mount_fn(&self) -> MountFn<V> {
        Arc::clone(&self.inner.lifecycle.read().mount)
    }

    /// The current destroy operation.
    pub fn destroy_fn(&self) -> DestroyFn<V> {
        Arc::clone(&self.inner.lifecycle.read().destroy)
    }

    /// Override the mount operation for all instances of this class.
    pub fn set_mount(&self, mount: MountFn<V>) {
        self.inner.lifecycle.write().mount = mount;
    }

    /// Override the destroy operation for all instances of this class.
    pub fn set_destroy(&self, destroy: DestroyFn<V>) {
        self.inner.lifecycle.write().destroy = destroy;
    }
}

impl<V> ComponentClass<V> {
    pub(crate) fn downgrade(&self) -> WeakClass<V> {
        WeakClass(Arc::downgrade(&self.inner))
    }
}

impl<V> Clone for ComponentClass<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> PartialEq for ComponentClass<V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<V> Eq for ComponentClass<V> {}

impl<V> fmt::Debug for ComponentClass<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name.read().value)
            .field("parent", &self.inner.parent.as_ref().map(|p| p.inner.id))
            .finish()
    }
}

/// Non-owning class handle, used by ctor caches.
pub(crate) struct WeakClass<V>(Weak<ClassInner<V>>);

impl<V> WeakClass<V> {
    pub(crate) fn upgrade(&self) -> Option<ComponentClass<V>> {
        self.0.upgrade().map(|inner| ComponentClass { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> ComponentClass<i64> {
        ComponentClass::new("Root", ComponentDefinition::new(), None, Lifecycle::inert())
    }

    #[test]
    fn class_ids_are_unique() {
        assert_ne!(ClassId::new(), ClassId::new());
    }

    #[test]
    fn lineage_runs_root_to_leaf() {
        let root = root();
        let mid = ComponentClass::new("Mid", ComponentDefinition::new(), Some(root.clone()), root.lifecycle());
        let leaf = ComponentClass::new("Leaf", ComponentDefinition::new(), Some(mid.clone()), mid.lifecycle());

        let names: Vec<_> = leaf.lineage().iter().map(ComponentClass::name).collect();
        assert_eq!(names, vec!["Root", "Mid", "Leaf"]);
        assert!(root.is_root());
        assert!(!leaf.is_root());
    }

    #[test]
    fn renderer_is_inherited() {
        let root = root();
        let base = ComponentClass::new(
            "Base",
            ComponentDefinition::new().with_render(|_| Ok(())),
            Some(root.clone()),
            root.lifecycle(),
        );
        let leaf = ComponentClass::new("Leaf", ComponentDefinition::new(), Some(base.clone()), base.lifecycle());

        assert!(root.renderer().is_none());
        assert!(leaf.renderer().is_some());
    }

    #[test]
    fn hardened_name_rejects_reassignment() {
        let class = root();
        class.set_name("Renamed").unwrap();
        assert_eq!(class.name(), "Renamed");

        assert!(class.harden_name("Counter"));
        let property = class.name_property();
        assert_eq!(property.value(), "Counter");
        assert!(!property.is_writable());
        assert!(!property.is_configurable());

        assert!(matches!(class.set_name("Other"), Err(BridgeError::ReadOnlyName { .. })));
        assert!(!class.harden_name("Other"));
        assert_eq!(class.name(), "Counter");
    }

    #[test]
    fn lifecycle_override_is_visible_through_handles() {
        let class = root();
        let alias = class.clone();
        let before = class.mount_fn();

        class.set_mount(Arc::new(|_: &Arc<Instance<i64>>, _: &MountOptions| -> Result<()> { Ok(()) }));
        assert!(!Arc::ptr_eq(&before, &alias.mount_fn()));
    }
}
