//! A minimal component host.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use super::value::Value;
use crate::error::Result;
use crate::host::{
    ComponentClass, ComponentDefinition, Host, Instance, InstanceId, Lifecycle, MountOptions,
    Property, RenderFn, StateMap,
};

/// Name the host gives every class it builds.
pub const HOST_CLASS_NAME: &str = "HostComponent";

/// Reserved, non-configurable property defined on every instance.
pub const RESERVED_ELEMENT: &str = "$el";

struct HostInner {
    root: ComponentClass<Value>,
    mounts: DashMap<InstanceId, usize>,
    renders: DashMap<InstanceId, usize>,
    destroys: DashMap<InstanceId, usize>,
    initial_state: DashMap<InstanceId, StateMap<Value>>,
}

/// A component host with a watcher-style render slot.
///
/// - `mount` installs the native renderer in the render slot and renders once.
/// - `set_field` writes a plain field and re-renders through the slot.
/// - `destroy` empties the render slot.
///
/// Cloning shares the same host.
#[derive(Clone)]
pub struct MockHost {
    inner: Arc<HostInner>,
}

impl MockHost {
    /// Create a host with a fresh root class.
    pub fn new() -> Self {
        let inner = Arc::new_cyclic(|host: &Weak<HostInner>| HostInner {
            root: ComponentClass::new("Root", ComponentDefinition::new(), None, native_lifecycle(host.clone())),
            mounts: DashMap::new(),
            renders: DashMap::new(),
            destroys: DashMap::new(),
            initial_state: DashMap::new(),
        });
        Self { inner }
    }

    /// Extend the root class with `definition`.
    pub fn define(&self, definition: ComponentDefinition<Value>) -> ComponentClass<Value> {
        self.extend(&self.inner.root, definition)
    }

    /// Construct an instance of `class`.
    ///
    /// State is resolved for every class from the root down; a subclass
    /// overrides keys declared by its ancestors.
    pub fn instantiate(&self, class: &ComponentClass<Value>) -> Result<Arc<Instance<Value>>> {
        let instance = Instance::new(class.clone());
        instance.define_property(RESERVED_ELEMENT, Property::sealed(Value::Null))?;

        let mut state = StateMap::new();
        for level in class.lineage() {
            let declared = level.definition().state();
            if declared.is_absent() {
                continue;
            }
            state.extend(declared.produce(&instance)?);
        }

        self.inner.initial_state.insert(instance.id(), state.clone());
        for (key, value) in state {
            instance.define_property(key, Property::data(value))?;
        }
        Ok(instance)
    }

    /// Write a plain field through the host's update path.
    pub fn set_field(&self, instance: &Arc<Instance<Value>>, key: &str, value: impl Into<Value>) -> Result<()> {
        if instance.set(key, value.into()) {
            instance.render()
        } else {
            Ok(())
        }
    }

    /// The state the host received for `instance` at construction.
    pub fn initial_state(&self, instance: &Instance<Value>) -> Option<StateMap<Value>> {
        self.inner
            .initial_state
            .get(&instance.id())
            .map(|entry| entry.value().clone())
    }

    /// Times the native mount ran for `instance`.
    pub fn mount_count(&self, instance: &Instance<Value>) -> usize {
        count(&self.inner.mounts, instance.id())
    }

    /// Times the native renderer ran for `instance`.
    pub fn render_count(&self, instance: &Instance<Value>) -> usize {
        count(&self.inner.renders, instance.id())
    }

    /// Times the native destroy ran for `instance`.
    pub fn destroy_count(&self, instance: &Instance<Value>) -> usize {
        count(&self.inner.destroys, instance.id())
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host<Value> for MockHost {
    fn root(&self) -> ComponentClass<Value> {
        self.inner.root.clone()
    }

    fn extend(&self, base: &ComponentClass<Value>, definition: ComponentDefinition<Value>) -> ComponentClass<Value> {
        if let Some(cached) = definition.ctor_cache().lookup(base.id()) {
            return cached;
        }

        let cache = definition.ctor_cache().clone();
        let class = ComponentClass::new(HOST_CLASS_NAME, definition, Some(base.clone()), base.lifecycle());
        cache.store(base.id(), &class);
        class
    }
}

impl fmt::Debug for MockHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHost")
            .field("root", &self.inner.root)
            .field("instances", &self.inner.initial_state.len())
            .finish()
    }
}

fn count(table: &DashMap<InstanceId, usize>, id: InstanceId) -> usize {
    table.get(&id).map(|entry| *entry).unwrap_or(0)
}

fn bump(host: &Weak<HostInner>, table: fn(&HostInner) -> &DashMap<InstanceId, usize>, id: InstanceId) {
    if let Some(host) = host.upgrade() {
        *table(&host).entry(id).or_insert(0) += 1;
    }
}

fn native_lifecycle(host: Weak<HostInner>) -> Lifecycle<Value> {
    let mount_host = host.clone();
    Lifecycle {
        mount: Arc::new(move |instance: &Arc<Instance<Value>>, _: &MountOptions| -> Result<()> {
            bump(&mount_host, |h| &h.mounts, instance.id());
            instance.render_slot().replace(native_renderer(mount_host.clone()));
            instance.render()
        }),
        destroy: Arc::new(move |instance: &Arc<Instance<Value>>| {
            bump(&host, |h| &h.destroys, instance.id());
            instance.render_slot().clear();
        }),
    }
}

fn native_renderer(host: Weak<HostInner>) -> RenderFn<Value> {
    Arc::new(move |instance: &Arc<Instance<Value>>| -> Result<()> {
        bump(&host, |h| &h.renders, instance.id());
        match instance.class().renderer() {
            Some(render) => render(instance),
            None => Ok(()),
        }
    })
}
