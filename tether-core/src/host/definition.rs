//! Component definitions and their state specifications.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::class::{ClassId, ComponentClass, WeakClass};
use super::instance::{Instance, RenderFn};
use super::FieldValue;
use crate::error::Result;

/// Ordered key → value mapping of component state.
pub type StateMap<V> = IndexMap<String, V>;

/// A state factory, called with the instance under construction.
///
/// Returning `Ok(None)` is the same as returning an empty map.
pub type StateFactory<V> = Arc<dyn Fn(&Instance<V>) -> Result<Option<StateMap<V>>> + Send + Sync>;

/// How a component declares its local state.
pub enum StateSpec<V> {
    /// No state declared.
    Absent,

    /// A fixed mapping, copied for every instance.
    Static(StateMap<V>),

    /// A function of the instance, invoked once per construction.
    Factory(StateFactory<V>),
}

impl<V: FieldValue> StateSpec<V> {
    /// Build a factory state spec from a closure.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Instance<V>) -> Result<Option<StateMap<V>>> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    /// Resolve to a concrete mapping for `instance`.
    ///
    /// A factory runs exactly once per call; its errors propagate as-is.
    pub fn produce(&self, instance: &Instance<V>) -> Result<StateMap<V>> {
        match self {
            Self::Absent => Ok(StateMap::new()),
            Self::Static(map) => Ok(map.clone()),
            Self::Factory(factory) => Ok(factory(instance)?.unwrap_or_default()),
        }
    }

    /// Check if no state was declared.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl<V> Default for StateSpec<V> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<V: Clone> Clone for StateSpec<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Absent => Self::Absent,
            Self::Static(map) => Self::Static(map.clone()),
            Self::Factory(factory) => Self::Factory(Arc::clone(factory)),
        }
    }
}

impl<V> fmt::Debug for StateSpec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Static(map) => f
                .debug_tuple("Static")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// The host's cache of subclasses built from one definition, keyed by base class.
///
/// Entries hold weak class references so the cache never keeps a class alive.
/// Cloning shares the cache; a derived definition has to ask for a fresh one
/// or the host will hand back the class built from the original.
pub struct CtorCache<V> {
    entries: Arc<Mutex<HashMap<ClassId, WeakClass<V>>>>,
}

impl<V> CtorCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Look up the subclass previously built on `base`.
    pub fn lookup(&self, base: ClassId) -> Option<ComponentClass<V>> {
        self.entries.lock().get(&base).and_then(WeakClass::upgrade)
    }

    /// Remember `class` as the subclass built on `base`.
    pub fn store(&self, base: ClassId, class: &ComponentClass<V>) {
        self.entries.lock().insert(base, class.downgrade());
    }

    /// Number of cached entries, live or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing was ever cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if two handles share the same cache.
    pub fn shares_with(&self, other: &CtorCache<V>) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<V> Default for CtorCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for CtorCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

/// An immutable description of a component.
///
/// Definitions are owned by the caller. Deriving one (`clone` plus the
/// `with_*` methods) is a shallow copy: state factories, render functions and
/// the ctor cache are shared with the original.
pub struct ComponentDefinition<V> {
    name: Option<String>,
    tag: Option<String>,
    state: StateSpec<V>,
    render: Option<RenderFn<V>>,
    options: IndexMap<String, serde_json::Value>,
    ctor_cache: CtorCache<V>,
}

impl<V: FieldValue> ComponentDefinition<V> {
    /// Create an empty definition.
    pub fn new() -> Self {
        Self {
            name: None,
            tag: None,
            state: StateSpec::Absent,
            render: None,
            options: IndexMap::new(),
            ctor_cache: CtorCache::new(),
        }
    }

    /// Set the explicit component name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the internal tag the host registered the component under.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Replace the state specification.
    pub fn with_state(mut self, state: StateSpec<V>) -> Self {
        self.state = state;
        self
    }

    /// Declare a fixed state mapping.
    pub fn with_static_state<I, K>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        let map = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.with_state(StateSpec::Static(map))
    }

    /// Declare state through a factory of the instance.
    pub fn with_state_factory<F>(self, factory: F) -> Self
    where
        F: Fn(&Instance<V>) -> Result<Option<StateMap<V>>> + Send + Sync + 'static,
    {
        self.with_state(StateSpec::factory(factory))
    }

    /// Set the render function.
    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Arc<Instance<V>>) -> Result<()> + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    /// Set a framework-native option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Detach from the original's ctor cache.
    pub fn with_fresh_ctor_cache(mut self) -> Self {
        self.ctor_cache = CtorCache::new();
        self
    }

    /// The explicit name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The internal tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The state specification.
    pub fn state(&self) -> &StateSpec<V> {
        &self.state
    }

    /// The render function, if any.
    pub fn render(&self) -> Option<&RenderFn<V>> {
        self.render.as_ref()
    }

    /// A single framework-native option.
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.options.get(key)
    }

    /// The host's subclass cache for this definition.
    pub fn ctor_cache(&self) -> &CtorCache<V> {
        &self.ctor_cache
    }
}

impl<V: FieldValue> Default for ComponentDefinition<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Clone for ComponentDefinition<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tag: self.tag.clone(),
            state: self.state.clone(),
            render: self.render.clone(),
            options: self.options.clone(),
            ctor_cache: self.ctor_cache.clone(),
        }
    }
}

impl<V> fmt::Debug for ComponentDefinition<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("state", &self.state)
            .field("has_render", &self.render.is_some())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Lifecycle, ComponentClass};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn class() -> ComponentClass<i64> {
        ComponentClass::new("Root", ComponentDefinition::new(), None, Lifecycle::inert())
    }

    #[test]
    fn absent_state_produces_empty_map() {
        let instance = Instance::new(class());
        let state: StateSpec<i64> = StateSpec::Absent;
        assert!(state.is_absent());
        assert!(state.produce(&instance).unwrap().is_empty());
    }

    #[test]
    fn empty_static_state_is_still_declared() {
        let definition: ComponentDefinition<i64> = ComponentDefinition::new();
        assert!(definition.state().is_absent());

        let declared = definition.with_static_state(Vec::<(String, i64)>::new());
        assert!(!declared.state().is_absent());
    }

    #[test]
    fn factory_runs_once_per_produce() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let state = StateSpec::factory(move |_: &Instance<i64>| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Some(StateMap::from([("count".to_string(), 0)])))
        });

        let instance = Instance::new(class());
        let map = state.produce(&instance).unwrap();
        assert_eq!(map.get("count"), Some(&0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn factory_returning_none_is_empty() {
        let state = StateSpec::factory(|_: &Instance<i64>| Ok(None));
        let instance = Instance::new(class());
        assert!(state.produce(&instance).unwrap().is_empty());
    }

    #[test]
    fn clone_shares_ctor_cache_until_reset() {
        let definition: ComponentDefinition<i64> = ComponentDefinition::new().with_name("Counter");
        let copy = definition.clone();
        assert!(copy.ctor_cache().shares_with(definition.ctor_cache()));

        let fresh = copy.with_fresh_ctor_cache();
        assert!(!fresh.ctor_cache().shares_with(definition.ctor_cache()));
        assert_eq!(fresh.name(), Some("Counter"));
    }

    #[test]
    fn ctor_cache_does_not_keep_classes_alive() {
        let cache: CtorCache<i64> = CtorCache::new();
        let base = class();
        {
            let sub = ComponentClass::new("Sub", ComponentDefinition::new(), Some(base.clone()), Lifecycle::inert());
            cache.store(base.id(), &sub);
            assert!(cache.lookup(base.id()).is_some());
        }
        assert!(cache.lookup(base.id()).is_none());
        assert_eq!(cache.len(), 1);
    }
}
