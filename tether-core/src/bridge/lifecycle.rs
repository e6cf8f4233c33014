//! Lifecycle Bridge
//!
//! Wraps a component so that its render cycle is tracked by the external
//! reactive system instead of the host's own watcher.
//!
//! # Per-Instance State Machine
//!
//! ```text
//! unmounted --mount()--> mounting --first tracked pass--> mounted
//! ```
//!
//! - `mount()` creates one reaction labelled `<name>.render()` and runs the
//!   tracked render once, synchronously.
//! - In `mounting`, the tracked render calls the host's mount, captures the
//!   render function the host just installed, and installs itself in its place.
//! - In `mounted`, the tracked render calls the captured native renderer.
//!
//! Whatever the host renderer reads from observable values during either pass
//! becomes the reaction's dependency set for the next automatic re-run.
//!
//! # Layers
//!
//! Bridging a class that already extends a bridged class stacks two layers on
//! every instance. Each layer keeps its own disposer, keyed by its class id,
//! so destroy tears down both reactions exactly once.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::fields;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::host::{
    ClassId, ComponentClass, ComponentDefinition, DestroyFn, FieldValue, Host, Instance,
    MountFn, MountOptions, RenderFn,
};
use crate::reactive::{Disposer, Reaction, ReactiveSystem};

/// What can be bridged: a bare definition or a class the host already built.
pub enum Component<V> {
    /// A definition; the bridged class extends the host's root.
    Definition(ComponentDefinition<V>),

    /// A class; the bridged class extends that class's parent.
    Class(ComponentClass<V>),
}

impl<V: FieldValue> Component<V> {
    /// The name used for the bridged class and its reaction label.
    ///
    /// Explicit name first, then the internal tag, then the class's own name,
    /// then `fallback`.
    pub fn display_name(&self, fallback: &str) -> String {
        let (definition, class_name) = match self {
            Self::Definition(definition) => (definition, None),
            Self::Class(class) => (class.definition(), Some(class.name())),
        };

        definition
            .name()
            .map(str::to_string)
            .or_else(|| definition.tag().map(str::to_string))
            .or_else(|| class_name.filter(|name| !name.is_empty()))
            .unwrap_or_else(|| fallback.to_string())
    }
}

impl<V> From<ComponentDefinition<V>> for Component<V> {
    fn from(definition: ComponentDefinition<V>) -> Self {
        Self::Definition(definition)
    }
}

impl<V> From<ComponentClass<V>> for Component<V> {
    fn from(class: ComponentClass<V>) -> Self {
        Self::Class(class)
    }
}

/// Produces bridged component classes for one host and one reactive system.
///
/// # Example
///
/// ```rust
/// use tether_core::testkit::{MockHost, Tracker, Value};
/// use tether_core::{Bridge, ComponentDefinition, MountOptions};
///
/// let host = MockHost::new();
/// let tracker = Tracker::new();
/// let label = tracker.atom("a");
///
/// let definition = ComponentDefinition::new()
///     .with_name("Badge")
///     .with_static_state([("label", Value::Observable(label.clone()))]);
///
/// let class = Bridge::new(host.clone(), tracker.clone()).wrap(definition);
/// let instance = host.instantiate(&class).unwrap();
/// instance.mount(&MountOptions::default()).unwrap();
///
/// assert_eq!(tracker.labels(), vec!["Badge.render()".to_string()]);
/// ```
pub struct Bridge<H, X> {
    host: H,
    reactive: Arc<X>,
    config: BridgeConfig,
}

impl<H, X> Bridge<H, X> {
    /// Create a bridge with the default configuration.
    pub fn new(host: H, reactive: X) -> Self {
        Self::with_config(host, reactive, BridgeConfig::default())
    }

    /// Create a bridge with an explicit configuration.
    pub fn with_config(host: H, reactive: X, config: BridgeConfig) -> Self {
        Self {
            host,
            reactive: Arc::new(reactive),
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Produce the bridged class for `component`.
    ///
    /// The input is never modified: its definition is shallow-copied, and a
    /// class input keeps its own lifecycle.
    pub fn wrap<V>(&self, component: impl Into<Component<V>>) -> ComponentClass<V>
    where
        V: FieldValue,
        H: Host<V>,
        X: ReactiveSystem<V>,
    {
        let component = component.into();
        let name = component.display_name(&self.config.fallback_name);

        let (definition, base) = match component {
            Component::Definition(definition) => (definition, self.host.root()),
            Component::Class(class) => {
                let base = class.parent().cloned().unwrap_or_else(|| self.host.root());
                (class.definition().clone(), base)
            }
        };

        let class = self.host.extend(&base, self.enhance(&name, definition));

        let layer = Arc::new(Layer {
            id: class.id(),
            label: self.config.reaction_label(&name),
            name: name.clone(),
            reactive: Arc::clone(&self.reactive),
            host_mount: class.mount_fn(),
            host_destroy: class.destroy_fn(),
        });

        let mount_layer = Arc::clone(&layer);
        let mount: MountFn<V> = Arc::new(move |instance: &Arc<Instance<V>>, options: &MountOptions| {
            mount_layer.mount(instance, options)
        });
        let destroy: DestroyFn<V> = Arc::new(move |instance: &Arc<Instance<V>>| layer.destroy(instance));
        class.set_mount(mount);
        class.set_destroy(destroy);

        if self.config.harden_name && class.name_property().is_configurable() {
            class.harden_name(name.as_str());
        }

        tracing::debug!(component = %name, class = %class.id(), base = %base.id(), "bridged component");
        class
    }

    /// Shallow copy of `definition` with the name set, state routed through
    /// the classifier and a ctor cache of its own.
    fn enhance<V>(&self, name: &str, definition: ComponentDefinition<V>) -> ComponentDefinition<V>
    where
        V: FieldValue,
        X: ReactiveSystem<V>,
    {
        let declared = definition.state().clone();
        let reactive = Arc::clone(&self.reactive);

        definition
            .with_name(name)
            .with_state_factory(move |instance| {
                fields::resolve(instance, &declared, |value| reactive.is_observable(value)).map(Some)
            })
            .with_fresh_ctor_cache()
    }
}

/// Bridge `component` with the default configuration.
pub fn observer<V, H, X>(host: &H, reactive: &X, component: impl Into<Component<V>>) -> ComponentClass<V>
where
    V: FieldValue,
    H: Host<V> + Clone,
    X: ReactiveSystem<V> + Clone,
{
    Bridge::new(host.clone(), reactive.clone()).wrap(component)
}

/// One bridged class: what its overridden mount and destroy share.
struct Layer<V, X> {
    id: ClassId,
    name: String,
    label: String,
    reactive: Arc<X>,
    host_mount: MountFn<V>,
    host_destroy: DestroyFn<V>,
}

impl<V, X> Layer<V, X>
where
    V: FieldValue,
    X: ReactiveSystem<V>,
{
    fn mount(self: &Arc<Self>, instance: &Arc<Instance<V>>, options: &MountOptions) -> Result<()> {
        // A second mount starts over; the old reaction must not outlive it.
        if let Some(previous) = instance.disposers().install(self.id, Disposer::noop()) {
            previous.dispose();
        }

        let tracked = Arc::new_cyclic(|weak: &Weak<TrackedRender<V, X>>| {
            let weak = weak.clone();
            let reaction = self.reactive.reaction(
                &self.label,
                Arc::new(move || {
                    if let Some(tracked) = weak.upgrade() {
                        tracked.rerun();
                    }
                }),
            );
            TrackedRender {
                layer: Arc::clone(self),
                instance: Arc::downgrade(instance),
                options: options.clone(),
                phase: Mutex::new(Phase::Mounting),
                reaction,
            }
        });

        instance.disposers().install(self.id, tracked.reaction.disposer());
        tracked.run()
    }

    fn destroy(&self, instance: &Arc<Instance<V>>) {
        instance.disposers().dispose(self.id);
        tracing::debug!(component = %self.name, instance = instance.id().raw(), "disposed render reaction");
        (self.host_destroy)(instance);
    }
}

enum Phase<V> {
    Mounting,
    Mounted(RenderFn<V>),
}

impl<V> Clone for Phase<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Mounting => Self::Mounting,
            Self::Mounted(native) => Self::Mounted(Arc::clone(native)),
        }
    }
}

/// The render routine installed in an instance's render slot.
///
/// Owned by the slot once mounted; the reaction only holds it weakly. It
/// holds the instance weakly too, so dropping the last instance handle
/// drops the reaction with it, without calling the disposer or the host's
/// destroy.
struct TrackedRender<V, X: ReactiveSystem<V>> {
    layer: Arc<Layer<V, X>>,
    instance: Weak<Instance<V>>,
    options: MountOptions,
    phase: Mutex<Phase<V>>,
    reaction: X::Reaction,
}

impl<V, X> TrackedRender<V, X>
where
    V: FieldValue,
    X: ReactiveSystem<V>,
{
    /// Run one pass inside the reaction's tracked scope.
    fn run(self: &Arc<Self>) -> Result<()> {
        let mut outcome = Ok(());
        self.reaction.track(&mut || outcome = self.step());
        outcome
    }

    /// Entry point for re-runs scheduled by the reactive system.
    ///
    /// Nobody is waiting for the result, so failures are logged and the
    /// reaction stays subscribed to whatever was read before the error.
    fn rerun(self: &Arc<Self>) {
        if let Err(err) = self.run() {
            tracing::error!(component = %self.layer.name, error = %err, "tracked render failed");
        }
    }

    fn step(self: &Arc<Self>) -> Result<()> {
        let Some(instance) = self.instance.upgrade() else {
            return Ok(());
        };

        let phase = self.phase.lock().clone();
        match phase {
            Phase::Mounting => {
                tracing::trace!(component = %self.layer.name, instance = instance.id().raw(), "first mount pass");
                (self.layer.host_mount)(&instance, &self.options)?;

                let native = instance.render_slot().current().ok_or_else(|| BridgeError::MissingRenderer {
                    component: self.layer.name.clone(),
                })?;
                *self.phase.lock() = Phase::Mounted(native);
                instance.render_slot().replace(self.render_fn());
            }
            Phase::Mounted(native) => {
                tracing::trace!(component = %self.layer.name, instance = instance.id().raw(), "tracked re-run");
                native(&instance)?;
            }
        }
        Ok(())
    }

    fn render_fn(self: &Arc<Self>) -> RenderFn<V> {
        let tracked = Arc::clone(self);
        Arc::new(move |_: &Arc<Instance<V>>| tracked.run())
    }
}

#[cfg(all(test, feature = "testkit"))]
mod tests {
    use super::*;
    use crate::testkit::{MockHost, Tracker, Value};

    fn bridge() -> (MockHost, Tracker, Bridge<MockHost, Tracker>) {
        let host = MockHost::new();
        let tracker = Tracker::new();
        let bridge = Bridge::new(host.clone(), tracker.clone());
        (host, tracker, bridge)
    }

    #[test]
    fn name_prefers_explicit_then_tag_then_class() {
        let host = MockHost::new();
        let named: Component<Value> = ComponentDefinition::new().with_name("Counter").with_tag("x-counter").into();
        let tagged: Component<Value> = ComponentDefinition::new().with_tag("x-counter").into();
        let bare: Component<Value> = ComponentDefinition::new().into();
        let class: Component<Value> = host.define(ComponentDefinition::new()).into();

        assert_eq!(named.display_name("<component>"), "Counter");
        assert_eq!(tagged.display_name("<component>"), "x-counter");
        assert_eq!(bare.display_name("<component>"), "<component>");
        assert_eq!(class.display_name("<component>"), crate::testkit::HOST_CLASS_NAME);
    }

    #[test]
    fn wrapped_class_name_is_hardened() {
        let (_, _, bridge) = bridge();
        let class = bridge.wrap(ComponentDefinition::new().with_name("Counter"));

        let property = class.name_property();
        assert_eq!(property.value(), "Counter");
        assert!(!property.is_writable());
        assert!(!property.is_configurable());
        assert!(class.set_name("Other").is_err());
    }

    #[test]
    fn hardening_can_be_disabled() {
        let config = BridgeConfig {
            harden_name: false,
            ..BridgeConfig::default()
        };
        let bridge = Bridge::with_config(MockHost::new(), Tracker::new(), config);
        let class = bridge.wrap(ComponentDefinition::new().with_name("Counter"));
        assert!(class.name_property().is_writable());
    }

    #[test]
    fn enhanced_definition_is_a_fresh_copy() {
        let (_, _, bridge) = bridge();
        let original = ComponentDefinition::new()
            .with_tag("x-card")
            .with_option("template", serde_json::json!("<div/>"));
        let class = bridge.wrap(original.clone());

        let enhanced = class.definition();
        assert_eq!(enhanced.name(), Some("x-card"));
        assert_eq!(original.name(), None);
        assert_eq!(enhanced.option("template"), original.option("template"));
        assert!(!enhanced.ctor_cache().shares_with(original.ctor_cache()));
        assert!(matches!(enhanced.state(), crate::host::StateSpec::Factory(_)));
    }

    #[test]
    fn reaction_is_created_on_mount_not_on_construction() {
        let (host, tracker, bridge) = bridge();
        let class = bridge.wrap(ComponentDefinition::new().with_name("Lazy"));

        let instance = host.instantiate(&class).unwrap();
        assert_eq!(tracker.live_reactions(), 0);

        instance.mount(&MountOptions::default()).unwrap();
        assert_eq!(tracker.labels(), vec!["Lazy.render()".to_string()]);
    }

    #[test]
    fn custom_label_suffix_is_used() {
        let config = BridgeConfig {
            label_suffix: "#view".to_string(),
            ..BridgeConfig::default()
        };
        let host = MockHost::new();
        let tracker = Tracker::new();
        let class = Bridge::with_config(host.clone(), tracker.clone(), config)
            .wrap(ComponentDefinition::new().with_name("Panel"));

        let instance = host.instantiate(&class).unwrap();
        instance.mount(&MountOptions::default()).unwrap();
        assert_eq!(tracker.labels(), vec!["Panel#view".to_string()]);
    }

    #[test]
    fn missing_renderer_fails_first_mount() {
        let host = MockHost::new();
        let tracker = Tracker::new();
        let class = observer(
            &HeadlessHost(host.clone()),
            &tracker,
            ComponentDefinition::<Value>::new().with_name("Headless"),
        );

        let instance = host.instantiate(&class).unwrap();
        let err = instance.mount(&MountOptions::default()).unwrap_err();
        assert!(matches!(err, BridgeError::MissingRenderer { ref component } if component == "Headless"));
        assert!(instance.render_slot().is_empty());
    }

    /// A host whose classes mount without installing a renderer.
    #[derive(Clone)]
    struct HeadlessHost(MockHost);

    impl Host<Value> for HeadlessHost {
        fn root(&self) -> ComponentClass<Value> {
            self.0.root()
        }

        fn extend(&self, base: &ComponentClass<Value>, definition: ComponentDefinition<Value>) -> ComponentClass<Value> {
            ComponentClass::new("Headless", definition, Some(base.clone()), crate::host::Lifecycle::inert())
        }
    }
}
