//! Field Classifier
//!
//! Splits resolved component state into plain fields, which go back to the
//! host's own state initialization, and external fields, which are installed
//! on the instance as read-only accessors.
//!
//! Classification runs on every state resolution. Nothing is cached across
//! instances, so the same declaration can yield a different split for two
//! instances if the factory returns different values.

use indexmap::IndexMap;

use crate::error::Result;
use crate::host::{ExternalField, FieldValue, Instance, Property, StateMap, StateSpec};

/// A classified state field.
#[derive(Debug, Clone)]
pub enum Field<V> {
    /// Left to the host's reactivity.
    Plain(V),

    /// Owned by the external reactive system.
    External(ExternalField<V>),
}

impl<V> Field<V> {
    /// Check if the field is owned by the external reactive system.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

/// Tag every field of `state` as plain or external.
///
/// External values are captured as they are now; later reads through the
/// accessor see this exact value, not whatever the map might hold later.
pub fn classify<V, P>(state: StateMap<V>, is_observable: P) -> IndexMap<String, Field<V>>
where
    V: FieldValue,
    P: Fn(&V) -> bool,
{
    state
        .into_iter()
        .map(|(key, value)| {
            let field = if is_observable(&value) {
                Field::External(ExternalField::new(value))
            } else {
                Field::Plain(value)
            };
            (key, field)
        })
        .collect()
}

/// Resolve `spec` for `instance`, install external fields, return the plain ones.
///
/// A factory is invoked exactly once, with the instance as its argument, and
/// its errors propagate untouched. Installing over a non-configurable property
/// fails with [`BridgeError::ConfigurationConflict`](crate::BridgeError::ConfigurationConflict);
/// accessors installed before the conflict stay in place.
pub fn resolve<V, P>(instance: &Instance<V>, spec: &StateSpec<V>, is_observable: P) -> Result<StateMap<V>>
where
    V: FieldValue,
    P: Fn(&V) -> bool,
{
    let working = spec.produce(instance)?;
    let mut plain = StateMap::with_capacity(working.len());

    for (key, field) in classify(working, is_observable) {
        match field {
            Field::Plain(value) => {
                plain.insert(key, value);
            }
            Field::External(accessor) => {
                if let Err(err) = instance.define_property(key.as_str(), Property::External(accessor)) {
                    tracing::warn!(
                        component = %instance.class().name(),
                        field = %key,
                        "external field shadows a non-configurable property"
                    );
                    return Err(err);
                }
            }
        }
    }

    Ok(plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ComponentClass, ComponentDefinition, Lifecycle};
    use crate::BridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Negative numbers play the part of observable values.
    fn observable(value: &i64) -> bool {
        *value < 0
    }

    fn instance() -> Arc<Instance<i64>> {
        Instance::new(ComponentClass::new(
            "Gauge",
            ComponentDefinition::new(),
            None,
            Lifecycle::inert(),
        ))
    }

    fn state(fields: &[(&str, i64)]) -> StateMap<i64> {
        fields.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn classify_tags_by_predicate() {
        let fields = classify(state(&[("count", 1), ("level", -4)]), observable);
        assert!(!fields["count"].is_external());
        assert!(fields["level"].is_external());
    }

    #[test]
    fn resolve_returns_only_plain_fields() {
        let instance = instance();
        let spec = StateSpec::Static(state(&[("count", 0), ("level", -1), ("step", 2)]));

        let plain = resolve(&instance, &spec, observable).unwrap();
        assert_eq!(plain, state(&[("count", 0), ("step", 2)]));

        assert_eq!(instance.get("level"), Some(-1));
        assert!(!instance.has("count"));
        let descriptor = instance.descriptor("level").unwrap();
        assert!(descriptor.accessor && descriptor.enumerable && !descriptor.writable);
    }

    #[test]
    fn accessor_ignores_writes() {
        let instance = instance();
        let spec = StateSpec::Static(state(&[("level", -9)]));
        resolve(&instance, &spec, observable).unwrap();

        for attempt in 0..3 {
            instance.set("level", attempt);
            assert_eq!(instance.get("level"), Some(-9));
        }
    }

    #[test]
    fn factory_receives_instance_and_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let spec = StateSpec::factory(move |instance: &Instance<i64>| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let seed = instance.id().raw() as i64;
            Ok(Some(StateMap::from([("seed".to_string(), seed), ("feed".to_string(), -1)])))
        });

        let instance = instance();
        let plain = resolve(&instance, &spec, observable).unwrap();
        assert_eq!(plain.get("seed"), Some(&(instance.id().raw() as i64)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn factory_error_propagates_unchanged() {
        let spec = StateSpec::factory(|_: &Instance<i64>| Err(BridgeError::state_factory("store offline")));
        let err = resolve(&instance(), &spec, observable).unwrap_err();
        assert!(matches!(err, BridgeError::StateFactory(_)));
        assert_eq!(err.to_string(), "store offline");
    }

    #[test]
    fn conflict_with_sealed_property_fails() {
        let instance = instance();
        instance.define_property("$el", Property::sealed(0)).unwrap();
        let spec = StateSpec::Static(state(&[("$el", -1)]));

        let err = resolve(&instance, &spec, observable).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigurationConflict { ref field, .. } if field == "$el"));
    }

    #[test]
    fn absent_spec_resolves_to_nothing() {
        let instance = instance();
        let plain = resolve(&instance, &StateSpec::Absent, observable).unwrap();
        assert!(plain.is_empty());
        assert!(instance.keys().is_empty());
    }
}
