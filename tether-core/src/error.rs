//! Error types for the bridge.
//!
//! The bridge adds almost nothing of its own: most variants exist to carry
//! failures of the host framework or of user state factories back to the
//! caller without rewriting them.

use thiserror::Error;

/// Boxed error raised by a collaborator (host framework or state factory).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced while constructing, mounting or rendering a bridged component.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// An external field would shadow a non-configurable property on the instance.
    #[error("cannot install external field `{field}` on {component}: property is not configurable")]
    ConfigurationConflict {
        /// Name of the component being constructed
        component: String,
        /// The conflicting key
        field: String,
    },

    /// A user state factory failed.
    #[error(transparent)]
    StateFactory(BoxError),

    /// The host framework failed during mount or render.
    #[error(transparent)]
    Host(BoxError),

    /// The host finished its first mount without installing a render function.
    #[error("{component} has no render function after mount")]
    MissingRenderer {
        /// Name of the component being mounted
        component: String,
    },

    /// The class name was hardened and cannot be reassigned.
    #[error("component name `{name}` is read-only")]
    ReadOnlyName {
        /// The current (locked) name
        name: String,
    },

    /// The bridge configuration document could not be parsed.
    #[error("invalid bridge configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl BridgeError {
    /// Wrap an error raised inside a state factory.
    pub fn state_factory<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::StateFactory(err.into())
    }

    /// Wrap an error raised by the host framework.
    pub fn host<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Host(err.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_factory_error_is_transparent() {
        let err = BridgeError::state_factory("backend unavailable");
        assert_eq!(err.to_string(), "backend unavailable");
    }

    #[test]
    fn conflict_names_field_and_component() {
        let err = BridgeError::ConfigurationConflict {
            component: "Counter".into(),
            field: "$el".into(),
        };
        let message = err.to_string();
        assert!(message.contains("`$el`"));
        assert!(message.contains("Counter"));
    }
}
