//! Bridge configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Knobs for how bridged classes are named and labelled.
///
/// Every field has a default, so a partial JSON document is valid:
///
/// ```rust
/// use tether_core::BridgeConfig;
///
/// let config = BridgeConfig::from_json(r#"{ "label_suffix": "::render" }"#).unwrap();
/// assert_eq!(config.label_suffix, "::render");
/// assert_eq!(config.fallback_name, "<component>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name used when neither the definition nor the class provides one.
    pub fallback_name: String,

    /// Appended to the component name to form the reaction label.
    pub label_suffix: String,

    /// Lock the produced class's name if the host left it configurable.
    pub harden_name: bool,
}

impl BridgeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The reaction label for a component.
    pub fn reaction_label(&self, component: &str) -> String {
        format!("{}{}", component, self.label_suffix)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fallback_name: "<component>".to_string(),
            label_suffix: ".render()".to_string(),
            harden_name: true,
        }
    }
}
