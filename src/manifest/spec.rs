//! Capability specification — the unit of declarative container composition.
//!
//! A capability is a named service facet of the container process (process
//! management, exchange management, datastore access, ...). Each spec names
//! the implementing class reference, an optional field under which the live
//! instance is bound into the runtime context, the capabilities it depends
//! on, and an optional configuration key gating whether it is active.
//!
//! Example YAML record:
//! ```yaml
//! - name: proc_manager
//!   docstring: "Manages spawn and supervision of container processes"
//!   class: container.ProcManager
//!   field: proc_manager
//!   depends_on: [exchange_manager]
//! ```

use serde::{Deserialize, Serialize};

/// Derive the configuration key gating a capability when its spec does not
/// name one explicitly: `container.<name>.enabled`.
pub fn default_enabled_key(name: &str) -> String {
    format!("container.{}.enabled", name)
}

fn default_true() -> bool {
    true
}

/// A single declared capability.
///
/// Specs are immutable data: validation happens in
/// [`CapabilityRegistry::from_specs`](super::registry::CapabilityRegistry::from_specs),
/// activation and ordering happen later against the validated registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    /// Unique name within the manifest.
    pub name: String,

    /// Human-readable description of what this capability provides.
    #[serde(default)]
    pub docstring: String,

    /// Opaque reference to the implementing capability type. Resolved only
    /// through a registered factory, never by reflective lookup.
    #[serde(rename = "class")]
    pub class_ref: String,

    /// Field under which the instance is bound in the runtime context.
    /// Capabilities without a field are not retrievable by field.
    #[serde(default)]
    pub field: Option<String>,

    /// Names of capabilities that must be started first. Order is preserved.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Configuration key gating this capability. When absent the key derives
    /// as `container.<name>.enabled`.
    #[serde(default)]
    pub enabled_config_key: Option<String>,

    /// Enabled state when the configuration does not decide.
    #[serde(default = "default_true")]
    pub enabled_default: bool,
}

impl CapabilitySpec {
    /// Create a spec with the given name and class reference; everything else
    /// takes its default (no field, no dependencies, enabled by default).
    pub fn new(name: impl Into<String>, class_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docstring: String::new(),
            class_ref: class_ref.into(),
            field: None,
            depends_on: Vec::new(),
            enabled_config_key: None,
            enabled_default: true,
        }
    }

    /// Set the docstring.
    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = docstring.into();
        self
    }

    /// Set the context binding field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set the dependency names.
    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Override the configuration gate key.
    pub fn with_config_key(mut self, key: impl Into<String>) -> Self {
        self.enabled_config_key = Some(key.into());
        self
    }

    /// Make this capability disabled unless configuration enables it.
    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_default = false;
        self
    }

    /// The configuration key gating this capability — the explicit key if the
    /// spec names one, the derived `container.<name>.enabled` otherwise.
    pub fn enabled_key(&self) -> String {
        self.enabled_config_key
            .clone()
            .unwrap_or_else(|| default_enabled_key(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enabled_key() {
        assert_eq!(
            default_enabled_key("proc_manager"),
            "container.proc_manager.enabled"
        );
    }

    #[test]
    fn test_enabled_key_prefers_explicit() {
        let spec = CapabilitySpec::new("datastore_manager", "container.DatastoreManager")
            .with_config_key("container.datastore.enabled");
        assert_eq!(spec.enabled_key(), "container.datastore.enabled");

        let derived = CapabilitySpec::new("datastore_manager", "container.DatastoreManager");
        assert_eq!(derived.enabled_key(), "container.datastore_manager.enabled");
    }

    #[test]
    fn test_builder_defaults() {
        let spec = CapabilitySpec::new("event_repository", "container.EventRepository");
        assert!(spec.enabled_default);
        assert!(spec.field.is_none());
        assert!(spec.depends_on.is_empty());
        assert!(spec.enabled_config_key.is_none());
    }

    #[test]
    fn test_parse_spec_yaml() {
        let yaml = r#"
name: proc_manager
docstring: "Manages spawn and supervision of container processes"
class: container.ProcManager
field: proc_manager
depends_on: [exchange_manager]
"#;
        let spec: CapabilitySpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.name, "proc_manager");
        assert_eq!(spec.class_ref, "container.ProcManager");
        assert_eq!(spec.field.as_deref(), Some("proc_manager"));
        assert_eq!(spec.depends_on, vec!["exchange_manager"]);
        assert!(spec.enabled_default);
        assert_eq!(spec.enabled_key(), "container.proc_manager.enabled");
    }

    #[test]
    fn test_parse_spec_yaml_disabled_default() {
        let yaml = r#"
name: sflow_manager
class: container.SflowManager
enabled_config_key: container.sflow.enabled
enabled_default: false
"#;
        let spec: CapabilitySpec = serde_yaml::from_str(yaml).unwrap();
        assert!(!spec.enabled_default);
        assert_eq!(spec.enabled_key(), "container.sflow.enabled");
    }
}
