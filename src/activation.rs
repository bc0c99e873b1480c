//! Activation resolution — which declared capabilities run this container.
//!
//! Every capability is gated by a configuration key (explicit in the spec or
//! derived as `container.<name>.enabled`). The configuration provider is
//! consulted exactly once per capability: a boolean answer wins, absence
//! falls back to the spec's default. Resolution never fails — a missing key
//! is not an error.

use std::collections::HashMap;

use serde_json::Value;

use crate::manifest::CapabilityRegistry;

// ---------------------------------------------------------------------------
// ConfigProvider
// ---------------------------------------------------------------------------

/// Key → boolean lookup used during activation resolution.
///
/// Implementations read configuration only; they must not have side effects.
pub trait ConfigProvider {
    /// Look up a boolean flag. `None` when the key is absent.
    fn enabled_flag(&self, key: &str) -> Option<bool>;
}

/// Flat map of fully-qualified keys to booleans.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    flags: HashMap<String, bool>,
}

impl MapConfig {
    /// Create an empty config (every lookup falls back to spec defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flag, chaining.
    pub fn with_flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.flags.insert(key.into(), value);
        self
    }

    /// Set a flag in place.
    pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
        self.flags.insert(key.into(), value);
    }
}

impl ConfigProvider for MapConfig {
    fn enabled_flag(&self, key: &str) -> Option<bool> {
        self.flags.get(key).copied()
    }
}

/// Configuration backed by a nested value tree.
///
/// Keys are dotted paths into the tree, so `container.proc_manager.enabled`
/// navigates `{"container": {"proc_manager": {"enabled": ...}}}`. Only real
/// booleans count; a non-boolean leaf is ignored with a warning and the spec
/// default applies.
#[derive(Debug, Clone)]
pub struct ValueConfig {
    root: Value,
}

impl ValueConfig {
    /// Wrap a parsed configuration tree.
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut node = &self.root;
        for part in key.split('.') {
            node = node.as_object()?.get(part)?;
        }
        Some(node)
    }
}

impl ConfigProvider for ValueConfig {
    fn enabled_flag(&self, key: &str) -> Option<bool> {
        match self.lookup(key) {
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => {
                log::warn!(
                    "config key '{}' is not a boolean (found {}); ignoring",
                    key,
                    other
                );
                None
            }
            None => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

/// The enabled/disabled decision for every declared capability.
///
/// Computed once per run from a registry and a configuration provider;
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    enabled: HashMap<String, bool>,
}

impl Activation {
    /// Decide activation for every capability in the registry.
    pub fn resolve(registry: &CapabilityRegistry, config: &dyn ConfigProvider) -> Self {
        let mut enabled = HashMap::with_capacity(registry.len());
        for spec in registry.iter() {
            let key = spec.enabled_key();
            let decision = config.enabled_flag(&key).unwrap_or(spec.enabled_default);
            if !decision {
                log::debug!("capability '{}' disabled (gate '{}')", spec.name, key);
            }
            enabled.insert(spec.name.clone(), decision);
        }
        Self { enabled }
    }

    /// Whether a capability is enabled. Unknown names are disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(false)
    }

    /// Number of enabled capabilities.
    pub fn enabled_count(&self) -> usize {
        self.enabled.values().filter(|&&e| e).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::CapabilitySpec;
    use serde_json::json;

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::from_specs(vec![
            CapabilitySpec::new("exchange_manager", "container.ExchangeManager"),
            CapabilitySpec::new("proc_manager", "container.ProcManager"),
            CapabilitySpec::new("sflow_manager", "container.SflowManager")
                .with_config_key("container.sflow.enabled")
                .disabled_by_default(),
        ])
        .unwrap()
    }

    #[test]
    fn test_defaults_apply_when_config_silent() {
        let activation = Activation::resolve(&registry(), &MapConfig::new());
        assert!(activation.is_enabled("exchange_manager"));
        assert!(activation.is_enabled("proc_manager"));
        assert!(!activation.is_enabled("sflow_manager"));
        assert_eq!(activation.enabled_count(), 2);
    }

    #[test]
    fn test_config_overrides_defaults() {
        let config = MapConfig::new()
            .with_flag("container.proc_manager.enabled", false)
            .with_flag("container.sflow.enabled", true);
        let activation = Activation::resolve(&registry(), &config);
        assert!(activation.is_enabled("exchange_manager"));
        assert!(!activation.is_enabled("proc_manager"));
        assert!(activation.is_enabled("sflow_manager"));
    }

    #[test]
    fn test_explicit_key_is_the_only_gate() {
        // The derived key has no effect once a spec names its own gate.
        let config = MapConfig::new().with_flag("container.sflow_manager.enabled", true);
        let activation = Activation::resolve(&registry(), &config);
        assert!(!activation.is_enabled("sflow_manager"));
    }

    #[test]
    fn test_unknown_name_is_disabled() {
        let activation = Activation::resolve(&registry(), &MapConfig::new());
        assert!(!activation.is_enabled("no_such_capability"));
    }

    #[test]
    fn test_value_config_dotted_lookup() {
        let config = ValueConfig::new(json!({
            "container": {
                "proc_manager": { "enabled": false },
                "sflow": { "enabled": true },
            }
        }));
        assert_eq!(
            config.enabled_flag("container.proc_manager.enabled"),
            Some(false)
        );
        assert_eq!(config.enabled_flag("container.sflow.enabled"), Some(true));
        assert_eq!(config.enabled_flag("container.missing.enabled"), None);

        let activation = Activation::resolve(&registry(), &config);
        assert!(!activation.is_enabled("proc_manager"));
        assert!(activation.is_enabled("sflow_manager"));
        assert!(activation.is_enabled("exchange_manager"));
    }

    #[test]
    fn test_value_config_non_boolean_leaf_ignored() {
        let config = ValueConfig::new(json!({
            "container": { "proc_manager": { "enabled": "yes" } }
        }));
        assert_eq!(config.enabled_flag("container.proc_manager.enabled"), None);

        // Spec default still applies.
        let activation = Activation::resolve(&registry(), &config);
        assert!(activation.is_enabled("proc_manager"));
    }

    #[test]
    fn test_resolution_is_pure() {
        let config = MapConfig::new().with_flag("container.proc_manager.enabled", false);
        let reg = registry();
        let first = Activation::resolve(&reg, &config);
        let second = Activation::resolve(&reg, &config);
        assert_eq!(first, second);
    }
}
