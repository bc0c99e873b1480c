//! Capability registry — the validated manifest for one container run.
//!
//! Validation happens exactly once, at load. Anything that passes is immutable
//! from then on: resolution and orchestration can assume every dependency name
//! resolves and every config key is well-formed.

use std::collections::HashMap;

use thiserror::Error;

use super::spec::CapabilitySpec;

/// Errors detected while validating a manifest.
///
/// These are fail-fast: a manifest that does not validate aborts bootstrap
/// before any activation or resolution work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    /// Two specs share a name.
    #[error("duplicate capability name '{0}' in manifest")]
    DuplicateName(String),

    /// A spec has an empty name.
    #[error("capability with empty name in manifest")]
    EmptyName,

    /// A dependency names a capability the manifest does not declare.
    #[error("capability '{capability}' depends on unknown capability '{dependency}'")]
    UnknownDependency {
        capability: String,
        dependency: String,
    },

    /// An explicit config gate key is empty or contains whitespace/control
    /// characters.
    #[error("capability '{capability}' has malformed config key '{key}'")]
    MalformedConfigKey { capability: String, key: String },

    /// Two specs bind the same context field.
    #[error("capabilities '{first}' and '{second}' both bind field '{field}'")]
    DuplicateField {
        first: String,
        second: String,
        field: String,
    },
}

/// The validated, immutable set of capability specs for one container run.
///
/// Declaration order is preserved — it is the tie-break that makes start
/// plans deterministic. Names are mapped once to dense indices so later graph
/// work never repeats string lookups.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    specs: Vec<CapabilitySpec>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    /// Validate a list of specs into a registry.
    ///
    /// Checks: non-empty unique names, well-formed explicit config keys,
    /// unique binding fields, and that every `depends_on` entry names a
    /// declared capability.
    pub fn from_specs(specs: Vec<CapabilitySpec>) -> Result<Self, ManifestError> {
        let mut index = HashMap::with_capacity(specs.len());
        let mut fields: HashMap<&str, &str> = HashMap::new();

        for (i, spec) in specs.iter().enumerate() {
            if spec.name.is_empty() {
                return Err(ManifestError::EmptyName);
            }
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(ManifestError::DuplicateName(spec.name.clone()));
            }
            if let Some(key) = &spec.enabled_config_key {
                if !key_is_well_formed(key) {
                    return Err(ManifestError::MalformedConfigKey {
                        capability: spec.name.clone(),
                        key: key.clone(),
                    });
                }
            }
            if let Some(field) = &spec.field {
                if let Some(first) = fields.insert(field.as_str(), spec.name.as_str()) {
                    return Err(ManifestError::DuplicateField {
                        first: first.to_string(),
                        second: spec.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }

        for spec in &specs {
            for dep in &spec.depends_on {
                if !index.contains_key(dep) {
                    return Err(ManifestError::UnknownDependency {
                        capability: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        log::debug!("manifest validated: {} capabilities", specs.len());
        Ok(Self { specs, index })
    }

    /// Number of declared capabilities.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the manifest declares no capabilities.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Look up a spec by capability name.
    pub fn get(&self, name: &str) -> Option<&CapabilitySpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    /// Dense declaration index of a capability name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Spec at a declaration index.
    pub fn spec_at(&self, index: usize) -> Option<&CapabilitySpec> {
        self.specs.get(index)
    }

    /// Iterate specs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilitySpec> {
        self.specs.iter()
    }

    /// Capability names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A config key is looked up verbatim; empty keys or keys with embedded
/// whitespace/control characters can never match and are rejected at load.
fn key_is_well_formed(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(|c| c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> CapabilitySpec {
        CapabilitySpec::new(name, format!("container.{}", name))
    }

    #[test]
    fn test_valid_manifest_preserves_declaration_order() {
        let registry = CapabilityRegistry::from_specs(vec![
            spec("exchange_manager"),
            spec("proc_manager").with_depends_on(["exchange_manager"]),
            spec("datastore_manager"),
        ])
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.names(),
            vec!["exchange_manager", "proc_manager", "datastore_manager"]
        );
        assert_eq!(registry.index_of("proc_manager"), Some(1));
        assert_eq!(
            registry.get("proc_manager").unwrap().depends_on,
            vec!["exchange_manager"]
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = CapabilityRegistry::from_specs(vec![spec("proc_manager"), spec("proc_manager")])
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateName("proc_manager".to_string())
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = CapabilityRegistry::from_specs(vec![spec("")]).unwrap_err();
        assert_eq!(err, ManifestError::EmptyName);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = CapabilityRegistry::from_specs(vec![
            spec("proc_manager").with_depends_on(["exchange_manager"])
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ManifestError::UnknownDependency {
                capability: "proc_manager".to_string(),
                dependency: "exchange_manager".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_config_key_rejected() {
        let err = CapabilityRegistry::from_specs(vec![
            spec("proc_manager").with_config_key("container.proc manager.enabled")
        ])
        .unwrap_err();
        assert!(matches!(err, ManifestError::MalformedConfigKey { .. }));

        let err =
            CapabilityRegistry::from_specs(vec![spec("proc_manager").with_config_key("")])
                .unwrap_err();
        assert!(matches!(err, ManifestError::MalformedConfigKey { .. }));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = CapabilityRegistry::from_specs(vec![
            spec("resource_registry").with_field("registry"),
            spec("directory").with_field("registry"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateField {
                first: "resource_registry".to_string(),
                second: "directory".to_string(),
                field: "registry".to_string(),
            }
        );
    }

    #[test]
    fn test_self_dependency_passes_load_validation() {
        // A self-dependency names a declared capability; it is rejected later
        // as a one-node cycle during plan resolution.
        let registry =
            CapabilityRegistry::from_specs(vec![spec("directory").with_depends_on(["directory"])]);
        assert!(registry.is_ok());
    }
}
