//! Manifest loading — YAML documents into a validated registry.
//!
//! The engine API is typed-list-first: [`CapabilityRegistry::from_specs`]
//! accepts specs from anywhere. This module is the convenience layer for the
//! common case of a manifest kept as a YAML document:
//!
//! ```yaml
//! capabilities:
//!   - name: exchange_manager
//!     docstring: "Broker connections, exchanges and queues"
//!     class: container.ExchangeManager
//!     field: ex_manager
//!   - name: proc_manager
//!     class: container.ProcManager
//!     field: proc_manager
//!     depends_on: [exchange_manager]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::registry::{CapabilityRegistry, ManifestError};
use super::spec::CapabilitySpec;

/// Errors from loading a manifest document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document parsed but the manifest did not validate.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Wrapper for YAML deserialization (specs are nested under `capabilities:`).
#[derive(Debug, Deserialize)]
struct ManifestDoc {
    capabilities: Vec<CapabilitySpec>,
}

/// Parse and validate a manifest from a YAML string.
pub fn load_str(yaml: &str) -> Result<CapabilityRegistry, LoadError> {
    let doc: ManifestDoc = serde_yaml::from_str(yaml)?;
    Ok(CapabilityRegistry::from_specs(doc.capabilities)?)
}

/// Parse and validate a manifest from a YAML file.
pub fn load_file(path: impl AsRef<Path>) -> Result<CapabilityRegistry, LoadError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let registry = load_str(&content)?;
    log::info!(
        "loaded manifest from {}: {} capabilities",
        path.display(),
        registry.len()
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"
capabilities:
  - name: exchange_manager
    docstring: "Broker connections, exchanges and queues"
    class: container.ExchangeManager
    field: ex_manager
  - name: proc_manager
    docstring: "Spawns and supervises container processes"
    class: container.ProcManager
    field: proc_manager
    depends_on: [exchange_manager]
  - name: sflow_manager
    class: container.SflowManager
    enabled_config_key: container.sflow.enabled
    enabled_default: false
"#;

    #[test]
    fn test_load_str() {
        let registry = load_str(MANIFEST).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.names(),
            vec!["exchange_manager", "proc_manager", "sflow_manager"]
        );

        let proc_manager = registry.get("proc_manager").unwrap();
        assert_eq!(proc_manager.field.as_deref(), Some("proc_manager"));
        assert_eq!(proc_manager.depends_on, vec!["exchange_manager"]);

        let sflow = registry.get("sflow_manager").unwrap();
        assert!(!sflow.enabled_default);
        assert_eq!(sflow.enabled_key(), "container.sflow.enabled");
    }

    #[test]
    fn test_load_str_invalid_manifest() {
        let yaml = r#"
capabilities:
  - name: proc_manager
    class: container.ProcManager
    depends_on: [missing]
"#;
        let err = load_str(yaml).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Manifest(ManifestError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_load_str_bad_yaml() {
        let err = load_str("capabilities: [not a spec").unwrap_err();
        assert!(matches!(err, LoadError::Yaml(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let registry = load_file(file.path()).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_load_file_missing() {
        let err = load_file("/nonexistent/manifest.yml").unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
