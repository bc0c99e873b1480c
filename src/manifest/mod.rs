//! Manifest handling — capability specs, validation, and loading.
//!
//! A manifest is the declarative description of every capability a container
//! build knows about. It arrives either as an already-typed list of
//! [`CapabilitySpec`] records or as a YAML document loaded through
//! [`load_str`]/[`load_file`], and is validated once into an immutable
//! [`CapabilityRegistry`] before any resolution work happens.

pub mod loader;
pub mod registry;
pub mod spec;

pub use loader::{load_file, load_str, LoadError};
pub use registry::{CapabilityRegistry, ManifestError};
pub use spec::{default_enabled_key, CapabilitySpec};
