//! # Capstan
//!
//! Capability bootstrap engine for long-running container processes.
//!
//! A container is composed of named "capabilities" — modular service facets
//! such as process management, exchange management, datastore access, or a
//! resource registry. Capstan takes a declarative manifest of capability
//! specs, decides which are enabled from configuration, computes a
//! deterministic start order that respects declared dependencies, starts each
//! capability through an injected factory into a shared [`RuntimeContext`],
//! and tears everything down in reverse order on shutdown — rolling back
//! already-started capabilities if any start fails.

pub mod activation;
pub mod capability;
pub mod container;
pub mod context;
pub mod manifest;
pub mod orchestrator;
pub mod plan;

pub use activation::{Activation, ConfigProvider, MapConfig, ValueConfig};
pub use capability::{Capability, CapabilityFactory, Constructor, FactoryRegistry};
pub use container::{BootError, Container, RunningContainer};
pub use context::RuntimeContext;
pub use manifest::{
    default_enabled_key, CapabilityRegistry, CapabilitySpec, LoadError, ManifestError,
};
pub use orchestrator::{
    CapabilityState, Orchestrator, OrchestratorOptions, RunningSet, StartErrorKind, StartupError,
    TeardownError, TeardownErrorKind,
};
pub use plan::{PlanError, StartPlan};

/// Library version.
pub const VERSION: &str = "0.1.0";
