//! Container facade — manifest to running capabilities in one call.
//!
//! `Container` is the composition root: it owns the validated registry and
//! the capability factory, and wires activation → plan → orchestration for
//! each start. The registry/context pair is explicit, owned state — there are
//! no ambient globals anywhere in the bootstrap path.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::activation::{Activation, ConfigProvider};
use crate::capability::CapabilityFactory;
use crate::context::RuntimeContext;
use crate::manifest::CapabilityRegistry;
use crate::orchestrator::{
    Orchestrator, OrchestratorOptions, RunningSet, StartupError, TeardownError,
};
use crate::plan::{PlanError, StartPlan};

/// Errors surfaced by [`Container::start`].
#[derive(Debug, Error)]
pub enum BootError {
    /// Activation or dependency resolution failed; nothing was instantiated.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A capability failed to start; everything already started was rolled
    /// back.
    #[error(transparent)]
    Startup(#[from] StartupError),
}

/// A container assembled from a registry and a factory, ready to start.
pub struct Container<F> {
    registry: CapabilityRegistry,
    factory: F,
    orchestrator: Orchestrator,
}

impl<F: CapabilityFactory> Container<F> {
    /// Assemble a container with default orchestrator options.
    pub fn new(registry: CapabilityRegistry, factory: F) -> Self {
        Self {
            registry,
            factory,
            orchestrator: Orchestrator::new(),
        }
    }

    /// Assemble a container with explicit orchestrator options.
    pub fn with_options(
        registry: CapabilityRegistry,
        factory: F,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            registry,
            factory,
            orchestrator: Orchestrator::with_options(options),
        }
    }

    /// The validated manifest registry.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Resolve activation against `config`, compute the start plan, and start
    /// every enabled capability.
    pub async fn start(&self, config: &dyn ConfigProvider) -> Result<RunningContainer, BootError> {
        let activation = Activation::resolve(&self.registry, config);
        let plan = StartPlan::resolve(&self.registry, &activation)?;
        log::info!(
            "container start plan ({} of {} capabilities): [{}]",
            plan.len(),
            self.registry.len(),
            plan.order().join(", ")
        );

        let running = self
            .orchestrator
            .start(&self.registry, &plan, &self.factory)
            .await?;

        let id = Uuid::new_v4();
        log::info!("container {} up: {} capabilities running", id, running.len());
        Ok(RunningContainer { id, running })
    }

    /// Stop a running container: reverse start order, best-effort. Teardown
    /// errors are returned for diagnostics; they do not retroactively turn a
    /// successful run into a failure.
    pub async fn stop(&self, container: RunningContainer) -> Vec<TeardownError> {
        log::info!("container {} shutting down", container.id);
        let errors = self.orchestrator.stop(container.running).await;
        for error in &errors {
            log::warn!("{}", error);
        }
        errors
    }
}

/// A started container: run id plus the live capability set.
#[derive(Debug)]
pub struct RunningContainer {
    id: Uuid,
    running: RunningSet,
}

impl RunningContainer {
    /// Unique id of this container run.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The shared runtime context.
    pub fn context(&self) -> &Arc<RuntimeContext> {
        self.running.context()
    }

    /// Capability names in actual start order.
    pub fn started_order(&self) -> Vec<&str> {
        self.running.started_order()
    }

    /// Number of running capabilities.
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Whether the container runs no capabilities.
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}
