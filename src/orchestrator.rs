//! Lifecycle orchestration — ordered startup, reverse teardown, rollback.
//!
//! The orchestrator walks a resolved start plan, builds each capability
//! through the injected factory, and binds it into the shared runtime
//! context. A failure anywhere stops further starts and rolls back every
//! already-started capability in strict reverse of the order they actually
//! finished starting. Shutdown runs the same reverse walk, best-effort:
//! one capability's teardown error never prevents another's attempt.
//!
//! Starts are sequential by default. With
//! [`OrchestratorOptions::concurrent_levels`] capabilities at the same
//! topological depth start concurrently; the completion-order record keeps
//! teardown correct regardless of which sibling finished first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::timeout;

use crate::capability::{Capability, CapabilityFactory};
use crate::context::RuntimeContext;
use crate::manifest::CapabilityRegistry;
use crate::plan::StartPlan;

// ---------------------------------------------------------------------------
// CapabilityState
// ---------------------------------------------------------------------------

/// Lifecycle state of a single capability.
///
/// `Pending → Starting → Started → Stopping → Stopped`, with `Failed`
/// terminal from `Starting`. A failed capability never reaches `Started` and
/// is excluded from every teardown pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    Pending,
    Starting,
    Started,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapabilityState::Pending => "pending",
            CapabilityState::Starting => "starting",
            CapabilityState::Started => "started",
            CapabilityState::Stopping => "stopping",
            CapabilityState::Stopped => "stopped",
            CapabilityState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a capability failed to start.
#[derive(Debug, Error)]
pub enum StartErrorKind {
    /// The factory returned an error while constructing the capability.
    #[error("instantiation failed: {0}")]
    Instantiation(#[source] anyhow::Error),

    /// The start did not complete within the per-capability budget. Treated
    /// exactly like an instantiation failure for rollback purposes.
    #[error("start timed out after {0:?}")]
    Timeout(Duration),
}

/// A startup failure: the original cause aggregated with any teardown errors
/// encountered while rolling back already-started capabilities.
#[derive(Debug, Error)]
#[error("capability '{capability}' failed to start: {cause}{}", rollback_suffix(.rollback_errors))]
pub struct StartupError {
    /// The capability whose start failed.
    pub capability: String,
    /// The original failure.
    pub cause: StartErrorKind,
    /// Teardown errors hit during rollback (empty when rollback was clean).
    pub rollback_errors: Vec<TeardownError>,
}

fn rollback_suffix(errors: &[TeardownError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!(
        " ({} rollback error(s): {})",
        errors.len(),
        details.join("; ")
    )
}

/// Why a capability failed to stop.
#[derive(Debug, Error)]
pub enum TeardownErrorKind {
    /// The teardown hook returned an error.
    #[error("{0}")]
    Stop(#[source] anyhow::Error),

    /// The stop did not complete within the per-capability budget.
    #[error("stop timed out after {0:?}")]
    Timeout(Duration),
}

/// A teardown failure for one capability. Collected and reported after the
/// pass; never fatal to the remaining teardowns.
#[derive(Debug, Error)]
#[error("teardown of capability '{capability}' failed: {cause}")]
pub struct TeardownError {
    pub capability: String,
    pub cause: TeardownErrorKind,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Budget for a single capability start.
    pub start_timeout: Duration,
    /// Budget for a single capability stop.
    pub stop_timeout: Duration,
    /// Start capabilities at the same topological depth concurrently.
    pub concurrent_levels: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(10),
            concurrent_levels: false,
        }
    }
}

// ---------------------------------------------------------------------------
// RunningSet
// ---------------------------------------------------------------------------

/// The outcome of a successful start: the shared context plus the actual
/// start order the orchestrator recorded (completion order, which is what
/// teardown reverses).
pub struct RunningSet {
    context: Arc<RuntimeContext>,
    started: Vec<StartedCapability>,
    states: HashMap<String, CapabilityState>,
}

struct StartedCapability {
    name: String,
    field: Option<String>,
    instance: Arc<dyn Capability>,
}

impl RunningSet {
    /// The shared runtime context.
    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    /// Capability names in actual start (completion) order.
    pub fn started_order(&self) -> Vec<&str> {
        self.started.iter().map(|c| c.name.as_str()).collect()
    }

    /// Lifecycle state of a capability, if it was part of the plan.
    pub fn state(&self, name: &str) -> Option<CapabilityState> {
        self.states.get(name).copied()
    }

    /// Number of started capabilities.
    pub fn len(&self) -> usize {
        self.started.len()
    }

    /// Whether nothing was started.
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }
}

impl fmt::Debug for RunningSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningSet")
            .field("started", &self.started_order())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives capability startup and teardown for one container run.
pub struct Orchestrator {
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Create an orchestrator with default options (sequential starts).
    pub fn new() -> Self {
        Self {
            options: OrchestratorOptions::default(),
        }
    }

    /// Create an orchestrator with explicit options.
    pub fn with_options(options: OrchestratorOptions) -> Self {
        Self { options }
    }

    /// The active options.
    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Start every capability in the plan.
    ///
    /// Sequential mode walks `plan.order()`; concurrent mode walks
    /// `plan.levels()`, starting each level's capabilities together. On the
    /// first failure no further capability is started, everything already
    /// started is torn down in reverse completion order, and the aggregate
    /// error is returned — the partially built context is discarded.
    pub async fn start(
        &self,
        registry: &CapabilityRegistry,
        plan: &StartPlan,
        factory: &dyn CapabilityFactory,
    ) -> Result<RunningSet, StartupError> {
        let context = Arc::new(RuntimeContext::new());
        let started: Mutex<Vec<StartedCapability>> = Mutex::new(Vec::with_capacity(plan.len()));
        let states: Mutex<HashMap<String, CapabilityState>> = Mutex::new(
            plan.order()
                .iter()
                .map(|n| (n.clone(), CapabilityState::Pending))
                .collect(),
        );

        let batches: Vec<Vec<String>> = if self.options.concurrent_levels {
            plan.levels().to_vec()
        } else {
            plan.order().iter().map(|n| vec![n.clone()]).collect()
        };

        let mut failure: Option<(String, StartErrorKind)> = None;
        for batch in &batches {
            // Siblings in a batch share no edges; all may run concurrently.
            // In-flight siblings run to completion even when one fails, but
            // no deeper batch is started after a failure.
            let results = futures::future::join_all(batch.iter().map(|name| {
                let context = &context;
                let started = &started;
                let states = &states;
                async move {
                    let result = self
                        .start_one(name, registry, context, started, states, factory)
                        .await;
                    (name.clone(), result)
                }
            }))
            .await;

            for (name, result) in results {
                if let Err(kind) = result {
                    log::error!("capability '{}' failed to start: {}", name, kind);
                    if failure.is_none() {
                        failure = Some((name, kind));
                    }
                }
            }
            if failure.is_some() {
                break;
            }
        }

        if let Some((capability, cause)) = failure {
            let rollback_errors = self
                .rollback(&context, started.into_inner(), &states)
                .await;
            return Err(StartupError {
                capability,
                cause,
                rollback_errors,
            });
        }

        Ok(RunningSet {
            context,
            started: started.into_inner(),
            states: states.into_inner(),
        })
    }

    /// Stop every started capability in reverse start order.
    ///
    /// Best-effort: errors and timeouts are collected per capability and the
    /// pass always continues to the next one. Consumes the set — no
    /// capability is ever torn down twice.
    pub async fn stop(&self, running: RunningSet) -> Vec<TeardownError> {
        let RunningSet {
            context,
            started,
            states,
        } = running;
        let states = Mutex::new(states);
        log::info!("stopping {} capabilities", started.len());
        self.teardown(&context, started, &states).await
    }

    async fn start_one(
        &self,
        name: &str,
        registry: &CapabilityRegistry,
        context: &Arc<RuntimeContext>,
        started: &Mutex<Vec<StartedCapability>>,
        states: &Mutex<HashMap<String, CapabilityState>>,
        factory: &dyn CapabilityFactory,
    ) -> Result<(), StartErrorKind> {
        let spec = match registry.get(name) {
            Some(spec) => spec,
            None => {
                // Only reachable when the plan was resolved against a
                // different registry.
                return Err(StartErrorKind::Instantiation(anyhow::anyhow!(
                    "capability '{}' is not declared in the registry",
                    name
                )));
            }
        };

        set_state(states, name, CapabilityState::Starting);
        log::debug!("starting capability '{}' ({})", spec.name, spec.class_ref);

        let instance = match timeout(self.options.start_timeout, factory.build(spec, context)).await
        {
            Err(_) => {
                set_state(states, name, CapabilityState::Failed);
                return Err(StartErrorKind::Timeout(self.options.start_timeout));
            }
            Ok(Err(e)) => {
                set_state(states, name, CapabilityState::Failed);
                return Err(StartErrorKind::Instantiation(e));
            }
            Ok(Ok(instance)) => instance,
        };

        // Bind, then record: the completion-order entry must never precede
        // the context binding a dependent could observe.
        context.bind(&spec.name, spec.field.as_deref(), instance.clone());
        started.lock().push(StartedCapability {
            name: spec.name.clone(),
            field: spec.field.clone(),
            instance,
        });
        set_state(states, name, CapabilityState::Started);
        log::info!("capability '{}' started", spec.name);
        Ok(())
    }

    async fn rollback(
        &self,
        context: &RuntimeContext,
        started: Vec<StartedCapability>,
        states: &Mutex<HashMap<String, CapabilityState>>,
    ) -> Vec<TeardownError> {
        if started.is_empty() {
            return Vec::new();
        }
        log::warn!(
            "rolling back {} started capabilities in reverse start order",
            started.len()
        );
        self.teardown(context, started, states).await
    }

    async fn teardown(
        &self,
        context: &RuntimeContext,
        mut started: Vec<StartedCapability>,
        states: &Mutex<HashMap<String, CapabilityState>>,
    ) -> Vec<TeardownError> {
        let mut errors = Vec::new();
        while let Some(cap) = started.pop() {
            set_state(states, &cap.name, CapabilityState::Stopping);
            log::debug!("stopping capability '{}'", cap.name);
            match timeout(self.options.stop_timeout, cap.instance.stop()).await {
                Err(_) => {
                    errors.push(TeardownError {
                        capability: cap.name.clone(),
                        cause: TeardownErrorKind::Timeout(self.options.stop_timeout),
                    });
                }
                Ok(Err(e)) => {
                    errors.push(TeardownError {
                        capability: cap.name.clone(),
                        cause: TeardownErrorKind::Stop(e),
                    });
                }
                Ok(Ok(())) => log::info!("capability '{}' stopped", cap.name),
            }
            set_state(states, &cap.name, CapabilityState::Stopped);
            context.unbind(&cap.name, cap.field.as_deref());
        }
        errors
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn set_state(states: &Mutex<HashMap<String, CapabilityState>>, name: &str, state: CapabilityState) {
    states.lock().insert(name.to_string(), state);
}
