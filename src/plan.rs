//! Start-plan resolution — a deterministic, dependency-respecting order over
//! the enabled capabilities.
//!
//! The graph is built on dense declaration indices, restricted to the enabled
//! subset. Resolution validates in a fixed order: disabled dependencies
//! first, then cycles, then a topological sort whose tie-break is manifest
//! declaration order — the same manifest and configuration always produce the
//! same plan. Alongside the total order, capabilities are grouped into
//! topological-depth levels; everything at one depth depends only on
//! shallower depths, so a level can be started concurrently.

use thiserror::Error;

use crate::activation::Activation;
use crate::manifest::CapabilityRegistry;

// ---------------------------------------------------------------------------
// PlanError
// ---------------------------------------------------------------------------

/// Errors from plan resolution. Fail-fast: nothing is instantiated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// An enabled capability depends on a capability activation turned off.
    #[error("capability '{capability}' depends on disabled capability '{dependency}'")]
    DisabledDependency {
        capability: String,
        dependency: String,
    },

    /// The dependency graph contains a cycle. The path lists the capability
    /// names in traversal order, first name repeated at the end.
    #[error("cyclic capability dependency: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

// ---------------------------------------------------------------------------
// StartPlan
// ---------------------------------------------------------------------------

/// The resolved start order for one (registry, activation) pair.
///
/// `order` is the sequential start order; `levels` groups the same
/// capabilities by topological depth for same-depth concurrent starts.
/// Disabled capabilities appear in neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPlan {
    order: Vec<String>,
    levels: Vec<Vec<String>>,
}

impl StartPlan {
    /// Resolve the start plan over the enabled subset of the registry.
    pub fn resolve(
        registry: &CapabilityRegistry,
        activation: &Activation,
    ) -> Result<Self, PlanError> {
        let n = registry.len();
        let enabled: Vec<bool> = registry
            .iter()
            .map(|spec| activation.is_enabled(&spec.name))
            .collect();

        // Dependency edges on dense indices, enabled capabilities only.
        // The registry guarantees every name resolves.
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, spec) in registry.iter().enumerate() {
            if !enabled[i] {
                continue;
            }
            for dep in &spec.depends_on {
                let d = registry
                    .index_of(dep)
                    .expect("registry validated dependency names at load");
                if !enabled[d] {
                    return Err(PlanError::DisabledDependency {
                        capability: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                deps[i].push(d);
            }
        }

        detect_cycle(registry, &enabled, &deps)?;

        // Kahn's algorithm over the enabled subset. Among ready nodes the
        // earliest declaration index always starts next (determinism).
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree: Vec<usize> = vec![0; n];
        for i in 0..n {
            if !enabled[i] {
                continue;
            }
            in_degree[i] = deps[i].len();
            for &d in &deps[i] {
                dependents[d].push(i);
            }
        }

        let mut ready: std::collections::BTreeSet<usize> = (0..n)
            .filter(|&i| enabled[i] && in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(enabled.iter().filter(|&&e| e).count());

        while let Some(i) = ready.first().copied() {
            ready.remove(&i);
            order.push(registry.spec_at(i).unwrap().name.clone());
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        // Longest-path depth per node; same depth means no edge between two
        // capabilities, directly or transitively.
        let mut depth: Vec<usize> = vec![0; n];
        for name in &order {
            let i = registry.index_of(name).unwrap();
            depth[i] = deps[i].iter().map(|&d| depth[d] + 1).max().unwrap_or(0);
        }
        let max_depth = (0..n)
            .filter(|&i| enabled[i])
            .map(|i| depth[i])
            .max()
            .map_or(0, |d| d + 1);
        let mut levels: Vec<Vec<String>> = vec![Vec::new(); max_depth];
        for (i, spec) in registry.iter().enumerate() {
            if enabled[i] {
                levels[depth[i]].push(spec.name.clone());
            }
        }

        Ok(Self { order, levels })
    }

    /// Sequential start order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Capabilities grouped by topological depth, declaration order within a
    /// level.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Number of capabilities in the plan.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the plan starts nothing.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a capability is part of the plan.
    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }
}

/// Depth-first cycle detection over the enabled subset. Roots are visited in
/// declaration order and neighbors in `depends_on` order, so the reported
/// path is deterministic.
fn detect_cycle(
    registry: &CapabilityRegistry,
    enabled: &[bool],
    deps: &[Vec<usize>],
) -> Result<(), PlanError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        i: usize,
        registry: &CapabilityRegistry,
        deps: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<(), PlanError> {
        marks[i] = Mark::InProgress;
        path.push(i);
        for &d in &deps[i] {
            match marks[d] {
                Mark::Done => {}
                Mark::Unvisited => visit(d, registry, deps, marks, path)?,
                Mark::InProgress => {
                    let start = path.iter().position(|&p| p == d).unwrap();
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&p| registry.spec_at(p).unwrap().name.clone())
                        .collect();
                    cycle.push(registry.spec_at(d).unwrap().name.clone());
                    return Err(PlanError::Cycle { path: cycle });
                }
            }
        }
        path.pop();
        marks[i] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; deps.len()];
    let mut path = Vec::new();
    for i in 0..deps.len() {
        if enabled[i] && marks[i] == Mark::Unvisited {
            visit(i, registry, deps, &mut marks, &mut path)?;
        }
    }
    Ok(())
}
