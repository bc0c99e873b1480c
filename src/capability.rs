//! Capability instances and the factory seam that creates them.
//!
//! The orchestration core never performs dynamic type lookup: a class
//! reference in a spec is an opaque string resolved through a
//! [`CapabilityFactory`] supplied by the embedding process. The default
//! factory is [`FactoryRegistry`], an explicit map from class reference to
//! constructor closure, registered at startup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::RuntimeContext;
use crate::manifest::CapabilitySpec;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A live capability instance.
///
/// Construction *is* the start of a capability: the factory returns a fully
/// started instance, reading any dependencies it needs out of the runtime
/// context it is given. `stop` is the teardown hook, invoked in reverse start
/// order during shutdown or rollback.
#[async_trait]
pub trait Capability: Send + Sync + 'static {
    /// Teardown hook. The default is a no-op for capabilities with nothing to
    /// release.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Downcast hook so a dependent can reach the concrete type behind a
    /// context lookup: `ctx.by_field("proc_manager")?.as_any().downcast_ref::<ProcManager>()`.
    fn as_any(&self) -> &dyn Any;
}

// ---------------------------------------------------------------------------
// CapabilityFactory
// ---------------------------------------------------------------------------

/// Builds capability instances from class references.
///
/// Supplied by the caller of the orchestrator. The context passed to `build`
/// holds every capability bound so far, so an instance can look up its
/// dependencies while constructing.
#[async_trait]
pub trait CapabilityFactory: Send + Sync {
    /// Build (and start) the capability described by `spec`.
    async fn build(
        &self,
        spec: &CapabilitySpec,
        ctx: &RuntimeContext,
    ) -> anyhow::Result<Arc<dyn Capability>>;
}

/// Constructor closure stored in a [`FactoryRegistry`].
pub type Constructor = Box<
    dyn for<'a> Fn(
            &'a CapabilitySpec,
            &'a RuntimeContext,
        ) -> BoxFuture<'a, anyhow::Result<Arc<dyn Capability>>>
        + Send
        + Sync,
>;

/// Explicit class-reference → constructor registry.
///
/// Replaces reflective class lookup: every class reference a manifest may
/// name must be registered here before the container starts. An unknown
/// reference fails the capability's instantiation.
#[derive(Default)]
pub struct FactoryRegistry {
    constructors: HashMap<String, Constructor>,
}

impl FactoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a class reference.
    pub fn register(&mut self, class_ref: impl Into<String>, constructor: Constructor) {
        let class_ref = class_ref.into();
        log::debug!("factory: registered constructor for '{}'", class_ref);
        self.constructors.insert(class_ref, constructor);
    }

    /// Register a synchronous constructor for a class reference.
    pub fn register_fn<F>(&mut self, class_ref: impl Into<String>, f: F)
    where
        F: Fn(&CapabilitySpec, &RuntimeContext) -> anyhow::Result<Arc<dyn Capability>>
            + Send
            + Sync
            + 'static,
    {
        self.register(
            class_ref,
            Box::new(move |spec, ctx| {
                let result = f(spec, ctx);
                Box::pin(async move { result })
            }),
        );
    }

    /// Whether a class reference has a constructor.
    pub fn contains(&self, class_ref: &str) -> bool {
        self.constructors.contains_key(class_ref)
    }

    /// Number of registered constructors.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl CapabilityFactory for FactoryRegistry {
    async fn build(
        &self,
        spec: &CapabilitySpec,
        ctx: &RuntimeContext,
    ) -> anyhow::Result<Arc<dyn Capability>> {
        let constructor = self.constructors.get(&spec.class_ref).ok_or_else(|| {
            anyhow::anyhow!(
                "no constructor registered for class '{}' (capability '{}')",
                spec.class_ref,
                spec.name
            )
        })?;
        constructor(spec, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Capability for Noop {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_register_and_build() {
        let mut factory = FactoryRegistry::new();
        factory.register_fn("container.Noop", |_, _| Ok(Arc::new(Noop) as _));
        assert!(factory.contains("container.Noop"));
        assert_eq!(factory.len(), 1);

        let spec = CapabilitySpec::new("noop", "container.Noop");
        let ctx = RuntimeContext::new();
        let instance = tokio_test::block_on(factory.build(&spec, &ctx)).unwrap();
        assert!(instance.as_any().downcast_ref::<Noop>().is_some());
    }

    #[test]
    fn test_unknown_class_ref_fails() {
        let factory = FactoryRegistry::new();
        let spec = CapabilitySpec::new("ghost", "container.Ghost");
        let ctx = RuntimeContext::new();
        let err = tokio_test::block_on(factory.build(&spec, &ctx)).err().unwrap();
        assert!(err.to_string().contains("container.Ghost"));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_async_constructor() {
        let mut factory = FactoryRegistry::new();
        factory.register(
            "container.Async",
            Box::new(|_, _| Box::pin(async { Ok(Arc::new(Noop) as _) })),
        );
        let spec = CapabilitySpec::new("async_cap", "container.Async");
        let ctx = RuntimeContext::new();
        assert!(tokio_test::block_on(factory.build(&spec, &ctx)).is_ok());
    }

    #[test]
    fn test_default_stop_is_noop() {
        let noop = Noop;
        assert!(tokio_test::block_on(noop.stop()).is_ok());
    }
}
