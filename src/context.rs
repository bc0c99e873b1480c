//! Runtime context — the shared registry of live capability instances.
//!
//! The context is populated incrementally during startup and drained during
//! teardown. Capabilities started later in the plan read their dependencies
//! out of it, by binding field or by capability name; that lookup is the only
//! data-plane contact between capabilities and the orchestration core.
//!
//! Writes are restricted to the orchestrator (bind during startup, unbind
//! during teardown); the interior lock makes same-depth concurrent binds
//! mutually exclusive while dependents read.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::capability::Capability;

/// Shared, incrementally populated map of live capability instances.
#[derive(Default)]
pub struct RuntimeContext {
    inner: RwLock<ContextInner>,
}

#[derive(Default)]
struct ContextInner {
    by_field: HashMap<String, Arc<dyn Capability>>,
    by_name: HashMap<String, Arc<dyn Capability>>,
}

impl RuntimeContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bind an instance under its capability name and, when set, its field.
    pub(crate) fn bind(&self, name: &str, field: Option<&str>, instance: Arc<dyn Capability>) {
        let mut inner = self.inner.write();
        if let Some(field) = field {
            inner.by_field.insert(field.to_string(), instance.clone());
        }
        inner.by_name.insert(name.to_string(), instance);
    }

    /// Remove an instance's bindings during teardown.
    pub(crate) fn unbind(&self, name: &str, field: Option<&str>) {
        let mut inner = self.inner.write();
        if let Some(field) = field {
            inner.by_field.remove(field);
        }
        inner.by_name.remove(name);
    }

    /// Look up a capability by its binding field.
    pub fn by_field(&self, field: &str) -> Option<Arc<dyn Capability>> {
        self.inner.read().by_field.get(field).cloned()
    }

    /// Look up a capability by its capability name.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.inner.read().by_name.get(name).cloned()
    }

    /// Names of all currently bound capabilities (unordered).
    pub fn names(&self) -> Vec<String> {
        self.inner.read().by_name.keys().cloned().collect()
    }

    /// Number of bound capabilities.
    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_name.is_empty()
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("RuntimeContext")
            .field("capabilities", &inner.by_name.keys().collect::<Vec<_>>())
            .field("fields", &inner.by_field.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::any::Any;

    struct Stub(&'static str);

    #[async_trait]
    impl Capability for Stub {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_bind_and_lookup() {
        let ctx = RuntimeContext::new();
        ctx.bind("proc_manager", Some("proc_manager"), Arc::new(Stub("pm")));
        ctx.bind("event_repository", None, Arc::new(Stub("er")));

        assert_eq!(ctx.len(), 2);
        assert!(ctx.by_field("proc_manager").is_some());
        assert!(ctx.by_name("proc_manager").is_some());
        assert!(ctx.by_name("event_repository").is_some());
        // No field was bound for the event repository.
        assert!(ctx.by_field("event_repository").is_none());
    }

    #[test]
    fn test_downcast_through_lookup() {
        let ctx = RuntimeContext::new();
        ctx.bind("proc_manager", Some("proc_manager"), Arc::new(Stub("pm")));

        let instance = ctx.by_field("proc_manager").unwrap();
        let stub = instance.as_any().downcast_ref::<Stub>().unwrap();
        assert_eq!(stub.0, "pm");
    }

    #[test]
    fn test_unbind_removes_both_bindings() {
        let ctx = RuntimeContext::new();
        ctx.bind("proc_manager", Some("proc_manager"), Arc::new(Stub("pm")));
        ctx.unbind("proc_manager", Some("proc_manager"));

        assert!(ctx.is_empty());
        assert!(ctx.by_field("proc_manager").is_none());
        assert!(ctx.by_name("proc_manager").is_none());
    }

    #[test]
    fn test_missing_lookups() {
        let ctx = RuntimeContext::new();
        assert!(ctx.by_field("nope").is_none());
        assert!(ctx.by_name("nope").is_none());
        assert!(ctx.is_empty());
    }
}
