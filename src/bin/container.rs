//! capstan demo container binary.
//!
//! Boots a capability manifest end-to-end with stub capability
//! implementations, waits for an interrupt, then shuts down in reverse start
//! order.
//!
//! # Environment Variables
//!
//! - `CAPSTAN_MANIFEST` — path to a manifest YAML file (default: a small
//!   built-in demo manifest)
//! - `CAPSTAN_CONFIG` — path to a JSON configuration tree consulted for
//!   `container.<name>.enabled` gates (default: empty)
//! - `RUST_LOG` — log filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin container
//! # or with a manifest on disk:
//! CAPSTAN_MANIFEST=manifest.yml cargo run --bin container
//! ```

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use capstan::{
    manifest, Capability, CapabilityRegistry, Container, FactoryRegistry, MapConfig, ValueConfig,
};

/// Built-in demo manifest mirroring the facets of a small container build.
const DEMO_MANIFEST: &str = r#"
capabilities:
  - name: exchange_manager
    docstring: "Broker connections, exchanges and queues"
    class: demo.Facet
    field: ex_manager
  - name: datastore_manager
    docstring: "Persistent datastore access"
    class: demo.Facet
    field: datastore_manager
  - name: resource_registry
    docstring: "Resource registry backed by the datastore"
    class: demo.Facet
    field: resource_registry
    depends_on: [datastore_manager]
  - name: event_repository
    docstring: "Persists published events"
    class: demo.Facet
    field: event_repository
    depends_on: [datastore_manager, exchange_manager]
  - name: proc_manager
    docstring: "Spawns and supervises container processes"
    class: demo.Facet
    field: proc_manager
    depends_on: [exchange_manager, resource_registry]
"#;

/// Stub facet: logs its lifecycle, holds no resources.
struct Facet {
    name: String,
}

#[async_trait]
impl Capability for Facet {
    async fn stop(&self) -> anyhow::Result<()> {
        log::info!("facet '{}' released", self.name);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn load_registry() -> anyhow::Result<CapabilityRegistry> {
    match std::env::var("CAPSTAN_MANIFEST") {
        Ok(path) => Ok(manifest::load_file(path)?),
        Err(_) => Ok(manifest::load_str(DEMO_MANIFEST)?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let registry = load_registry()?;

    let mut factory = FactoryRegistry::new();
    for spec in registry.iter() {
        factory.register_fn(spec.class_ref.clone(), |spec, _ctx| {
            log::info!("facet '{}' ready ({})", spec.name, spec.docstring);
            Ok(Arc::new(Facet {
                name: spec.name.clone(),
            }) as _)
        });
    }

    let container = Container::new(registry, factory);

    let running = match std::env::var("CAPSTAN_CONFIG") {
        Ok(path) => {
            let tree: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            container.start(&ValueConfig::new(tree)).await?
        }
        Err(_) => container.start(&MapConfig::new()).await?,
    };

    log::info!(
        "container {} running capabilities: [{}]",
        running.id(),
        running.started_order().join(", ")
    );
    log::info!("press ctrl-c to shut down");

    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    let _ = tokio::task::spawn_blocking(move || rx.recv()).await?;

    let errors = container.stop(running).await;
    if errors.is_empty() {
        log::info!("container shut down cleanly");
    } else {
        log::warn!("container shut down with {} teardown errors", errors.len());
    }
    Ok(())
}
