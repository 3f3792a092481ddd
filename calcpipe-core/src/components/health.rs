//! Health check protocol.
//!
//! Every component exposes `health_check()`: a lightweight availability probe
//! with no side effects. It reports `false` for an unreachable backing store;
//! it never errors. `probe` additionally contains a panicking probe, and
//! `probe_all` runs a batch of probes concurrently.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::factory::ComponentKind;

/// Liveness/readiness probe shared by all five component kinds.
pub trait HealthCheck: Send + Sync {
    /// `true` if the component can currently reach whatever it depends on.
    fn health_check(&self) -> bool;
}

/// Run a probe, mapping a panic to `false`.
pub fn probe<F>(name: &str, check: F) -> bool
where
    F: FnOnce() -> bool,
{
    match panic::catch_unwind(AssertUnwindSafe(check)) {
        Ok(healthy) => {
            debug!(component = name, healthy, "health probe finished");
            healthy
        }
        Err(_) => {
            warn!(component = name, "health probe panicked, reporting unhealthy");
            false
        }
    }
}

/// A named probe waiting to run.
pub struct ProbeTarget<'a> {
    pub kind: ComponentKind,
    pub name: String,
    check: Box<dyn Fn() -> bool + Send + Sync + 'a>,
}

impl<'a> ProbeTarget<'a> {
    pub fn new(
        kind: ComponentKind,
        name: impl Into<String>,
        check: impl Fn() -> bool + Send + Sync + 'a,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            check: Box::new(check),
        }
    }
}

/// Health of one participating component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub kind: ComponentKind,
    pub name: String,
    pub healthy: bool,
}

/// Result of probing a set of components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.components.iter().all(|c| c.healthy)
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &ComponentHealth> {
        self.components.iter().filter(|c| !c.healthy)
    }
}

/// Probe every target concurrently. Report order matches input order.
pub fn probe_all(targets: Vec<ProbeTarget<'_>>) -> HealthReport {
    let components = targets
        .par_iter()
        .map(|target| ComponentHealth {
            kind: target.kind,
            name: target.name.clone(),
            healthy: probe(&target.name, || (target.check)()),
        })
        .collect();

    HealthReport { components }
}
