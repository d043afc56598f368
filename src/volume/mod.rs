//! Mirrored-volume reconciliation
//!
//! Each run is a fresh convergence attempt over a strictly sequential
//! pipeline: validate the request against fetched facts, discover the
//! volume's current topology, decide one action, execute it. Nothing is
//! cached between runs; the array is the sole source of truth.

use crate::error::Result;
use crate::gateway::ArrayGatewayRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod discover;
pub mod engine;
pub mod executor;
pub mod request;
pub mod validate;

use discover::{DiscoveredTopology, TopologyDiscoverer};
use engine::{decide, Action};
use executor::MutationExecutor;
use request::{DesiredState, VolumeRequest};
use validate::validate;

// =============================================================================
// Outcome
// =============================================================================

/// Result of one reconcile run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Whether a mutating command was issued
    pub changed: bool,
    /// Human-readable summary of the action taken
    pub message: String,
}

// =============================================================================
// Reconciler
// =============================================================================

/// Drives one volume to its requested topology
pub struct VolumeReconciler {
    gateway: ArrayGatewayRef,
}

impl VolumeReconciler {
    pub fn new(gateway: ArrayGatewayRef) -> Self {
        Self { gateway }
    }

    /// Run one convergence attempt for the request.
    ///
    /// All reads happen up front; validation runs over the fetched facts,
    /// and at most one mutating command is issued afterwards.
    pub async fn reconcile(&self, request: &VolumeRequest) -> Result<ReconcileOutcome> {
        let discoverer = TopologyDiscoverer::new(self.gateway.clone());

        let system = discoverer.system_topology().await?;
        let discovered = discoverer.discover(&request.name).await?;
        debug!(
            "Volume '{}': discovered {} on a {} system",
            request.name,
            discovered.describe(),
            system
        );

        let pool_a = match request.pool_a.as_deref() {
            Some(name) => discoverer.pool(name).await?,
            None => None,
        };
        let pool_b = match request.pool_b.as_deref() {
            Some(name) => discoverer.pool(name).await?,
            None => None,
        };

        validate(request, system, &discovered, pool_a.as_ref(), pool_b.as_ref())?;

        let action = decide(request, &discovered)?;

        match action {
            Action::Nothing => {
                let message = match (&discovered, request.state) {
                    (DiscoveredTopology::Absent, _) => format!(
                        "volume '{}' does not exist; no modification needed",
                        request.name
                    ),
                    (_, DesiredState::Present) => format!(
                        "volume '{}' already matches the requested configuration",
                        request.name
                    ),
                    (_, DesiredState::Absent) => {
                        format!("volume '{}' already absent", request.name)
                    }
                };
                debug!("{}", message);
                Ok(ReconcileOutcome {
                    changed: false,
                    message,
                })
            }
            action => {
                let message = MutationExecutor::new(self.gateway.clone())
                    .execute(request, &action)
                    .await?;
                info!("{}", message);
                Ok(ReconcileOutcome {
                    changed: true,
                    message,
                })
            }
        }
    }
}
