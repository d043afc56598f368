//! Reconciliation Engine
//!
//! Computes the single action that converges the volume from its
//! discovered topology to the requested one. The whole decision table
//! lives here as one match over `(discovered, request)`, and the result
//! is one [`Action`] value consumed exactly once by the executor.

use crate::error::{Error, Result};
use crate::volume::discover::DiscoveredTopology;
use crate::volume::request::{DesiredState, RequestedTopology, VolumeRequest};

// =============================================================================
// Action
// =============================================================================

/// The mutation (or no-op) chosen for this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Already converged
    Nothing,
    /// Create a volume with two same-site vdisk copies
    CreateStandardMirror { pool_a: String, pool_b: String },
    /// Create a HyperSwap volume across two sites
    CreateHyperSwap { pool_a: String, pool_b: String },
    /// Standalone to HyperSwap: add a volume copy in the target pool
    AddVolumeCopy { target_pool: String },
    /// Standalone to standard mirror: add a vdisk copy in the target pool
    AddVdiskCopy {
        target_pool: String,
        current_pool: String,
    },
    /// Mirrored to standalone: remove the copy in the target pool
    RemoveCopy { target_pool: String },
    /// Delete the volume
    Delete,
}

// =============================================================================
// Decision
// =============================================================================

/// Decide the action for one reconcile run.
///
/// Assumes the request already passed validation; re-checks only what
/// the decision itself depends on.
pub fn decide(request: &VolumeRequest, discovered: &DiscoveredTopology) -> Result<Action> {
    if request.state == DesiredState::Absent {
        return Ok(match discovered {
            DiscoveredTopology::Absent => Action::Nothing,
            _ => Action::Delete,
        });
    }

    // Resize is unsupported regardless of the topology decision.
    if let (Some(requested), Some(existing)) = (request.size, discovered.capacity_mb()) {
        if requested != existing {
            return Err(Error::UnsupportedTransition(format!(
                "volume '{}' has capacity {} MB; resizing to {} MB is not supported",
                request.name, existing, requested
            )));
        }
    }

    let Some(kind) = request.topology else {
        return Err(Error::Configuration(
            "type is required when state is present".into(),
        ));
    };

    match discovered {
        DiscoveredTopology::Absent => {
            let Some((pool_a, pool_b)) = request.pool_pair() else {
                return Err(Error::Configuration(format!(
                    "both pool_a and pool_b are required to create volume '{}'",
                    request.name
                )));
            };
            Ok(match kind {
                RequestedTopology::Standard => Action::CreateStandardMirror {
                    pool_a: pool_a.to_string(),
                    pool_b: pool_b.to_string(),
                },
                RequestedTopology::LocalHyperswap => Action::CreateHyperSwap {
                    pool_a: pool_a.to_string(),
                    pool_b: pool_b.to_string(),
                },
            })
        }

        DiscoveredTopology::Standalone { pool, .. } => decide_standalone(request, kind, pool),

        DiscoveredTopology::StandardMirror { pool_a, pool_b, .. } => {
            if kind == RequestedTopology::LocalHyperswap {
                return Err(Error::UnsupportedTransition(format!(
                    "standard mirrored volume '{}' cannot be converted to HyperSwap",
                    request.name
                )));
            }
            decide_mirrored(request, pool_a, pool_b)
        }

        DiscoveredTopology::HyperSwap { pool_a, pool_b, .. } => {
            if kind == RequestedTopology::Standard {
                return Err(Error::UnsupportedTransition(format!(
                    "HyperSwap volume '{}' cannot be converted to a standard mirror",
                    request.name
                )));
            }
            decide_mirrored(request, pool_a, pool_b)
        }
    }
}

/// Standalone volume: grow to a mirror when the caller names the backing
/// pool plus one more; a supplied pool that is not the backing pool is a
/// conflict, never an implicit re-placement.
fn decide_standalone(
    request: &VolumeRequest,
    kind: RequestedTopology,
    backing: &str,
) -> Result<Action> {
    let pool_a = request.pool_a.as_deref();
    let pool_b = request.pool_b.as_deref();

    if pool_a.is_none() && pool_b.is_none() {
        return Ok(Action::Nothing);
    }

    let other = if pool_a == Some(backing) {
        pool_b
    } else if pool_b == Some(backing) {
        pool_a
    } else {
        return Err(Error::TopologyConflict(format!(
            "volume '{}' is backed by pool '{}', which is not among the supplied pools",
            request.name, backing
        )));
    };

    Ok(match other {
        None => Action::Nothing,
        Some(target) => match kind {
            RequestedTopology::LocalHyperswap => Action::AddVolumeCopy {
                target_pool: target.to_string(),
            },
            RequestedTopology::Standard => Action::AddVdiskCopy {
                target_pool: target.to_string(),
                current_pool: backing.to_string(),
            },
        },
    })
}

/// Mirrored volume: a full pair is converged iff it matches the
/// discovered pair in either order; a single pool shrinks the volume to
/// standalone by removing the other copy.
fn decide_mirrored(request: &VolumeRequest, pool_a: &str, pool_b: &str) -> Result<Action> {
    match (request.pool_a.as_deref(), request.pool_b.as_deref()) {
        (Some(x), Some(y)) => {
            if (x == pool_a && y == pool_b) || (x == pool_b && y == pool_a) {
                Ok(Action::Nothing)
            } else {
                Err(Error::TopologyConflict(format!(
                    "volume '{}' is mirrored across pools '{}' and '{}'; \
                     the pools of an existing mirrored volume cannot be changed",
                    request.name, pool_a, pool_b
                )))
            }
        }
        (Some(kept), None) | (None, Some(kept)) => {
            if kept == pool_a {
                Ok(Action::RemoveCopy {
                    target_pool: pool_b.to_string(),
                })
            } else if kept == pool_b {
                Ok(Action::RemoveCopy {
                    target_pool: pool_a.to_string(),
                })
            } else {
                Err(Error::TopologyConflict(format!(
                    "pool '{}' does not back a copy of volume '{}'",
                    kept, request.name
                )))
            }
        }
        (None, None) => Ok(Action::Nothing),
    }
}
