//! Constraint Validator
//!
//! Pure checks of the request against system-wide invariants, run over
//! already-fetched facts before any mutation is attempted. Each clause
//! fails with a configuration error; nothing here talks to the array.

use crate::error::{Error, Result};
use crate::volume::discover::{DiscoveredTopology, PoolFacts, SystemTopology};
use crate::volume::request::{DesiredState, RequestedTopology, VolumeRequest};

/// Validate the request against the fetched system and pool facts.
///
/// `pool_a`/`pool_b` are the lookup results for the requested pools and
/// are `None` when the pool was requested but not found (or not
/// requested at all).
pub fn validate(
    request: &VolumeRequest,
    system: SystemTopology,
    discovered: &DiscoveredTopology,
    pool_a: Option<&PoolFacts>,
    pool_b: Option<&PoolFacts>,
) -> Result<()> {
    // HyperSwap objects cannot exist on a standard-topology system.
    if request.topology == Some(RequestedTopology::LocalHyperswap)
        && system == SystemTopology::Standard
    {
        return Err(Error::Configuration(format!(
            "volume '{}' requests local-hyperswap but the system topology is standard",
            request.name
        )));
    }

    if request.state == DesiredState::Present && request.topology.is_none() {
        return Err(Error::Configuration(
            "type is required when state is present".into(),
        ));
    }

    if let Some((a, b)) = request.pool_pair() {
        if a == b {
            return Err(Error::Configuration(format!(
                "pool_a and pool_b are both '{}'; a volume cannot be mirrored within one pool",
                a
            )));
        }
    }

    for (requested, facts) in [
        (request.pool_a.as_deref(), pool_a),
        (request.pool_b.as_deref(), pool_b),
    ] {
        if let Some(name) = requested {
            if facts.is_none() {
                return Err(Error::Configuration(format!(
                    "pool '{}' was not found on the system",
                    name
                )));
            }
        }
    }

    // A standard mirror keeps both copies in one site. This guards the
    // create and add-copy paths; a volume that is already mirrored is
    // judged by the engine's conversion rules instead.
    if request.topology == Some(RequestedTopology::Standard)
        && matches!(
            discovered,
            DiscoveredTopology::Absent | DiscoveredTopology::Standalone { .. }
        )
    {
        if let (Some(a), Some(b)) = (pool_a, pool_b) {
            if a.site != b.site {
                return Err(Error::Configuration(format!(
                    "pools '{}' (site {}) and '{}' (site {}) are in different sites; \
                     a standard mirror requires same-site pools",
                    a.name,
                    a.site.as_deref().unwrap_or("none"),
                    b.name,
                    b.site.as_deref().unwrap_or("none"),
                )));
            }
        }
    }

    if request.state == DesiredState::Present
        && request.supplied_pools().is_empty()
        && *discovered == DiscoveredTopology::Absent
    {
        return Err(Error::Configuration(format!(
            "volume '{}' does not exist and no pool was supplied to create it in",
            request.name
        )));
    }

    if request.rsize.is_some() && !request.thin {
        return Err(Error::Configuration(
            "rsize requires thin provisioning".into(),
        ));
    }

    Ok(())
}
