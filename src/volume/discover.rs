//! Topology Discoverer
//!
//! The array does not store a volume's mirrored topology as a single
//! attribute; it has to be reconstructed from three independent facts:
//! the vdisk copy count, the attached remote-copy relationship, and the
//! site of each backing pool. This module composes those queries into one
//! [`DiscoveredTopology`] value, with the contradictory mixed-signal case
//! as a first-class error rather than a fall-through.

use crate::error::{Error, Result};
use crate::gateway::ArrayGatewayRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// System Topology
// =============================================================================

/// System-wide topology, fetched once per run.
///
/// HyperSwap volumes can only exist on a `hyperswap`-topology system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemTopology {
    Standard,
    Hyperswap,
}

impl std::fmt::Display for SystemTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemTopology::Standard => write!(f, "standard"),
            SystemTopology::Hyperswap => write!(f, "hyperswap"),
        }
    }
}

// =============================================================================
// Pool Facts
// =============================================================================

/// Pool attributes the validator and executor need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolFacts {
    pub name: String,
    /// Site the pool belongs to; `None` on standard-topology systems
    pub site: Option<String>,
}

// =============================================================================
// Discovered Topology
// =============================================================================

/// Current topology of a volume, re-derived from the array on every run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveredTopology {
    /// No volume record exists
    Absent,
    /// Single vdisk copy, no relationship
    Standalone { pool: String, capacity_mb: u64 },
    /// Two vdisk copies, no relationship
    StandardMirror {
        pool_a: String,
        pool_b: String,
        capacity_mb: u64,
    },
    /// Active-active relationship pairing copies across two sites
    HyperSwap {
        pool_a: String,
        pool_b: String,
        capacity_mb: u64,
    },
}

impl DiscoveredTopology {
    /// Capacity of the existing volume, if any
    pub fn capacity_mb(&self) -> Option<u64> {
        match self {
            DiscoveredTopology::Absent => None,
            DiscoveredTopology::Standalone { capacity_mb, .. }
            | DiscoveredTopology::StandardMirror { capacity_mb, .. }
            | DiscoveredTopology::HyperSwap { capacity_mb, .. } => Some(*capacity_mb),
        }
    }

    /// Human-readable topology name for result messages
    pub fn describe(&self) -> &'static str {
        match self {
            DiscoveredTopology::Absent => "absent",
            DiscoveredTopology::Standalone { .. } => "standalone",
            DiscoveredTopology::StandardMirror { .. } => "standard mirror",
            DiscoveredTopology::HyperSwap { .. } => "HyperSwap",
        }
    }
}

// =============================================================================
// Discoverer
// =============================================================================

/// Read-only composition of array queries into topology facts
pub struct TopologyDiscoverer {
    gateway: ArrayGatewayRef,
}

impl TopologyDiscoverer {
    pub fn new(gateway: ArrayGatewayRef) -> Self {
        Self { gateway }
    }

    /// Fetch the system-wide topology
    pub async fn system_topology(&self) -> Result<SystemTopology> {
        let records = self.gateway.query("lssystem", None).await?;
        let record = records.first().ok_or_else(|| Error::MalformedRecord {
            command: "lssystem".into(),
            field: "topology".into(),
        })?;

        Ok(match record.get_str("topology") {
            Some("hyperswap") => SystemTopology::Hyperswap,
            _ => SystemTopology::Standard,
        })
    }

    /// Look up a pool's facts; `None` when the pool does not exist
    pub async fn pool(&self, name: &str) -> Result<Option<PoolFacts>> {
        match self.gateway.query_object("lsmdiskgrp", name).await? {
            Some(record) => {
                let site = record
                    .get_str("site_name")
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                Ok(Some(PoolFacts {
                    name: name.to_string(),
                    site,
                }))
            }
            None => Ok(None),
        }
    }

    /// Determine the volume's current topology.
    ///
    /// A second vdisk copy signals a standard mirror; an active-active
    /// relationship signals HyperSwap. Observing both at once is a
    /// contradictory array state and fails rather than preferring one.
    pub async fn discover(&self, name: &str) -> Result<DiscoveredTopology> {
        let Some(vdisk) = self.gateway.query_object("lsvdisk", name).await? else {
            return Ok(DiscoveredTopology::Absent);
        };

        let capacity_mb = parse_capacity_mb(vdisk.require_str("lsvdisk", "capacity")?)?;

        let mirror_pools = if vdisk.get_str("type") == Some("many") {
            Some(self.mirror_pools(name).await?)
        } else {
            None
        };

        let relationship_pools = match vdisk.get_str("RC_name").filter(|rc| !rc.is_empty()) {
            Some(rc_name) => self.active_active_pools(rc_name).await?,
            None => None,
        };

        let topology = match (mirror_pools, relationship_pools) {
            (Some(_), Some(_)) => {
                return Err(Error::TopologyConflict(format!(
                    "volume '{}' reports both a second vdisk copy and an \
                     active-active relationship; refusing to reconcile a mixed topology",
                    name
                )))
            }
            (Some((pool_a, pool_b)), None) => DiscoveredTopology::StandardMirror {
                pool_a,
                pool_b,
                capacity_mb,
            },
            (None, Some((pool_a, pool_b))) => DiscoveredTopology::HyperSwap {
                pool_a,
                pool_b,
                capacity_mb,
            },
            (None, None) => DiscoveredTopology::Standalone {
                pool: vdisk.require_str("lsvdisk", "mdisk_grp_name")?.to_string(),
                capacity_mb,
            },
        };

        debug!("Discovered volume '{}' as {}", name, topology.describe());
        Ok(topology)
    }

    /// Backing pools of a mirrored vdisk's two copies
    async fn mirror_pools(&self, name: &str) -> Result<(String, String)> {
        let mut copies = self.gateway.query("lsvdiskcopy", Some(name)).await?;
        copies.sort_by(|a, b| a.get_str("copy_id").cmp(&b.get_str("copy_id")));

        if copies.len() < 2 {
            return Err(Error::TopologyConflict(format!(
                "volume '{}' reports type 'many' but only {} vdisk copy record(s)",
                name,
                copies.len()
            )));
        }

        Ok((
            copies[0]
                .require_str("lsvdiskcopy", "mdisk_grp_name")?
                .to_string(),
            copies[1]
                .require_str("lsvdiskcopy", "mdisk_grp_name")?
                .to_string(),
        ))
    }

    /// Master/aux backing pools of an active-active relationship, or
    /// `None` when the relationship is absent or of another copy type
    async fn active_active_pools(&self, rc_name: &str) -> Result<Option<(String, String)>> {
        let Some(rel) = self
            .gateway
            .query_object("lsrcrelationship", rc_name)
            .await?
        else {
            return Ok(None);
        };

        if rel.get_str("copy_type") != Some("activeactive") {
            return Ok(None);
        }

        let master = rel.require_str("lsrcrelationship", "master_vdisk_name")?;
        let aux = rel.require_str("lsrcrelationship", "aux_vdisk_name")?;

        Ok(Some((
            self.backing_pool(master).await?,
            self.backing_pool(aux).await?,
        )))
    }

    async fn backing_pool(&self, vdisk_name: &str) -> Result<String> {
        let vdisk = self
            .gateway
            .query_object("lsvdisk", vdisk_name)
            .await?
            .ok_or_else(|| {
                Error::TopologyConflict(format!(
                    "relationship references vdisk '{}' that does not exist",
                    vdisk_name
                ))
            })?;
        Ok(vdisk.require_str("lsvdisk", "mdisk_grp_name")?.to_string())
    }
}

// =============================================================================
// Capacity Parsing
// =============================================================================

/// Parse a discovered capacity into MiB.
///
/// The array reports either raw bytes (`1073741824`) or a unit-suffixed
/// display value (`512.00MB`).
pub fn parse_capacity_mb(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::CapacityParse("empty capacity value".into()));
    }

    if raw.chars().all(|c| c.is_ascii_digit()) {
        let bytes: u64 = raw
            .parse()
            .map_err(|_| Error::CapacityParse(format!("invalid byte count '{}'", raw)))?;
        return Ok(bytes / (1024 * 1024));
    }

    let unit_start = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| Error::CapacityParse(format!("no unit in '{}'", raw)))?;
    let (number, unit) = raw.split_at(unit_start);

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| Error::CapacityParse(format!("invalid number in '{}'", raw)))?;

    let scale_mb = match unit.trim().to_ascii_uppercase().as_str() {
        "B" => 1.0 / (1024.0 * 1024.0),
        "KB" => 1.0 / 1024.0,
        "MB" => 1.0,
        "GB" => 1024.0,
        "TB" => 1024.0 * 1024.0,
        "PB" => 1024.0 * 1024.0 * 1024.0,
        other => {
            return Err(Error::CapacityParse(format!(
                "unknown capacity unit '{}'",
                other
            )))
        }
    };

    Ok((value * scale_mb).round() as u64)
}
