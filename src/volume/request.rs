//! Volume reconciliation request types
//!
//! The configuration surface accepted from the CLI or a request file.
//! Topology names are a closed enum rather than free-form strings so the
//! decision table can match on them exhaustively.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Desired State
// =============================================================================

/// Whether the volume should exist after reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Present,
    Absent,
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
        }
    }
}

impl FromStr for DesiredState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            other => Err(Error::Configuration(format!(
                "state must be 'present' or 'absent', got '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Requested Topology
// =============================================================================

/// Mirrored topology requested for the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestedTopology {
    /// Two synchronized vdisk copies in two same-site pools
    Standard,
    /// Active-active copies across two sites, backed by a remote-copy
    /// relationship
    LocalHyperswap,
}

impl std::fmt::Display for RequestedTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestedTopology::Standard => write!(f, "standard"),
            RequestedTopology::LocalHyperswap => write!(f, "local-hyperswap"),
        }
    }
}

impl FromStr for RequestedTopology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(RequestedTopology::Standard),
            "local-hyperswap" => Ok(RequestedTopology::LocalHyperswap),
            other => Err(Error::Configuration(format!(
                "type must be 'standard' or 'local-hyperswap', got '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Volume Request
// =============================================================================

/// Declared desired state for one volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRequest {
    /// Volume name
    pub name: String,
    /// Whether the volume should exist
    pub state: DesiredState,
    /// Requested mirrored topology; required when `state` is present
    #[serde(default, rename = "type")]
    pub topology: Option<RequestedTopology>,
    /// First placement pool
    #[serde(default)]
    pub pool_a: Option<String>,
    /// Second placement pool
    #[serde(default)]
    pub pool_b: Option<String>,
    /// Capacity in MiB; immutable after creation
    #[serde(default)]
    pub size: Option<u64>,
    /// Thin-provision the copies
    #[serde(default)]
    pub thin: bool,
    /// Compress the copies
    #[serde(default)]
    pub compressed: bool,
    /// Deduplicate the copies
    #[serde(default)]
    pub deduplicated: bool,
    /// Grain size for thin copies, in KiB
    #[serde(default)]
    pub grainsize: Option<u32>,
    /// Real-capacity percentage for thin copies, e.g. `2%`
    #[serde(default)]
    pub rsize: Option<String>,
}

impl VolumeRequest {
    /// Pools supplied by the caller, in `pool_a`/`pool_b` order
    pub fn supplied_pools(&self) -> Vec<&str> {
        self.pool_a
            .iter()
            .chain(self.pool_b.iter())
            .map(String::as_str)
            .collect()
    }

    /// Both pools, when the caller supplied the full pair
    pub fn pool_pair(&self) -> Option<(&str, &str)> {
        match (self.pool_a.as_deref(), self.pool_b.as_deref()) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }
}
