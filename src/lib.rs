//! Mirrored-Volume Operator
//!
//! Idempotent reconciliation of a block-storage array's mirrored-volume
//! topology. Each run drives one volume toward a declared desired state:
//! standalone, standard mirror (two same-site copies), or HyperSwap
//! (active-active copies across two sites).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Volume Reconciler                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐  ┌────────────┐  ┌────────┐  ┌───────────┐  │
//! │  │ Constraint │→ │  Topology  │→ │ Engine │→ │ Mutation  │  │
//! │  │ Validator  │  │ Discoverer │  │        │  │ Executor  │  │
//! │  └────────────┘  └─────┬──────┘  └────────┘  └─────┬─────┘  │
//! ├────────────────────────┼───────────────────────────┼────────┤
//! │                   ┌────┴───────────────────────────┴────┐   │
//! │                   │       Array Gateway (REST)          │   │
//! │                   └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline is strictly sequential and stateless: every run
//! re-discovers the volume's topology from the array, which remains the
//! sole source of truth.
//!
//! # Modules
//!
//! - [`gateway`]: Port and REST adapter for the array's management API
//! - [`volume`]: Request types, discovery, decision table, executor
//! - [`error`]: Error types and handling

pub mod error;
pub mod gateway;
pub mod volume;

// Re-export commonly used types
pub use error::{Error, Result};

pub use gateway::{
    ArrayGateway, ArrayGatewayRef, CommandOptions, CommandOutcome, Record, RestGateway,
    RestGatewayConfig,
};

pub use volume::{
    discover::{DiscoveredTopology, PoolFacts, SystemTopology, TopologyDiscoverer},
    engine::{decide, Action},
    executor::MutationExecutor,
    request::{DesiredState, RequestedTopology, VolumeRequest},
    validate::validate,
    ReconcileOutcome, VolumeReconciler,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
