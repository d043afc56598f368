//! Mutation Executor
//!
//! Translates the engine's chosen [`Action`] into exactly one array
//! command. Array failures are propagated verbatim; retry policy lives
//! in the gateway, not here.

use crate::error::{Error, Result};
use crate::gateway::{ArrayGatewayRef, CommandOptions};
use crate::volume::discover::TopologyDiscoverer;
use crate::volume::engine::Action;
use crate::volume::request::VolumeRequest;
use tracing::info;

/// Default real-capacity percentage for thin copies
const DEFAULT_RSIZE: &str = "2%";

/// Issues the concrete create/add-copy/remove-copy/delete commands
pub struct MutationExecutor {
    gateway: ArrayGatewayRef,
}

impl MutationExecutor {
    pub fn new(gateway: ArrayGatewayRef) -> Self {
        Self { gateway }
    }

    /// Execute one action, returning a human-readable summary
    pub async fn execute(&self, request: &VolumeRequest, action: &Action) -> Result<String> {
        match action {
            Action::Nothing => Ok(format!(
                "volume '{}' already matches the requested configuration",
                request.name
            )),

            Action::CreateStandardMirror { pool_a, pool_b } => {
                self.create_standard_mirror(request, pool_a, pool_b).await
            }

            Action::CreateHyperSwap { pool_a, pool_b } => {
                self.create_hyperswap(request, pool_a, pool_b).await
            }

            Action::AddVolumeCopy { target_pool } => {
                info!(
                    "Adding volume copy to '{}' in pool '{}'",
                    request.name, target_pool
                );
                let options = CommandOptions::new().set("pool", target_pool);
                self.gateway
                    .execute("addvolumecopy", &options, &[&request.name])
                    .await?;
                Ok(format!(
                    "volume copy added to volume '{}' in pool '{}'",
                    request.name, target_pool
                ))
            }

            Action::AddVdiskCopy {
                target_pool,
                current_pool,
            } => self.add_vdisk_copy(request, target_pool, current_pool).await,

            Action::RemoveCopy { target_pool } => {
                info!(
                    "Removing copy of '{}' in pool '{}'",
                    request.name, target_pool
                );
                let options = CommandOptions::new().set("pool", target_pool);
                self.gateway
                    .execute("rmvolumecopy", &options, &[&request.name])
                    .await?;
                Ok(format!(
                    "volume copy in pool '{}' removed from volume '{}'",
                    target_pool, request.name
                ))
            }

            Action::Delete => {
                info!("Deleting volume '{}'", request.name);
                self.gateway
                    .execute("rmvolume", &CommandOptions::new(), &[&request.name])
                    .await?;
                Ok(format!("volume '{}' deleted", request.name))
            }
        }
    }

    async fn create_standard_mirror(
        &self,
        request: &VolumeRequest,
        pool_a: &str,
        pool_b: &str,
    ) -> Result<String> {
        let size = require_size(request)?;

        info!(
            "Creating standard mirrored volume '{}' across pools {}:{}",
            request.name, pool_a, pool_b
        );

        let mut options = CommandOptions::new()
            .set("name", &request.name)
            .set("mdiskgrp", format!("{}:{}", pool_a, pool_b))
            .set("size", size.to_string())
            .set("unit", "mb")
            .set("copies", "2");

        if request.thin {
            let rsize = request.rsize.as_deref().unwrap_or(DEFAULT_RSIZE);
            options = options.set("rsize", rsize).flag("autoexpand");
            if let Some(grainsize) = request.grainsize {
                options = options.set("grainsize", grainsize.to_string());
            }
        }
        if request.compressed {
            options = options.flag("compressed");
        }
        if request.deduplicated {
            options = options.flag("deduplicated");
        }

        self.gateway.execute("mkvdisk", &options, &[]).await?;
        Ok(format!(
            "volume '{}' created with two copies in pools {}:{}",
            request.name, pool_a, pool_b
        ))
    }

    async fn create_hyperswap(
        &self,
        request: &VolumeRequest,
        pool_a: &str,
        pool_b: &str,
    ) -> Result<String> {
        let size = require_size(request)?;

        info!(
            "Creating HyperSwap volume '{}' across pools {}:{}",
            request.name, pool_a, pool_b
        );

        let mut options = CommandOptions::new()
            .set("name", &request.name)
            .set("pool", format!("{}:{}", pool_a, pool_b))
            .set("size", size.to_string())
            .set("unit", "mb");

        // mkvolume expresses thin provisioning as a buffer percentage.
        if request.thin {
            let buffersize = request.rsize.as_deref().unwrap_or(DEFAULT_RSIZE);
            options = options.set("buffersize", buffersize);
            if let Some(grainsize) = request.grainsize {
                options = options.set("grainsize", grainsize.to_string());
            }
        }
        if request.compressed {
            options = options.flag("compressed");
        }
        if request.deduplicated {
            options = options.flag("deduplicated");
        }

        self.gateway.execute("mkvolume", &options, &[]).await?;
        Ok(format!(
            "HyperSwap volume '{}' created across pools {}:{}",
            request.name, pool_a, pool_b
        ))
    }

    /// Standalone to standard mirror. The site affinity of the two pools
    /// is re-checked against the array immediately before the command.
    async fn add_vdisk_copy(
        &self,
        request: &VolumeRequest,
        target_pool: &str,
        current_pool: &str,
    ) -> Result<String> {
        let discoverer = TopologyDiscoverer::new(self.gateway.clone());
        let current = self.pool_facts(&discoverer, current_pool).await?;
        let target = self.pool_facts(&discoverer, target_pool).await?;

        if current.site != target.site {
            return Err(Error::Configuration(format!(
                "pools '{}' (site {}) and '{}' (site {}) are in different sites; \
                 a standard mirror requires same-site pools",
                current.name,
                current.site.as_deref().unwrap_or("none"),
                target.name,
                target.site.as_deref().unwrap_or("none"),
            )));
        }

        info!(
            "Adding vdisk copy to '{}' in pool '{}'",
            request.name, target_pool
        );
        let options = CommandOptions::new().set("mdiskgrp", target_pool);
        self.gateway
            .execute("addvdiskcopy", &options, &[&request.name])
            .await?;
        Ok(format!(
            "vdisk copy added to volume '{}' in pool '{}'",
            request.name, target_pool
        ))
    }

    async fn pool_facts(
        &self,
        discoverer: &TopologyDiscoverer,
        pool: &str,
    ) -> Result<crate::volume::discover::PoolFacts> {
        discoverer.pool(pool).await?.ok_or_else(|| {
            Error::Configuration(format!("pool '{}' was not found on the system", pool))
        })
    }
}

fn require_size(request: &VolumeRequest) -> Result<u64> {
    request.size.ok_or_else(|| {
        Error::Configuration(format!(
            "size is required to create volume '{}'",
            request.name
        ))
    })
}
