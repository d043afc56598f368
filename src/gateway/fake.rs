//! In-memory fake array, test-only
//!
//! Models just enough array state (pools, vdisks, vdisk copies,
//! remote-copy relationships) for the reconciliation pipeline to run
//! end-to-end, and journals every mutating command so tests can assert
//! exactly what was issued. Mutations update the state, so a second
//! reconcile run re-discovers the converged topology.

use crate::error::{Error, Result};
use crate::gateway::{ArrayGateway, CommandOptions, CommandOutcome, Record};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

// =============================================================================
// Fake State
// =============================================================================

#[derive(Debug, Clone)]
struct FakeVolume {
    capacity_mb: u64,
    /// Backing pool of each vdisk copy, in copy-id order
    copies: Vec<String>,
    /// Attached remote-copy relationship, if any
    rc_name: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeRelationship {
    copy_type: String,
    master_vdisk: String,
    aux_vdisk: String,
}

/// One mutating command as the fake received it
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub command: String,
    pub options: CommandOptions,
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    topology: String,
    pools: BTreeMap<String, String>,
    volumes: BTreeMap<String, FakeVolume>,
    relationships: BTreeMap<String, FakeRelationship>,
    journal: Vec<JournalEntry>,
    /// When set, the named command is rejected with this message
    reject: Option<(String, String)>,
}

// =============================================================================
// Fake Array
// =============================================================================

/// Fake gateway backed by in-memory array state
pub struct FakeArray {
    state: RwLock<FakeState>,
}

impl FakeArray {
    /// Fake array with `standard` system topology
    pub fn standard() -> Self {
        Self::with_topology("standard")
    }

    /// Fake array with `hyperswap` system topology
    pub fn hyperswap() -> Self {
        Self::with_topology("hyperswap")
    }

    fn with_topology(topology: &str) -> Self {
        Self {
            state: RwLock::new(FakeState {
                topology: topology.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Add a pool; an empty site means a standard-topology pool
    pub fn with_pool(mut self, name: &str, site: &str) -> Self {
        self.state
            .get_mut()
            .pools
            .insert(name.to_string(), site.to_string());
        self
    }

    /// Add a standalone volume with a single vdisk copy
    pub fn with_standalone(mut self, name: &str, pool: &str, capacity_mb: u64) -> Self {
        self.state.get_mut().volumes.insert(
            name.to_string(),
            FakeVolume {
                capacity_mb,
                copies: vec![pool.to_string()],
                rc_name: None,
            },
        );
        self
    }

    /// Add a standard mirrored volume with two same-site vdisk copies
    pub fn with_standard_mirror(
        mut self,
        name: &str,
        pool_a: &str,
        pool_b: &str,
        capacity_mb: u64,
    ) -> Self {
        self.state.get_mut().volumes.insert(
            name.to_string(),
            FakeVolume {
                capacity_mb,
                copies: vec![pool_a.to_string(), pool_b.to_string()],
                rc_name: None,
            },
        );
        self
    }

    /// Add a HyperSwap volume: master/aux vdisks paired by an
    /// active-active relationship
    pub fn with_hyperswap(
        mut self,
        name: &str,
        pool_a: &str,
        pool_b: &str,
        capacity_mb: u64,
    ) -> Self {
        let state = self.state.get_mut();
        insert_hyperswap(state, name, pool_a, pool_b, capacity_mb);
        self
    }

    /// Add a volume reporting both mirror signals at once: two vdisk
    /// copies and an active-active relationship
    pub fn with_mixed_signals(
        mut self,
        name: &str,
        pool_a: &str,
        pool_b: &str,
        capacity_mb: u64,
    ) -> Self {
        let state = self.state.get_mut();
        insert_hyperswap(state, name, pool_a, pool_b, capacity_mb);
        let volume = state.volumes.get_mut(name).unwrap();
        volume.copies = vec![pool_a.to_string(), pool_b.to_string()];
        self
    }

    /// Reject the named command with the given array message
    pub fn rejecting(mut self, command: &str, message: &str) -> Self {
        self.state.get_mut().reject = Some((command.to_string(), message.to_string()));
        self
    }

    /// All mutating commands issued so far
    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.state.read().await.journal.clone()
    }

    pub async fn has_volume(&self, name: &str) -> bool {
        self.state.read().await.volumes.contains_key(name)
    }
}

fn insert_hyperswap(
    state: &mut FakeState,
    name: &str,
    pool_a: &str,
    pool_b: &str,
    capacity_mb: u64,
) {
    let rc_name = format!("rcrel_{}", name);
    let aux_name = format!("{}_aux", name);

    state.volumes.insert(
        name.to_string(),
        FakeVolume {
            capacity_mb,
            copies: vec![pool_a.to_string()],
            rc_name: Some(rc_name.clone()),
        },
    );
    state.volumes.insert(
        aux_name.clone(),
        FakeVolume {
            capacity_mb,
            copies: vec![pool_b.to_string()],
            rc_name: Some(rc_name.clone()),
        },
    );
    state.relationships.insert(
        rc_name,
        FakeRelationship {
            copy_type: "activeactive".to_string(),
            master_vdisk: name.to_string(),
            aux_vdisk: aux_name,
        },
    );
}

// =============================================================================
// Query Handling
// =============================================================================

fn not_found(command: &str, object: &str) -> Error {
    Error::ObjectNotFound {
        command: command.to_string(),
        object: object.to_string(),
    }
}

fn vdisk_record(name: &str, volume: &FakeVolume) -> Record {
    let (vdisk_type, group) = if volume.copies.len() > 1 {
        ("many", "many".to_string())
    } else {
        ("striped", volume.copies.first().cloned().unwrap_or_default())
    };
    Record::from_pairs([
        ("name", name.to_string()),
        ("type", vdisk_type.to_string()),
        ("mdisk_grp_name", group),
        ("capacity", format!("{}.00MB", volume.capacity_mb)),
        ("RC_name", volume.rc_name.clone().unwrap_or_default()),
    ])
}

impl FakeState {
    fn handle_query(&self, command: &str, object: Option<&str>) -> Result<Vec<Record>> {
        match command {
            "lssystem" => Ok(vec![Record::from_pairs([(
                "topology",
                self.topology.as_str(),
            )])]),
            "lsvdisk" => {
                let name = object.ok_or_else(|| not_found(command, ""))?;
                let volume = self
                    .volumes
                    .get(name)
                    .ok_or_else(|| not_found(command, name))?;
                Ok(vec![vdisk_record(name, volume)])
            }
            "lsvdiskcopy" => {
                let name = object.ok_or_else(|| not_found(command, ""))?;
                let volume = self
                    .volumes
                    .get(name)
                    .ok_or_else(|| not_found(command, name))?;
                Ok(volume
                    .copies
                    .iter()
                    .enumerate()
                    .map(|(id, pool)| {
                        Record::from_pairs([
                            ("copy_id", id.to_string()),
                            ("mdisk_grp_name", pool.clone()),
                        ])
                    })
                    .collect())
            }
            "lsrcrelationship" => {
                let name = object.ok_or_else(|| not_found(command, ""))?;
                let rel = self
                    .relationships
                    .get(name)
                    .ok_or_else(|| not_found(command, name))?;
                Ok(vec![Record::from_pairs([
                    ("name", name.to_string()),
                    ("copy_type", rel.copy_type.clone()),
                    ("master_vdisk_name", rel.master_vdisk.clone()),
                    ("aux_vdisk_name", rel.aux_vdisk.clone()),
                ])])
            }
            "lsmdiskgrp" => {
                let name = object.ok_or_else(|| not_found(command, ""))?;
                let site = self
                    .pools
                    .get(name)
                    .ok_or_else(|| not_found(command, name))?;
                Ok(vec![Record::from_pairs([
                    ("name", name.to_string()),
                    ("site_name", site.clone()),
                ])])
            }
            _ => Err(Error::Gateway {
                command: command.to_string(),
                message: "unknown query".to_string(),
            }),
        }
    }

    fn handle_execute(
        &mut self,
        command: &str,
        options: &CommandOptions,
        args: &[&str],
    ) -> Result<CommandOutcome> {
        let bad_request = |message: &str| Error::Gateway {
            command: command.to_string(),
            message: message.to_string(),
        };

        match command {
            "mkvdisk" => {
                let name = options.get("name").ok_or_else(|| bad_request("no name"))?;
                let pools: Vec<String> = options
                    .get("mdiskgrp")
                    .ok_or_else(|| bad_request("no mdiskgrp"))?
                    .split(':')
                    .map(str::to_string)
                    .collect();
                let capacity_mb = options
                    .get("size")
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| bad_request("no size"))?;
                self.volumes.insert(
                    name.to_string(),
                    FakeVolume {
                        capacity_mb,
                        copies: pools,
                        rc_name: None,
                    },
                );
            }
            "mkvolume" => {
                let name = options.get("name").ok_or_else(|| bad_request("no name"))?;
                let pools: Vec<&str> = options
                    .get("pool")
                    .ok_or_else(|| bad_request("no pool"))?
                    .split(':')
                    .collect();
                let capacity_mb = options
                    .get("size")
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| bad_request("no size"))?;
                if pools.len() != 2 {
                    return Err(bad_request("mkvolume requires a pool pair"));
                }
                insert_hyperswap(self, name, pools[0], pools[1], capacity_mb);
            }
            "addvolumecopy" => {
                let name = args.first().ok_or_else(|| bad_request("no volume"))?;
                let pool = options.get("pool").ok_or_else(|| bad_request("no pool"))?;
                let current = self
                    .volumes
                    .get(*name)
                    .ok_or_else(|| not_found(command, name))?
                    .clone();
                let current_pool = current
                    .copies
                    .first()
                    .cloned()
                    .ok_or_else(|| bad_request("volume has no copies"))?;
                insert_hyperswap(self, name, &current_pool, pool, current.capacity_mb);
            }
            "addvdiskcopy" => {
                let name = args.first().ok_or_else(|| bad_request("no volume"))?;
                let pool = options
                    .get("mdiskgrp")
                    .ok_or_else(|| bad_request("no mdiskgrp"))?;
                let volume = self
                    .volumes
                    .get_mut(*name)
                    .ok_or_else(|| not_found(command, name))?;
                volume.copies.push(pool.to_string());
            }
            "rmvolumecopy" => {
                let name = args.first().ok_or_else(|| bad_request("no volume"))?;
                let pool = options.get("pool").ok_or_else(|| bad_request("no pool"))?;
                self.remove_copy(command, name, pool)?;
            }
            "rmvolume" => {
                let name = args.first().ok_or_else(|| bad_request("no volume"))?;
                let volume = self
                    .volumes
                    .remove(*name)
                    .ok_or_else(|| not_found(command, name))?;
                if let Some(rc_name) = volume.rc_name {
                    if let Some(rel) = self.relationships.remove(&rc_name) {
                        self.volumes.remove(&rel.aux_vdisk);
                        self.volumes.remove(&rel.master_vdisk);
                    }
                }
            }
            _ => return Err(bad_request("unknown command")),
        }

        Ok(CommandOutcome {
            id: None,
            message: format!("{} completed", command),
        })
    }

    fn remove_copy(&mut self, command: &str, name: &str, pool: &str) -> Result<()> {
        let volume = self
            .volumes
            .get(name)
            .ok_or_else(|| not_found(command, name))?
            .clone();

        match volume.rc_name {
            // HyperSwap: the volume collapses to the surviving pool and
            // the relationship and aux vdisk go away with the copy.
            Some(rc_name) => {
                let rel = self
                    .relationships
                    .remove(&rc_name)
                    .ok_or_else(|| not_found(command, &rc_name))?;
                let master_pool = volume.copies.first().cloned().unwrap_or_default();
                let aux_pool = self
                    .volumes
                    .get(&rel.aux_vdisk)
                    .and_then(|aux| aux.copies.first().cloned())
                    .unwrap_or_default();
                let survivor = if master_pool == pool {
                    aux_pool
                } else {
                    master_pool
                };
                self.volumes.remove(&rel.aux_vdisk);
                self.volumes.insert(
                    name.to_string(),
                    FakeVolume {
                        capacity_mb: volume.capacity_mb,
                        copies: vec![survivor],
                        rc_name: None,
                    },
                );
            }
            None => {
                let volume = self.volumes.get_mut(name).unwrap();
                volume.copies.retain(|p| p != pool);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ArrayGateway for FakeArray {
    async fn query(&self, command: &str, object: Option<&str>) -> Result<Vec<Record>> {
        self.state.read().await.handle_query(command, object)
    }

    async fn execute(
        &self,
        command: &str,
        options: &CommandOptions,
        args: &[&str],
    ) -> Result<CommandOutcome> {
        let mut state = self.state.write().await;
        if let Some((rejected, message)) = &state.reject {
            if rejected == command {
                return Err(Error::Gateway {
                    command: command.to_string(),
                    message: message.clone(),
                });
            }
        }
        state.journal.push(JournalEntry {
            command: command.to_string(),
            options: options.clone(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        state.handle_execute(command, options, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mutations_update_state() {
        let fake = FakeArray::hyperswap()
            .with_pool("Pool0", "site1")
            .with_pool("Pool1", "site2")
            .with_standalone("vol0", "Pool0", 1024);

        let options = CommandOptions::new().set("pool", "Pool1");
        fake.execute("addvolumecopy", &options, &["vol0"])
            .await
            .unwrap();

        let vdisk = fake.query("lsvdisk", Some("vol0")).await.unwrap();
        assert_eq!(vdisk[0].get_str("RC_name"), Some("rcrel_vol0"));

        let journal = fake.journal().await;
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].command, "addvolumecopy");
        assert_eq!(journal[0].options.get("pool"), Some("Pool1"));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let fake = FakeArray::standard();
        let err = fake.query("lsvdisk", Some("ghost")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
