// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Domain to hosted zone registry.
//!
//! The registry exclusively owns the [`DomainRecord`] entries of a deployment:
//! exactly one root zone and any number of child zones, each child pointing at
//! exactly one registered parent.

use std::collections::BTreeMap;

use crate::config::Topology;
use crate::errors::WorkflowError;
use crate::models::{DomainRecord, ZoneDescriptor};
use crate::provisioner::Provisioner;
use crate::utils::{is_within, normalize_domain, strip_zone_prefix};

#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    /// zone id -> record
    records: BTreeMap<String, DomainRecord>,
    root_zone_id: Option<String>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_root(&mut self, mut record: DomainRecord) -> Result<(), WorkflowError> {
        if record.parent_zone_id.is_some() {
            return Err(WorkflowError::Config(format!(
                "root zone {} cannot have a parent",
                record.name
            )));
        }
        if let Some(root) = &self.root_zone_id {
            return Err(WorkflowError::Config(format!(
                "root zone already registered as {root}"
            )));
        }

        record.name = normalize_domain(&record.name);
        self.root_zone_id = Some(record.zone_id.clone());
        self.records.insert(record.zone_id.clone(), record);
        Ok(())
    }

    pub fn insert_child(&mut self, mut record: DomainRecord) -> Result<(), WorkflowError> {
        let parent_id = record.parent_zone_id.as_deref().ok_or_else(|| {
            WorkflowError::Config(format!("child zone {} has no parent", record.name))
        })?;
        let parent = self.records.get(parent_id).ok_or_else(|| {
            WorkflowError::Config(format!(
                "parent zone {parent_id} of {} is not registered",
                record.name
            ))
        })?;

        record.name = normalize_domain(&record.name);
        if record.name == parent.name || !is_within(&record.name, &parent.name) {
            return Err(WorkflowError::Config(format!(
                "{} is not a subdomain of {}",
                record.name, parent.name
            )));
        }
        if self.records.contains_key(&record.zone_id) {
            return Err(WorkflowError::Config(format!(
                "zone {} is already registered",
                record.zone_id
            )));
        }

        self.records.insert(record.zone_id.clone(), record);
        Ok(())
    }

    pub fn get(&self, zone_id: &str) -> Option<&DomainRecord> {
        self.records.get(zone_id)
    }

    pub fn root(&self) -> Option<&DomainRecord> {
        self.root_zone_id.as_deref().and_then(|id| self.records.get(id))
    }

    pub fn parent_of(&self, zone_id: &str) -> Option<&DomainRecord> {
        self.records
            .get(zone_id)
            .and_then(|record| record.parent_zone_id.as_deref())
            .and_then(|parent| self.records.get(parent))
    }

    pub fn children(&self, zone_id: &str) -> Vec<&DomainRecord> {
        self.records
            .values()
            .filter(|record| record.parent_zone_id.as_deref() == Some(zone_id))
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &DomainRecord> {
        self.records.values()
    }

    /// Zone registered for exactly `name`.
    pub fn by_name(&self, name: &str) -> Option<&DomainRecord> {
        let name = normalize_domain(name);
        self.records.values().find(|record| record.name == name)
    }

    /// Resolves the zone owning `domain` by longest suffix match.
    pub fn resolve(&self, domain: &str) -> Result<&DomainRecord, WorkflowError> {
        self.records
            .values()
            .filter(|record| is_within(domain, &record.name))
            .max_by_key(|record| record.name.len())
            .ok_or_else(|| WorkflowError::NotFound(format!("no hosted zone owns {domain}")))
    }

    /// Looks up every zone of `topology` and registers it. Every zone is owned
    /// by the root account, which hands out delegation roles per zone.
    #[tracing::instrument(skip(provisioner, topology))]
    pub async fn discover(
        provisioner: &dyn Provisioner,
        topology: &Topology,
    ) -> Result<Self, WorkflowError> {
        let mut registry = Self::new();

        let root = lookup_zone(provisioner, &topology.root.domain).await?;
        let root_id = root.id.clone();
        registry.insert_root(DomainRecord {
            name: topology.root.domain.clone(),
            zone_id: root.id,
            account_id: topology.root.account.clone(),
            parent_zone_id: None,
        })?;

        for (name, env) in &topology.environments {
            let zone = lookup_zone(provisioner, &env.domain).await?;
            tracing::debug!("[workflow] discovered zone {} for {name}", zone.id);
            registry.insert_child(DomainRecord {
                name: env.domain.clone(),
                zone_id: zone.id,
                account_id: topology.root.account.clone(),
                parent_zone_id: Some(root_id.clone()),
            })?;
        }

        tracing::info!(
            "[workflow] registered {} hosted zones",
            registry.records.len()
        );

        Ok(registry)
    }
}

/// Resolves a hosted zone by name. The lookup returns zones in order starting
/// at `name`; an exact match wins, otherwise the first entry is taken.
pub async fn lookup_zone(
    provisioner: &dyn Provisioner,
    name: &str,
) -> Result<ZoneDescriptor, WorkflowError> {
    select_zone(provisioner.list_zones_by_name(None, name).await?, name)
}

pub(crate) fn select_zone(
    zones: Vec<ZoneDescriptor>,
    name: &str,
) -> Result<ZoneDescriptor, WorkflowError> {
    let wanted = normalize_domain(name);
    let position = zones
        .iter()
        .position(|zone| normalize_domain(&zone.name) == wanted)
        .unwrap_or(0);

    zones
        .into_iter()
        .nth(position)
        .map(|zone| ZoneDescriptor {
            id: strip_zone_prefix(&zone.id).to_string(),
            name: zone.name,
        })
        .ok_or_else(|| WorkflowError::NotFound(format!("hosted zone {name}")))
}
