// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Name-server propagation.
//!
//! When a hosted zone is (re)created it gets a fresh set of name servers. For
//! the root zone they are pushed to the domain registrar; for any other zone
//! an NS delegation record is written into the parent zone.
//!
//! The name-server list joined with `,` is the physical resource id, so an
//! unchanged list is detected from the event alone.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::{CALLER_GRANTEE, DELEGATION_RECORD_TTL, DELEGATION_SESSION_NAME};
use crate::delegation::{DelegationManager, WriteOutcome};
use crate::driver::ResourceHandler;
use crate::errors::WorkflowError;
use crate::models::{
    Activation, LifecycleEvent, NameServerSet, RecordAction, RecordChange, RecordKind, RecordSet,
    RequestType,
};
use crate::provisioner::Provisioner;
use crate::registry::ZoneRegistry;
use crate::utils::normalize_domain;

/// Properties of a registrar name-server resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrarProperties {
    /// Registered domain, e.g. `example.com`
    pub domain: String,
    /// Comma-separated name servers
    pub name_servers: String,
}

/// Properties of an NS delegation record in a parent zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DelegationProperties {
    /// Parent zone the record is written into
    pub zone_name: String,
    /// Delegated child domain
    pub domain: String,
    /// Comma-separated name servers of the child zone
    pub name_servers: String,
    /// Role used to write into the parent zone; ambient credentials when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation_role_arn: Option<String>,
}

impl DelegationProperties {
    fn name_server_set(&self) -> Result<NameServerSet, WorkflowError> {
        parse_name_servers(&self.name_servers)
    }

    fn same_record(&self, other: &Self) -> bool {
        normalize_domain(&self.zone_name) == normalize_domain(&other.zone_name)
            && normalize_domain(&self.domain) == normalize_domain(&other.domain)
    }
}

pub struct NameServerSync {
    provisioner: Arc<dyn Provisioner>,
}

impl NameServerSync {
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self { provisioner }
    }

    /// Propagates the name servers of a registered zone.
    ///
    /// Returns `false` without any call when `previous` equals `name_servers`.
    #[tracing::instrument(skip(self, registry, name_servers, previous))]
    pub async fn sync(
        &self,
        registry: &ZoneRegistry,
        child_zone_id: &str,
        name_servers: &NameServerSet,
        previous: Option<&NameServerSet>,
    ) -> Result<bool, WorkflowError> {
        if previous == Some(name_servers) {
            tracing::debug!("[workflow] name servers of {child_zone_id} unchanged");
            return Ok(false);
        }
        if name_servers.is_empty() {
            return Err(WorkflowError::Config(format!(
                "no name servers given for {child_zone_id}"
            )));
        }

        let child = registry
            .get(child_zone_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("hosted zone {child_zone_id}")))?;

        match registry.parent_of(child_zone_id) {
            None => self.update_registrar(&child.name, name_servers).await?,
            Some(parent) => {
                let manager = DelegationManager::new(self.provisioner.clone());
                manager
                    .change_record(
                        None,
                        DELEGATION_SESSION_NAME,
                        &parent.name,
                        &delegation_change(RecordAction::Upsert, &child.name, name_servers),
                    )
                    .await?;
            }
        }

        Ok(true)
    }

    async fn update_registrar(
        &self,
        domain: &str,
        name_servers: &NameServerSet,
    ) -> Result<(), WorkflowError> {
        tracing::info!(
            "[workflow] updating {} registrar name servers of {domain}",
            name_servers.len()
        );
        self.provisioner
            .update_registrar_name_servers(domain, &name_servers.to_vec())
            .await?;
        Ok(())
    }

    /// Registrar resource: Create and changed Update write once; Delete keeps
    /// the last name servers at the registrar.
    #[tracing::instrument(skip_all, fields(request_type = ?event.request_type))]
    pub async fn on_registrar_event(
        &self,
        event: &LifecycleEvent<RegistrarProperties>,
    ) -> Result<Activation, WorkflowError> {
        let properties = &event.resource_properties;
        let name_servers = parse_name_servers(&properties.name_servers)?;

        match event.request_type {
            RequestType::Create => {
                self.update_registrar(&properties.domain, &name_servers).await?;
            }
            RequestType::Update => {
                let previous = event
                    .physical_resource_id
                    .as_deref()
                    .map(NameServerSet::parse);
                if previous.as_ref() != Some(&name_servers) {
                    self.update_registrar(&properties.domain, &name_servers).await?;
                }
            }
            RequestType::Delete => {
                tracing::info!(
                    "[workflow] {} keeps its registrar name servers",
                    properties.domain
                );
                return Ok(Activation::complete(
                    event
                        .physical_resource_id
                        .clone()
                        .unwrap_or_else(|| name_servers.physical_id()),
                ));
            }
        }

        Ok(Activation::complete(name_servers.physical_id()))
    }

    /// NS delegation record resource in a parent zone.
    #[tracing::instrument(skip_all, fields(request_type = ?event.request_type))]
    pub async fn on_delegation_event(
        &self,
        event: &LifecycleEvent<DelegationProperties>,
    ) -> Result<Activation, WorkflowError> {
        let properties = &event.resource_properties;
        let name_servers = properties.name_server_set()?;

        match event.request_type {
            RequestType::Create => {
                self.write_delegation(properties, RecordAction::Upsert, &name_servers)
                    .await?;
            }
            RequestType::Update => {
                let previous = event
                    .physical_resource_id
                    .as_deref()
                    .map(NameServerSet::parse);
                let old = event.old_resource_properties.as_ref();
                let moved = old.is_some_and(|old| !old.same_record(properties));

                if moved || previous.as_ref() != Some(&name_servers) {
                    self.write_delegation(properties, RecordAction::Upsert, &name_servers)
                        .await?;
                }
                if let Some(old) = old.filter(|_| moved) {
                    self.write_delegation(old, RecordAction::Delete, &old.name_server_set()?)
                        .await?;
                }
            }
            RequestType::Delete => {
                self.write_delegation(properties, RecordAction::Delete, &name_servers)
                    .await?;
                return Ok(Activation::complete(
                    event
                        .physical_resource_id
                        .clone()
                        .unwrap_or_else(|| name_servers.physical_id()),
                ));
            }
        }

        Ok(Activation::complete(name_servers.physical_id()))
    }

    async fn write_delegation(
        &self,
        properties: &DelegationProperties,
        action: RecordAction,
        name_servers: &NameServerSet,
    ) -> Result<(), WorkflowError> {
        let mut manager = DelegationManager::new(self.provisioner.clone());
        let grant = properties
            .delegation_role_arn
            .as_deref()
            .map(|role| manager.grant_role(&properties.zone_name, CALLER_GRANTEE, role));

        let outcome = manager
            .change_record(
                grant.as_ref(),
                DELEGATION_SESSION_NAME,
                &properties.zone_name,
                &delegation_change(action, &properties.domain, name_servers),
            )
            .await?;

        if let WriteOutcome::AlreadyAbsent(zone) = outcome {
            tracing::info!(
                "[workflow] no NS record for {} in {}",
                properties.domain,
                zone.id
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler<RegistrarProperties> for NameServerSync {
    async fn on_event(
        &self,
        event: &LifecycleEvent<RegistrarProperties>,
    ) -> Result<Activation, WorkflowError> {
        self.on_registrar_event(event).await
    }
}

#[async_trait]
impl ResourceHandler<DelegationProperties> for NameServerSync {
    async fn on_event(
        &self,
        event: &LifecycleEvent<DelegationProperties>,
    ) -> Result<Activation, WorkflowError> {
        self.on_delegation_event(event).await
    }
}

fn parse_name_servers(name_servers: &str) -> Result<NameServerSet, WorkflowError> {
    let set = NameServerSet::parse(name_servers);
    if set.is_empty() {
        return Err(WorkflowError::Config(
            "at least one name server is required".to_string(),
        ));
    }
    Ok(set)
}

fn delegation_change(action: RecordAction, domain: &str, name_servers: &NameServerSet) -> RecordChange {
    RecordChange {
        action,
        record: RecordSet {
            name: normalize_domain(domain),
            kind: RecordKind::NameServers {
                values: name_servers.to_vec(),
                ttl: DELEGATION_RECORD_TTL,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryProvisioner;
    use crate::models::DomainRecord;

    const NS: &str = "ns-1.awsdns-01.org,ns-2.awsdns-02.com";

    fn registrar(name_servers: &str) -> RegistrarProperties {
        RegistrarProperties {
            domain: "example.com".to_string(),
            name_servers: name_servers.to_string(),
        }
    }

    fn delegation(domain: &str, name_servers: &str) -> DelegationProperties {
        DelegationProperties {
            zone_name: "example.com".to_string(),
            domain: domain.to_string(),
            name_servers: name_servers.to_string(),
            delegation_role_arn: None,
        }
    }

    async fn registry(provisioner: &InMemoryProvisioner) -> (ZoneRegistry, String, String) {
        let root = provisioner.add_zone("example.com").await;
        let dev = provisioner.add_zone("dev.example.com").await;
        let mut registry = ZoneRegistry::new();
        registry
            .insert_root(DomainRecord {
                name: "example.com".to_string(),
                zone_id: root.clone(),
                account_id: "111111111111".to_string(),
                parent_zone_id: None,
            })
            .unwrap();
        registry
            .insert_child(DomainRecord {
                name: "dev.example.com".to_string(),
                zone_id: dev.clone(),
                account_id: "111111111111".to_string(),
                parent_zone_id: Some(root.clone()),
            })
            .unwrap();
        (registry, root, dev)
    }

    #[tokio::test]
    async fn test_sync_root_goes_to_registrar() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let (registry, root, _) = registry(&provisioner).await;
        let sync = NameServerSync::new(provisioner.clone());

        let written = sync
            .sync(&registry, &root, &NameServerSet::parse(NS), None)
            .await
            .unwrap();

        assert!(written);
        assert_eq!(
            provisioner.registrar_name_servers("example.com").await.unwrap(),
            vec!["ns-1.awsdns-01.org", "ns-2.awsdns-02.com"]
        );
    }

    #[tokio::test]
    async fn test_sync_child_writes_ns_record_into_parent() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let (registry, root, dev) = registry(&provisioner).await;
        let sync = NameServerSync::new(provisioner.clone());

        sync.sync(&registry, &dev, &NameServerSet::parse(NS), None)
            .await
            .unwrap();

        let record = provisioner.record(&root, "dev.example.com", "NS").await.unwrap();
        match record.kind {
            RecordKind::NameServers { values, ttl } => {
                assert_eq!(values.len(), 2);
                assert_eq!(ttl, DELEGATION_RECORD_TTL);
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert_eq!(provisioner.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_sync_unchanged_performs_no_call() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let (registry, _, dev) = registry(&provisioner).await;
        let sync = NameServerSync::new(provisioner.clone());
        let current = NameServerSet::parse(NS);
        let previous = NameServerSet::parse("ns-2.awsdns-02.com.,ns-1.awsdns-01.org");

        let written = sync
            .sync(&registry, &dev, &current, Some(&previous))
            .await
            .unwrap();

        assert!(!written);
        assert!(provisioner.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_registrar_update_writes_only_when_changed() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let sync = NameServerSync::new(provisioner.clone());

        let created = sync
            .on_registrar_event(&LifecycleEvent::create(registrar(NS)))
            .await
            .unwrap();
        let physical_id = created.physical_resource_id().unwrap().to_string();
        assert_eq!(provisioner.write_count().await, 1);

        let reordered = "ns-2.awsdns-02.com,ns-1.awsdns-01.org";
        sync.on_registrar_event(&LifecycleEvent::update(
            physical_id.clone(),
            registrar(NS),
            registrar(reordered),
        ))
        .await
        .unwrap();
        assert_eq!(provisioner.write_count().await, 1);

        let changed = sync
            .on_registrar_event(&LifecycleEvent::update(
                physical_id,
                registrar(NS),
                registrar("ns-3.awsdns-03.net"),
            ))
            .await
            .unwrap();
        assert_eq!(provisioner.write_count().await, 2);
        assert_eq!(changed.physical_resource_id(), Some("ns-3.awsdns-03.net"));
    }

    #[tokio::test]
    async fn test_registrar_delete_is_a_no_op() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let sync = NameServerSync::new(provisioner.clone());

        let result = sync
            .on_registrar_event(&LifecycleEvent::delete(NS, registrar(NS)))
            .await
            .unwrap();
        assert_eq!(result.physical_resource_id(), Some(NS));
        assert!(provisioner.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_registrar_rejects_empty_list() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let sync = NameServerSync::new(provisioner);
        let result = sync
            .on_registrar_event(&LifecycleEvent::create(registrar(" , ")))
            .await;
        assert!(matches!(result, Err(WorkflowError::Config(_))));
    }

    #[tokio::test]
    async fn test_delegation_lifecycle() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let (_, root, _) = registry(&provisioner).await;
        let sync = NameServerSync::new(provisioner.clone());

        let created = sync
            .on_delegation_event(&LifecycleEvent::create(delegation("dev.example.com", NS)))
            .await
            .unwrap();
        assert!(provisioner.record(&root, "dev.example.com", "NS").await.is_some());

        let physical_id = created.physical_resource_id().unwrap().to_string();
        sync.on_delegation_event(&LifecycleEvent::delete(
            physical_id.clone(),
            delegation("dev.example.com", NS),
        ))
        .await
        .unwrap();
        assert!(provisioner.record(&root, "dev.example.com", "NS").await.is_none());

        // second delete finds nothing and still succeeds
        sync.on_delegation_event(&LifecycleEvent::delete(
            physical_id,
            delegation("dev.example.com", NS),
        ))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_delegation_moved_to_new_domain() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let (_, root, _) = registry(&provisioner).await;
        let sync = NameServerSync::new(provisioner.clone());

        sync.on_delegation_event(&LifecycleEvent::create(delegation("dev.example.com", NS)))
            .await
            .unwrap();
        sync.on_delegation_event(&LifecycleEvent::update(
            NameServerSet::parse(NS).physical_id(),
            delegation("dev.example.com", NS),
            delegation("qa.example.com", NS),
        ))
        .await
        .unwrap();

        assert!(provisioner.record(&root, "dev.example.com", "NS").await.is_none());
        assert!(provisioner.record(&root, "qa.example.com", "NS").await.is_some());
    }

    #[tokio::test]
    async fn test_delegation_with_role_uses_scoped_credential() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let (_, root, _) = registry(&provisioner).await;
        let role = "arn:aws:iam::111111111111:role/example-ZoneDelegationRole";
        provisioner.allow_role(role, &[&root]).await;
        let sync = NameServerSync::new(provisioner.clone());

        let mut properties = delegation("dev.example.com", NS);
        properties.delegation_role_arn = Some(role.to_string());
        sync.on_delegation_event(&LifecycleEvent::create(properties))
            .await
            .unwrap();

        assert_eq!(
            provisioner.count(&format!("assume_role:{role}:{DELEGATION_SESSION_NAME}")).await,
            1
        );
    }
}
