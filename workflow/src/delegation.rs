// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Delegation grants and scoped record mutation.
//!
//! A [`DelegationGrant`] lets an environment account mutate records in a zone
//! owned by the root account by assuming a per-zone role. The manager is the
//! only place grants are created or revoked, and the only place scoped
//! credentials are obtained.
//!
//! Credentials never outlive one
//! [`change_record`](DelegationManager::change_record). They are dropped (and
//! zeroized) as soon as the change has been applied.
//!
//! Authorization failures are not transient and are never retried.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Topology;
use crate::constants::DELEGATION_ROLE_SUFFIX;
use crate::errors::{ProvisionerError, WorkflowError};
use crate::models::{DelegationGrant, RecordAction, RecordChange, ScopedCredential, ZoneDescriptor};
use crate::provisioner::Provisioner;
use crate::registry::{ZoneRegistry, select_zone};
use crate::utils::{first_label, normalize_domain};

/// Result of a [`change_record`](DelegationManager::change_record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(ZoneDescriptor),
    /// A DELETE found nothing to delete
    AlreadyAbsent(ZoneDescriptor),
}

impl WriteOutcome {
    pub fn zone(&self) -> &ZoneDescriptor {
        match self {
            WriteOutcome::Applied(zone) | WriteOutcome::AlreadyAbsent(zone) => zone,
        }
    }
}

pub struct DelegationManager {
    provisioner: Arc<dyn Provisioner>,
    grants: HashSet<DelegationGrant>,
}

impl DelegationManager {
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            provisioner,
            grants: HashSet::new(),
        }
    }

    /// Grants `grantee_account_id` write access to a registered zone through
    /// the zone's delegation role in the owning account.
    pub fn grant(
        &mut self,
        registry: &ZoneRegistry,
        target_zone_id: &str,
        grantee_account_id: &str,
    ) -> Result<DelegationGrant, WorkflowError> {
        let zone = registry
            .get(target_zone_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("hosted zone {target_zone_id}")))?;

        let grant = DelegationGrant {
            grantee_account_id: grantee_account_id.to_string(),
            role_identifier: delegation_role_arn(&zone.account_id, &zone.name),
            target_zone_id: zone.zone_id.clone(),
            target_zone_name: zone.name.clone(),
        };
        self.grants.insert(grant.clone());
        Ok(grant)
    }

    /// Registers a role supplied from outside (e.g. resource properties). The
    /// zone id is resolved on first write.
    pub fn grant_role(
        &mut self,
        target_zone_name: &str,
        grantee_account_id: &str,
        role_identifier: &str,
    ) -> DelegationGrant {
        let grant = DelegationGrant {
            grantee_account_id: grantee_account_id.to_string(),
            role_identifier: role_identifier.to_string(),
            target_zone_id: String::new(),
            target_zone_name: normalize_domain(target_zone_name),
        };
        self.grants.insert(grant.clone());
        grant
    }

    /// Per-environment grants on each environment zone, plus the apex grant
    /// on the root zone when an apex owner is configured.
    pub fn grant_for_topology(
        &mut self,
        registry: &ZoneRegistry,
        topology: &Topology,
    ) -> Result<Vec<DelegationGrant>, WorkflowError> {
        let mut grants = Vec::new();

        for env in topology.environments.values() {
            let zone = registry
                .by_name(&env.domain)
                .ok_or_else(|| WorkflowError::NotFound(format!("hosted zone {}", env.domain)))?;
            let zone_id = zone.zone_id.clone();
            grants.push(self.grant(registry, &zone_id, &env.account)?);
        }

        if let Some((name, env)) = topology.apex_environment() {
            let root = registry
                .root()
                .ok_or_else(|| WorkflowError::NotFound("root hosted zone".to_string()))?;
            let root_id = root.zone_id.clone();
            tracing::info!("[workflow] environment {name} owns the apex");
            grants.push(self.grant(registry, &root_id, &env.account)?);
        }

        Ok(grants)
    }

    pub fn revoke(&mut self, grant: &DelegationGrant) -> bool {
        self.grants.remove(grant)
    }

    pub fn grants(&self) -> impl Iterator<Item = &DelegationGrant> {
        self.grants.iter()
    }

    /// Obtains a credential scoped to `grant`, valid for one operation.
    #[tracing::instrument(skip(self, grant), fields(role = %grant.role_identifier))]
    pub async fn assume(
        &self,
        grant: &DelegationGrant,
        session_name: &str,
    ) -> Result<ScopedCredential, WorkflowError> {
        if !self.grants.contains(grant) {
            return Err(WorkflowError::Authorization(format!(
                "grant on {} for {} was revoked",
                grant.target_zone_name, grant.grantee_account_id
            )));
        }

        self.provisioner
            .assume_role(&grant.role_identifier, session_name)
            .await
            .map_err(|err| {
                tracing::error!("[workflow] unable to assume {}: {}", grant.role_identifier, err);
                WorkflowError::from(err)
            })
    }

    /// Applies one change in `zone_name`, using a credential scoped to `grant`
    /// or the ambient credentials when `grant` is `None`.
    ///
    /// The zone is looked up by name with the same credential. A DELETE of an
    /// absent record is reported as [`WriteOutcome::AlreadyAbsent`].
    #[tracing::instrument(skip(self, grant, change), fields(action = %change.action, record = %change.record.name))]
    pub async fn change_record(
        &self,
        grant: Option<&DelegationGrant>,
        session_name: &str,
        zone_name: &str,
        change: &RecordChange,
    ) -> Result<WriteOutcome, WorkflowError> {
        let credential = match grant {
            Some(grant) => Some(self.assume(grant, session_name).await?),
            None => None,
        };

        let zones = self
            .provisioner
            .list_zones_by_name(credential.as_ref(), zone_name)
            .await?;
        let zone = select_zone(zones, zone_name)?;

        if let Some(grant) = grant {
            if !grant.target_zone_id.is_empty() && grant.target_zone_id != zone.id {
                return Err(WorkflowError::Authorization(format!(
                    "grant targets {} but {zone_name} resolved to {}",
                    grant.target_zone_id, zone.id
                )));
            }
        }

        match self
            .provisioner
            .change_record(credential.as_ref(), &zone.id, change)
            .await
        {
            Ok(()) => {
                tracing::debug!("[workflow] {} applied in {}", change.action, zone.id);
                Ok(WriteOutcome::Applied(zone))
            }
            Err(ProvisionerError::RecordNotFound(msg)) if change.action == RecordAction::Delete => {
                tracing::warn!(
                    "[workflow] delete of {} in {} not applied: {msg}",
                    change.record.name,
                    zone.id
                );
                Ok(WriteOutcome::AlreadyAbsent(zone))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Role each zone exposes for cross-account writes, e.g.
/// `arn:aws:iam::111111111111:role/dev-ZoneDelegationRole`.
pub fn delegation_role_arn(account_id: &str, zone_name: &str) -> String {
    format!(
        "arn:aws:iam::{account_id}:role/{}{DELEGATION_ROLE_SUFFIX}",
        first_label(&normalize_domain(zone_name))
    )
}
