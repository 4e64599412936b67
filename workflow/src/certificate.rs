// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Certificate request, DNS validation and teardown.
//!
//! ```text
//! Requested -> PendingValidation -> Issued
//!      |              |
//!      +--> Failed <--+
//!
//! Issued -> PendingDeletion -> Deleted
//! ```
//!
//! `on_event` only requests (or reuses) the certificate. Everything that has
//! to wait for the certificate authority happens in `is_complete`, which is
//! re-entrant: each poll re-derives the state from the certificate
//! description and re-applies the validation records with UPSERT.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{CertificateConfig, DomainBinding};
use crate::constants::{
    CALLER_GRANTEE, ROOT_VALIDATION_SESSION_NAME, VALIDATION_RECORD_TTL,
};
use crate::delegation::{DelegationManager, WriteOutcome};
use crate::driver::ResourceHandler;
use crate::errors::{ProvisionerError, WorkflowError};
use crate::models::{
    Activation, CertificateDescription, CertificateRequest, CertificateState, CertificateStatus,
    LifecycleEvent, PendingReason, RecordAction, RecordChange, RecordKind, RecordSet, RequestType,
    ValidationRecord,
};
use crate::provisioner::Provisioner;
use crate::utils::{idempotency_token, normalize_domain};

/// Output attribute carrying the certificate identifier.
pub const CERTIFICATE_ARN_KEY: &str = "CertificateArn";

/// An additional name on the certificate and where its record goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlternateDomainProperties {
    pub domain: String,
    pub zone_name: String,
    pub delegation_role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateProperties {
    /// Primary name, e.g. `dev.example.com`
    pub domain: String,
    /// Zone the primary validation record is written into
    pub zone_name: String,
    pub delegation_role_arn: String,
    /// Root zone whose apex is added to the certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_zone_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_delegation_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_domains: Vec<AlternateDomainProperties>,
}

impl TryFrom<&CertificateProperties> for CertificateConfig {
    type Error = WorkflowError;

    fn try_from(properties: &CertificateProperties) -> Result<Self, Self::Error> {
        let primary = DomainBinding::new(
            &properties.domain,
            &properties.zone_name,
            &properties.delegation_role_arn,
        )?;

        let mut alternates = Vec::new();
        match (
            properties.root_zone_name.as_deref(),
            properties.root_delegation_role_arn.as_deref(),
        ) {
            (Some(zone), Some(role)) => alternates.push(
                DomainBinding::new(zone, zone, role)?.with_session_name(ROOT_VALIDATION_SESSION_NAME),
            ),
            (None, None) => {}
            _ => {
                return Err(WorkflowError::Config(
                    "RootZoneName and RootDelegationRoleArn must be given together".to_string(),
                ));
            }
        }
        for alternate in &properties.alternate_domains {
            alternates.push(DomainBinding::new(
                &alternate.domain,
                &alternate.zone_name,
                &alternate.delegation_role_arn,
            )?);
        }

        CertificateConfig::new(primary, alternates)
    }
}

impl CertificateRequest {
    /// A certificate the provider no longer knows about.
    pub fn deleted(config: &CertificateConfig, certificate_id: &str) -> Self {
        Self {
            primary_domain: config.primary().domain.clone(),
            alternate_domains: config.alternate_domains().into_iter().collect(),
            state: CertificateState::Deleted,
            validation_records: Vec::new(),
            certificate_id: certificate_id.to_string(),
        }
    }

    /// Derives the request state from a provider description.
    pub fn observe(description: &CertificateDescription) -> Self {
        let mut domains = vec![description.domain.clone()];
        domains.extend(
            description
                .alternate_domains
                .iter()
                .filter(|domain| normalize_domain(domain) != normalize_domain(&description.domain))
                .cloned(),
        );
        let validation_records: Vec<ValidationRecord> = domains
            .iter()
            .filter_map(|domain| description.validation_record(domain))
            .collect();

        let state = match description.status {
            CertificateStatus::Issued => CertificateState::Issued,
            CertificateStatus::PendingValidation if validation_records.len() == domains.len() => {
                CertificateState::PendingValidation
            }
            CertificateStatus::PendingValidation => CertificateState::Requested,
            _ => CertificateState::Failed,
        };

        Self {
            primary_domain: description.domain.clone(),
            alternate_domains: domains.into_iter().skip(1).collect(),
            state,
            validation_records,
            certificate_id: description.certificate_id.clone(),
        }
    }
}

/// Outcome of one teardown poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retirement {
    /// `PendingDeletion` or `Deleted`
    pub request: CertificateRequest,
    /// Resources still referencing the certificate, when known
    pub in_use_by: Vec<String>,
}

pub struct CertificateWorkflow {
    provisioner: Arc<dyn Provisioner>,
}

impl CertificateWorkflow {
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self { provisioner }
    }

    /// Requests a DNS validated certificate for the configured domains.
    ///
    /// The idempotency token only depends on the domain set, so a repeat
    /// within the provider's one hour token window returns the certificate
    /// allocated the first time. Later retries rely on the event carrying the
    /// physical resource id, which `on_event` reuses without a request.
    #[tracing::instrument(skip_all, fields(domain = %config.primary().domain))]
    pub async fn request(&self, config: &CertificateConfig) -> Result<String, WorkflowError> {
        let alternates = config.alternate_domains();
        let token = idempotency_token(&config.primary().domain, &alternates);

        let certificate_id = self
            .provisioner
            .request_certificate(&config.primary().domain, &alternates, &token)
            .await?;

        tracing::info!("[workflow] requested certificate {certificate_id}");
        Ok(certificate_id)
    }

    /// One validation poll.
    ///
    /// Pending while any domain lacks its validation record or while the
    /// certificate authority has not issued yet.
    #[tracing::instrument(skip(self, config))]
    pub async fn validate(
        &self,
        config: &CertificateConfig,
        certificate_id: &str,
    ) -> Result<Activation, WorkflowError> {
        let description = self.provisioner.describe_certificate(certificate_id).await?;
        let request = CertificateRequest::observe(&description);

        if request.state == CertificateState::Failed {
            tracing::error!(
                "[workflow] certificate {certificate_id} ended in {}",
                description.status
            );
            return Err(WorkflowError::CertificateFailed {
                certificate_id: certificate_id.to_string(),
                status: description.status.to_string(),
            });
        }

        let mut records = Vec::new();
        let mut missing = Vec::new();
        for binding in config.bindings() {
            match description.validation_record(&binding.domain) {
                Some(record) => records.push((binding, record)),
                None => missing.push(binding.domain.clone()),
            }
        }
        if !missing.is_empty() {
            tracing::debug!("[workflow] validation records not ready: {missing:?}");
            return Ok(Activation::pending(PendingReason::ValidationRecordsMissing {
                domains: missing,
            }));
        }

        // primary (local zone) first, then the alternates (remote zones)
        let mut manager = DelegationManager::new(self.provisioner.clone());
        for (binding, record) in &records {
            self.write_record(&mut manager, binding, record, RecordAction::Upsert)
                .await?;
        }

        match request.state {
            CertificateState::Issued => {
                tracing::info!("[workflow] certificate {certificate_id} issued");
                Ok(Activation::complete(certificate_id)
                    .with_data(CERTIFICATE_ARN_KEY, certificate_id))
            }
            _ => Ok(Activation::pending(PendingReason::AwaitingIssuance {
                status: description.status,
            })),
        }
    }

    /// One teardown poll, reported as the certificate's state.
    ///
    /// `PendingDeletion` while other resources still use the certificate,
    /// `Deleted` once it is gone. Validation records are removed before the
    /// certificate; records that no longer exist are skipped.
    #[tracing::instrument(skip(self, config))]
    pub async fn retire(
        &self,
        config: &CertificateConfig,
        certificate_id: &str,
    ) -> Result<Retirement, WorkflowError> {
        let description = match self.provisioner.describe_certificate(certificate_id).await {
            Ok(description) => description,
            Err(ProvisionerError::NotFound(_)) => {
                tracing::info!("[workflow] certificate {certificate_id} already deleted");
                return Ok(Retirement {
                    request: CertificateRequest::deleted(config, certificate_id),
                    in_use_by: Vec::new(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let mut request = CertificateRequest::observe(&description);
        if !description.in_use_by.is_empty() {
            tracing::info!(
                "[workflow] certificate {certificate_id} still in use by {:?}",
                description.in_use_by
            );
            request.state = CertificateState::PendingDeletion;
            return Ok(Retirement {
                request,
                in_use_by: description.in_use_by,
            });
        }

        let mut manager = DelegationManager::new(self.provisioner.clone());
        for binding in config.bindings() {
            if let Some(record) = description.validation_record(&binding.domain) {
                self.write_record(&mut manager, binding, &record, RecordAction::Delete)
                    .await?;
            }
        }

        request.state = match self.provisioner.delete_certificate(certificate_id).await {
            Ok(()) | Err(ProvisionerError::NotFound(_)) => CertificateState::Deleted,
            Err(ProvisionerError::ResourceInUse(msg)) => {
                tracing::info!("[workflow] certificate {certificate_id} picked up a user: {msg}");
                CertificateState::PendingDeletion
            }
            Err(err) => return Err(err.into()),
        };

        if request.state == CertificateState::Deleted {
            tracing::info!("[workflow] certificate {certificate_id} deleted");
        }
        Ok(Retirement {
            request,
            in_use_by: description.in_use_by,
        })
    }

    /// [`retire`](Self::retire) as an activation: complete once deleted,
    /// pending with [`PendingReason::ResourceInUse`] otherwise.
    pub async fn teardown(
        &self,
        config: &CertificateConfig,
        certificate_id: &str,
    ) -> Result<Activation, WorkflowError> {
        let retirement = self.retire(config, certificate_id).await?;

        match retirement.request.state {
            CertificateState::Deleted => Ok(Activation::complete(certificate_id)),
            _ => Ok(Activation::pending(PendingReason::ResourceInUse {
                in_use_by: retirement.in_use_by,
            })),
        }
    }

    async fn write_record(
        &self,
        manager: &mut DelegationManager,
        binding: &DomainBinding,
        record: &ValidationRecord,
        action: RecordAction,
    ) -> Result<(), WorkflowError> {
        let grant = manager.grant_role(&binding.zone_name, CALLER_GRANTEE, &binding.delegation_role);
        let change = RecordChange {
            action,
            record: RecordSet {
                name: record.record_name.clone(),
                kind: RecordKind::Cname {
                    value: record.record_value.clone(),
                    ttl: VALIDATION_RECORD_TTL,
                },
            },
        };

        let outcome = manager
            .change_record(Some(&grant), &binding.session_name, &binding.zone_name, &change)
            .await?;
        if let WriteOutcome::AlreadyAbsent(zone) = outcome {
            tracing::debug!(
                "[workflow] validation record of {} already gone from {}",
                record.domain,
                zone.id
            );
        }
        Ok(())
    }
}

fn domain_set(config: &CertificateConfig) -> (String, BTreeSet<String>) {
    (
        config.primary().domain.clone(),
        config.alternate_domains().into_iter().collect(),
    )
}

fn physical_id<P>(event: &LifecycleEvent<P>) -> Result<&str, WorkflowError> {
    event
        .physical_resource_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            WorkflowError::Config(format!(
                "{:?} event without a physical resource id",
                event.request_type
            ))
        })
}

#[async_trait]
impl ResourceHandler<CertificateProperties> for CertificateWorkflow {
    #[tracing::instrument(skip_all, fields(request_type = ?event.request_type))]
    async fn on_event(
        &self,
        event: &LifecycleEvent<CertificateProperties>,
    ) -> Result<Activation, WorkflowError> {
        let config = CertificateConfig::try_from(&event.resource_properties)?;

        match event.request_type {
            RequestType::Create => match event.physical_resource_id.as_deref() {
                Some(existing) if !existing.is_empty() => {
                    tracing::info!("[workflow] reusing certificate {existing}");
                    Ok(Activation::complete(existing))
                }
                _ => Ok(Activation::complete(self.request(&config).await?)),
            },
            RequestType::Update => {
                let unchanged = match &event.old_resource_properties {
                    Some(old) => domain_set(&CertificateConfig::try_from(old)?) == domain_set(&config),
                    None => false,
                };
                match event.physical_resource_id.as_deref() {
                    Some(existing) if unchanged && !existing.is_empty() => {
                        Ok(Activation::complete(existing))
                    }
                    _ => Ok(Activation::complete(self.request(&config).await?)),
                }
            }
            RequestType::Delete => Ok(Activation::complete(physical_id(event)?)),
        }
    }

    #[tracing::instrument(skip_all, fields(request_type = ?event.request_type))]
    async fn is_complete(
        &self,
        event: &LifecycleEvent<CertificateProperties>,
    ) -> Result<Activation, WorkflowError> {
        let config = CertificateConfig::try_from(&event.resource_properties)?;
        let certificate_id = physical_id(event)?;

        match event.request_type {
            RequestType::Create | RequestType::Update => self.validate(&config, certificate_id).await,
            RequestType::Delete => self.teardown(&config, certificate_id).await,
        }
    }
}
