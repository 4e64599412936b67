// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Alias records pointing a name at an edge distribution or API endpoint,
//! written into a zone owned by another account.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AliasConfig;
use crate::constants::{ALIAS_SESSION_NAME, CALLER_GRANTEE, CLOUDFRONT_HOSTED_ZONE_ID};
use crate::delegation::{DelegationManager, WriteOutcome};
use crate::driver::ResourceHandler;
use crate::errors::WorkflowError;
use crate::models::{Activation, AliasRecord, LifecycleEvent, RecordAction, RequestType};
use crate::provisioner::Provisioner;

fn default_target_zone() -> String {
    CLOUDFRONT_HOSTED_ZONE_ID.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasProperties {
    pub zone_name: String,
    /// Record name, e.g. `example.com` for the apex
    pub domain: String,
    pub target_alias: String,
    #[serde(default = "default_target_zone")]
    pub target_hosted_zone_id: String,
    pub delegation_role_arn: String,
}

impl TryFrom<&AliasProperties> for AliasConfig {
    type Error = WorkflowError;

    fn try_from(properties: &AliasProperties) -> Result<Self, Self::Error> {
        AliasConfig::new(
            &properties.zone_name,
            &properties.domain,
            &properties.target_alias,
            &properties.target_hosted_zone_id,
            &properties.delegation_role_arn,
        )
    }
}

/// Physical id of an alias resource: `<zone_name>/<record_name>`
pub fn alias_physical_id(config: &AliasConfig) -> String {
    format!("{}/{}", config.zone_name, config.record_name)
}

pub struct AliasPublisher {
    provisioner: Arc<dyn Provisioner>,
}

impl AliasPublisher {
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self { provisioner }
    }

    /// UPSERTs the alias `A` record. Publishing twice leaves one record.
    pub async fn publish(&self, config: &AliasConfig) -> Result<AliasRecord, WorkflowError> {
        self.apply(config, RecordAction::Upsert).await
    }

    /// DELETEs the alias `A` record. An absent record counts as retracted.
    pub async fn retract(&self, config: &AliasConfig) -> Result<AliasRecord, WorkflowError> {
        self.apply(config, RecordAction::Delete).await
    }

    #[tracing::instrument(skip(self, config), fields(record = %config.record_name))]
    async fn apply(
        &self,
        config: &AliasConfig,
        action: RecordAction,
    ) -> Result<AliasRecord, WorkflowError> {
        let mut manager = DelegationManager::new(self.provisioner.clone());
        let grant = manager.grant_role(&config.zone_name, CALLER_GRANTEE, &config.delegation_role);

        let mut record = AliasRecord {
            zone_id: String::new(),
            name: config.record_name.clone(),
            target_host: config.target_host.clone(),
            target_zone_id: config.target_zone_id.clone(),
            action,
        };

        let outcome = manager
            .change_record(
                Some(&grant),
                ALIAS_SESSION_NAME,
                &config.zone_name,
                &record.to_change(),
            )
            .await?;
        if let WriteOutcome::AlreadyAbsent(_) = &outcome {
            tracing::info!("[workflow] alias {} was already removed", config.record_name);
        }

        record.zone_id = outcome.zone().id.clone();
        Ok(record)
    }
}

#[async_trait]
impl ResourceHandler<AliasProperties> for AliasPublisher {
    #[tracing::instrument(skip_all, fields(request_type = ?event.request_type))]
    async fn on_event(
        &self,
        event: &LifecycleEvent<AliasProperties>,
    ) -> Result<Activation, WorkflowError> {
        let config = AliasConfig::try_from(&event.resource_properties)?;

        match event.request_type {
            RequestType::Create => {
                self.publish(&config).await?;
            }
            RequestType::Update => {
                self.publish(&config).await?;
                if let Some(old) = &event.old_resource_properties {
                    let old = AliasConfig::try_from(old)?;
                    if alias_physical_id(&old) != alias_physical_id(&config) {
                        self.retract(&old).await?;
                    }
                }
            }
            RequestType::Delete => {
                self.retract(&config).await?;
            }
        }

        Ok(Activation::complete(alias_physical_id(&config)))
    }
}
