// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Driving a single lifecycle event to completion from the command line.

use std::sync::Arc;

use clap::ValueEnum;
use dns_workflow::alias::{AliasProperties, AliasPublisher};
use dns_workflow::certificate::{CertificateProperties, CertificateWorkflow};
use dns_workflow::driver::{Driver, ResourceHandler};
use dns_workflow::models::LifecycleEvent;
use dns_workflow::nameservers::{DelegationProperties, NameServerSync, RegistrarProperties};
use dns_workflow::provisioner::Provisioner;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::AppError;
use crate::models::{ActivationResponse, EventEnvelope};

/// Resource kind of an event file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKind {
    Certificate,
    Alias,
    Registrar,
    Delegation,
}

/// Rejects events whose envelope is inconsistent before any activation runs.
pub fn validate_event<P>(event: &LifecycleEvent<P>) -> Result<(), AppError> {
    EventEnvelope::from(event).validate().map_err(|e| {
        tracing::error!("[provisioner] validation failed: {}", e);
        AppError::ValidationError(e.to_string())
    })
}

/// Parses `body` as an event of `kind` and polls it until it completes or
/// the driver's wait budget runs out.
#[tracing::instrument(skip(provisioner, body, driver))]
pub async fn drive(
    provisioner: Arc<dyn Provisioner>,
    kind: EventKind,
    body: &str,
    driver: &Driver,
) -> Result<ActivationResponse, AppError> {
    match kind {
        EventKind::Certificate => {
            let event: LifecycleEvent<CertificateProperties> = parse(body)?;
            run(&CertificateWorkflow::new(provisioner), event, driver).await
        }
        EventKind::Alias => {
            let event: LifecycleEvent<AliasProperties> = parse(body)?;
            run(&AliasPublisher::new(provisioner), event, driver).await
        }
        EventKind::Registrar => {
            let event: LifecycleEvent<RegistrarProperties> = parse(body)?;
            run(&NameServerSync::new(provisioner), event, driver).await
        }
        EventKind::Delegation => {
            let event: LifecycleEvent<DelegationProperties> = parse(body)?;
            run(&NameServerSync::new(provisioner), event, driver).await
        }
    }
}

fn parse<P: DeserializeOwned>(body: &str) -> Result<LifecycleEvent<P>, AppError> {
    Ok(serde_json::from_str(body)?)
}

async fn run<P, H>(
    handler: &H,
    event: LifecycleEvent<P>,
    driver: &Driver,
) -> Result<ActivationResponse, AppError>
where
    P: Send + Sync,
    H: ResourceHandler<P>,
{
    validate_event(&event)?;
    Ok(driver.apply(handler, event).await?.into())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use dns_workflow::memory::InMemoryProvisioner;

    fn driver() -> Driver {
        Driver::new(Duration::from_secs(15), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_registrar_event() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let body = r#"{
            "RequestType": "Create",
            "ResourceProperties": {"Domain": "example.com", "NameServers": "ns-1.example.net,ns-2.example.org"}
        }"#;

        let response = drive(provisioner.clone(), EventKind::Registrar, body, &driver())
            .await
            .unwrap();

        assert!(response.is_complete);
        assert_eq!(
            response.physical_resource_id.as_deref(),
            Some("ns-1.example.net,ns-2.example.org")
        );
        assert_eq!(
            provisioner.registrar_name_servers("example.com").await.unwrap().len(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_rejects_malformed_event() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let result = drive(provisioner, EventKind::Alias, "{not json", &driver()).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_rejects_delete_without_physical_id() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let body = r#"{
            "RequestType": "Delete",
            "ResourceProperties": {"Domain": "example.com", "NameServers": "ns-1.example.net"}
        }"#;
        let result = drive(provisioner.clone(), EventKind::Registrar, body, &driver()).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert!(provisioner.calls().await.is_empty());
    }
}
