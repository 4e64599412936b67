// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers.
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/health` | [`health`] | Health check endpoint |
//! | GET | `/zones` | [`get_zones`] | Registered zones and delegation grants |
//! | POST | `/certificate/on-event` | [`certificate_on_event`] | Request a certificate |
//! | POST | `/certificate/is-complete` | [`certificate_is_complete`] | Validation / teardown poll |
//! | POST | `/alias` | [`alias`] | Publish or retract an alias record |
//! | POST | `/registrar` | [`registrar`] | Registrar name-server sync |
//! | POST | `/delegation` | [`delegation`] | NS delegation record sync |
//!
//! Every POST body is a lifecycle event; every response is an
//! [`ActivationResponse`]. Pending activations are returned with
//! `IsComplete: false` and the caller polls again.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use dns_workflow::alias::{AliasProperties, AliasPublisher};
use dns_workflow::certificate::{CertificateProperties, CertificateWorkflow};
use dns_workflow::driver::ResourceHandler;
use dns_workflow::models::LifecycleEvent;
use dns_workflow::nameservers::{DelegationProperties, NameServerSync, RegistrarProperties};
use serde_json::json;

use crate::application::AppState;
use crate::errors::AppError;
use crate::events::validate_event;
use crate::models::{ActivationResponse, ZoneInventory};

/// Health check endpoint.
///
/// # Response
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Hosted zones and delegation grants discovered from the topology file.
#[tracing::instrument(skip(state))]
pub async fn get_zones(State(state): State<Arc<AppState>>) -> Json<ZoneInventory> {
    Json(state.inventory.clone())
}

/// Requests (or reuses) the certificate. Validation happens in
/// [`certificate_is_complete`].
#[tracing::instrument(skip(state, event), fields(request_type = ?event.request_type))]
pub async fn certificate_on_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<LifecycleEvent<CertificateProperties>>,
) -> Result<Json<ActivationResponse>, AppError> {
    validate_event(&event)?;
    let workflow = CertificateWorkflow::new(state.provisioner.clone());
    let activation = workflow.on_event(&event).await?;

    Ok(Json(activation.into()))
}

/// One validation or teardown poll.
///
/// # Errors
///
/// - [`AppError::ValidationError`] - Event without a physical resource id
/// - [`AppError::Unauthorized`] - A delegation role could not be assumed
/// - [`AppError::CertificateError`] - The certificate authority rejected the certificate
#[tracing::instrument(skip(state, event), fields(request_type = ?event.request_type))]
pub async fn certificate_is_complete(
    State(state): State<Arc<AppState>>,
    Json(event): Json<LifecycleEvent<CertificateProperties>>,
) -> Result<Json<ActivationResponse>, AppError> {
    validate_event(&event)?;
    if event.physical_resource_id.is_none() {
        return Err(AppError::ValidationError(
            "PhysicalResourceId is required".to_string(),
        ));
    }

    let workflow = CertificateWorkflow::new(state.provisioner.clone());
    let activation = workflow.is_complete(&event).await?;

    tracing::debug!("[provisioner] complete: {}", activation.is_complete());
    Ok(Json(activation.into()))
}

#[tracing::instrument(skip(state, event), fields(request_type = ?event.request_type))]
pub async fn alias(
    State(state): State<Arc<AppState>>,
    Json(event): Json<LifecycleEvent<AliasProperties>>,
) -> Result<Json<ActivationResponse>, AppError> {
    validate_event(&event)?;
    let publisher = AliasPublisher::new(state.provisioner.clone());

    Ok(Json(publisher.on_event(&event).await?.into()))
}

#[tracing::instrument(skip(state, event), fields(request_type = ?event.request_type))]
pub async fn registrar(
    State(state): State<Arc<AppState>>,
    Json(event): Json<LifecycleEvent<RegistrarProperties>>,
) -> Result<Json<ActivationResponse>, AppError> {
    validate_event(&event)?;
    let sync = NameServerSync::new(state.provisioner.clone());

    Ok(Json(sync.on_registrar_event(&event).await?.into()))
}

#[tracing::instrument(skip(state, event), fields(request_type = ?event.request_type))]
pub async fn delegation(
    State(state): State<Arc<AppState>>,
    Json(event): Json<LifecycleEvent<DelegationProperties>>,
) -> Result<Json<ActivationResponse>, AppError> {
    validate_event(&event)?;
    let sync = NameServerSync::new(state.provisioner.clone());

    Ok(Json(sync.on_delegation_event(&event).await?.into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use dns_workflow::memory::InMemoryProvisioner;

    use crate::configuration::ProvisionerOptions;

    // Integration tests using TestServer are in tests/http_integration.rs

    fn state(provisioner: Arc<InMemoryProvisioner>) -> State<Arc<AppState>> {
        State(Arc::new(AppState {
            options: ProvisionerOptions::default(),
            provisioner,
            inventory: ZoneInventory::default(),
        }))
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_registrar_handler_writes_name_servers() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let event = LifecycleEvent::create(RegistrarProperties {
            domain: "example.com".to_string(),
            name_servers: "ns-1.example.net".to_string(),
        });

        let Json(response) = registrar(state(provisioner.clone()), Json(event))
            .await
            .unwrap();

        assert!(response.is_complete);
        assert_eq!(provisioner.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_is_complete_requires_physical_id() {
        let provisioner = Arc::new(InMemoryProvisioner::new());
        let event = LifecycleEvent::create(CertificateProperties {
            domain: "dev.example.com".to_string(),
            zone_name: "dev.example.com".to_string(),
            delegation_role_arn: "role".to_string(),
            root_zone_name: None,
            root_delegation_role_arn: None,
            alternate_domains: vec![],
        });

        let result = certificate_is_complete(state(provisioner), Json(event)).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
