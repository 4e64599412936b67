// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::serve::Serve;
use dns_workflow::config::Topology;
use dns_workflow::delegation::DelegationManager;
use dns_workflow::provisioner::Provisioner;
use dns_workflow::registry::ZoneRegistry;
use tokio::net::TcpListener;

use crate::configuration::ProvisionerOptions;
use crate::constants::MAX_REQUEST_BODY_SIZE;
use crate::errors::AppError;
use crate::models::ZoneInventory;
use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub options: ProvisionerOptions,
    pub provisioner: Arc<dyn Provisioner>,
    pub inventory: ZoneInventory,
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(
        options: ProvisionerOptions,
        provisioner: Arc<dyn Provisioner>,
        inventory: ZoneInventory,
    ) -> Result<Self, std::io::Error> {
        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(address).await?;
        let server = run(listener, options.clone(), provisioner, inventory)?;
        let port = server.local_addr()?.port();

        tracing::info!("[provisioner] listening at http://{}:{}", options.host, port);

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn create_router(
    options: ProvisionerOptions,
    provisioner: Arc<dyn Provisioner>,
    inventory: ZoneInventory,
) -> Router {
    let state = Arc::new(AppState {
        options,
        provisioner,
        inventory,
    });

    Router::new()
        .route("/health", get(routes::health))
        .route("/zones", get(routes::get_zones))
        .route("/certificate/on-event", post(routes::certificate_on_event))
        .route("/certificate/is-complete", post(routes::certificate_is_complete))
        .route("/alias", post(routes::alias))
        .route("/registrar", post(routes::registrar))
        .route("/delegation", post(routes::delegation))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .with_state(state)
}

#[tracing::instrument(skip(listener, provisioner, inventory))]
pub fn run(
    listener: TcpListener,
    options: ProvisionerOptions,
    provisioner: Arc<dyn Provisioner>,
    inventory: ZoneInventory,
) -> Result<Serve<TcpListener, Router, Router>, std::io::Error> {
    let app = create_router(options, provisioner, inventory);
    Ok(axum::serve(listener, app))
}

/// Discovers the hosted zones of the topology in `path` and derives the
/// delegation grants of every environment.
#[tracing::instrument(skip(provisioner))]
pub async fn load_inventory(
    provisioner: Arc<dyn Provisioner>,
    path: &Path,
) -> Result<ZoneInventory, AppError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::ConfigError(format!("unable to read topology {}: {err}", path.display()))
    })?;
    let topology = Topology::from_json(&contents).map_err(|err| {
        tracing::error!("[provisioner] rejected topology {}: {}", path.display(), err);
        AppError::ConfigError(err.to_string())
    })?;

    let registry = ZoneRegistry::discover(provisioner.as_ref(), &topology).await?;
    let mut manager = DelegationManager::new(provisioner);
    let grants = manager.grant_for_topology(&registry, &topology)?;

    tracing::info!(
        "[provisioner] loaded {} zones and {} grants",
        registry.records().count(),
        grants.len()
    );

    Ok(ZoneInventory {
        zones: registry.records().cloned().collect(),
        grants,
    })
}
