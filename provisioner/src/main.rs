// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dns_provisioner::application::{Application, load_inventory};
use dns_provisioner::aws::AwsProvisioner;
use dns_provisioner::configuration::ProvisionerOptions;
use dns_provisioner::events;
use dns_provisioner::models::ZoneInventory;
use dns_workflow::constants::MAX_VALIDATION_WAIT;
use dns_workflow::driver::Driver;
use dns_workflow::provisioner::Provisioner;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("[provisioner] init");

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        // this needs to be set to false, otherwise ANSI color codes will
        // show up in a confusing manner in CloudWatch logs.
        .with_ansi(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    // get configuration options from environment variables
    let options = ProvisionerOptions::parse();

    tracing::info!("[provisioner] {:?}", &options);

    let provisioner: Arc<dyn Provisioner> =
        Arc::new(AwsProvisioner::from_env(options.region.clone(), &options.acm_region).await);

    if let (Some(path), Some(kind)) = (&options.event, options.kind) {
        let body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("unable to read event file {}", path.display()))?;
        let driver = Driver::new(
            Duration::from_secs(options.poll_interval_secs),
            MAX_VALIDATION_WAIT,
        );

        let response = events::drive(provisioner, kind, &body, &driver).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let inventory = match &options.topology {
        Some(path) => load_inventory(provisioner.clone(), path).await?,
        None => {
            tracing::warn!("[provisioner] no topology given, zone inventory is empty");
            ZoneInventory::default()
        }
    };

    let application = Application::build(options, provisioner, inventory).await?;

    application.run_until_stopped().await?;
    Ok(())
}
