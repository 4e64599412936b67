// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;

use clap::Parser;

use crate::constants::DEFAULT_ACM_REGION;
use crate::events::EventKind;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ProvisionerOptions {
    #[arg(long, default_value = "127.0.0.1", env("PROVISIONER_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value = "8080", env("PROVISIONER_HTTP_PORT"))]
    pub port: u16,
    /// JSON file describing the root domain and its environments
    #[arg(long, env("PROVISIONER_TOPOLOGY"))]
    pub topology: Option<PathBuf>,
    /// Region of the DNS and STS clients; the default provider chain when absent
    #[arg(long, env("PROVISIONER_REGION"))]
    pub region: Option<String>,
    #[arg(long, default_value = DEFAULT_ACM_REGION, env("PROVISIONER_ACM_REGION"))]
    pub acm_region: String,
    /// Lifecycle event to drive to completion instead of serving HTTP
    #[arg(long, env("PROVISIONER_EVENT"), requires = "kind")]
    pub event: Option<PathBuf>,
    #[arg(long, value_enum, env("PROVISIONER_EVENT_KIND"))]
    pub kind: Option<EventKind>,
    #[arg(long, default_value = "15", env("PROVISIONER_POLL_INTERVAL_SECS"))]
    pub poll_interval_secs: u64,
}

impl Default for ProvisionerOptions {
    fn default() -> Self {
        ProvisionerOptions {
            host: "127.0.0.1".to_string(),
            port: 8080,
            topology: None,
            region: None,
            acm_region: DEFAULT_ACM_REGION.to_string(),
            event: None,
            kind: None,
            poll_interval_secs: 15,
        }
    }
}
