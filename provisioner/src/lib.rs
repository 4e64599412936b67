// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # DNS Provisioner
//!
//! The service tier of the cross-account DNS workflow.
//!
//! This crate exposes the workflow handlers over HTTP and binds them to the
//! AWS APIs: STS for delegation roles, Route 53 for hosted zones and records,
//! Route 53 Domains for registrar name servers and ACM for certificates.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator -> HTTP API -> Provisioner (this crate) -> dns-workflow handlers
//!                                  |
//!                                  +-> STS (delegation roles)
//!                                  +-> Route 53 / Route 53 Domains
//!                                  +-> ACM
//! ```
//!
//! A single event can also be driven to completion from the command line with
//! `--event`, which polls the handler until it completes or the validation
//! wait budget runs out.
//!
//! ## Modules
//!
//! - [`application`]: HTTP server setup with Axum and body limits
//! - [`aws`]: AWS SDK implementation of the provisioner trait
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: Configuration constants for the application
//! - [`credentials`]: Conversion between STS and scoped credentials
//! - [`errors`]: Application error types with HTTP response mapping
//! - [`events`]: Command-line event driving
//! - [`models`]: Response types and event envelope validation
//! - [`routes`]: HTTP route handlers
//!
//! ## Usage
//!
//! ```bash
//! dns-provisioner --host 127.0.0.1 --port 8080 --topology topology.json
//! dns-provisioner --event create-certificate.json --kind certificate
//! ```
//!
//! ## Security Considerations
//!
//! - Assumed-role credentials are zeroized on drop and never logged
//! - Every cross-account write re-resolves its zone with the scoped credential
//! - Request bodies are limited to 1 MiB

pub mod application;
pub mod aws;
pub mod configuration;
pub mod constants;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod models;
pub mod routes;
