// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # DNS Workflow
//!
//! The cross-account DNS delegation and certificate provisioning workflow.
//!
//! A root account hosts the hosted zone of the root domain and one hosted zone
//! per environment sub-domain. Environment accounts are handed a delegation
//! role per zone, and use it to write certificate validation records and alias
//! records into zones they do not own.
//!
//! ## Architecture
//!
//! ```text
//! orchestrator -> LifecycleEvent -> handler (on_event / is_complete) -> Provisioner
//!       ^                                   |
//!       +------------ Activation -----------+
//! ```
//!
//! Every activation is stateless: it recomputes what to do from the event and
//! from provider state, and reports either completion or a pending reason. The
//! [`driver`] re-invokes pending activations within a fixed wait budget.
//!
//! ## Modules
//!
//! - [`alias`]: alias record publish / retract
//! - [`certificate`]: certificate request, validation and teardown state machine
//! - [`config`]: validated configuration structs and the deployment topology
//! - [`constants`]: workflow constants
//! - [`delegation`]: delegation grants and scoped record mutation
//! - [`driver`]: external polling loop with a maximum wait budget
//! - [`errors`]: workflow and provider error types
//! - [`memory`]: in-memory provisioner for tests and dry runs
//! - [`models`]: data model shared by every component
//! - [`nameservers`]: registrar and NS delegation record sync
//! - [`provisioner`]: the cloud provisioner collaborator trait
//! - [`registry`]: domain to hosted zone registry
//! - [`utils`]: domain name helpers

pub mod alias;
pub mod certificate;
pub mod config;
pub mod constants;
pub mod delegation;
pub mod driver;
pub mod errors;
pub mod memory;
pub mod models;
pub mod nameservers;
pub mod provisioner;
pub mod registry;
pub mod utils;
