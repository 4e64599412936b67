// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::BTreeMap;

use dns_workflow::models::{
    Activation, DelegationGrant, DomainRecord, LifecycleEvent, PendingReason, RequestType,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::MAX_PHYSICAL_ID_LENGTH;

/// Response returned for every activation, in the shape the orchestrator
/// expects from `onEvent` / `isComplete` handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivationResponse {
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<PendingReason>,
}

impl From<Activation> for ActivationResponse {
    fn from(activation: Activation) -> Self {
        match activation {
            Activation::Complete {
                physical_resource_id,
                data,
            } => Self {
                is_complete: true,
                physical_resource_id: Some(physical_resource_id),
                data,
                reason: None,
            },
            Activation::Pending { reason } => Self {
                is_complete: false,
                physical_resource_id: None,
                data: BTreeMap::new(),
                reason: Some(reason),
            },
        }
    }
}

/// Envelope fields of a lifecycle event, checked before any activation runs.
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_envelope"))]
pub struct EventEnvelope {
    pub request_type: RequestType,
    #[validate(length(min = 1, max = MAX_PHYSICAL_ID_LENGTH))]
    pub physical_resource_id: Option<String>,
}

impl<P> From<&LifecycleEvent<P>> for EventEnvelope {
    fn from(event: &LifecycleEvent<P>) -> Self {
        Self {
            request_type: event.request_type,
            physical_resource_id: event.physical_resource_id.clone(),
        }
    }
}

/// Update and Delete always refer to an existing physical resource.
fn validate_envelope(envelope: &EventEnvelope) -> Result<(), validator::ValidationError> {
    match envelope.request_type {
        RequestType::Create => Ok(()),
        RequestType::Update | RequestType::Delete if envelope.physical_resource_id.is_some() => {
            Ok(())
        }
        _ => Err(validator::ValidationError::new("missing_physical_resource_id")),
    }
}

/// Hosted zones and delegation grants of the loaded topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneInventory {
    pub zones: Vec<DomainRecord>,
    pub grants: Vec<DelegationGrant>,
}
