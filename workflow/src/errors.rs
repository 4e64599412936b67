// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Error types for the workflow and its provisioner collaborator.
//!
//! Pending conditions (validation records not yet available, certificate not
//! yet issued, certificate still in use) are not errors. They are reported as
//! [`Activation::Pending`](crate::models::Activation::Pending) and the caller
//! re-polls on its own schedule.

use std::time::Duration;

/// Errors returned by a [`Provisioner`](crate::provisioner::Provisioner).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionerError {
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("record not found: {0}")]
    RecordNotFound(String),
    #[error("resource in use: {0}")]
    ResourceInUse(String),
    #[error("service error: {0}")]
    Service(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The trust relationship is missing or the grant was revoked. Never retried.
    #[error("authorization error: {0}")]
    Authorization(String),
    #[error("certificate {certificate_id} was not issued within {waited:?}: {reason}")]
    ValidationTimeout {
        certificate_id: String,
        waited: Duration,
        reason: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("certificate {certificate_id} failed with status {status}")]
    CertificateFailed {
        certificate_id: String,
        status: String,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("provider error: {0}")]
    Provider(ProvisionerError),
}

impl From<ProvisionerError> for WorkflowError {
    fn from(source: ProvisionerError) -> Self {
        match source {
            ProvisionerError::Authorization(msg) => WorkflowError::Authorization(msg),
            ProvisionerError::NotFound(msg) => WorkflowError::NotFound(msg),
            other => WorkflowError::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_errors_keep_their_kind() {
        let err: WorkflowError = ProvisionerError::Authorization("denied".to_string()).into();
        assert_eq!(err, WorkflowError::Authorization("denied".to_string()));
    }

    #[test]
    fn test_other_provider_errors_are_wrapped() {
        let err: WorkflowError = ProvisionerError::Transport("reset".to_string()).into();
        assert!(matches!(
            err,
            WorkflowError::Provider(ProvisionerError::Transport(_))
        ));
        assert_eq!(err.to_string(), "provider error: transport error: reset");
    }
}
