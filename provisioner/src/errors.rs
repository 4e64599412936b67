// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dns_workflow::errors::WorkflowError;
use serde_json::json;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("certificate error: {0}")]
    CertificateError(String),
    #[error("internal server error")]
    InternalServerError,
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg),
            Self::CertificateError(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
            Self::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({"code": status.as_u16(), "message": message}));

        (status, body).into_response()
    }
}

impl From<WorkflowError> for AppError {
    fn from(source: WorkflowError) -> Self {
        match source {
            WorkflowError::Config(msg) => AppError::ValidationError(msg),
            WorkflowError::NotFound(msg) => AppError::NotFound(msg),
            WorkflowError::Authorization(msg) => AppError::Unauthorized(msg),
            err @ (WorkflowError::CertificateFailed { .. }
            | WorkflowError::ValidationTimeout { .. }) => {
                AppError::CertificateError(err.to_string())
            }
            WorkflowError::Provider(err) => {
                tracing::error!("[provisioner] {:?}", err);
                AppError::InternalServerError
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(source: serde_json::Error) -> Self {
        tracing::error!("{:?}", source);
        AppError::ValidationError(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_workflow::errors::ProvisionerError;

    #[test]
    fn test_workflow_errors_map_to_status() {
        let cases = [
            (WorkflowError::Config("bad".to_string()), StatusCode::BAD_REQUEST),
            (WorkflowError::NotFound("zone".to_string()), StatusCode::NOT_FOUND),
            (WorkflowError::Authorization("denied".to_string()), StatusCode::FORBIDDEN),
            (
                WorkflowError::CertificateFailed {
                    certificate_id: "arn".to_string(),
                    status: "FAILED".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                WorkflowError::Provider(ProvisionerError::Transport("reset".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_config_error_is_internal() {
        let response = AppError::ConfigError("bad topology".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
