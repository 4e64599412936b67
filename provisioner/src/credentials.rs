// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Conversions between STS session credentials, the workflow's
//! [`ScopedCredential`] and the SDK credential type.
//!
//! Scoped credentials are never cached: each conversion builds a client that
//! lives for a single record mutation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_credential_types::Credentials;
use dns_workflow::errors::ProvisionerError;
use dns_workflow::models::ScopedCredential;

use crate::constants::ASSUMED_ROLE_PROVIDER;

/// Converts the credentials returned by `sts:AssumeRole`.
pub fn from_sts(
    credentials: Option<&aws_sdk_sts::types::Credentials>,
) -> Result<ScopedCredential, ProvisionerError> {
    let credentials = credentials.ok_or_else(|| {
        ProvisionerError::Service("sts:AssumeRole returned no credentials".to_string())
    })?;

    Ok(ScopedCredential {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expires_at_secs: Some(credentials.expiration().secs()),
    })
}

/// Credentials usable as a service client credentials provider.
pub fn to_sdk(credential: &ScopedCredential) -> Credentials {
    let expires_at = credential
        .expires_at_secs
        .and_then(|secs| u64::try_from(secs).ok())
        .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)));

    Credentials::new(
        credential.access_key_id.clone(),
        credential.secret_access_key.clone(),
        Some(credential.session_token.clone()),
        expires_at,
        ASSUMED_ROLE_PROVIDER,
    )
}

/// Seconds left before `credential` expires, `None` without an expiry.
pub fn remaining(credential: &ScopedCredential, now: SystemTime) -> Option<Duration> {
    let secs = u64::try_from(credential.expires_at_secs?).ok()?;
    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))?
        .duration_since(now)
        .ok()
}
