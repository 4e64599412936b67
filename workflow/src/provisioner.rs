// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! The cloud resource provisioner collaborator.
//!
//! Every network call the workflow makes goes through this trait. A handle is
//! injected into each component; nothing in the workflow constructs clients
//! on its own.

use async_trait::async_trait;

use crate::errors::ProvisionerError;
use crate::models::{CertificateDescription, RecordChange, ScopedCredential, ZoneDescriptor};

#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Obtains temporary credentials for `role_identifier`.
    ///
    /// Fails with [`ProvisionerError::Authorization`] if the trust relationship
    /// does not allow the caller to assume the role.
    async fn assume_role(
        &self,
        role_identifier: &str,
        session_name: &str,
    ) -> Result<ScopedCredential, ProvisionerError>;

    /// Lists hosted zones in lexicographic order starting at `name`.
    ///
    /// The zone itself, when it exists, comes first. Zone ids are returned
    /// without the `/hostedzone/` prefix.
    async fn list_zones_by_name(
        &self,
        credential: Option<&ScopedCredential>,
        name: &str,
    ) -> Result<Vec<ZoneDescriptor>, ProvisionerError>;

    /// Applies a single record change. Deleting an absent record fails with
    /// [`ProvisionerError::RecordNotFound`].
    async fn change_record(
        &self,
        credential: Option<&ScopedCredential>,
        zone_id: &str,
        change: &RecordChange,
    ) -> Result<(), ProvisionerError>;

    /// Requests a DNS-validated certificate and returns its identifier.
    ///
    /// Repeating a request with the same `idempotency_token` within one hour
    /// returns the identifier of the certificate allocated by the first
    /// request. After that window a new certificate is allocated, so callers
    /// that already hold an identifier must reuse it rather than request again.
    async fn request_certificate(
        &self,
        primary_domain: &str,
        alternate_domains: &[String],
        idempotency_token: &str,
    ) -> Result<String, ProvisionerError>;

    async fn describe_certificate(
        &self,
        certificate_id: &str,
    ) -> Result<CertificateDescription, ProvisionerError>;

    async fn delete_certificate(&self, certificate_id: &str) -> Result<(), ProvisionerError>;

    async fn update_registrar_name_servers(
        &self,
        domain: &str,
        name_servers: &[String],
    ) -> Result<(), ProvisionerError>;
}
