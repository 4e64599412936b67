// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::constants::NAME_SERVER_SEPARATOR;
use crate::utils::normalize_domain;

/// A hosted zone known to the [`ZoneRegistry`](crate::registry::ZoneRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Domain name of the zone, e.g. `dev.example.com`
    pub name: String,
    /// Hosted zone id without the `/hostedzone/` prefix
    pub zone_id: String,
    /// Account that owns the hosted zone
    pub account_id: String,
    /// Zone id of the parent zone. `None` for the root zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_zone_id: Option<String>,
}

impl DomainRecord {
    pub fn is_root(&self) -> bool {
        self.parent_zone_id.is_none()
    }
}

/// Capability: `grantee_account_id` may mutate records in `target_zone_id`
/// by assuming `role_identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegationGrant {
    pub grantee_account_id: String,
    pub role_identifier: String,
    /// Empty when the grant was declared by zone name only
    pub target_zone_id: String,
    pub target_zone_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateState {
    Requested,
    PendingValidation,
    Issued,
    Failed,
    PendingDeletion,
    Deleted,
}

/// A DNS record the certificate authority requires for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub domain: String,
    pub record_name: String,
    pub record_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub primary_domain: String,
    pub alternate_domains: BTreeSet<String>,
    pub state: CertificateState,
    /// Ordered primary first, then alternates in request order.
    pub validation_records: Vec<ValidationRecord>,
    pub certificate_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordAction {
    Upsert,
    Delete,
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordAction::Upsert => write!(f, "UPSERT"),
            RecordAction::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub zone_id: String,
    pub name: String,
    pub target_host: String,
    pub target_zone_id: String,
    pub action: RecordAction,
}

impl AliasRecord {
    pub fn to_change(&self) -> RecordChange {
        RecordChange {
            action: self.action,
            record: RecordSet {
                name: self.name.clone(),
                kind: RecordKind::Alias {
                    target_host: self.target_host.clone(),
                    target_zone_id: self.target_zone_id.clone(),
                },
            },
        }
    }
}

/// Hosted zone as returned by a lookup by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Cname { value: String, ttl: i64 },
    NameServers { values: Vec<String>, ttl: i64 },
    Alias { target_host: String, target_zone_id: String },
}

impl RecordKind {
    /// DNS record type written for this kind.
    pub fn record_type(&self) -> &'static str {
        match self {
            RecordKind::Cname { .. } => "CNAME",
            RecordKind::NameServers { .. } => "NS",
            RecordKind::Alias { .. } => "A",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    pub kind: RecordKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChange {
    pub action: RecordAction,
    pub record: RecordSet,
}

/// Temporary credentials obtained by assuming a delegation role.
///
/// Valid for a single record mutation; never cached by the workflow.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct ScopedCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Expiry as seconds since the Unix epoch
    #[zeroize(skip)]
    pub expires_at_secs: Option<i64>,
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for ScopedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCredential")
            .field("access_key_id", &"[REDACTED]")
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expires_at_secs", &self.expires_at_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    ValidationTimedOut,
    Revoked,
    Failed,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::PendingValidation => "PENDING_VALIDATION",
            CertificateStatus::Issued => "ISSUED",
            CertificateStatus::Inactive => "INACTIVE",
            CertificateStatus::Expired => "EXPIRED",
            CertificateStatus::ValidationTimedOut => "VALIDATION_TIMED_OUT",
            CertificateStatus::Revoked => "REVOKED",
            CertificateStatus::Failed => "FAILED",
        }
    }

    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "PENDING_VALIDATION" => Some(CertificateStatus::PendingValidation),
            "ISSUED" => Some(CertificateStatus::Issued),
            "INACTIVE" => Some(CertificateStatus::Inactive),
            "EXPIRED" => Some(CertificateStatus::Expired),
            "VALIDATION_TIMED_OUT" => Some(CertificateStatus::ValidationTimedOut),
            "REVOKED" => Some(CertificateStatus::Revoked),
            "FAILED" => Some(CertificateStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    pub value: String,
}

/// Validation state of one domain in a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainValidation {
    pub domain: String,
    /// `None` until the certificate authority has produced the record
    pub resource_record: Option<ResourceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDescription {
    pub certificate_id: String,
    pub domain: String,
    pub alternate_domains: Vec<String>,
    pub status: CertificateStatus,
    pub validation_options: Vec<DomainValidation>,
    /// Resources (distributions, API domains, ...) currently using the certificate
    pub in_use_by: Vec<String>,
}

impl CertificateDescription {
    /// Returns the validation record for `domain` once the certificate authority produced it.
    pub fn validation_record(&self, domain: &str) -> Option<ValidationRecord> {
        let wanted = normalize_domain(domain);
        self.validation_options
            .iter()
            .find(|option| normalize_domain(&option.domain) == wanted)
            .and_then(|option| option.resource_record.as_ref())
            .map(|record| ValidationRecord {
                domain: domain.to_string(),
                record_name: record.name.clone(),
                record_value: record.value.clone(),
            })
    }
}

/// Canonical name-server list. Its joined form is used as a physical resource
/// id so that an unchanged list is detected without a network call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameServerSet(BTreeSet<String>);

impl NameServerSet {
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            servers
                .into_iter()
                .map(|server| normalize_domain(server.as_ref()))
                .filter(|server| !server.is_empty())
                .collect(),
        )
    }

    /// Parses a physical resource id produced by [`physical_id`](Self::physical_id).
    pub fn parse(physical_id: &str) -> Self {
        Self::new(physical_id.split(NAME_SERVER_SEPARATOR))
    }

    pub fn physical_id(&self) -> String {
        self.to_vec().join(&NAME_SERVER_SEPARATOR.to_string())
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// Lifecycle event delivered by the orchestrator for one declared resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", bound(deserialize = "P: Deserialize<'de>"))]
pub struct LifecycleEvent<P> {
    pub request_type: RequestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    pub resource_properties: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<P>,
}

impl<P> LifecycleEvent<P> {
    pub fn create(properties: P) -> Self {
        Self {
            request_type: RequestType::Create,
            physical_resource_id: None,
            resource_properties: properties,
            old_resource_properties: None,
        }
    }

    pub fn update(physical_resource_id: impl Into<String>, old: P, new: P) -> Self {
        Self {
            request_type: RequestType::Update,
            physical_resource_id: Some(physical_resource_id.into()),
            resource_properties: new,
            old_resource_properties: Some(old),
        }
    }

    pub fn delete(physical_resource_id: impl Into<String>, properties: P) -> Self {
        Self {
            request_type: RequestType::Delete,
            physical_resource_id: Some(physical_resource_id.into()),
            resource_properties: properties,
            old_resource_properties: None,
        }
    }
}

/// Why an activation has not completed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum PendingReason {
    /// The certificate authority has not produced a record for these domains yet
    ValidationRecordsMissing { domains: Vec<String> },
    /// Records are in place, the certificate authority has not validated yet
    AwaitingIssuance { status: CertificateStatus },
    /// Teardown blocked until the referencing resources are removed
    ResourceInUse { in_use_by: Vec<String> },
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingReason::ValidationRecordsMissing { domains } => {
                write!(f, "validation records missing for {}", domains.join(", "))
            }
            PendingReason::AwaitingIssuance { status } => {
                write!(f, "awaiting issuance, status {status}")
            }
            PendingReason::ResourceInUse { in_use_by } => {
                write!(f, "in use by {}", in_use_by.join(", "))
            }
        }
    }
}

/// Result of one activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Complete {
        physical_resource_id: String,
        data: BTreeMap<String, String>,
    },
    Pending {
        reason: PendingReason,
    },
}

impl Activation {
    pub fn complete(physical_resource_id: impl Into<String>) -> Self {
        Activation::Complete {
            physical_resource_id: physical_resource_id.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn pending(reason: PendingReason) -> Self {
        Activation::Pending { reason }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Activation::Complete { data, .. } = &mut self {
            data.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Activation::Complete { .. })
    }

    pub fn physical_resource_id(&self) -> Option<&str> {
        match self {
            Activation::Complete {
                physical_resource_id,
                ..
            } => Some(physical_resource_id),
            Activation::Pending { .. } => None,
        }
    }
}
