// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! In-memory [`Provisioner`] used by tests and dry runs.
//!
//! Simulates the parts of the cloud provider the workflow depends on:
//!
//! - roles that may be assumed, each scoped to a set of hosted zones
//! - hosted zones and their record sets, keyed by `(name, type)`
//! - certificates with idempotent requests and a controllable status
//! - the registrar's name-server list per domain
//!
//! Every call is appended to a call log so tests can assert on the exact
//! sequence and number of provider calls.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::ProvisionerError;
use crate::models::{
    CertificateDescription, CertificateStatus, DomainValidation, RecordAction, RecordChange,
    RecordKind, RecordSet, ResourceRecord, ScopedCredential, ZoneDescriptor,
};
use crate::provisioner::Provisioner;
use crate::utils::{normalize_domain, strip_zone_prefix};

#[derive(Debug, Default)]
struct ZoneState {
    name: String,
    records: BTreeMap<(String, &'static str), RecordSet>,
}

#[derive(Debug)]
struct CertificateState {
    description: CertificateDescription,
    deleted: bool,
}

#[derive(Debug, Default)]
struct State {
    /// role identifier -> zone ids the role may write into
    roles: HashMap<String, BTreeSet<String>>,
    /// access key id -> role identifier
    sessions: HashMap<String, String>,
    zones: BTreeMap<String, ZoneState>,
    certificates: BTreeMap<String, CertificateState>,
    tokens: HashMap<String, String>,
    registrar: BTreeMap<String, Vec<String>>,
    calls: Vec<String>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn validation_record_present(&self, record: &ResourceRecord) -> bool {
        let key = (normalize_domain(&record.name), "CNAME");
        self.zones.values().any(|zone| {
            zone.records.get(&key).is_some_and(|set| {
                matches!(&set.kind, RecordKind::Cname { value, .. } if value == &record.value)
            })
        })
    }
}

/// Simulated cloud provider.
#[derive(Debug, Default)]
pub struct InMemoryProvisioner {
    state: RwLock<State>,
    auto_publish_records: bool,
    auto_issue: bool,
}

impl InMemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validation records are produced as soon as a certificate is requested,
    /// and certificates are issued once all their records exist in some zone.
    pub fn with_auto_validation() -> Self {
        Self {
            auto_publish_records: true,
            auto_issue: true,
            ..Self::default()
        }
    }

    /// Registers a hosted zone and returns its id.
    pub async fn add_zone(&self, name: &str) -> String {
        let mut state = self.state.write().await;
        let id = format!("Z{:012}", state.next_id());
        state.zones.insert(
            id.clone(),
            ZoneState {
                name: normalize_domain(name),
                records: BTreeMap::new(),
            },
        );
        id
    }

    /// Allows `role_identifier` to be assumed and to write into `zone_ids`.
    pub async fn allow_role(&self, role_identifier: &str, zone_ids: &[&str]) {
        let mut state = self.state.write().await;
        state.roles.insert(
            role_identifier.to_string(),
            zone_ids.iter().map(|id| id.to_string()).collect(),
        );
    }

    /// Breaks the trust relationship of `role_identifier`.
    pub async fn deny_role(&self, role_identifier: &str) {
        self.state.write().await.roles.remove(role_identifier);
    }

    /// Produces the validation records for every domain of a certificate.
    pub async fn publish_validation_records(&self, certificate_id: &str) {
        let mut state = self.state.write().await;
        if let Some(certificate) = state.certificates.get_mut(certificate_id) {
            publish_records(&mut certificate.description);
        }
    }

    /// Produces the validation record of a single domain of a certificate.
    pub async fn publish_validation_record(&self, certificate_id: &str, domain: &str) {
        let mut state = self.state.write().await;
        if let Some(certificate) = state.certificates.get_mut(certificate_id) {
            publish_records_for(&mut certificate.description, |name| {
                normalize_domain(name) == normalize_domain(domain)
            });
        }
    }

    pub async fn set_status(&self, certificate_id: &str, status: CertificateStatus) {
        let mut state = self.state.write().await;
        if let Some(certificate) = state.certificates.get_mut(certificate_id) {
            certificate.description.status = status;
        }
    }

    pub async fn set_in_use_by(&self, certificate_id: &str, in_use_by: Vec<String>) {
        let mut state = self.state.write().await;
        if let Some(certificate) = state.certificates.get_mut(certificate_id) {
            certificate.description.in_use_by = in_use_by;
        }
    }

    /// Records of a zone, ordered by name.
    pub async fn records(&self, zone_id: &str) -> Vec<RecordSet> {
        let state = self.state.read().await;
        state
            .zones
            .get(zone_id)
            .map(|zone| zone.records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn record(&self, zone_id: &str, name: &str, record_type: &str) -> Option<RecordSet> {
        self.records(zone_id).await.into_iter().find(|record| {
            normalize_domain(&record.name) == normalize_domain(name)
                && record.kind.record_type() == record_type
        })
    }

    /// Certificates that have been requested and not deleted.
    pub async fn live_certificates(&self) -> Vec<String> {
        let state = self.state.read().await;
        state
            .certificates
            .iter()
            .filter(|(_, certificate)| !certificate.deleted)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub async fn registrar_name_servers(&self, domain: &str) -> Option<Vec<String>> {
        let state = self.state.read().await;
        state.registrar.get(&normalize_domain(domain)).cloned()
    }

    /// Every provider call made so far, e.g. `change_record:UPSERT:Z000000000001:_x.example.com`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    /// Number of calls whose log entry starts with `operation`.
    pub async fn count(&self, operation: &str) -> usize {
        let state = self.state.read().await;
        state
            .calls
            .iter()
            .filter(|call| call.starts_with(operation))
            .count()
    }

    /// Number of calls that mutate DNS or registrar state.
    pub async fn write_count(&self) -> usize {
        self.count("change_record").await + self.count("update_registrar_name_servers").await
    }
}

fn publish_records(description: &mut CertificateDescription) {
    publish_records_for(description, |_| true);
}

fn publish_records_for(
    description: &mut CertificateDescription,
    include: impl Fn(&str) -> bool,
) {
    let certificate_suffix = description
        .certificate_id
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    for option in description.validation_options.iter_mut() {
        if option.resource_record.is_none() && include(&option.domain) {
            option.resource_record = Some(ResourceRecord {
                name: format!("_{certificate_suffix}.{}.", option.domain),
                value: format!("_{certificate_suffix}.validations.example.net."),
            });
        }
    }
}

#[async_trait]
impl Provisioner for InMemoryProvisioner {
    async fn assume_role(
        &self,
        role_identifier: &str,
        session_name: &str,
    ) -> Result<ScopedCredential, ProvisionerError> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("assume_role:{role_identifier}:{session_name}"));

        if !state.roles.contains_key(role_identifier) {
            return Err(ProvisionerError::Authorization(format!(
                "not authorized to perform sts:AssumeRole on {role_identifier}"
            )));
        }

        let access_key_id = format!("ASIA{:016}", state.next_id());
        state
            .sessions
            .insert(access_key_id.clone(), role_identifier.to_string());

        Ok(ScopedCredential {
            access_key_id,
            secret_access_key: format!("secret-{session_name}"),
            session_token: format!("session-{session_name}"),
            expires_at_secs: Some(3600),
        })
    }

    async fn list_zones_by_name(
        &self,
        _credential: Option<&ScopedCredential>,
        name: &str,
    ) -> Result<Vec<ZoneDescriptor>, ProvisionerError> {
        let mut state = self.state.write().await;
        state.calls.push(format!("list_zones_by_name:{name}"));

        // zones are ordered by their labels reversed, starting at `name`
        let start = reversed_labels(name);
        let mut zones: Vec<(String, ZoneDescriptor)> = state
            .zones
            .iter()
            .map(|(id, zone)| {
                (
                    reversed_labels(&zone.name),
                    ZoneDescriptor {
                        id: id.clone(),
                        name: format!("{}.", zone.name),
                    },
                )
            })
            .filter(|(key, _)| key.as_str() >= start.as_str())
            .collect();
        zones.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(zones.into_iter().map(|(_, zone)| zone).collect())
    }

    async fn change_record(
        &self,
        credential: Option<&ScopedCredential>,
        zone_id: &str,
        change: &RecordChange,
    ) -> Result<(), ProvisionerError> {
        let zone_id = strip_zone_prefix(zone_id);
        let mut state = self.state.write().await;
        state.calls.push(format!(
            "change_record:{}:{zone_id}:{}",
            change.action, change.record.name
        ));

        if let Some(credential) = credential {
            let allowed = state
                .sessions
                .get(&credential.access_key_id)
                .and_then(|role| state.roles.get(role))
                .is_some_and(|zones| zones.contains(zone_id));
            if !allowed {
                return Err(ProvisionerError::Authorization(format!(
                    "not authorized to change records in {zone_id}"
                )));
            }
        }

        let zone = state
            .zones
            .get_mut(zone_id)
            .ok_or_else(|| ProvisionerError::NotFound(format!("hosted zone {zone_id}")))?;
        let key = (
            normalize_domain(&change.record.name),
            change.record.kind.record_type(),
        );

        match change.action {
            RecordAction::Upsert => {
                zone.records.insert(key, change.record.clone());
                Ok(())
            }
            RecordAction::Delete => zone.records.remove(&key).map(|_| ()).ok_or_else(|| {
                ProvisionerError::RecordNotFound(format!(
                    "{} {} not found in {zone_id}",
                    change.record.name,
                    change.record.kind.record_type()
                ))
            }),
        }
    }

    async fn request_certificate(
        &self,
        primary_domain: &str,
        alternate_domains: &[String],
        idempotency_token: &str,
    ) -> Result<String, ProvisionerError> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("request_certificate:{primary_domain}"));

        if let Some(existing) = state.tokens.get(idempotency_token) {
            let live = state
                .certificates
                .get(existing)
                .is_some_and(|certificate| !certificate.deleted);
            if live {
                return Ok(existing.clone());
            }
        }

        let certificate_id = format!(
            "arn:aws:acm:us-east-1:000000000000:certificate/{:08}",
            state.next_id()
        );
        let mut domains = vec![primary_domain.to_string()];
        domains.extend(
            alternate_domains
                .iter()
                .filter(|domain| domain.as_str() != primary_domain)
                .cloned(),
        );

        let mut description = CertificateDescription {
            certificate_id: certificate_id.clone(),
            domain: primary_domain.to_string(),
            alternate_domains: alternate_domains.to_vec(),
            status: CertificateStatus::PendingValidation,
            validation_options: domains
                .into_iter()
                .map(|domain| DomainValidation {
                    domain,
                    resource_record: None,
                })
                .collect(),
            in_use_by: Vec::new(),
        };
        if self.auto_publish_records {
            publish_records(&mut description);
        }

        state
            .tokens
            .insert(idempotency_token.to_string(), certificate_id.clone());
        state.certificates.insert(
            certificate_id.clone(),
            CertificateState {
                description,
                deleted: false,
            },
        );

        Ok(certificate_id)
    }

    async fn describe_certificate(
        &self,
        certificate_id: &str,
    ) -> Result<CertificateDescription, ProvisionerError> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("describe_certificate:{certificate_id}"));

        let description = match state.certificates.get(certificate_id) {
            Some(certificate) if !certificate.deleted => certificate.description.clone(),
            _ => {
                return Err(ProvisionerError::NotFound(format!(
                    "certificate {certificate_id}"
                )));
            }
        };

        if self.auto_issue && description.status == CertificateStatus::PendingValidation {
            let validated = description.validation_options.iter().all(|option| {
                option
                    .resource_record
                    .as_ref()
                    .is_some_and(|record| state.validation_record_present(record))
            });
            if validated {
                if let Some(certificate) = state.certificates.get_mut(certificate_id) {
                    certificate.description.status = CertificateStatus::Issued;
                    return Ok(certificate.description.clone());
                }
            }
        }

        Ok(description)
    }

    async fn delete_certificate(&self, certificate_id: &str) -> Result<(), ProvisionerError> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("delete_certificate:{certificate_id}"));

        let certificate = state
            .certificates
            .get_mut(certificate_id)
            .filter(|certificate| !certificate.deleted)
            .ok_or_else(|| ProvisionerError::NotFound(format!("certificate {certificate_id}")))?;

        if !certificate.description.in_use_by.is_empty() {
            return Err(ProvisionerError::ResourceInUse(format!(
                "certificate {certificate_id} is in use"
            )));
        }
        certificate.deleted = true;
        Ok(())
    }

    async fn update_registrar_name_servers(
        &self,
        domain: &str,
        name_servers: &[String],
    ) -> Result<(), ProvisionerError> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("update_registrar_name_servers:{domain}"));
        state
            .registrar
            .insert(normalize_domain(domain), name_servers.to_vec());
        Ok(())
    }
}

fn reversed_labels(name: &str) -> String {
    let name = normalize_domain(name);
    let mut labels: Vec<&str> = name.split('.').collect();
    labels.reverse();
    labels.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cname(name: &str, value: &str, action: RecordAction) -> RecordChange {
        RecordChange {
            action,
            record: RecordSet {
                name: name.to_string(),
                kind: RecordKind::Cname {
                    value: value.to_string(),
                    ttl: 60,
                },
            },
        }
    }

    #[tokio::test]
    async fn test_list_zones_starts_at_name() {
        let provisioner = InMemoryProvisioner::new();
        let root = provisioner.add_zone("example.com").await;
        let dev = provisioner.add_zone("dev.example.com").await;
        provisioner.add_zone("example.org").await;

        let zones = provisioner
            .list_zones_by_name(None, "dev.example.com")
            .await
            .unwrap();
        assert_eq!(zones[0].id, dev);
        assert_eq!(zones[0].name, "dev.example.com.");
        assert!(zones.iter().all(|zone| zone.id != root));
    }

    #[tokio::test]
    async fn test_scoped_credential_is_limited_to_its_zones() {
        let provisioner = InMemoryProvisioner::new();
        let dev = provisioner.add_zone("dev.example.com").await;
        let root = provisioner.add_zone("example.com").await;
        provisioner.allow_role("dev-role", &[&dev]).await;

        let credential = provisioner.assume_role("dev-role", "test").await.unwrap();
        let change = cname("a.dev.example.com", "b", RecordAction::Upsert);

        assert!(
            provisioner
                .change_record(Some(&credential), &dev, &change)
                .await
                .is_ok()
        );
        assert!(matches!(
            provisioner
                .change_record(Some(&credential), &root, &change)
                .await,
            Err(ProvisionerError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_of_absent_record_is_record_not_found() {
        let provisioner = InMemoryProvisioner::new();
        let zone = provisioner.add_zone("example.com").await;
        let result = provisioner
            .change_record(None, &zone, &cname("x.example.com", "y", RecordAction::Delete))
            .await;
        assert!(matches!(result, Err(ProvisionerError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_request_certificate_is_idempotent_per_token() {
        let provisioner = InMemoryProvisioner::new();
        let first = provisioner
            .request_certificate("dev.example.com", &[], "token")
            .await
            .unwrap();
        let second = provisioner
            .request_certificate("dev.example.com", &[], "token")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(provisioner.live_certificates().await.len(), 1);
    }

    #[tokio::test]
    async fn test_in_use_certificate_cannot_be_deleted() {
        let provisioner = InMemoryProvisioner::new();
        let id = provisioner
            .request_certificate("dev.example.com", &[], "token")
            .await
            .unwrap();
        provisioner
            .set_in_use_by(&id, vec!["distribution".to_string()])
            .await;
        assert!(matches!(
            provisioner.delete_certificate(&id).await,
            Err(ProvisionerError::ResourceInUse(_))
        ));
    }
}
