// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! [`Provisioner`] backed by STS, Route 53, ACM and Route 53 Domains.

use std::fmt::Debug;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_acm::types::ValidationMethod;
use aws_sdk_route53::types::{
    AliasTarget, Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53domains::types::Nameserver;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use dns_workflow::errors::ProvisionerError;
use dns_workflow::models::{
    CertificateDescription, CertificateStatus, DomainValidation, RecordAction, RecordChange,
    RecordKind, ScopedCredential, ZoneDescriptor,
};
use dns_workflow::provisioner::Provisioner;
use dns_workflow::utils::strip_zone_prefix;

use crate::constants::REGISTRAR_REGION;
use crate::credentials;

pub struct AwsProvisioner {
    sdk_config: SdkConfig,
    sts: aws_sdk_sts::Client,
    route53: aws_sdk_route53::Client,
    acm: aws_sdk_acm::Client,
    domains: aws_sdk_route53domains::Client,
}

impl AwsProvisioner {
    /// Loads the default credential chain. ACM uses `acm_region`, Route 53
    /// Domains always uses us-east-1.
    pub async fn from_env(region: Option<String>, acm_region: &str) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self::new(sdk_config, acm_region)
    }

    pub fn new(sdk_config: SdkConfig, acm_region: &str) -> Self {
        let acm_config = aws_sdk_acm::config::Builder::from(&sdk_config)
            .region(Region::new(acm_region.to_string()))
            .build();
        let domains_config = aws_sdk_route53domains::config::Builder::from(&sdk_config)
            .region(Region::new(REGISTRAR_REGION))
            .build();

        Self {
            sts: aws_sdk_sts::Client::new(&sdk_config),
            route53: aws_sdk_route53::Client::new(&sdk_config),
            acm: aws_sdk_acm::Client::from_conf(acm_config),
            domains: aws_sdk_route53domains::Client::from_conf(domains_config),
            sdk_config,
        }
    }

    /// Route 53 client for one operation, scoped to `credential` when given.
    fn route53(&self, credential: Option<&ScopedCredential>) -> aws_sdk_route53::Client {
        match credential {
            None => self.route53.clone(),
            Some(credential) => {
                let config = aws_sdk_route53::config::Builder::from(&self.sdk_config)
                    .credentials_provider(credentials::to_sdk(credential))
                    .build();
                aws_sdk_route53::Client::from_conf(config)
            }
        }
    }
}

/// Maps an SDK error onto the provider error taxonomy.
fn map_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> ProvisionerError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    match &err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            let code = inner.code().unwrap_or("Unknown");
            let message = format!(
                "{operation}: {code}: {}",
                inner.message().unwrap_or_default()
            );
            match code {
                "AccessDenied"
                | "AccessDeniedException"
                | "NotAuthorizedException"
                | "InvalidClientTokenId"
                | "ExpiredToken"
                | "ExpiredTokenException"
                | "UnrecognizedClientException" => ProvisionerError::Authorization(message),
                "ResourceNotFoundException" | "NoSuchHostedZone" => {
                    ProvisionerError::NotFound(message)
                }
                "ResourceInUseException" => ProvisionerError::ResourceInUse(message),
                _ => ProvisionerError::Service(message),
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ProvisionerError::Transport(format!("{operation}: {}", DisplayErrorContext(&err)))
        }
        _ => ProvisionerError::Service(format!("{operation}: {}", DisplayErrorContext(&err))),
    }
}

/// Route 53 rejects a DELETE both when the record is gone and when its
/// value or TTL differ from the stored record. The rejection message is kept
/// so a stale record can be told apart from a missing one.
fn delete_rejected(
    change: &RecordChange,
    zone_id: &str,
    detail: Option<&str>,
) -> ProvisionerError {
    ProvisionerError::RecordNotFound(format!(
        "{} {} in {zone_id}: {}",
        change.record.name,
        change.record.kind.record_type(),
        detail.unwrap_or("InvalidChangeBatch")
    ))
}

fn build_error(err: impl std::fmt::Display) -> ProvisionerError {
    ProvisionerError::Service(format!("invalid request: {err}"))
}

fn record_set(change: &RecordChange) -> Result<ResourceRecordSet, ProvisionerError> {
    let record = &change.record;
    let mut builder = ResourceRecordSet::builder()
        .name(&record.name)
        .r#type(RrType::from(record.kind.record_type()));

    builder = match &record.kind {
        RecordKind::Cname { value, ttl } => builder.ttl(*ttl).resource_records(
            ResourceRecord::builder()
                .value(value)
                .build()
                .map_err(build_error)?,
        ),
        RecordKind::NameServers { values, ttl } => {
            let mut builder = builder.ttl(*ttl);
            for value in values {
                builder = builder.resource_records(
                    ResourceRecord::builder()
                        .value(value)
                        .build()
                        .map_err(build_error)?,
                );
            }
            builder
        }
        RecordKind::Alias {
            target_host,
            target_zone_id,
        } => builder.alias_target(
            AliasTarget::builder()
                .dns_name(target_host)
                .hosted_zone_id(target_zone_id)
                .evaluate_target_health(false)
                .build()
                .map_err(build_error)?,
        ),
    };

    builder.build().map_err(build_error)
}

#[async_trait]
impl Provisioner for AwsProvisioner {
    #[tracing::instrument(skip(self))]
    async fn assume_role(
        &self,
        role_identifier: &str,
        session_name: &str,
    ) -> Result<ScopedCredential, ProvisionerError> {
        let output = self
            .sts
            .assume_role()
            .role_arn(role_identifier)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|err| map_sdk_error("AssumeRole", err))?;

        let credential = credentials::from_sts(output.credentials())?;
        tracing::debug!(
            "[provisioner] assumed {role_identifier}, valid for {:?}",
            credentials::remaining(&credential, SystemTime::now())
        );
        Ok(credential)
    }

    #[tracing::instrument(skip(self, credential))]
    async fn list_zones_by_name(
        &self,
        credential: Option<&ScopedCredential>,
        name: &str,
    ) -> Result<Vec<ZoneDescriptor>, ProvisionerError> {
        let output = self
            .route53(credential)
            .list_hosted_zones_by_name()
            .dns_name(name)
            .send()
            .await
            .map_err(|err| map_sdk_error("ListHostedZonesByName", err))?;

        Ok(output
            .hosted_zones()
            .iter()
            .map(|zone| ZoneDescriptor {
                id: strip_zone_prefix(zone.id()).to_string(),
                name: zone.name().to_string(),
            })
            .collect())
    }

    #[tracing::instrument(skip(self, credential, change), fields(action = %change.action, record = %change.record.name))]
    async fn change_record(
        &self,
        credential: Option<&ScopedCredential>,
        zone_id: &str,
        change: &RecordChange,
    ) -> Result<(), ProvisionerError> {
        let action = match change.action {
            RecordAction::Upsert => ChangeAction::Upsert,
            RecordAction::Delete => ChangeAction::Delete,
        };
        let batch = ChangeBatch::builder()
            .changes(
                Change::builder()
                    .action(action)
                    .resource_record_set(record_set(change)?)
                    .build()
                    .map_err(build_error)?,
            )
            .build()
            .map_err(build_error)?;

        let result = self
            .route53(credential)
            .change_resource_record_sets()
            .hosted_zone_id(strip_zone_prefix(zone_id))
            .change_batch(batch)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            // Route 53 rejects the whole batch when a DELETE does not match an existing record
            Err(err)
                if change.action == RecordAction::Delete
                    && err
                        .as_service_error()
                        .is_some_and(|service| service.is_invalid_change_batch()) =>
            {
                let detail = err.as_service_error().and_then(ProvideErrorMetadata::message);
                Err(delete_rejected(change, zone_id, detail))
            }
            Err(err) => Err(map_sdk_error("ChangeResourceRecordSets", err)),
        }
    }

    #[tracing::instrument(skip(self, alternate_domains, idempotency_token))]
    async fn request_certificate(
        &self,
        primary_domain: &str,
        alternate_domains: &[String],
        idempotency_token: &str,
    ) -> Result<String, ProvisionerError> {
        let mut request = self
            .acm
            .request_certificate()
            .domain_name(primary_domain)
            .validation_method(ValidationMethod::Dns)
            .idempotency_token(idempotency_token);
        for domain in alternate_domains {
            request = request.subject_alternative_names(domain);
        }

        let output = request
            .send()
            .await
            .map_err(|err| map_sdk_error("RequestCertificate", err))?;

        output
            .certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| {
                ProvisionerError::Service("RequestCertificate returned no ARN".to_string())
            })
    }

    #[tracing::instrument(skip(self))]
    async fn describe_certificate(
        &self,
        certificate_id: &str,
    ) -> Result<CertificateDescription, ProvisionerError> {
        let output = self
            .acm
            .describe_certificate()
            .certificate_arn(certificate_id)
            .send()
            .await
            .map_err(|err| map_sdk_error("DescribeCertificate", err))?;

        let detail = output.certificate().ok_or_else(|| {
            ProvisionerError::NotFound(format!("certificate {certificate_id}"))
        })?;

        let status = match detail.status() {
            Some(status) => CertificateStatus::parse(status.as_str()).ok_or_else(|| {
                ProvisionerError::Service(format!("unknown certificate status {}", status.as_str()))
            })?,
            None => CertificateStatus::PendingValidation,
        };

        Ok(CertificateDescription {
            certificate_id: certificate_id.to_string(),
            domain: detail.domain_name().unwrap_or_default().to_string(),
            alternate_domains: detail.subject_alternative_names().to_vec(),
            status,
            validation_options: detail
                .domain_validation_options()
                .iter()
                .map(|option| DomainValidation {
                    domain: option.domain_name().to_string(),
                    resource_record: option.resource_record().map(|record| {
                        dns_workflow::models::ResourceRecord {
                            name: record.name().to_string(),
                            value: record.value().to_string(),
                        }
                    }),
                })
                .collect(),
            in_use_by: detail.in_use_by().to_vec(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete_certificate(&self, certificate_id: &str) -> Result<(), ProvisionerError> {
        self.acm
            .delete_certificate()
            .certificate_arn(certificate_id)
            .send()
            .await
            .map_err(|err| map_sdk_error("DeleteCertificate", err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, name_servers))]
    async fn update_registrar_name_servers(
        &self,
        domain: &str,
        name_servers: &[String],
    ) -> Result<(), ProvisionerError> {
        let mut request = self.domains.update_domain_nameservers().domain_name(domain);
        for name in name_servers {
            let name_server = Nameserver::builder()
                .name(name)
                .build()
                .map_err(build_error)?;
            request = request.nameservers(name_server);
        }

        let output = request
            .send()
            .await
            .map_err(|err| map_sdk_error("UpdateDomainNameservers", err))?;

        tracing::info!(
            "[provisioner] registrar operation {} submitted for {domain}",
            output.operation_id().unwrap_or_default()
        );
        Ok(())
    }
}
