// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! End to end lifecycle scenarios against the in-memory provisioner.

use std::sync::Arc;
use std::time::Duration;

use dns_workflow::alias::{AliasProperties, AliasPublisher};
use dns_workflow::certificate::{CERTIFICATE_ARN_KEY, CertificateProperties, CertificateWorkflow};
use dns_workflow::config::Topology;
use dns_workflow::constants::{ROOT_VALIDATION_SESSION_NAME, VALIDATION_SESSION_NAME};
use dns_workflow::delegation::{DelegationManager, delegation_role_arn};
use dns_workflow::driver::{Driver, ResourceHandler};
use dns_workflow::errors::WorkflowError;
use dns_workflow::memory::InMemoryProvisioner;
use dns_workflow::models::{Activation, CertificateStatus, LifecycleEvent, NameServerSet, PendingReason};
use dns_workflow::nameservers::{NameServerSync, RegistrarProperties};
use dns_workflow::registry::ZoneRegistry;

const TOPOLOGY: &str = r#"{
    "root": {"domain": "example.com", "account": "111111111111", "region": "us-east-1"},
    "environments": {
        "dev": {"domain": "dev.example.com", "account": "222222222222", "region": "eu-west-1"},
        "prod": {"domain": "prod.example.com", "account": "333333333333", "region": "eu-west-1"}
    },
    "apex_owner": "prod"
}"#;

struct Deployment {
    provisioner: Arc<InMemoryProvisioner>,
    root_zone: String,
    dev_zone: String,
    prod_zone: String,
}

async fn deployment(provisioner: InMemoryProvisioner) -> Deployment {
    let provisioner = Arc::new(provisioner);
    let root_zone = provisioner.add_zone("example.com").await;
    let dev_zone = provisioner.add_zone("dev.example.com").await;
    let prod_zone = provisioner.add_zone("prod.example.com").await;

    provisioner
        .allow_role(&delegation_role_arn("111111111111", "example.com"), &[&root_zone])
        .await;
    provisioner
        .allow_role(&delegation_role_arn("111111111111", "dev.example.com"), &[&dev_zone])
        .await;
    provisioner
        .allow_role(&delegation_role_arn("111111111111", "prod.example.com"), &[&prod_zone])
        .await;

    Deployment {
        provisioner,
        root_zone,
        dev_zone,
        prod_zone,
    }
}

fn dev_certificate() -> CertificateProperties {
    CertificateProperties {
        domain: "dev.example.com".to_string(),
        zone_name: "dev.example.com".to_string(),
        delegation_role_arn: delegation_role_arn("111111111111", "dev.example.com"),
        root_zone_name: None,
        root_delegation_role_arn: None,
        alternate_domains: vec![],
    }
}

fn prod_certificate_with_apex() -> CertificateProperties {
    CertificateProperties {
        domain: "prod.example.com".to_string(),
        zone_name: "prod.example.com".to_string(),
        delegation_role_arn: delegation_role_arn("111111111111", "prod.example.com"),
        root_zone_name: Some("example.com".to_string()),
        root_delegation_role_arn: Some(delegation_role_arn("111111111111", "example.com")),
        alternate_domains: vec![],
    }
}

fn driver() -> Driver {
    Driver::new(Duration::from_secs(15), Duration::from_secs(14 * 60))
}

// ============================================================================
// Certificate
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_domain_certificate_needs_one_record() {
    let env = deployment(InMemoryProvisioner::with_auto_validation()).await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());

    let result = driver()
        .apply(&workflow, LifecycleEvent::create(dev_certificate()))
        .await
        .unwrap();

    let Activation::Complete {
        physical_resource_id,
        data,
    } = result
    else {
        panic!("certificate was not issued");
    };
    assert_eq!(data[CERTIFICATE_ARN_KEY], physical_resource_id);
    assert_eq!(env.provisioner.records(&env.dev_zone).await.len(), 1);
    assert!(env.provisioner.records(&env.root_zone).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_apex_certificate_writes_one_record_per_zone() {
    let env = deployment(InMemoryProvisioner::with_auto_validation()).await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());

    let result = driver()
        .apply(&workflow, LifecycleEvent::create(prod_certificate_with_apex()))
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(env.provisioner.records(&env.prod_zone).await.len(), 1);
    assert_eq!(env.provisioner.records(&env.root_zone).await.len(), 1);

    // local zone first, with its own session, then the root zone
    let assumes: Vec<String> = env
        .provisioner
        .calls()
        .await
        .into_iter()
        .filter(|call| call.starts_with("assume_role"))
        .collect();
    assert!(assumes[0].ends_with(VALIDATION_SESSION_NAME));
    assert!(assumes[1].ends_with(ROOT_VALIDATION_SESSION_NAME));
}

#[tokio::test]
async fn test_apex_record_missing_blocks_every_write() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());

    let created = workflow
        .on_event(&LifecycleEvent::create(prod_certificate_with_apex()))
        .await
        .unwrap();
    let id = created.physical_resource_id().unwrap().to_string();
    env.provisioner
        .publish_validation_record(&id, "prod.example.com")
        .await;

    let mut event = LifecycleEvent::create(prod_certificate_with_apex());
    event.physical_resource_id = Some(id);
    let result = workflow.is_complete(&event).await.unwrap();

    assert_eq!(
        result,
        Activation::pending(PendingReason::ValidationRecordsMissing {
            domains: vec!["example.com".to_string()],
        })
    );
    assert_eq!(env.provisioner.write_count().await, 0);
    assert!(env.provisioner.records(&env.prod_zone).await.is_empty());
}

#[tokio::test]
async fn test_repeated_create_allocates_one_certificate() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());

    let first = workflow
        .on_event(&LifecycleEvent::create(dev_certificate()))
        .await
        .unwrap();
    let second = workflow
        .on_event(&LifecycleEvent::create(dev_certificate()))
        .await
        .unwrap();

    assert_eq!(first.physical_resource_id(), second.physical_resource_id());
    assert_eq!(env.provisioner.live_certificates().await.len(), 1);
}

#[tokio::test]
async fn test_polling_sequence_until_issued() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());

    let created = workflow
        .on_event(&LifecycleEvent::create(dev_certificate()))
        .await
        .unwrap();
    let id = created.physical_resource_id().unwrap().to_string();
    let mut event = LifecycleEvent::create(dev_certificate());
    event.physical_resource_id = Some(id.clone());

    // records not produced yet
    let first = workflow.is_complete(&event).await.unwrap();
    assert!(matches!(
        first,
        Activation::Pending {
            reason: PendingReason::ValidationRecordsMissing { .. }
        }
    ));

    // records written, authority still validating
    env.provisioner.publish_validation_records(&id).await;
    let second = workflow.is_complete(&event).await.unwrap();
    assert!(matches!(
        second,
        Activation::Pending {
            reason: PendingReason::AwaitingIssuance { .. }
        }
    ));

    env.provisioner.set_status(&id, CertificateStatus::Issued).await;
    let third = workflow.is_complete(&event).await.unwrap();
    assert_eq!(third.physical_resource_id(), Some(id.as_str()));

    // each poll re-applied the same record
    assert_eq!(env.provisioner.records(&env.dev_zone).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_use_certificate_teardown_deletes_nothing() {
    let env = deployment(InMemoryProvisioner::with_auto_validation()).await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());
    let issued = driver()
        .apply(&workflow, LifecycleEvent::create(dev_certificate()))
        .await
        .unwrap();
    let id = issued.physical_resource_id().unwrap().to_string();
    env.provisioner
        .set_in_use_by(&id, vec!["arn:aws:cloudfront::111111111111:distribution/E1".to_string()])
        .await;
    let writes_before = env.provisioner.write_count().await;

    let event = LifecycleEvent::delete(id.clone(), dev_certificate());
    let result = workflow.is_complete(&event).await.unwrap();

    assert!(matches!(
        result,
        Activation::Pending {
            reason: PendingReason::ResourceInUse { .. }
        }
    ));
    assert_eq!(env.provisioner.write_count().await, writes_before);
    assert_eq!(env.provisioner.count("delete_certificate").await, 0);
    assert_eq!(env.provisioner.records(&env.dev_zone).await.len(), 1);

    env.provisioner.set_in_use_by(&id, vec![]).await;
    let result = workflow.is_complete(&event).await.unwrap();
    assert!(result.is_complete());
    assert!(env.provisioner.records(&env.dev_zone).await.is_empty());
    assert!(env.provisioner.live_certificates().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_validation_timeout() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());

    let result = driver()
        .apply(&workflow, LifecycleEvent::create(dev_certificate()))
        .await;

    assert!(matches!(result, Err(WorkflowError::ValidationTimeout { .. })));
}

#[tokio::test]
async fn test_missing_trust_propagates_as_authorization_error() {
    let env = deployment(InMemoryProvisioner::with_auto_validation()).await;
    env.provisioner
        .deny_role(&delegation_role_arn("111111111111", "example.com"))
        .await;
    let workflow = CertificateWorkflow::new(env.provisioner.clone());

    let created = workflow
        .on_event(&LifecycleEvent::create(prod_certificate_with_apex()))
        .await
        .unwrap();
    let mut event = LifecycleEvent::create(prod_certificate_with_apex());
    event.physical_resource_id = created.physical_resource_id().map(str::to_string);

    let result = workflow.is_complete(&event).await;
    assert!(matches!(result, Err(WorkflowError::Authorization(_))));
}

// ============================================================================
// Alias
// ============================================================================

fn apex_alias() -> AliasProperties {
    AliasProperties {
        zone_name: "example.com".to_string(),
        domain: "example.com".to_string(),
        target_alias: "d111111abcdef8.cloudfront.net".to_string(),
        target_hosted_zone_id: "Z2FDTNDATAQYW2".to_string(),
        delegation_role_arn: delegation_role_arn("111111111111", "example.com"),
    }
}

#[tokio::test]
async fn test_double_alias_upsert_leaves_one_record() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let publisher = AliasPublisher::new(env.provisioner.clone());

    for _ in 0..2 {
        publisher
            .on_event(&LifecycleEvent::create(apex_alias()))
            .await
            .unwrap();
    }

    assert_eq!(env.provisioner.records(&env.root_zone).await.len(), 1);
}

#[tokio::test]
async fn test_delete_of_absent_alias_succeeds() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let publisher = AliasPublisher::new(env.provisioner.clone());

    let result = publisher
        .on_event(&LifecycleEvent::delete("example.com/example.com", apex_alias()))
        .await
        .unwrap();
    assert!(result.is_complete());
}

// ============================================================================
// Name servers
// ============================================================================

#[tokio::test]
async fn test_name_server_sync_writes_once_per_change() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let topology = Topology::from_json(TOPOLOGY).unwrap();
    let registry = ZoneRegistry::discover(&*env.provisioner, &topology)
        .await
        .unwrap();
    let sync = NameServerSync::new(env.provisioner.clone());
    let writes = env.provisioner.write_count().await;

    let servers = NameServerSet::new(["ns-1.awsdns-01.org", "ns-2.awsdns-02.com"]);
    assert!(
        !sync
            .sync(&registry, &env.dev_zone, &servers, Some(&servers))
            .await
            .unwrap()
    );
    assert_eq!(env.provisioner.write_count().await, writes);

    let changed = NameServerSet::new(["ns-3.awsdns-03.net"]);
    assert!(
        sync.sync(&registry, &env.dev_zone, &changed, Some(&servers))
            .await
            .unwrap()
    );
    assert_eq!(env.provisioner.write_count().await, writes + 1);
}

#[tokio::test(start_paused = true)]
async fn test_registrar_event_through_driver() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let sync = NameServerSync::new(env.provisioner.clone());

    let result = driver()
        .apply(
            &sync,
            LifecycleEvent::create(RegistrarProperties {
                domain: "example.com".to_string(),
                name_servers: "ns-2.awsdns-02.com,ns-1.awsdns-01.org".to_string(),
            }),
        )
        .await
        .unwrap();

    assert_eq!(
        result.physical_resource_id(),
        Some("ns-1.awsdns-01.org,ns-2.awsdns-02.com")
    );
    assert_eq!(env.provisioner.write_count().await, 1);
}

// ============================================================================
// Delegation
// ============================================================================

#[tokio::test]
async fn test_topology_grants_cover_environments_and_apex() {
    let env = deployment(InMemoryProvisioner::new()).await;
    let topology = Topology::from_json(TOPOLOGY).unwrap();
    let registry = ZoneRegistry::discover(&*env.provisioner, &topology)
        .await
        .unwrap();

    let mut manager = DelegationManager::new(env.provisioner.clone());
    let grants = manager.grant_for_topology(&registry, &topology).unwrap();

    assert_eq!(grants.len(), 3);
    let apex = grants
        .iter()
        .find(|grant| grant.target_zone_id == env.root_zone)
        .unwrap();
    assert_eq!(apex.grantee_account_id, "333333333333");
}
