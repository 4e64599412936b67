// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Validated configuration for the workflow components.
//!
//! Every struct here is checked when it is constructed, so a workflow never
//! starts with a configuration it would only reject half-way through.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_ALTERNATE_DOMAINS, MAX_DOMAIN_LABEL_LENGTH, MAX_DOMAIN_NAME_LENGTH,
    ROOT_VALIDATION_SESSION_NAME, VALIDATION_SESSION_NAME,
};
use crate::errors::WorkflowError;
use crate::utils::{is_within, normalize_domain};

/// Where the validation record of one certificate domain is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBinding {
    pub domain: String,
    /// Name of the hosted zone that owns `domain`
    pub zone_name: String,
    /// Delegation role used to write into the zone
    pub delegation_role: String,
    /// Session name used when assuming `delegation_role`
    pub session_name: String,
}

impl DomainBinding {
    pub fn new(domain: &str, zone_name: &str, delegation_role: &str) -> Result<Self, WorkflowError> {
        validate_domain_name(domain)?;
        validate_domain_name(zone_name)?;
        if !is_within(domain, zone_name) {
            return Err(WorkflowError::Config(format!(
                "{domain} is not part of zone {zone_name}"
            )));
        }
        validate_role(delegation_role)?;

        Ok(Self {
            domain: normalize_domain(domain),
            zone_name: normalize_domain(zone_name),
            delegation_role: delegation_role.to_string(),
            session_name: VALIDATION_SESSION_NAME.to_string(),
        })
    }

    pub fn with_session_name(mut self, session_name: &str) -> Self {
        self.session_name = session_name.to_string();
        self
    }
}

/// Domains of one certificate and the zones their validation records go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateConfig {
    primary: DomainBinding,
    alternates: Vec<DomainBinding>,
}

impl CertificateConfig {
    pub fn new(primary: DomainBinding, alternates: Vec<DomainBinding>) -> Result<Self, WorkflowError> {
        if alternates.len() > MAX_ALTERNATE_DOMAINS {
            return Err(WorkflowError::Config(format!(
                "at most {MAX_ALTERNATE_DOMAINS} alternate domains are supported"
            )));
        }

        let mut seen = BTreeSet::new();
        seen.insert(primary.domain.clone());
        for alternate in &alternates {
            if !seen.insert(alternate.domain.clone()) {
                return Err(WorkflowError::Config(format!(
                    "domain {} is listed more than once",
                    alternate.domain
                )));
            }
        }

        Ok(Self {
            primary,
            alternates,
        })
    }

    /// Certificate for `domain` in `zone_name`, optionally with the apex of a
    /// remote root zone as alternate name.
    pub fn for_zone(
        domain: &str,
        zone_name: &str,
        delegation_role: &str,
        root: Option<(&str, &str)>,
    ) -> Result<Self, WorkflowError> {
        let primary = DomainBinding::new(domain, zone_name, delegation_role)?;
        let alternates = match root {
            Some((root_zone_name, root_delegation_role)) => vec![
                DomainBinding::new(root_zone_name, root_zone_name, root_delegation_role)?
                    .with_session_name(ROOT_VALIDATION_SESSION_NAME),
            ],
            None => Vec::new(),
        };
        Self::new(primary, alternates)
    }

    pub fn primary(&self) -> &DomainBinding {
        &self.primary
    }

    pub fn alternates(&self) -> &[DomainBinding] {
        &self.alternates
    }

    pub fn alternate_domains(&self) -> Vec<String> {
        self.alternates.iter().map(|a| a.domain.clone()).collect()
    }

    /// Primary first, then alternates in configuration order.
    pub fn bindings(&self) -> impl Iterator<Item = &DomainBinding> {
        std::iter::once(&self.primary).chain(self.alternates.iter())
    }
}

/// Alias record to publish in a zone, written with a delegation role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasConfig {
    pub zone_name: String,
    pub record_name: String,
    pub target_host: String,
    pub target_zone_id: String,
    pub delegation_role: String,
}

impl AliasConfig {
    pub fn new(
        zone_name: &str,
        record_name: &str,
        target_host: &str,
        target_zone_id: &str,
        delegation_role: &str,
    ) -> Result<Self, WorkflowError> {
        validate_domain_name(zone_name)?;
        validate_domain_name(record_name)?;
        validate_domain_name(target_host)?;
        if !is_within(record_name, zone_name) {
            return Err(WorkflowError::Config(format!(
                "{record_name} is not part of zone {zone_name}"
            )));
        }
        if target_zone_id.trim().is_empty() {
            return Err(WorkflowError::Config(
                "target hosted zone id is required".to_string(),
            ));
        }
        validate_role(delegation_role)?;

        Ok(Self {
            zone_name: normalize_domain(zone_name),
            record_name: normalize_domain(record_name),
            target_host: normalize_domain(target_host),
            target_zone_id: target_zone_id.trim().to_string(),
            delegation_role: delegation_role.to_string(),
        })
    }
}

/// One deployment environment: a domain consumed from one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEnv {
    pub domain: String,
    pub account: String,
    pub region: String,
}

/// The accounts and domains of a deployment.
///
/// `apex_owner` names the environment allowed to write into the root zone and
/// to point the bare root domain at its resources. Without it, no environment
/// owns the apex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub root: DomainEnv,
    pub environments: BTreeMap<String, DomainEnv>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apex_owner: Option<String>,
}

impl Topology {
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        let topology: Topology = serde_json::from_str(json)
            .map_err(|err| WorkflowError::Config(format!("invalid topology: {err}")))?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        validate_env("root", &self.root)?;

        let mut domains = BTreeSet::new();
        for (name, env) in &self.environments {
            validate_env(name, env)?;
            if !is_within(&env.domain, &self.root.domain)
                || normalize_domain(&env.domain) == normalize_domain(&self.root.domain)
            {
                return Err(WorkflowError::Config(format!(
                    "environment {name}: {} is not a subdomain of {}",
                    env.domain, self.root.domain
                )));
            }
            if !domains.insert(normalize_domain(&env.domain)) {
                return Err(WorkflowError::Config(format!(
                    "environment {name}: domain {} is used twice",
                    env.domain
                )));
            }
        }

        if let Some(owner) = &self.apex_owner {
            if !self.environments.contains_key(owner) {
                return Err(WorkflowError::Config(format!(
                    "apex owner {owner} is not a configured environment"
                )));
            }
        }

        Ok(())
    }

    /// The environment that owns the apex, if one was configured.
    pub fn apex_environment(&self) -> Option<(&str, &DomainEnv)> {
        let owner = self.apex_owner.as_deref()?;
        self.environments
            .get_key_value(owner)
            .map(|(name, env)| (name.as_str(), env))
    }
}

fn validate_env(name: &str, env: &DomainEnv) -> Result<(), WorkflowError> {
    validate_domain_name(&env.domain)
        .map_err(|err| WorkflowError::Config(format!("environment {name}: {err}")))?;
    if env.account.len() != 12 || !env.account.chars().all(|c| c.is_ascii_digit()) {
        return Err(WorkflowError::Config(format!(
            "environment {name}: account {} is not a 12 digit account id",
            env.account
        )));
    }
    if env.region.trim().is_empty() {
        return Err(WorkflowError::Config(format!(
            "environment {name}: region is required"
        )));
    }
    Ok(())
}

fn validate_role(role: &str) -> Result<(), WorkflowError> {
    if role.trim().is_empty() {
        return Err(WorkflowError::Config(
            "delegation role is required".to_string(),
        ));
    }
    Ok(())
}

/// Checks length and label syntax. A leading `*` label is accepted for wildcards.
pub fn validate_domain_name(domain: &str) -> Result<(), WorkflowError> {
    let normalized = normalize_domain(domain);
    if normalized.is_empty() || normalized.len() > MAX_DOMAIN_NAME_LENGTH {
        return Err(WorkflowError::Config(format!(
            "invalid domain name length: {domain:?}"
        )));
    }

    for (index, label) in normalized.split('.').enumerate() {
        if index == 0 && label == "*" {
            continue;
        }
        let valid = !label.is_empty()
            && label.len() <= MAX_DOMAIN_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(WorkflowError::Config(format!(
                "invalid label {label:?} in domain {domain:?}"
            )));
        }
    }

    Ok(())
}
