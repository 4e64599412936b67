// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

/// TTL of the CNAME records requested by the certificate authority
pub const VALIDATION_RECORD_TTL: i64 = 60;
/// TTL of NS delegation records written into a parent zone (two days)
pub const DELEGATION_RECORD_TTL: i64 = 172_800;

/// Hosted zone id used by every CloudFront distribution alias target
/// https://docs.aws.amazon.com/Route53/latest/APIReference/API_AliasTarget.html
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// Prefix the DNS service puts in front of hosted zone ids
pub const HOSTED_ZONE_ID_PREFIX: &str = "/hostedzone/";

/// Suffix of the per-zone cross-account delegation role name
pub const DELEGATION_ROLE_SUFFIX: &str = "-ZoneDelegationRole";

pub const VALIDATION_SESSION_NAME: &str = "AddValidationRecords";
pub const ROOT_VALIDATION_SESSION_NAME: &str = "AddRootValidationRecords";
pub const ALIAS_SESSION_NAME: &str = "AliasRecord";
pub const DELEGATION_SESSION_NAME: &str = "ZoneDelegation";

/// Maximum time the certificate authority is given to validate a certificate
pub const MAX_VALIDATION_WAIT: Duration = Duration::from_secs(14 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Idempotency tokens accepted by the certificate authority are at most 32 characters
pub const IDEMPOTENCY_TOKEN_LENGTH: usize = 32;

/// Separator used to join name servers into a physical resource id
pub const NAME_SERVER_SEPARATOR: char = ',';

// Validation limits for configuration values
pub const MAX_DOMAIN_NAME_LENGTH: usize = 253;
pub const MAX_DOMAIN_LABEL_LENGTH: usize = 63;
pub const MAX_ALTERNATE_DOMAINS: usize = 10;

/// Grantee recorded for delegation roles supplied in event properties, i.e.
/// the account running the activation
pub const CALLER_GRANTEE: &str = "caller";
