// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

/// Route 53 Domains is only available in us-east-1
pub const REGISTRAR_REGION: &str = "us-east-1";
/// Certificates used by CloudFront must be issued in us-east-1
pub const DEFAULT_ACM_REGION: &str = "us-east-1";

/// Provider name attached to credentials obtained with sts:AssumeRole
pub const ASSUMED_ROLE_PROVIDER: &str = "DelegationRole";

pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024; // 1 MiB

// Validation constants for lifecycle events
pub const MAX_PHYSICAL_ID_LENGTH: u64 = 2048;
