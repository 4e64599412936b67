// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use aws_lc_rs::digest;
use data_encoding::HEXLOWER;

use crate::constants::{HOSTED_ZONE_ID_PREFIX, IDEMPOTENCY_TOKEN_LENGTH};

/// Lowercases a domain name and strips surrounding whitespace and the trailing dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Returns true if `domain` is `zone` itself or any name below it.
pub fn is_within(domain: &str, zone: &str) -> bool {
    let domain = normalize_domain(domain);
    let zone = normalize_domain(zone);
    domain == zone || domain.ends_with(&format!(".{zone}"))
}

/// First label of a domain, e.g. `dev` for `dev.example.com`
pub fn first_label(domain: &str) -> &str {
    domain.split('.').next().unwrap_or(domain)
}

/// Strips the `/hostedzone/` prefix the DNS service puts in front of zone ids.
pub fn strip_zone_prefix(zone_id: &str) -> &str {
    zone_id.strip_prefix(HOSTED_ZONE_ID_PREFIX).unwrap_or(zone_id)
}

/// Derives the certificate request idempotency token from the domain set.
///
/// Alternates are sorted so the token only depends on the set of names.
pub fn idempotency_token(primary: &str, alternates: &[String]) -> String {
    let mut names: Vec<String> = alternates.iter().map(|d| normalize_domain(d)).collect();
    names.sort();
    names.dedup();

    let mut input = normalize_domain(primary);
    for name in names {
        input.push('|');
        input.push_str(&name);
    }

    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    let mut token = HEXLOWER.encode(hash.as_ref());
    token.truncate(IDEMPOTENCY_TOKEN_LENGTH);
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_is_within() {
        assert!(is_within("dev.example.com", "example.com"));
        assert!(is_within("example.com.", "EXAMPLE.com"));
        assert!(!is_within("badexample.com", "example.com"));
        assert!(!is_within("example.com", "dev.example.com"));
    }

    #[test]
    fn test_strip_zone_prefix() {
        assert_eq!(strip_zone_prefix("/hostedzone/Z123"), "Z123");
        assert_eq!(strip_zone_prefix("Z123"), "Z123");
    }

    #[test]
    fn test_first_label() {
        assert_eq!(first_label("dev.example.com"), "dev");
        assert_eq!(first_label("localhost"), "localhost");
    }

    #[test]
    fn test_idempotency_token_shape() {
        let token = idempotency_token("dev.example.com", &[]);
        assert_eq!(token.len(), IDEMPOTENCY_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(
            token,
            idempotency_token("dev.example.com", &["example.com".to_string()])
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // The token depends on the set of alternates, not their order or case.
        #[test]
        fn prop_idempotency_token_ignores_alternate_order(
            mut alternates in proptest::collection::vec("[a-z]{1,10}\\.example\\.com", 0..5)
        ) {
            let forward = idempotency_token("www.example.com", &alternates);
            alternates.reverse();
            let upper: Vec<String> = alternates.iter().map(|a| a.to_uppercase()).collect();
            prop_assert_eq!(&forward, &idempotency_token("www.example.com", &alternates));
            prop_assert_eq!(&forward, &idempotency_token("WWW.example.com.", &upper));
        }
    }
}
