//! Host security policy — allow-list matching and public-address
//! validation.
//!
//! The gateway points a real browser at caller-supplied URLs; these two
//! checks are what keep it from doubling as an open proxy into the
//! network the process runs on.

use crate::error::GatewayError;
use anyhow::Context;
use regex::Regex;
use std::net::IpAddr;
use tokio::net::lookup_host;

/// Operator-supplied host policy, built once at startup.
pub struct HostPolicy {
    patterns: Vec<HostPattern>,
    deny_private_ips: bool,
}

enum HostPattern {
    Literal(String),
    Wildcard(Regex),
}

impl HostPolicy {
    pub fn new(patterns: &[String], deny_private_ips: bool) -> anyhow::Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            deny_private_ips,
        })
    }

    /// Whether the allow-list admits this host.
    ///
    /// An empty pattern set admits every host.
    pub fn allowed(&self, host: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        self.patterns.iter().any(|pattern| match pattern {
            HostPattern::Literal(literal) => literal.eq_ignore_ascii_case(host),
            HostPattern::Wildcard(regex) => regex.is_match(host),
        })
    }

    /// Resolve the host and reject it if any address is non-public.
    ///
    /// One private address among otherwise-public results rejects the
    /// whole target. Resolution failure is an error, never an allow.
    pub async fn validate_public(&self, host: &str) -> Result<(), GatewayError> {
        if !self.deny_private_ips {
            return Ok(());
        }

        // IPv6 URL hosts arrive bracketed; the resolver wants them bare.
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let addrs = lookup_host((host, 80)).await.map_err(|e| {
            GatewayError::Internal(anyhow::anyhow!("dns lookup failed for {host}: {e}"))
        })?;

        let mut resolved_any = false;
        for addr in addrs {
            resolved_any = true;
            let ip = addr.ip();
            if is_denied(ip) {
                return Err(GatewayError::Security(format!(
                    "{host} resolves to non-public address {ip}"
                )));
            }
        }
        if !resolved_any {
            return Err(GatewayError::Internal(anyhow::anyhow!(
                "dns lookup for {host} returned no addresses"
            )));
        }
        Ok(())
    }
}

/// Compile one allow-list pattern.
///
/// Patterns without `*` match literally. In a wildcard pattern every
/// regex metacharacter is escaped and only the first `*` becomes "match
/// anything"; later stars stay literal.
fn compile_pattern(pattern: &str) -> anyhow::Result<HostPattern> {
    match pattern.find('*') {
        None => Ok(HostPattern::Literal(pattern.to_string())),
        Some(idx) => {
            let head = &pattern[..idx];
            let tail = &pattern[idx + 1..];
            let expr = format!("(?i)^{}.*{}$", regex::escape(head), regex::escape(tail));
            let regex = Regex::new(&expr)
                .with_context(|| format!("invalid allow-list pattern: {pattern}"))?;
            Ok(HostPattern::Wildcard(regex))
        }
    }
}

fn is_denied(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn policy(patterns: &[&str]) -> HostPolicy {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        HostPolicy::new(&patterns, true).unwrap()
    }

    #[test]
    fn empty_pattern_set_allows_everything() {
        let policy = policy(&[]);
        assert!(policy.allowed("example.com"));
        assert!(policy.allowed("anything.at.all"));
    }

    #[test]
    fn literal_pattern_matches_case_insensitively_in_full() {
        let policy = policy(&["Example.COM"]);
        assert!(policy.allowed("example.com"));
        assert!(policy.allowed("EXAMPLE.com"));
        assert!(!policy.allowed("sub.example.com"));
        assert!(!policy.allowed("example.com.evil.com"));
    }

    #[test]
    fn wildcard_prefix_pattern() {
        let policy = policy(&["*.example.com"]);
        assert!(policy.allowed("a.example.com"));
        assert!(policy.allowed("deep.sub.example.com"));
        assert!(!policy.allowed("example.com"));
        assert!(!policy.allowed("evil.com"));
        assert!(!policy.allowed("example.com.evil.com"));
    }

    #[test]
    fn wildcard_does_not_leak_regex_metacharacters() {
        // The dot must stay literal: "aXexample.com" must not match.
        let policy = policy(&["*.example.com"]);
        assert!(!policy.allowed("aXexampleYcom"));
    }

    #[test]
    fn multiple_patterns_any_match_wins() {
        let policy = policy(&["a.com", "*.b.com"]);
        assert!(policy.allowed("a.com"));
        assert!(policy.allowed("x.b.com"));
        assert!(!policy.allowed("b.com"));
    }

    #[test]
    fn denied_ranges() {
        assert!(is_denied(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert!(is_denied(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_denied(IpAddr::V4(Ipv4Addr::new(172, 31, 255, 255))));
        assert!(is_denied(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(is_denied(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(is_denied(IpAddr::V4(Ipv4Addr::new(169, 254, 0, 1))));
        assert!(is_denied(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_denied("fe80::1".parse().unwrap()));

        assert!(!is_denied(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
        assert!(!is_denied(IpAddr::V4(Ipv4Addr::new(172, 32, 0, 1))));
        assert!(!is_denied("2606:2800:220:1::1".parse().unwrap()));
    }

    #[tokio::test]
    async fn validate_public_skipped_when_disabled() {
        let policy = HostPolicy::new(&[], false).unwrap();
        // No resolution happens at all, even for a host that cannot exist.
        assert!(policy.validate_public("definitely.invalid").await.is_ok());
    }

    #[tokio::test]
    async fn validate_public_rejects_loopback_literal() {
        let policy = HostPolicy::new(&[], true).unwrap();
        let err = policy.validate_public("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Security(_)));
    }

    #[tokio::test]
    async fn validate_public_rejects_private_literal() {
        let policy = HostPolicy::new(&[], true).unwrap();
        let err = policy.validate_public("10.0.0.5").await.unwrap_err();
        assert!(matches!(err, GatewayError::Security(_)));
    }

    #[tokio::test]
    async fn validate_public_rejects_bracketed_v6_loopback() {
        let policy = HostPolicy::new(&[], true).unwrap();
        let err = policy.validate_public("[::1]").await.unwrap_err();
        assert!(matches!(err, GatewayError::Security(_)));
    }

    #[tokio::test]
    async fn resolution_failure_is_an_error_not_an_allow() {
        let policy = HostPolicy::new(&[], true).unwrap();
        let err = policy
            .validate_public("does-not-exist.invalid")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }
}
