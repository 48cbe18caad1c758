//! SSRF-safe URL validation applied before every outbound fetch
//! (SPEC_FULL §9 "supplemented features").
//!
//! Grounded on `extraction::traits::crawler::UrlValidator`: a scheme
//! allow-list, a blocked-hostname set, and a blocked-CIDR list, with an
//! optional DNS-rebind check that resolves the host and re-checks the CIDRs.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::error::SecurityError;

#[derive(Debug, Clone)]
pub struct UrlGuard {
    allowed_schemes: HashSet<String>,
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<ipnet::IpNet>,
    allowed_hosts: HashSet<String>,
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlGuard {
    pub fn new() -> Self {
        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: [
                "localhost",
                "127.0.0.1",
                "::1",
                "[::1]",
                "0.0.0.0",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs: vec![
                "10.0.0.0/8".parse().unwrap(),
                "172.16.0.0/12".parse().unwrap(),
                "192.168.0.0/16".parse().unwrap(),
                "169.254.0.0/16".parse().unwrap(),
                "127.0.0.0/8".parse().unwrap(),
                "::1/128".parse().unwrap(),
                "fc00::/7".parse().unwrap(),
                "fe80::/10".parse().unwrap(),
            ],
            allowed_hosts: HashSet::new(),
        }
    }

    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    /// Validate scheme, host, and (for literal IP hosts) CIDR membership.
    pub fn validate(&self, url: &str) -> Result<(), SecurityError> {
        let parsed = url::Url::parse(url)?;

        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed.host_str().ok_or(SecurityError::NoHost)?;

        if self.allowed_hosts.contains(host) {
            return Ok(());
        }

        if self.blocked_hosts.contains(host) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            for cidr in &self.blocked_cidrs {
                if cidr.contains(&ip) {
                    return Err(SecurityError::BlockedCidr(ip.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Validate, then resolve DNS and re-check the blocked CIDRs against the
    /// addresses a hostname actually resolves to (catches DNS rebinding).
    pub async fn validate_with_dns(&self, url: &str) -> Result<(), SecurityError> {
        self.validate(url)?;

        let parsed = url::Url::parse(url)?;
        let host = parsed.host_str().ok_or(SecurityError::NoHost)?;

        if self.allowed_hosts.contains(host) || host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        let port = parsed.port().unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });

        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in addrs {
            let ip = addr.ip();
            for cidr in &self.blocked_cidrs {
                if cidr.contains(&ip) {
                    return Err(SecurityError::DnsResolution(format!(
                        "{host} resolved to blocked ip {ip}"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_localhost() {
        let guard = UrlGuard::new();
        assert!(guard.validate("http://localhost/").is_err());
        assert!(guard.validate("http://127.0.0.1/").is_err());
    }

    #[test]
    fn blocks_private_ips() {
        let guard = UrlGuard::new();
        assert!(guard.validate("http://10.0.0.1/").is_err());
        assert!(guard.validate("http://192.168.1.1/").is_err());
    }

    #[test]
    fn blocks_non_http_schemes() {
        let guard = UrlGuard::new();
        assert!(guard.validate("file:///etc/passwd").is_err());
    }

    #[test]
    fn allows_public_urls() {
        let guard = UrlGuard::new();
        assert!(guard.validate("https://boards.example.com/jobs").is_ok());
    }

    #[test]
    fn allowed_hosts_bypass_block_list() {
        let guard = UrlGuard::new().allow_host("localhost");
        assert!(guard.validate("http://localhost/").is_ok());
    }
}
