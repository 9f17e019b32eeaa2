//! Tenant identity derived from the request host

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case policy for tenant identifiers
///
/// Applied identically to storage keys at build time and to lookup keys
/// derived from hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantCase {
    /// ASCII-lowercase every identifier (hosts are case-insensitive)
    #[default]
    Insensitive,
    /// Keep identifiers byte-for-byte
    Sensitive,
}

impl TenantCase {
    fn apply(self, label: &str) -> String {
        match self {
            Self::Insensitive => label.to_ascii_lowercase(),
            Self::Sensitive => label.to_string(),
        }
    }
}

/// Tenant identifier: the leftmost label of a host name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(String);

impl TenantId {
    /// Parse a bare tenant name (a credential entry name)
    ///
    /// Returns `None` unless the name is non-empty and made only of ASCII
    /// alphanumerics, `-` and `_`.
    pub fn parse(name: &str, case: TenantCase) -> Option<Self> {
        if !is_valid_label(name) {
            return None;
        }
        Some(Self(case.apply(name)))
    }

    /// Derive the tenant from a host or authority value
    ///
    /// `acme.example.com`, `acme.example.com:8443` and `ACME.other.net`
    /// (under [`TenantCase::Insensitive`]) all derive `acme`. Whitespace is
    /// not trimmed; a host that carries any yields `None`.
    pub fn from_host(host: &str, case: TenantCase) -> Option<Self> {
        let name = strip_port(host)?;
        let first = name.split('.').next()?;
        Self::parse(first, case)
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remove a trailing `:port` and IPv6 brackets
fn strip_port(host: &str) -> Option<&str> {
    if let Some(rest) = host.strip_prefix('[') {
        let end = rest.find(']')?;
        return Some(&rest[..end]);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => Some(name),
        Some(_) => None,
        None => Some(host),
    }
}

#[inline]
fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
