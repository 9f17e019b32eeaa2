//! Authorization Decision Procedure
//!
//! One linear pass per request: host, tenant, credential, validate. Every
//! failure becomes the same 401 denial with a realm challenge; the precise
//! cause only reaches operator logs.

use crate::stats::DecisionCounters;
use crate::{DecisionConfig, DecisionStats, Result, StoreHandle, TenantId, Verdict};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP status attached to every denial
pub const DENY_HTTP_STATUS: u16 = 401;

/// Header carrying the realm challenge
pub const CHALLENGE_HEADER: &str = "WWW-Authenticate";

/// The parts of one inbound request the decision needs
#[derive(Debug, Clone, Default)]
pub struct RequestView<'a> {
    host: Option<&'a str>,
    headers: Vec<(&'a str, &'a str)>,
}

impl<'a> RequestView<'a> {
    /// View with the given target host
    pub fn new(host: Option<&'a str>) -> Self {
        Self {
            host,
            headers: Vec::new(),
        }
    }

    /// Append one header, keeping arrival order
    pub fn with_header(mut self, name: &'a str, value: &'a str) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Append headers, keeping arrival order
    pub fn with_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.headers.extend(headers);
        self
    }

    /// Target host
    pub fn host(&self) -> Option<&'a str> {
        self.host
    }

    /// First value of header `name` (ASCII case-insensitive)
    ///
    /// Later occurrences are ignored.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// No usable host or authority
    MissingHost,
    /// Credential header absent or empty
    MissingAuthorization,
    /// Unknown tenant or wrong credential
    InvalidAuthorization,
    /// Proxy sent no HTTP request attributes
    InvalidRequest,
}

impl DenyReason {
    /// Stable reason string sent to the proxy
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingHost => "missing host",
            Self::MissingAuthorization => "missing authorization",
            Self::InvalidAuthorization => "invalid authorization",
            Self::InvalidRequest => "invalid request",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denial details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// Reason
    pub reason: DenyReason,
    /// HTTP status for the client
    pub http_status: u16,
    /// Headers for the client, in order
    pub headers: Vec<(String, String)>,
}

/// Result of one decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// Forward the request
    Allow,
    /// Reject the request
    Deny(Denial),
}

impl AuthorizationDecision {
    /// True for [`AuthorizationDecision::Allow`]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Denial reason, if denied
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(denial) => Some(denial.reason),
        }
    }
}

/// Decision point
///
/// Stateless per request apart from lock-free counters. Share behind an
/// `Arc` across handler tasks.
pub struct DecisionPoint {
    store: Arc<StoreHandle>,
    config: DecisionConfig,
    challenge: String,
    counters: DecisionCounters,
}

impl DecisionPoint {
    /// Create a decision point over a published store
    pub fn new(store: Arc<StoreHandle>, config: DecisionConfig) -> Result<Self> {
        config.validate()?;
        let challenge = config.challenge();
        Ok(Self {
            store,
            config,
            challenge,
            counters: DecisionCounters::default(),
        })
    }

    /// Decide one request
    pub fn decide(&self, request: &RequestView<'_>) -> AuthorizationDecision {
        // One snapshot per decision; a concurrent reload cannot tear it
        let store = self.store.snapshot();

        let Some(host) = request.host().filter(|h| !h.is_empty()) else {
            warn!("DENY: no host in request");
            return self.deny(DenyReason::MissingHost);
        };

        let Some(tenant) = TenantId::from_host(host, store.tenant_case()) else {
            warn!("DENY: no usable tenant label in host {:?}", host);
            return self.deny(DenyReason::MissingHost);
        };

        let credential = request
            .header(&self.config.credential_header)
            .map(|value| {
                if self.config.trim_credential {
                    value.trim_matches(|c: char| c.is_ascii_whitespace())
                } else {
                    value
                }
            })
            .filter(|value| !value.is_empty());

        let Some(credential) = credential else {
            debug!("DENY: tenant={} no {} header", tenant, self.config.credential_header);
            return self.deny(DenyReason::MissingAuthorization);
        };

        match store.check(&tenant, credential.as_bytes()) {
            Verdict::Valid => {
                debug!("ALLOW: tenant={}", tenant);
                self.counters.allow();
                AuthorizationDecision::Allow
            }
            Verdict::UnknownTenant => {
                warn!("DENY: tenant={} unknown tenant", tenant);
                self.deny(DenyReason::InvalidAuthorization)
            }
            Verdict::Mismatch => {
                warn!("DENY: tenant={} credential mismatch", tenant);
                self.deny(DenyReason::InvalidAuthorization)
            }
        }
    }

    /// Denial for a proxy payload without HTTP attributes
    pub fn deny_invalid_request(&self) -> AuthorizationDecision {
        warn!("DENY: check request carries no HTTP attributes");
        self.deny(DenyReason::InvalidRequest)
    }

    fn deny(&self, reason: DenyReason) -> AuthorizationDecision {
        self.counters.deny(reason);
        AuthorizationDecision::Deny(Denial {
            reason,
            http_status: DENY_HTTP_STATUS,
            headers: vec![(CHALLENGE_HEADER.to_string(), self.challenge.clone())],
        })
    }

    /// Published store handle
    pub fn store(&self) -> &Arc<StoreHandle> {
        &self.store
    }

    /// Get decision statistics
    pub fn stats(&self) -> DecisionStats {
        let store = self.store.snapshot();
        self.counters.snapshot(self.store.version(), store.len())
    }
}
