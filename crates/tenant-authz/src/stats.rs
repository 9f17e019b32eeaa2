//! Lock-free decision counters

use crate::DenyReason;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct DecisionCounters {
    total: AtomicU64,
    allowed: AtomicU64,
    missing_host: AtomicU64,
    missing_authorization: AtomicU64,
    invalid_authorization: AtomicU64,
    invalid_request: AtomicU64,
}

impl DecisionCounters {
    #[inline(always)]
    pub(crate) fn allow(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(crate) fn deny(&self, reason: DenyReason) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let counter = match reason {
            DenyReason::MissingHost => &self.missing_host,
            DenyReason::MissingAuthorization => &self.missing_authorization,
            DenyReason::InvalidAuthorization => &self.invalid_authorization,
            DenyReason::InvalidRequest => &self.invalid_request,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, store_version: u64, tenants: usize) -> DecisionStats {
        DecisionStats {
            total: self.total.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            denied_missing_host: self.missing_host.load(Ordering::Relaxed),
            denied_missing_authorization: self.missing_authorization.load(Ordering::Relaxed),
            denied_invalid_authorization: self.invalid_authorization.load(Ordering::Relaxed),
            denied_invalid_request: self.invalid_request.load(Ordering::Relaxed),
            store_version,
            tenants,
        }
    }
}

/// Decision point statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionStats {
    /// Decisions rendered
    pub total: u64,
    /// Allowed requests
    pub allowed: u64,
    /// Denied: no usable host
    pub denied_missing_host: u64,
    /// Denied: no credential header
    pub denied_missing_authorization: u64,
    /// Denied: unknown tenant or wrong credential
    pub denied_invalid_authorization: u64,
    /// Denied: proxy sent no HTTP attributes
    pub denied_invalid_request: u64,
    /// Published store version
    pub store_version: u64,
    /// Tenants in the published store
    pub tenants: usize,
}

impl DecisionStats {
    /// All denials
    pub fn denied(&self) -> u64 {
        self.denied_missing_host
            + self.denied_missing_authorization
            + self.denied_invalid_authorization
            + self.denied_invalid_request
    }
}
