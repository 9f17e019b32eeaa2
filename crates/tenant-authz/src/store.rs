//! Credential Store with lock-free hot-swapping
//!
//! [`CredentialStore`] is immutable once built. [`StoreHandle`] publishes one
//! instance at a time; a reload builds the replacement completely and then
//! swaps the pointer, so a reader sees either the old or the new mapping.

use crate::source::{CredentialSource, SourceSnapshot};
use crate::{AuthzError, CredentialRecord, Result, Scheme, StoreConfig, TenantCase, TenantId};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a lookup, for operator logs only
///
/// Callers outside the decision path should use
/// [`CredentialStore::validate`], which collapses both failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Credential belongs to the tenant
    Valid,
    /// Tenant not present in the store
    UnknownTenant,
    /// Tenant present, credential wrong
    Mismatch,
}

impl Verdict {
    /// True only for [`Verdict::Valid`]
    #[inline]
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Immutable tenant to credential mapping
#[derive(Debug)]
pub struct CredentialStore {
    records: HashMap<TenantId, CredentialRecord>,
    scheme: Scheme,
    tenant_case: TenantCase,
}

impl CredentialStore {
    /// Build from a source snapshot
    ///
    /// Entries the scheme cannot prepare, names that are not valid tenant
    /// identifiers, and names that collide after case normalization are
    /// skipped with a warning.
    pub fn build(snapshot: SourceSnapshot, config: &StoreConfig) -> Result<Self> {
        let mut records: HashMap<TenantId, CredentialRecord> = HashMap::new();
        let mut owners: HashMap<TenantId, String> = HashMap::new();
        let mut ambiguous: Vec<TenantId> = Vec::new();
        let mut skipped = 0usize;

        for (name, raw) in snapshot.entries {
            let Some(tenant) = TenantId::parse(&name, config.tenant_case) else {
                warn!("Skipping credential entry: {}", AuthzError::malformed(&name, "not a valid tenant name"));
                skipped += 1;
                continue;
            };

            let record = match config.scheme.prepare(&name, &raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping credential entry: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            if let Some(other) = owners.get(&tenant) {
                warn!(
                    "Skipping credential entry: {}",
                    AuthzError::malformed(&name, format!("tenant {tenant} also defined by {other}"))
                );
                ambiguous.push(tenant);
                skipped += 1;
                continue;
            }
            owners.insert(tenant.clone(), name);
            records.insert(tenant, record);
        }

        for tenant in ambiguous {
            if records.remove(&tenant).is_some() {
                skipped += 1;
            }
        }

        if records.is_empty() && config.require_tenants {
            return Err(AuthzError::EmptyStore);
        }

        info!(
            "Credential store built: {} tenants, scheme={:?}, {} entries skipped",
            records.len(),
            config.scheme,
            skipped + snapshot.skipped.len()
        );

        Ok(Self {
            records,
            scheme: config.scheme,
            tenant_case: config.tenant_case,
        })
    }

    /// Load a source and build from it
    pub fn load(source: &dyn CredentialSource, config: &StoreConfig) -> Result<Self> {
        Self::build(source.load()?, config)
    }

    /// Store that denies everything
    pub fn empty(config: &StoreConfig) -> Self {
        Self {
            records: HashMap::new(),
            scheme: config.scheme,
            tenant_case: config.tenant_case,
        }
    }

    /// Is `presented` the credential of `tenant`?
    ///
    /// Unknown tenant and wrong credential are indistinguishable here.
    #[inline]
    pub fn validate(&self, tenant: &TenantId, presented: &[u8]) -> bool {
        self.check(tenant, presented).is_valid()
    }

    /// Same lookup as [`validate`](Self::validate), keeping the failure kind
    #[inline]
    pub fn check(&self, tenant: &TenantId, presented: &[u8]) -> Verdict {
        match self.records.get(tenant) {
            None => Verdict::UnknownTenant,
            Some(record) if record.verify(presented) => Verdict::Valid,
            Some(_) => Verdict::Mismatch,
        }
    }

    /// Case policy used for keys
    pub fn tenant_case(&self) -> TenantCase {
        self.tenant_case
    }

    /// Verification scheme
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Number of tenants
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when every request will be denied
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Published credential store
pub struct StoreHandle {
    /// Current store (atomically swappable)
    current: ArcSwap<CredentialStore>,
    /// Incremented on every publish
    version: AtomicU64,
}

impl StoreHandle {
    /// Publish an initial store
    pub fn new(store: CredentialStore) -> Self {
        Self {
            current: ArcSwap::from_pointee(store),
            version: AtomicU64::new(1),
        }
    }

    /// Current store; stays valid for the holder across later swaps
    #[inline]
    pub fn snapshot(&self) -> Arc<CredentialStore> {
        self.current.load_full()
    }

    /// Current version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Atomically replace the store and return the new version
    pub fn publish(&self, store: CredentialStore) -> u64 {
        self.current.store(Arc::new(store));
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Rebuild from `source` and publish
    ///
    /// On error the previous store stays published.
    pub fn reload(&self, source: &dyn CredentialSource, config: &StoreConfig) -> Result<u64> {
        let store = CredentialStore::load(source, config)?;
        let tenants = store.len();
        let version = self.publish(store);
        info!("Credential store reloaded: version={} tenants={}", version, tenants);
        Ok(version)
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("version", &self.version())
            .field("tenants", &self.current.load().len())
            .finish()
    }
}
