//! Tenant AuthZ - Per-tenant credential checks for an ext_authz decision point
//!
//! The proxy asks one question per request: does the presented credential
//! belong to the tenant named by the leftmost label of the target host?
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  load   ┌─────────────────┐  snapshot  ┌───────────────┐
//! │ CredentialSource │───────►│ CredentialStore │──────────►│ DecisionPoint │──► Allow / Deny
//! │  (directory tree)│         │ (behind ArcSwap)│            │  (per request)│
//! └──────────────────┘         └─────────────────┘            └───────────────┘
//! ```
//!
//! The store is built once, published through a [`StoreHandle`], and read
//! without locks. A reload builds a complete replacement and swaps it in.

#![warn(missing_docs)]

pub mod config;
pub mod decision;
pub mod source;
pub mod stats;
pub mod store;
pub mod tenant;
pub mod verifier;

pub use config::{AuthzConfig, DecisionConfig, SourceConfig, StoreConfig};
pub use decision::{AuthorizationDecision, DecisionPoint, DenyReason, Denial, RequestView};
pub use source::{CredentialSource, DirectorySource, MemorySource, SourceSnapshot};
pub use stats::DecisionStats;
pub use store::{CredentialStore, StoreHandle, Verdict};
pub use tenant::{TenantCase, TenantId};
pub use verifier::{CredentialRecord, Scheme};

use std::path::PathBuf;
use thiserror::Error;

/// Tenant AuthZ errors
///
/// Only bootstrap and load conditions are errors. Per-request outcomes are
/// always an [`AuthorizationDecision`].
#[derive(Error, Debug)]
pub enum AuthzError {
    /// Credential source cannot be traversed
    #[error("credential source unreadable: {path}: {source}")]
    SourceUnreadable {
        /// Root of the source
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// One credential entry could not be used; the rest of the load continues
    #[error("malformed credential entry {entry}: {reason}")]
    MalformedEntry {
        /// Entry name as found in the source
        entry: String,
        /// Why the entry was skipped
        reason: String,
    },

    /// Store holds no tenants but the configuration requires at least one
    #[error("credential store is empty")]
    EmptyStore,

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    pub(crate) fn malformed(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEntry {
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for tenant authz
pub type Result<T> = std::result::Result<T, AuthzError>;
