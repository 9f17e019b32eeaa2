//! Authorization configuration

use crate::{AuthzError, Result, Scheme, TenantCase};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete authorization configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Credential source settings
    pub source: SourceConfig,
    /// Store settings
    pub store: StoreConfig,
    /// Per-request decision settings
    pub decision: DecisionConfig,
}

/// Credential source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding one file per tenant
    pub directory: PathBuf,
    /// Drop a single trailing `\n` or `\r\n` from each record
    pub strip_trailing_newline: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/etc/tenant-authz/credentials"),
            strip_trailing_newline: true,
        }
    }
}

/// Store settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Verification scheme for every record in the store
    pub scheme: Scheme,
    /// Case policy for tenant identifiers
    pub tenant_case: TenantCase,
    /// Refuse to build a store without tenants
    pub require_tenants: bool,
}

/// Per-request decision settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Header carrying the credential (matched case-insensitively)
    pub credential_header: String,
    /// Trim ASCII whitespace around the presented credential
    pub trim_credential: bool,
    /// Authentication scheme named in the challenge
    pub challenge_scheme: String,
    /// Realm named in the challenge
    pub realm: String,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            credential_header: "authorization".to_string(),
            trim_credential: false,
            challenge_scheme: "Basic".to_string(),
            realm: "User Visible Realm".to_string(),
        }
    }
}

impl DecisionConfig {
    /// `WWW-Authenticate` value sent with every denial
    pub fn challenge(&self) -> String {
        format!("{} realm=\"{}\"", self.challenge_scheme, self.realm)
    }

    /// Check settings that would make every decision meaningless
    pub fn validate(&self) -> Result<()> {
        if self.credential_header.trim().is_empty() {
            return Err(AuthzError::Config("credential_header must not be empty".into()));
        }
        if self.challenge_scheme.trim().is_empty() {
            return Err(AuthzError::Config("challenge_scheme must not be empty".into()));
        }
        if self.realm.contains('"') {
            return Err(AuthzError::Config("realm must not contain '\"'".into()));
        }
        Ok(())
    }
}

impl AuthzConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| AuthzError::Config(e.to_string()))?;
        config.decision.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthzConfig::default();
        assert_eq!(config.store.scheme, Scheme::Plain);
        assert_eq!(config.store.tenant_case, TenantCase::Insensitive);
        assert!(!config.store.require_tenants);
        assert!(config.source.strip_trailing_newline);
        assert_eq!(config.decision.credential_header, "authorization");
        assert_eq!(config.decision.challenge(), "Basic realm=\"User Visible Realm\"");
    }

    #[test]
    fn test_partial_json() {
        let config = AuthzConfig::from_json(
            r#"{
                "source": { "directory": "/run/secrets/tenants" },
                "store": { "scheme": "sha256", "tenant_case": "sensitive" },
                "decision": { "realm": "tenants" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.source.directory, PathBuf::from("/run/secrets/tenants"));
        assert!(config.source.strip_trailing_newline);
        assert_eq!(config.store.scheme, Scheme::Sha256);
        assert_eq!(config.store.tenant_case, TenantCase::Sensitive);
        assert_eq!(config.decision.challenge(), "Basic realm=\"tenants\"");
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(matches!(
            AuthzConfig::from_json(r#"{ "store": { "scheme": "md5" } }"#),
            Err(AuthzError::Config(_))
        ));
        assert!(matches!(
            AuthzConfig::from_json(r#"{ "decision": { "credential_header": " " } }"#),
            Err(AuthzError::Config(_))
        ));
        assert!(matches!(
            AuthzConfig::from_json(r#"{ "decision": { "realm": "a\"b" } }"#),
            Err(AuthzError::Config(_))
        ));
    }
}
