//! Credential verification schemes
//!
//! One scheme is chosen per store instance and applied to every tenant.

use crate::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Verification scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Record holds the shared secret; constant-time byte equality
    #[default]
    Plain,
    /// Record holds the hex SHA-256 digest of the secret
    Sha256,
}

/// Prepared secret material for one tenant
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialRecord {
    /// Raw shared secret
    Plain(Vec<u8>),
    /// SHA-256 digest of the secret
    Sha256([u8; 32]),
}

// Secrets never reach logs through Debug.
impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("CredentialRecord::Plain(<redacted>)"),
            Self::Sha256(_) => f.write_str("CredentialRecord::Sha256(<redacted>)"),
        }
    }
}

impl Scheme {
    /// Turn raw record bytes into a [`CredentialRecord`]
    ///
    /// `entry` only names the record in the returned error.
    pub fn prepare(self, entry: &str, raw: &[u8]) -> Result<CredentialRecord> {
        if raw.is_empty() {
            return Err(AuthzError::malformed(entry, "empty record"));
        }
        match self {
            Self::Plain => Ok(CredentialRecord::Plain(raw.to_vec())),
            Self::Sha256 => {
                let text = std::str::from_utf8(raw)
                    .map_err(|_| AuthzError::malformed(entry, "digest is not UTF-8"))?;
                let mut digest = [0u8; 32];
                hex::decode_to_slice(text.trim(), &mut digest).map_err(|e| {
                    AuthzError::malformed(entry, format!("invalid sha256 digest: {e}"))
                })?;
                Ok(CredentialRecord::Sha256(digest))
            }
        }
    }
}

impl CredentialRecord {
    /// Check a presented credential against this record
    ///
    /// Runs in time independent of where the first differing byte is.
    #[inline]
    pub fn verify(&self, presented: &[u8]) -> bool {
        match self {
            Self::Plain(secret) => secret.as_slice().ct_eq(presented).into(),
            Self::Sha256(digest) => {
                let hashed = Sha256::digest(presented);
                digest.as_slice().ct_eq(hashed.as_slice()).into()
            }
        }
    }

    /// Scheme this record was prepared with
    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Plain(_) => Scheme::Plain,
            Self::Sha256(_) => Scheme::Sha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_hex(secret: &str) -> String {
        hex::encode(Sha256::digest(secret.as_bytes()))
    }

    #[test]
    fn test_plain_verify() {
        let record = Scheme::Plain.prepare("acme", b"secretA").unwrap();
        assert!(record.verify(b"secretA"));
        assert!(!record.verify(b"secretB"));
        assert!(!record.verify(b"secretA "));
        assert!(!record.verify(b"SECRETA"));
        assert!(!record.verify(b""));
    }

    #[test]
    fn test_sha256_verify() {
        let record = Scheme::Sha256.prepare("acme", sha256_hex("secretA").as_bytes()).unwrap();
        assert_eq!(record.scheme(), Scheme::Sha256);
        assert!(record.verify(b"secretA"));
        assert!(!record.verify(b"secretB"));
        // The stored digest is not itself a credential
        assert!(!record.verify(sha256_hex("secretA").as_bytes()));
    }

    #[test]
    fn test_sha256_accepts_uppercase_hex() {
        let upper = sha256_hex("secretA").to_uppercase();
        let record = Scheme::Sha256.prepare("acme", upper.as_bytes()).unwrap();
        assert!(record.verify(b"secretA"));
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            Scheme::Plain.prepare("acme", b""),
            Err(AuthzError::MalformedEntry { .. })
        ));
        assert!(matches!(
            Scheme::Sha256.prepare("acme", b"not-hex"),
            Err(AuthzError::MalformedEntry { .. })
        ));
        assert!(matches!(
            Scheme::Sha256.prepare("acme", b"abcd"),
            Err(AuthzError::MalformedEntry { .. })
        ));
        assert!(matches!(
            Scheme::Sha256.prepare("acme", &[0xff, 0xfe]),
            Err(AuthzError::MalformedEntry { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let record = Scheme::Plain.prepare("acme", b"secretA").unwrap();
        assert!(!format!("{record:?}").contains("secretA"));
    }
}
