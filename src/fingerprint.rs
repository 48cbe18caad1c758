//! Content-based posting fingerprint (spec §3, §8 "Fingerprint determinism").
//!
//! Mirrors `intelligent-crawler::types::ContentHash`: a newtype over a
//! hex-encoded SHA-256 digest with a constructor that owns the input
//! normalization, so callers can never accidentally hash un-normalized text.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::text;

/// 256-bit content hash used as the posting dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Derive a fingerprint per spec §3: prefer `(source, external_id)` when
    /// `external_id` is present and non-empty, otherwise fall back to
    /// `(source, normalized_title, normalized_company, normalized_location)`.
    /// Components are case-folded and whitespace-normalized before hashing;
    /// the inputs passed in should already be whitespace-normalized (as
    /// produced by [`text::normalize`]) — this function applies case-folding
    /// on top.
    pub fn compute(
        source: &str,
        external_id: Option<&str>,
        title: &str,
        company: &str,
        location: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        match external_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                hasher.update(b"id\0");
                hasher.update(text::fold_case(source).as_bytes());
                hasher.update(b"\0");
                hasher.update(text::fold_case(id).as_bytes());
            }
            None => {
                hasher.update(b"nat\0");
                hasher.update(text::fold_case(source).as_bytes());
                hasher.update(b"\0");
                hasher.update(text::fold_case(title).as_bytes());
                hasher.update(b"\0");
                hasher.update(text::fold_case(company).as_bytes());
                hasher.update(b"\0");
                hasher.update(text::fold_case(location).as_bytes());
            }
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let decoded = hex::decode(s)?;
        let mut bytes = [0u8; 32];
        if decoded.len() == 32 {
            bytes.copy_from_slice(&decoded);
        } else {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Fingerprint(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_with_external_id() {
        let a = Fingerprint::compute("greenhouse", Some("abc-123"), "Engineer", "Acme", "Remote");
        let b = Fingerprint::compute("greenhouse", Some("abc-123"), "Different Title", "Acme", "Onsite");
        assert_eq!(a, b, "external_id alone should determine the fingerprint");
    }

    #[test]
    fn deterministic_without_external_id() {
        let a = Fingerprint::compute("lever", None, "Senior Engineer", "Acme", "Remote");
        let b = Fingerprint::compute("lever", None, "senior   engineer", "ACME", "remote");
        assert_eq!(a, b, "natural key should be case/whitespace insensitive");
    }

    #[test]
    fn distinct_sources_differ() {
        let a = Fingerprint::compute("lever", None, "Engineer", "Acme", "Remote");
        let b = Fingerprint::compute("greenhouse", None, "Engineer", "Acme", "Remote");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_external_id_falls_back_to_natural_key() {
        let a = Fingerprint::compute("lever", Some(""), "Engineer", "Acme", "Remote");
        let b = Fingerprint::compute("lever", None, "Engineer", "Acme", "Remote");
        assert_eq!(a, b);
    }

    #[test]
    fn hex_round_trips() {
        let a = Fingerprint::compute("lever", Some("xyz"), "", "", "");
        let hex = a.to_hex();
        let b = Fingerprint::from_hex(&hex).unwrap();
        assert_eq!(a, b);
    }
}
