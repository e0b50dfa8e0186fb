//! Cache keys: content digests of an artifact

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Uppercase hex digests identifying a sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    /// Cache identity
    pub sha1: String,
    /// Checked against the cached row to reject SHA-1 collisions
    pub sha256: String,
}

impl ArtifactKey {
    pub fn of_bytes(data: &[u8]) -> Self {
        Self {
            sha1: format!("{:X}", Sha1::digest(data)),
            sha256: format!("{:X}", Sha256::digest(data)),
        }
    }

    /// Whether a cached digest set describes this artifact.
    pub fn matches(&self, sha1: &str, sha256: &str) -> bool {
        self.sha1.eq_ignore_ascii_case(sha1)
            && (sha256.is_empty() || self.sha256.eq_ignore_ascii_case(sha256))
    }
}
