//! Fingerprints of resolved graphs.
//!
//! A fingerprint is a SHA-256 over a domain tag followed by length-prefixed
//! JSON records, one per variant. Edge UUIDs and thread scheduling never
//! reach the records, so serial and parallel runs of the same graph agree.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Tag mixed in ahead of the records. Bump the version when the record
/// layout changes.
pub const RESOLVED_GRAPH_DOMAIN: &str = "mutagraph/resolved-graph/v1";

/// SHA-256 digest of a resolved graph. Displays as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Incremental fingerprint builder.
pub struct Fingerprinter {
    hasher: Sha256,
    records: u64,
}

impl Fingerprinter {
    pub fn new(domain: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((domain.len() as u64).to_le_bytes());
        hasher.update(domain.as_bytes());
        Self { hasher, records: 0 }
    }

    /// Append one record. The length prefix keeps `["ab"], ["c"]` and
    /// `["a"], ["bc"]` apart.
    pub fn record<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let json = serde_json::to_vec(value)?;
        self.hasher.update((json.len() as u64).to_le_bytes());
        self.hasher.update(&json);
        self.records += 1;
        Ok(())
    }

    pub fn finish(self) -> Fingerprint {
        let mut hasher = self.hasher;
        hasher.update(self.records.to_le_bytes());
        Fingerprint(hasher.finalize().into())
    }
}
