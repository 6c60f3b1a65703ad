//! Cross-cycle deduplication of incident records.
//!
//! The seen-set grows for the lifetime of the instance and is never evicted.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

use crate::ingest::types::IncidentRecord;

/// Stable identity of a record, derived from `(title, source_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(title: &str, source_name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        // unit separator keeps ("ab","c") and ("a","bc") apart
        hasher.update([0x1f]);
        hasher.update(source_name.as_bytes());
        let digest = hasher.finalize();

        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        Self(out)
    }

    pub fn of(record: &IncidentRecord) -> Self {
        Self::new(&record.title, &record.source_name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12])
    }
}

#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<DedupKey>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a key is offered and records it;
    /// every later call with the same `(title, source_name)` returns `false`.
    pub fn is_new(&mut self, record: &IncidentRecord) -> bool {
        self.seen.insert(DedupKey::of(record))
    }

    /// Read-only membership check; does not record anything.
    pub fn has_seen(&self, record: &IncidentRecord) -> bool {
        self.seen.contains(&DedupKey::of(record))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
