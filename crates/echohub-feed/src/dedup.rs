use std::collections::HashSet;

use echohub_core::EchoKey;

/// Append-only set of every echo identity emitted this session.
#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<EchoKey>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, key: &EchoKey) -> bool {
        self.seen.contains(key)
    }

    /// Records `key`. Returns true when it was not seen before.
    pub fn record(&mut self, key: EchoKey) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
