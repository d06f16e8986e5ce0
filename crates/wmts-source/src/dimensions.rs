//! Dimension state and cache-key derivation.
//!
//! A WMTS layer can vary along named dimensions (TIME, ELEVATION, ...).
//! The current dimension values partition the external tile cache, so
//! every change must republish a deterministic key derived from them.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Separator between `name-value` entries in the derived key.
const ENTRY_SEPARATOR: char = '/';

/// Separator between a dimension name and its value within one entry.
const VALUE_SEPARATOR: char = '-';

/// The mutable dimension mapping of one tile source.
///
/// Updates merge copy-on-write: readers holding a [`DimensionSet::snapshot`]
/// keep observing the fully-old mapping, and the derived key is recomputed
/// before an update returns, so the key can never be observed stale
/// relative to the mapping it was derived from.
#[derive(Debug, Clone)]
pub struct DimensionSet {
    values: Arc<BTreeMap<String, String>>,
    key: String,
}

impl DimensionSet {
    /// Create from initial dimension values.
    pub fn new(initial: BTreeMap<String, String>) -> Self {
        let key = derive_key(&initial);
        Self {
            values: Arc::new(initial),
            key,
        }
    }

    /// Merge a patch into the mapping: existing keys are overwritten, new
    /// keys are added, nothing is ever removed.
    pub fn update(&mut self, patch: BTreeMap<String, String>) {
        let mut next = (*self.values).clone();
        next.extend(patch);
        self.key = derive_key(&next);
        self.values = Arc::new(next);
    }

    /// The current value of one dimension.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// A shareable snapshot of the current mapping.
    pub fn snapshot(&self) -> Arc<BTreeMap<String, String>> {
        Arc::clone(&self.values)
    }

    /// The cache-partitioning key for the current dimension combination.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl Default for DimensionSet {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

/// Join the mapping into one deterministic key.
///
/// Entries enumerate in the map's stable order as `name-value`, joined
/// with `/`. Two distinct value combinations therefore derive distinct
/// keys as long as values avoid the separators, which dimension values
/// (timestamps, level labels) do.
fn derive_key(values: &BTreeMap<String, String>) -> String {
    let mut key = String::new();
    for (name, value) in values {
        if !key.is_empty() {
            key.push(ENTRY_SEPARATOR);
        }
        key.push_str(name);
        key.push(VALUE_SEPARATOR);
        key.push_str(value);
    }
    key
}
