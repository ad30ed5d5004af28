//! Batch Fetcher - Turns a set of missing keys into one bulk read
//!
//! One `read_by_keys` request per call no matter how many keys, results
//! indexed by entity identity, absent keys silently dropped. Association rows
//! are read per chunk and grouped by source id; they are never cached, only
//! the target entities they point at are.

use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

use crate::config::AssociationFields;
use crate::error::PrefetchResult;
use crate::key::Key;
use crate::record::Record;
use crate::source::{AssociationSource, EntitySource};

/// Counters for the bulk reads a spec has issued
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// `read_by_keys` requests issued
    pub bulk_reads: usize,
    /// Distinct keys asked for across all bulk reads
    pub keys_requested: usize,
    /// Entities actually returned and indexed
    pub entities_fetched: usize,
    /// `read_rows` requests issued against the association source
    pub association_reads: usize,
    /// Association rows returned across all reads
    pub association_rows: usize,
}

impl fmt::Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bulk reads ({} keys, {} entities), {} association reads ({} rows)",
            self.bulk_reads,
            self.keys_requested,
            self.entities_fetched,
            self.association_reads,
            self.association_rows
        )
    }
}

/// Coordinates bulk reads for one relation spec
#[derive(Debug, Default)]
pub struct BatchFetcher {
    stats: FetchStats,
}

impl BatchFetcher {
    /// Resolve a set of missing keys through exactly one bulk read, returning
    /// the fetched entities indexed by identity. Keys the source cannot
    /// resolve are absent from the result, not errors.
    pub fn fetch_missing<R: Record>(
        &mut self,
        source: &dyn EntitySource<R>,
        keys: &HashSet<Key>,
    ) -> PrefetchResult<HashMap<Key, R>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let key_list: Vec<Key> = keys.iter().cloned().collect();
        let entities = source.read_by_keys(&key_list)?;
        self.stats.bulk_reads += 1;
        self.stats.keys_requested += key_list.len();

        let mut resolved = HashMap::with_capacity(entities.len());
        for entity in entities {
            match entity.identity() {
                Some(id) => {
                    resolved.insert(id, entity);
                }
                None => warn!("bulk read returned an entity without an identity; skipping"),
            }
        }
        self.stats.entities_fetched += resolved.len();
        Ok(resolved)
    }

    /// Read the association rows for a chunk's source ids through exactly one
    /// request, grouped by source id with row order preserved
    pub fn fetch_associations(
        &mut self,
        source: &dyn AssociationSource,
        fields: &AssociationFields,
        source_ids: &[Key],
    ) -> PrefetchResult<HashMap<Key, Vec<Key>>> {
        if source_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = source.read_rows(fields, source_ids)?;
        self.stats.association_reads += 1;
        self.stats.association_rows += rows.len();

        let mut grouped: HashMap<Key, Vec<Key>> = HashMap::new();
        for row in rows {
            grouped.entry(row.source_id).or_default().push(row.target_id);
        }
        Ok(grouped)
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryAssociations, MemorySource};
    use serde_json::json;

    #[test]
    fn test_single_bulk_read_per_call() {
        let source = MemorySource::new([json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        let mut fetcher = BatchFetcher::default();

        let keys: HashSet<Key> = [1i64, 2, 3].into_iter().map(Key::from).collect();
        let resolved = fetcher.fetch_missing(&source, &keys).unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(source.read_count(), 1);
        assert_eq!(fetcher.stats().bulk_reads, 1);
        assert_eq!(fetcher.stats().keys_requested, 3);
    }

    #[test]
    fn test_absent_keys_missing_from_result() {
        let source = MemorySource::new([json!({"id": 1})]);
        let mut fetcher = BatchFetcher::default();

        let keys: HashSet<Key> = [1i64, 42].into_iter().map(Key::from).collect();
        let resolved = fetcher.fetch_missing(&source, &keys).unwrap();

        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key(&Key::Integer(1)));
        assert!(!resolved.contains_key(&Key::Integer(42)));
    }

    #[test]
    fn test_empty_key_set_issues_no_read() {
        let source = MemorySource::<serde_json::Value>::new([]);
        let mut fetcher = BatchFetcher::default();
        let resolved = fetcher.fetch_missing(&source, &HashSet::new()).unwrap();
        assert!(resolved.is_empty());
        assert_eq!(source.read_count(), 0);
    }

    #[test]
    fn test_associations_grouped_in_row_order() {
        let assoc = MemoryAssociations::new([(1, 10), (2, 10), (1, 11)]);
        let fields = AssociationFields::new("post_id", "tag_id");
        let mut fetcher = BatchFetcher::default();

        let grouped = fetcher
            .fetch_associations(&assoc, &fields, &[Key::Integer(1), Key::Integer(2)])
            .unwrap();

        assert_eq!(
            grouped.get(&Key::Integer(1)),
            Some(&vec![Key::Integer(10), Key::Integer(11)])
        );
        assert_eq!(grouped.get(&Key::Integer(2)), Some(&vec![Key::Integer(10)]));
        assert_eq!(fetcher.stats().association_reads, 1);
        assert_eq!(fetcher.stats().association_rows, 3);
    }
}
