//! Data Source Capabilities - Opaque bulk-read seams the engine fetches through
//!
//! The engine has no opinion on how entities are stored or queried. A spec
//! supplies an [`EntitySource`] (and, for multi-valued relations, an
//! [`AssociationSource`]); any bulk-read mechanism can sit behind them. The
//! bundled in-memory implementations back the test suite and double as
//! reference implementations.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::AssociationFields;
use crate::key::Key;
use crate::record::Record;

/// Opaque failure from an external read capability.
///
/// Carried through the engine unchanged; no retry, backoff, or suppression.
#[derive(Debug, thiserror::Error)]
#[error("data source error: {0}")]
pub struct DataSourceError(#[from] Box<dyn Error + Send + Sync>);

impl DataSourceError {
    /// Wrap any error (or message) as a data-source failure
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self(error.into())
    }
}

/// One membership edge read from an association table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationRow {
    /// Identity of the root-side record
    pub source_id: Key,
    /// Identity of the related entity
    pub target_id: Key,
}

/// Bulk-read capability over one related-entity type
pub trait EntitySource<R>: Send + Sync {
    /// Read the entities behind the given keys in one request. Keys with no
    /// entity are simply absent from the result.
    fn read_by_keys(&self, keys: &[Key]) -> Result<Vec<R>, DataSourceError>;

    /// Read every entity, for eager warm-up. Only exercised for specs marked
    /// eager, so sources backing lazy specs can keep the default.
    fn read_all(&self) -> Result<Vec<R>, DataSourceError> {
        Err(DataSourceError::new(
            "read_all is not supported by this source",
        ))
    }
}

/// Bulk-read capability over an association (through) table
pub trait AssociationSource: Send + Sync {
    /// Read the `(source_id, target_id)` rows for the given source ids in one
    /// request, using the configured column names
    fn read_rows(
        &self,
        fields: &AssociationFields,
        source_ids: &[Key],
    ) -> Result<Vec<AssociationRow>, DataSourceError>;
}

impl<R, S> EntitySource<R> for std::sync::Arc<S>
where
    S: EntitySource<R> + ?Sized,
{
    fn read_by_keys(&self, keys: &[Key]) -> Result<Vec<R>, DataSourceError> {
        (**self).read_by_keys(keys)
    }

    fn read_all(&self) -> Result<Vec<R>, DataSourceError> {
        (**self).read_all()
    }
}

impl<S> AssociationSource for std::sync::Arc<S>
where
    S: AssociationSource + ?Sized,
{
    fn read_rows(
        &self,
        fields: &AssociationFields,
        source_ids: &[Key],
    ) -> Result<Vec<AssociationRow>, DataSourceError> {
        (**self).read_rows(fields, source_ids)
    }
}

/// In-memory entity source keyed by identity, with read counters
#[derive(Debug)]
pub struct MemorySource<R> {
    entities: HashMap<Key, R>,
    bulk_reads: AtomicUsize,
    full_reads: AtomicUsize,
}

impl<R: Record> MemorySource<R> {
    /// Index the given entities by their identity. Entities without one are
    /// dropped, since they could never be read back by key.
    pub fn new(entities: impl IntoIterator<Item = R>) -> Self {
        let entities = entities
            .into_iter()
            .filter_map(|entity| entity.identity().map(|id| (id, entity)))
            .collect();
        Self {
            entities,
            bulk_reads: AtomicUsize::new(0),
            full_reads: AtomicUsize::new(0),
        }
    }

    /// Number of `read_by_keys` requests served
    pub fn read_count(&self) -> usize {
        self.bulk_reads.load(Ordering::Relaxed)
    }

    /// Number of `read_all` requests served
    pub fn read_all_count(&self) -> usize {
        self.full_reads.load(Ordering::Relaxed)
    }

    /// Number of entities held
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the source holds no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<R> EntitySource<R> for MemorySource<R>
where
    R: Record + Send + Sync,
{
    fn read_by_keys(&self, keys: &[Key]) -> Result<Vec<R>, DataSourceError> {
        self.bulk_reads.fetch_add(1, Ordering::Relaxed);
        Ok(keys
            .iter()
            .filter_map(|key| self.entities.get(key).cloned())
            .collect())
    }

    fn read_all(&self) -> Result<Vec<R>, DataSourceError> {
        self.full_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.entities.values().cloned().collect())
    }
}

/// In-memory association table, with a read counter
#[derive(Debug, Default)]
pub struct MemoryAssociations {
    rows: Vec<AssociationRow>,
    reads: AtomicUsize,
}

impl MemoryAssociations {
    /// Build from `(source_id, target_id)` pairs, kept in the given order
    pub fn new<S, T>(rows: impl IntoIterator<Item = (S, T)>) -> Self
    where
        S: Into<Key>,
        T: Into<Key>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|(source_id, target_id)| AssociationRow {
                    source_id: source_id.into(),
                    target_id: target_id.into(),
                })
                .collect(),
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of `read_rows` requests served
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl AssociationSource for MemoryAssociations {
    fn read_rows(
        &self,
        _fields: &AssociationFields,
        source_ids: &[Key],
    ) -> Result<Vec<AssociationRow>, DataSourceError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let wanted: HashSet<&Key> = source_ids.iter().collect();
        Ok(self
            .rows
            .iter()
            .filter(|row| wanted.contains(&row.source_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_source_reads_by_key() {
        let source = MemorySource::new([json!({"id": 1, "name": "a"}), json!({"id": 2})]);
        let entities = source
            .read_by_keys(&[Key::Integer(1), Key::Integer(99)])
            .unwrap();
        assert_eq!(entities, vec![json!({"id": 1, "name": "a"})]);
        assert_eq!(source.read_count(), 1);
    }

    #[test]
    fn test_memory_source_drops_identityless_entities() {
        let source = MemorySource::new([json!({"id": 1}), json!({"name": "no id"})]);
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_memory_associations_filter_by_source() {
        let assoc = MemoryAssociations::new([(1, 10), (1, 11), (2, 10)]);
        let fields = AssociationFields::new("somemodel_id", "somerelatedmodel_id");
        let rows = assoc.read_rows(&fields, &[Key::Integer(1)]).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.source_id == Key::Integer(1)));
        assert_eq!(assoc.read_count(), 1);
    }
}
