//! Relation Spec - Immutable configuration for one memoized relationship
//!
//! A spec names the related-entity type, the attribute paths it hangs off,
//! the data source to bulk-read from, and the cache policy. Multi-valued
//! (many-to-many style) relations additionally carry the association-table
//! column pair and an association source. All invariants are validated when
//! the builder finishes, never at first `process_chunk`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PrefetchError, PrefetchResult};
use crate::path::Path;
use crate::source::{AssociationSource, EntitySource};

/// Cache bound applied when a spec does not choose its own
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Column names linking an association table to its source and target sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationFields {
    /// Column holding the root-side id
    pub source_field: String,
    /// Column holding the related-entity id
    pub target_field: String,
}

impl AssociationFields {
    /// Name the source and target columns
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
        }
    }
}

/// Whether a relation resolves to one entity or a collection
pub enum RelationKind {
    /// Foreign-key style: each record points at most one related entity
    Single,
    /// Many-to-many style: membership edges live in an association table
    MultiValued {
        /// Association-table column pair
        fields: AssociationFields,
        /// Bulk-read capability over the association table
        associations: Box<dyn AssociationSource>,
    },
}

impl fmt::Debug for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Single => write!(f, "Single"),
            RelationKind::MultiValued { fields, .. } => f
                .debug_struct("MultiValued")
                .field("fields", fields)
                .finish_non_exhaustive(),
        }
    }
}

/// Immutable configuration describing one relationship to memoize
pub struct RelationSpec<R> {
    target: String,
    paths: Vec<Path>,
    source: Box<dyn EntitySource<R>>,
    eager: bool,
    cache_capacity: usize,
    kind: RelationKind,
}

impl<R> RelationSpec<R> {
    /// Start building a spec for the named related-entity type, bulk-read
    /// through the given source
    pub fn builder(
        target: impl Into<String>,
        source: impl EntitySource<R> + 'static,
    ) -> RelationSpecBuilder<R> {
        RelationSpecBuilder {
            target: target.into(),
            paths: Vec::new(),
            source: Box::new(source),
            eager: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            association: None,
        }
    }

    /// The related-entity type label, unique across an engine's specs
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The attribute paths this relation hangs off
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// The bulk-read capability for the related entities
    pub fn source(&self) -> &dyn EntitySource<R> {
        self.source.as_ref()
    }

    /// Whether every entity is loaded up front
    pub fn eager(&self) -> bool {
        self.eager
    }

    /// The LRU bound for this relation's cache
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    /// Single or multi-valued
    pub fn kind(&self) -> &RelationKind {
        &self.kind
    }

    /// Whether this spec resolves collections through an association table
    pub fn is_multi_valued(&self) -> bool {
        matches!(self.kind, RelationKind::MultiValued { .. })
    }
}

impl<R> fmt::Debug for RelationSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationSpec")
            .field("target", &self.target)
            .field("paths", &self.paths)
            .field("eager", &self.eager)
            .field("cache_capacity", &self.cache_capacity)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RelationSpec`]; invariants are checked in [`build`](RelationSpecBuilder::build)
pub struct RelationSpecBuilder<R> {
    target: String,
    paths: Vec<String>,
    source: Box<dyn EntitySource<R>>,
    eager: bool,
    cache_capacity: usize,
    association: Option<(Box<dyn AssociationSource>, AssociationFields)>,
}

impl<R> RelationSpecBuilder<R> {
    /// Add one attribute path, dot-joined or double-underscore-joined
    pub fn with_path(mut self, expr: impl Into<String>) -> Self {
        self.paths.push(expr.into());
        self
    }

    /// Add several attribute paths
    pub fn with_paths<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Load every entity up front and treat the cache as authoritative
    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    /// Bound the cache to `capacity` entries
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Make the relation multi-valued through an association table with the
    /// given source and target column names
    pub fn with_association(
        mut self,
        associations: impl AssociationSource + 'static,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        self.association = Some((
            Box::new(associations),
            AssociationFields::new(source_field, target_field),
        ));
        self
    }

    /// Validate and finish the spec
    pub fn build(self) -> PrefetchResult<RelationSpec<R>> {
        if self.target.trim().is_empty() {
            return Err(PrefetchError::Configuration(
                "spec target must not be empty".to_string(),
            ));
        }
        if self.paths.is_empty() {
            return Err(PrefetchError::Configuration(format!(
                "spec '{}' needs at least one path",
                self.target
            )));
        }
        let paths = self
            .paths
            .iter()
            .map(|expr| Path::parse(expr))
            .collect::<PrefetchResult<Vec<_>>>()?;
        if self.cache_capacity == 0 {
            return Err(PrefetchError::Configuration(format!(
                "spec '{}' cache capacity must be greater than zero",
                self.target
            )));
        }
        let kind = match self.association {
            Some((associations, fields)) => {
                if fields.source_field.is_empty() || fields.target_field.is_empty() {
                    return Err(PrefetchError::Configuration(format!(
                        "spec '{}' association source and target fields must both be set",
                        self.target
                    )));
                }
                RelationKind::MultiValued {
                    fields,
                    associations,
                }
            }
            None => RelationKind::Single,
        };
        Ok(RelationSpec {
            target: self.target,
            paths,
            source: self.source,
            eager: self.eager,
            cache_capacity: self.cache_capacity,
            kind,
        })
    }
}
