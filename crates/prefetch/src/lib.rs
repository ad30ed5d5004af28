//! # memo-prefetch
//!
//! Memoized batched prefetching of related records for chunked processing.
//!
//! When a job walks a large record set in chunks, the related records it
//! needs (authors, parents, tags) repeat heavily between chunks. This crate
//! resolves each relation once per distinct key for the whole run: per-chunk
//! misses are fetched in a single bulk read, results are memoized in a
//! bounded LRU cache per related-entity type, and resolved entities are
//! attached back onto the records in place.
//!
//! ## Features
//!
//! - **At most one fetch per distinct key** across the run, given enough
//!   cache capacity
//! - **Bounded memory**: strict LRU eviction per related-entity type
//! - **Nested paths**: `invoice.subsidiary` and `invoice__subsidiary` both
//!   work, any number of hops deep
//! - **Single and multi-valued relations**: foreign keys and many-to-many
//!   style association tables
//! - **Opaque data sources**: anything that can bulk-read by keys plugs in
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use memo_prefetch::{MemorySource, PrefetchEngine, RelationSpec};
//! use serde_json::json;
//!
//! let authors = Arc::new(MemorySource::new([
//!     json!({"id": 1, "name": "Iain Banks"}),
//! ]));
//!
//! let spec = RelationSpec::builder("author", authors.clone())
//!     .with_path("author")
//!     .build()
//!     .unwrap();
//! let mut engine = PrefetchEngine::new(vec![spec]).unwrap();
//!
//! let mut chunk = vec![
//!     json!({"id": 10, "title": "Consider Phlebas", "author_id": 1}),
//!     json!({"id": 11, "title": "The Wasp Factory", "author_id": 1}),
//! ];
//! engine.process_chunk(&mut chunk).unwrap();
//!
//! assert_eq!(chunk[0]["author"]["name"], "Iain Banks");
//! assert_eq!(chunk[1]["author"]["name"], "Iain Banks");
//! // one bulk read covered the whole chunk
//! assert_eq!(authors.read_count(), 1);
//! ```
//!
//! The engine is synchronous and single-writer: `process_chunk` runs to
//! completion on `&mut self`, and the per-spec caches are not internally
//! synchronized.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod key;
pub mod path;
pub mod record;
pub mod source;


// Re-export core types for convenience
pub use cache::{BoundedCache, CacheStats};
pub use config::{AssociationFields, RelationKind, RelationSpec, RelationSpecBuilder, DEFAULT_CACHE_CAPACITY};
pub use engine::{EngineStats, PrefetchEngine, SpecStats};
pub use error::{PrefetchError, PrefetchResult};
pub use fetch::{BatchFetcher, FetchStats};
pub use key::Key;
pub use path::Path;
pub use record::{FieldAccessError, Record};
pub use source::{
    AssociationRow, AssociationSource, DataSourceError, EntitySource, MemoryAssociations,
    MemorySource,
};
