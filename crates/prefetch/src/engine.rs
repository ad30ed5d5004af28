//! Prefetch Engine - Memoized batched prefetching across chunks
//!
//! For each chunk and each relation spec the engine runs one pass: collect
//! the keys the chunk needs, classify them against the spec's cache, resolve
//! the misses through one bulk read, update the cache, and attach the
//! resolved entities (or collections) back onto the records.
//!
//! The engine holds mutable per-spec caches across chunks. `process_chunk`
//! takes `&mut self`: single writer, no internal synchronization. Wrap the
//! engine in external locking if chunks must be fed from multiple threads.

use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

use crate::cache::{BoundedCache, CacheStats};
use crate::config::{RelationKind, RelationSpec};
use crate::error::{PrefetchError, PrefetchResult};
use crate::fetch::{BatchFetcher, FetchStats};
use crate::key::Key;
use crate::record::Record;

/// Snapshot of one spec's cache and fetch activity
#[derive(Debug, Clone)]
pub struct SpecStats {
    /// The spec's related-entity type label
    pub target: String,
    /// Entities currently cached
    pub cached_entities: usize,
    /// Cache effectiveness counters
    pub cache: CacheStats,
    /// Bulk-read counters
    pub fetch: FetchStats,
}

/// Snapshot of the engine's activity since construction
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Chunks processed so far
    pub chunks_processed: usize,
    /// Per-spec snapshots, in spec order
    pub specs: Vec<SpecStats>,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} chunks", self.chunks_processed)?;
        for spec in &self.specs {
            write!(
                f,
                "; {}: {} cached, {:.1}% hit rate, {}",
                spec.target,
                spec.cached_entities,
                spec.cache.hit_ratio() * 100.0,
                spec.fetch
            )?;
        }
        Ok(())
    }
}

struct SpecState<R: Record> {
    spec: RelationSpec<R>,
    cache: BoundedCache<R>,
    fetcher: BatchFetcher,
    warmed: bool,
}

/// Memoized batched-prefetch engine over an ordered list of relation specs.
///
/// Construction validates spec uniqueness and performs eager warm-up, so it
/// can already hit the data sources. Caches live as long as the engine.
pub struct PrefetchEngine<R: Record> {
    specs: Vec<SpecState<R>>,
    chunks_processed: usize,
}

impl<R: Record> PrefetchEngine<R> {
    /// Build an engine from an ordered list of specs, warming the caches of
    /// specs marked eager. Related-entity types have to be unique across the
    /// specs; to memoize one type behind several attributes, put the multiple
    /// paths into a single spec.
    pub fn new(specs: Vec<RelationSpec<R>>) -> PrefetchResult<Self> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.target().to_owned()) {
                return Err(PrefetchError::Configuration(format!(
                    "related-entity type '{}' appears in more than one spec; \
                     merge the attribute paths into a single spec",
                    spec.target()
                )));
            }
        }

        let mut states = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut cache = BoundedCache::new(spec.cache_capacity());
            let mut warmed = false;
            if spec.eager() {
                let count = cache.warm_all(spec.source())?;
                info!("warmed '{}' cache with {} entities", spec.target(), count);
                warmed = true;
            }
            states.push(SpecState {
                spec,
                cache,
                fetcher: BatchFetcher::default(),
                warmed,
            });
        }
        Ok(Self {
            specs: states,
            chunks_processed: 0,
        })
    }

    /// Process one chunk of root records in place: after this returns, every
    /// configured relation attribute on every record is populated from cache,
    /// and reading it needs no further fetch.
    pub fn process_chunk(&mut self, records: &mut [R]) -> PrefetchResult<()> {
        for state in &mut self.specs {
            match state.spec.kind() {
                RelationKind::Single => Self::process_single(state, records)?,
                RelationKind::MultiValued { .. } => Self::process_multi(state, records)?,
            }
        }
        self.chunks_processed += 1;
        Ok(())
    }

    /// Snapshot of cache and fetch activity per spec
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            chunks_processed: self.chunks_processed,
            specs: self
                .specs
                .iter()
                .map(|state| SpecStats {
                    target: state.spec.target().to_owned(),
                    cached_entities: state.cache.len(),
                    cache: state.cache.stats().clone(),
                    fetch: state.fetcher.stats().clone(),
                })
                .collect(),
        }
    }

    fn process_single(state: &mut SpecState<R>, records: &mut [R]) -> PrefetchResult<()> {
        let SpecState {
            spec,
            cache,
            fetcher,
            warmed,
        } = state;

        // 1. collect the distinct non-absent keys the chunk points at
        let mut needed: HashSet<Key> = HashSet::new();
        for record in records.iter() {
            for path in spec.paths() {
                if let Some(key) = path.resolve_key(record)? {
                    needed.insert(key);
                }
            }
        }

        // 2. classify against the cache
        let misses: HashSet<Key> = needed
            .iter()
            .filter(|key| !cache.contains(key))
            .cloned()
            .collect();

        // 3./4. resolve misses through one bulk read and cache the results;
        // a warmed cache is authoritative, its absent keys mean "no entity"
        if *warmed {
            if !misses.is_empty() {
                debug!(
                    "'{}': {} keys absent from warmed cache, treated as missing relations",
                    spec.target(),
                    misses.len()
                );
            }
        } else if !misses.is_empty() {
            let fetched = fetcher.fetch_missing(spec.source(), &misses)?;
            for (key, entity) in fetched {
                cache.put(key, entity);
            }
        }

        debug!(
            "prefetch '{}': {} records, {} distinct keys, {} misses",
            spec.target(),
            records.len(),
            needed.len(),
            misses.len()
        );

        // 5. attach from cache
        for record in records.iter_mut() {
            for path in spec.paths() {
                let Some(key) = path.resolve_key(record)? else {
                    continue;
                };
                if let Some(entity) = cache.get(&key).cloned() {
                    path.attach(record, entity)?;
                }
            }
        }
        Ok(())
    }

    fn process_multi(state: &mut SpecState<R>, records: &mut [R]) -> PrefetchResult<()> {
        let SpecState {
            spec,
            cache,
            fetcher,
            warmed,
        } = state;
        let RelationKind::MultiValued {
            fields,
            associations,
        } = spec.kind()
        else {
            return Ok(());
        };

        // 1. the chunk's distinct root identities, in first-seen order
        let mut roots: Vec<Key> = Vec::new();
        let mut seen = HashSet::new();
        for record in records.iter() {
            if let Some(id) = record.identity() {
                if seen.insert(id.clone()) {
                    roots.push(id);
                }
            }
        }

        // membership is chunk-scoped: rows are re-read every chunk, only the
        // target entities are memoized
        let grouped = fetcher.fetch_associations(associations.as_ref(), fields, &roots)?;

        let mut needed: HashSet<Key> = HashSet::new();
        for targets in grouped.values() {
            needed.extend(targets.iter().cloned());
        }

        let misses: HashSet<Key> = needed
            .iter()
            .filter(|key| !cache.contains(key))
            .cloned()
            .collect();
        if !*warmed && !misses.is_empty() {
            let fetched = fetcher.fetch_missing(spec.source(), &misses)?;
            for (key, entity) in fetched {
                cache.put(key, entity);
            }
        }

        debug!(
            "prefetch '{}': {} roots, {} association targets, {} misses",
            spec.target(),
            roots.len(),
            needed.len(),
            misses.len()
        );

        // attach per-root collections; roots with no rows get an empty one
        for record in records.iter_mut() {
            let Some(id) = record.identity() else { continue };
            let target_ids = grouped.get(&id).cloned().unwrap_or_default();
            let entities: Vec<R> = target_ids
                .iter()
                .filter_map(|target| cache.get(target).cloned())
                .collect();
            for path in spec.paths() {
                path.attach_many(record, entities.clone())?;
            }
        }
        Ok(())
    }
}

impl<R: Record> fmt::Debug for PrefetchEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchEngine")
            .field("specs", &self.specs.len())
            .field("chunks_processed", &self.chunks_processed)
            .finish()
    }
}
