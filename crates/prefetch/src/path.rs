//! Path System - Relationship path expressions and their interpreter
//!
//! A path names a chain of relation hops from a root record, written either
//! dot-joined (`invoice.subsidiary`) or double-underscore-joined
//! (`invoice__subsidiary`). Both surfaces parse to the same segments. The
//! interpreter walks all but the last segment as nested records; the terminal
//! segment is where the foreign key is read and the resolved value attached.

use std::fmt;
use std::str::FromStr;

use crate::error::{PrefetchError, PrefetchResult};
use crate::key::Key;
use crate::record::{FieldAccessError, Record};

/// A parsed relationship path expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a dot-joined or double-underscore-joined path expression
    pub fn parse(expr: &str) -> PrefetchResult<Self> {
        let separator = if expr.contains("__") { "__" } else { "." };
        let segments: Vec<String> = expr.split(separator).map(str::to_owned).collect();
        if expr.is_empty() || segments.iter().any(|segment| segment.is_empty()) {
            return Err(PrefetchError::Configuration(format!(
                "invalid path expression '{}'",
                expr
            )));
        }
        Ok(Self { segments })
    }

    /// The attribute names along the chain, in hop order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, where keys are read and values attached
    pub fn terminal(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    fn prefix(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Read the scalar foreign-key value at the end of the chain.
    ///
    /// A null intermediate hop skips the whole chain for that record and
    /// returns `Ok(None)`; an unknown field anywhere is an error.
    pub fn resolve_key<R: Record>(&self, root: &R) -> PrefetchResult<Option<Key>> {
        let mut current = root;
        for segment in self.prefix() {
            match current.related(segment) {
                Ok(Some(next)) => current = next,
                Ok(None) => return Ok(None),
                Err(err) => return Err(self.field_error(segment, err)),
            }
        }
        current
            .relation_key(self.terminal())
            .map_err(|err| self.field_error(self.terminal(), err))
    }

    /// Attach a resolved related record at the end of the chain.
    ///
    /// When an intermediate hop is null the attach is skipped, mirroring
    /// [`resolve_key`](Path::resolve_key).
    pub fn attach<R: Record>(&self, root: &mut R, entity: R) -> PrefetchResult<()> {
        match self.target_mut(root)? {
            Some(target) => target
                .set_related(self.terminal(), entity)
                .map_err(|err| self.field_error(self.terminal(), err)),
            None => Ok(()),
        }
    }

    /// Attach a resolved collection at the end of the chain
    pub fn attach_many<R: Record>(&self, root: &mut R, entities: Vec<R>) -> PrefetchResult<()> {
        match self.target_mut(root)? {
            Some(target) => target
                .set_related_many(self.terminal(), entities)
                .map_err(|err| self.field_error(self.terminal(), err)),
            None => Ok(()),
        }
    }

    /// Walk to the record that owns the terminal attribute
    fn target_mut<'a, R: Record>(&self, root: &'a mut R) -> PrefetchResult<Option<&'a mut R>> {
        let mut current = root;
        for segment in self.prefix() {
            current = match Record::related_mut(current, segment) {
                Ok(Some(next)) => next,
                Ok(None) => return Ok(None),
                Err(err) => return Err(self.field_error(segment, err)),
            };
        }
        Ok(Some(current))
    }

    fn field_error(&self, field: &str, err: FieldAccessError) -> PrefetchError {
        match err {
            FieldAccessError::UnknownField => PrefetchError::UnknownField {
                field: field.to_owned(),
                path: self.to_string(),
            },
            other => PrefetchError::Resolution {
                path: self.to_string(),
                context: format!("field '{}': {}", field, other),
            },
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for Path {
    type Err = PrefetchError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        Self::parse(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dot_and_dunder_parse_identically() {
        let dotted = Path::parse("a.b.c").unwrap();
        let dunder = Path::parse("a__b__c").unwrap();
        assert_eq!(dotted, dunder);
        assert_eq!(dotted.segments(), ["a", "b", "c"]);
        assert_eq!(dotted.to_string(), "a.b.c");
    }

    #[test]
    fn test_invalid_expressions_rejected() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("a..b").is_err());
        assert!(Path::parse("a____b").is_err());
        assert!(Path::parse(".a").is_err());
    }

    #[test]
    fn test_resolve_multi_hop_key() {
        let record = json!({
            "id": 1,
            "a": {"id": 2, "b": {"id": 3, "c_id": 5}, "b_id": 3},
            "a_id": 2
        });
        let key = Path::parse("a.b.c").unwrap().resolve_key(&record).unwrap();
        assert_eq!(key, Some(Key::Integer(5)));
    }

    #[test]
    fn test_null_intermediate_hop_skips_chain() {
        let record = json!({"id": 1, "a": null, "a_id": null});
        let path = Path::parse("a.b.c").unwrap();
        assert_eq!(path.resolve_key(&record).unwrap(), None);

        // attach through the same null hop is a no-op, not an error
        let mut record = record;
        path.attach(&mut record, json!({"id": 9})).unwrap();
        assert_eq!(record, json!({"id": 1, "a": null, "a_id": null}));
    }

    #[test]
    fn test_attach_nested_via_either_syntax() {
        let base = json!({"id": 1, "invoice": {"id": 4, "subsidiary_id": 7}, "invoice_id": 4});
        let entity = json!({"id": 7, "name": "sub"});

        let mut via_dot = base.clone();
        Path::parse("invoice.subsidiary")
            .unwrap()
            .attach(&mut via_dot, entity.clone())
            .unwrap();

        let mut via_dunder = base;
        Path::parse("invoice__subsidiary")
            .unwrap()
            .attach(&mut via_dunder, entity)
            .unwrap();

        assert_eq!(via_dot, via_dunder);
        assert_eq!(via_dot["invoice"]["subsidiary"]["name"], "sub");
    }

    #[test]
    fn test_unknown_field_surfaces_path_context() {
        let record = json!({"id": 1});
        let err = Path::parse("missing").unwrap().resolve_key(&record);
        match err {
            Err(PrefetchError::UnknownField { field, path }) => {
                assert_eq!(field, "missing");
                assert_eq!(path, "missing");
            }
            other => panic!("expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_non_record_hop_is_resolution_error() {
        let record = json!({"id": 1, "a": 17});
        let err = Path::parse("a.b").unwrap().resolve_key(&record);
        assert!(matches!(err, Err(PrefetchError::Resolution { .. })));
    }
}
