//! Record System - Minimal field-accessor capability for prefetchable records
//!
//! The engine never reflects over concrete types. Anything that can report its
//! identity, expose the scalar foreign-key value behind a relation field, and
//! accept attached related records can be processed. A ready-made
//! implementation for `serde_json::Value` covers dynamic record graphs.

use serde_json::Value;
use thiserror::Error;

use crate::key::Key;

/// Field-level access failures, mapped to engine errors with path context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldAccessError {
    /// The record shape has no such field
    #[error("unknown field")]
    UnknownField,
    /// The field holds something other than a nested record
    #[error("expected a record, found {found}")]
    NotARecord { found: &'static str },
    /// The field holds something other than a scalar key
    #[error("expected a scalar key, found {found}")]
    NotAKey { found: &'static str },
}

/// Field-accessor capability the prefetch engine requires of records.
///
/// Relation fields have two faces: a scalar foreign-key value (read via
/// [`relation_key`](Record::relation_key)) and the related record itself
/// (written via [`set_related`](Record::set_related)). How the two are stored
/// is the implementor's business.
pub trait Record: Clone {
    /// This record's own identity, if it has one
    fn identity(&self) -> Option<Key>;

    /// Scalar foreign-key value stored for the named relation field.
    /// `Ok(None)` means the relation is unset.
    fn relation_key(&self, field: &str) -> Result<Option<Key>, FieldAccessError>;

    /// Borrow the nested record behind a relation hop. `Ok(None)` means the
    /// hop is null and the rest of the chain should be skipped.
    fn related(&self, field: &str) -> Result<Option<&Self>, FieldAccessError>;

    /// Mutably borrow the nested record behind a relation hop
    fn related_mut(&mut self, field: &str) -> Result<Option<&mut Self>, FieldAccessError>;

    /// Attach a resolved related record to the named field
    fn set_related(&mut self, field: &str, value: Self) -> Result<(), FieldAccessError>;

    /// Attach a resolved collection of related records to the named field
    fn set_related_many(&mut self, field: &str, values: Vec<Self>) -> Result<(), FieldAccessError>;
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn key_from_value(value: &Value) -> Option<Key> {
    match value {
        Value::Number(n) => n.as_i64().map(Key::Integer),
        Value::String(s) => Some(Key::Text(s.clone())),
        _ => None,
    }
}

fn foreign_key_column(field: &str) -> String {
    format!("{}_id", field)
}

/// Dynamic record implementation over JSON objects.
///
/// The identity lives in the `id` member and the foreign key for a relation
/// field `author` lives in the `author_id` member, the usual relational
/// column convention. A relation hop whose object is not materialised but
/// whose `<field>_id` column is present counts as unset, not unknown.
impl Record for Value {
    fn identity(&self) -> Option<Key> {
        self.as_object()
            .and_then(|map| map.get("id"))
            .and_then(key_from_value)
    }

    fn relation_key(&self, field: &str) -> Result<Option<Key>, FieldAccessError> {
        let found = json_type(self);
        let Some(map) = self.as_object() else {
            return Err(FieldAccessError::NotARecord { found });
        };
        match map.get(&foreign_key_column(field)) {
            None => Err(FieldAccessError::UnknownField),
            Some(Value::Null) => Ok(None),
            Some(value) => match key_from_value(value) {
                Some(key) => Ok(Some(key)),
                None => Err(FieldAccessError::NotAKey {
                    found: json_type(value),
                }),
            },
        }
    }

    fn related(&self, field: &str) -> Result<Option<&Self>, FieldAccessError> {
        let found = json_type(self);
        let Some(map) = self.as_object() else {
            return Err(FieldAccessError::NotARecord { found });
        };
        match map.get(field) {
            Some(Value::Null) => Ok(None),
            Some(value @ Value::Object(_)) => Ok(Some(value)),
            Some(value) => Err(FieldAccessError::NotARecord {
                found: json_type(value),
            }),
            None if map.contains_key(&foreign_key_column(field)) => Ok(None),
            None => Err(FieldAccessError::UnknownField),
        }
    }

    fn related_mut(&mut self, field: &str) -> Result<Option<&mut Self>, FieldAccessError> {
        let found = json_type(self);
        let Some(map) = self.as_object_mut() else {
            return Err(FieldAccessError::NotARecord { found });
        };
        let has_column = map.contains_key(&foreign_key_column(field));
        match map.get_mut(field) {
            Some(Value::Null) => Ok(None),
            Some(value @ Value::Object(_)) => Ok(Some(value)),
            Some(value) => Err(FieldAccessError::NotARecord {
                found: json_type(value),
            }),
            None if has_column => Ok(None),
            None => Err(FieldAccessError::UnknownField),
        }
    }

    fn set_related(&mut self, field: &str, value: Self) -> Result<(), FieldAccessError> {
        let found = json_type(self);
        let Some(map) = self.as_object_mut() else {
            return Err(FieldAccessError::NotARecord { found });
        };
        map.insert(field.to_string(), value);
        Ok(())
    }

    fn set_related_many(&mut self, field: &str, values: Vec<Self>) -> Result<(), FieldAccessError> {
        let found = json_type(self);
        let Some(map) = self.as_object_mut() else {
            return Err(FieldAccessError::NotARecord { found });
        };
        map.insert(field.to_string(), Value::Array(values));
        Ok(())
    }
}
