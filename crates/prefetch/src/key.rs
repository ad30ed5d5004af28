//! Key System - Scalar identity values for records and relationships
//!
//! Supports integer, UUID, and text keys with serialization and display
//! formatting. A `Key` is both a record's own identity and the foreign-key
//! value a relation field stores.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Scalar key types understood by the prefetch engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Auto-incrementing integer key
    Integer(i64),
    /// UUID key
    Uuid(Uuid),
    /// Opaque text key
    Text(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(id) => write!(f, "{}", id),
            Key::Uuid(id) => write!(f, "{}", id),
            Key::Text(id) => write!(f, "{}", id),
        }
    }
}

impl Key {
    /// Extract as i64 if this is an Integer key
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Key::Integer(id) => Some(*id),
            _ => None,
        }
    }

    /// Extract as UUID if this is a Uuid key
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Key::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    /// Extract as text if this is a Text key
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Key::Text(id) => Some(id),
            _ => None,
        }
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Integer(id)
    }
}

impl From<i32> for Key {
    fn from(id: i32) -> Self {
        Key::Integer(id as i64)
    }
}

impl From<Uuid> for Key {
    fn from(id: Uuid) -> Self {
        Key::Uuid(id)
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Key::Text(id.to_string())
    }
}

impl From<String> for Key {
    fn from(id: String) -> Self {
        Key::Text(id)
    }
}
