//! Prefetch hints.
//!
//! A prefetch key asks the backend to embed a related object in each
//! returned row, so that the foreign key accessor on the model is
//! already [`Loaded`](crate::related::RelatedState::Loaded) and no
//! follow-up request is needed. Keys nest: `{"parent": "parent"}`
//! embeds a row's parent, and that parent's own parent.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrefetchKey {
    /// Embed the relation with this name.
    Field(String),
    /// Embed the relation with this name, and within it, the inner key.
    Nested(String, Box<PrefetchKey>),
}

impl PrefetchKey {
    pub fn field(name: &str) -> Self {
        PrefetchKey::Field(name.to_string())
    }

    pub fn nested<K: Into<PrefetchKey>>(name: &str, inner: K) -> Self {
        PrefetchKey::Nested(name.to_string(), Box::new(inner.into()))
    }

    /// The relation name at the top of this key.
    pub fn name(&self) -> &str {
        match self {
            PrefetchKey::Field(name) | PrefetchKey::Nested(name, _) => name,
        }
    }

    /// The dunder-joined relation path, e.g. `parent__parent`.
    pub fn path(&self) -> String {
        match self {
            PrefetchKey::Field(name) => name.clone(),
            PrefetchKey::Nested(name, inner) => format!("{}__{}", name, inner.path()),
        }
    }
}

impl fmt::Display for PrefetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl Serialize for PrefetchKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PrefetchKey::Field(name) => serializer.serialize_str(name),
            PrefetchKey::Nested(name, inner) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, inner)?;
                map.end()
            }
        }
    }
}

impl From<&str> for PrefetchKey {
    fn from(name: &str) -> Self {
        PrefetchKey::field(name)
    }
}

impl From<String> for PrefetchKey {
    fn from(name: String) -> Self {
        PrefetchKey::Field(name)
    }
}
