//! Lazily resolved foreign keys.
//!
//! A model that refers to another one carries two fields: the raw id
//! the backend always sends (`parent_id`) and a [`ForeignKey`] holding
//! the related row itself (`parent`). The latter is filled in either by
//! the backend, when the relation was prefetched, or on demand by
//! [`ForeignKey::resolve`], which fetches the row by id and keeps it.
//!
//! `#[derive(Model)]` generates `resolve_<field>` and `set_<field>`
//! methods that pass the sibling id field along.

use std::fmt;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::client::ServerClient;
use crate::model::Model;
use crate::prefetch::PrefetchKey;
use crate::queryset::QuerySet;

#[derive(Debug, Error)]
pub enum RelatedError {
    #[error("record does not decode into the related model: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where a foreign key is in its lifecycle.
///
/// `Loading` is only observed if a resolution was abandoned part way,
/// and is then treated like `Unloaded`.
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedState<T> {
    Unloaded,
    Loading,
    Loaded(T),
}

/// The ways a foreign key can be assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedRef<T: Model> {
    /// Point at the row with this id; it is fetched on the next
    /// resolution.
    ById(T::Pk),
    ByValue(T),
    /// A plain record, decoded into the related model.
    ByRecord(Map<String, Value>),
}

pub struct ForeignKey<T: Model> {
    state: RelatedState<T>,
    pending_id: Option<T::Pk>,
}

impl<T: Model> ForeignKey<T> {
    pub fn new() -> Self {
        Self {
            state: RelatedState::Unloaded,
            pending_id: None,
        }
    }

    pub fn loaded(value: T) -> Self {
        Self {
            state: RelatedState::Loaded(value),
            pending_id: None,
        }
    }

    /// The cached row, if any. Never issues a request.
    pub fn get(&self) -> Option<&T> {
        match &self.state {
            RelatedState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn state(&self) -> &RelatedState<T> {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, RelatedState::Loaded(_))
    }

    /// An id assigned with [`RelatedRef::ById`] and not yet resolved.
    pub fn pending_id(&self) -> Option<&T::Pk> {
        self.pending_id.as_ref()
    }

    pub fn set(&mut self, value: RelatedRef<T>) -> Result<(), RelatedError> {
        match value {
            RelatedRef::ById(id) => {
                self.state = RelatedState::Unloaded;
                self.pending_id = Some(id);
            }
            RelatedRef::ByValue(value) => {
                self.state = RelatedState::Loaded(value);
                self.pending_id = None;
            }
            RelatedRef::ByRecord(record) => {
                let value = T::deserialize(Value::Object(record))?;
                self.state = RelatedState::Loaded(value);
                self.pending_id = None;
            }
        }
        Ok(())
    }

    /// Forget the cached row and any pending id.
    pub fn clear(&mut self) {
        self.state = RelatedState::Unloaded;
        self.pending_id = None;
    }

    pub fn take(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, RelatedState::Unloaded) {
            RelatedState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Return the related row, fetching it if it is not cached.
    ///
    /// `id` is the value of the sibling id field; a pending id set with
    /// [`RelatedRef::ById`] takes precedence over it. A cached row is
    /// returned without a request as long as its primary key matches
    /// the id. When there is no id, or the fetch does not yield a row,
    /// the result is `None` and the key is left unloaded.
    pub async fn resolve(&mut self, client: &ServerClient, id: Option<T::Pk>) -> Option<&T> {
        let id = self.pending_id.clone().or(id);

        if let RelatedState::Loaded(value) = &self.state {
            match &id {
                Some(id) if value.pk() != *id => {
                    debug!("Cached {} row is stale, refetching {}", T::ENDPOINT, id);
                }
                _ => {
                    debug!("Using cached {} row", T::ENDPOINT);
                    return self.get();
                }
            }
        }

        let id = match id {
            Some(id) => id,
            None => {
                debug!("No id to resolve {} row from", T::ENDPOINT);
                return None;
            }
        };

        debug!("Fetching {} row {}", T::ENDPOINT, id);
        self.state = RelatedState::Loading;
        let payload = QuerySet::<T>::get(client, &id, std::iter::empty::<PrefetchKey>()).await;
        match payload.into_model() {
            Some(value) => {
                self.state = RelatedState::Loaded(value);
                self.pending_id = None;
            }
            None => {
                self.state = RelatedState::Unloaded;
            }
        }
        self.get()
    }
}

impl<T: Model> Default for ForeignKey<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Model + Clone> Clone for ForeignKey<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            pending_id: self.pending_id.clone(),
        }
    }
}

impl<T: Model + PartialEq> PartialEq for ForeignKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.pending_id == other.pending_id
    }
}

impl<T: Model + fmt::Debug> fmt::Debug for ForeignKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignKey")
            .field("state", &self.state)
            .field("pending_id", &self.pending_id)
            .finish()
    }
}

impl<T: Model> From<T> for ForeignKey<T> {
    fn from(value: T) -> Self {
        Self::loaded(value)
    }
}

/// Serializes as the cached row, or `null`.
impl<T: Model> Serialize for ForeignKey<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// A prefetched relation arrives as the embedded row; anything else
/// (`null`, or a missing field with `#[serde(default)]`) leaves the
/// key unloaded.
impl<'de, T: Model> Deserialize<'de> for ForeignKey<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::loaded(value),
            None => Self::new(),
        })
    }
}

/// Implemented by the field types `#[derive(Model)]` treats as
/// foreign keys.
pub trait Related {
    type Target: Model;
}

impl<T: Model> Related for ForeignKey<T> {
    type Target = T;
}
