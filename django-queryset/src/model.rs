//! The [`Model`] trait, implemented for each record type served by a
//! model endpoint.
//!
//! Most implementations are generated with `#[derive(Model)]`, which
//! fills in the endpoint, the primary key and the field schemas from
//! the struct definition:
//!
//! ```rust,no_run
//! use django_queryset::{Model, QuerySet, ServerClient};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Model)]
//! #[django(endpoint = "thing")]
//! struct Thing {
//!     #[django(pk, read_only)]
//!     id: i64,
//!     name: Option<String>,
//! }
//!
//! # async fn example(client: &ServerClient) {
//! let thing = QuerySet::<Thing>::get(client, &7, Vec::<&str>::new()).await;
//! if let Some(thing) = thing.model() {
//!     assert_eq!(thing.pk(), 7);
//! }
//! # }
//! ```

use std::fmt::{Debug, Display};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::{ServerClient, ServerResponse};
use crate::endpoint::{self, Endpoint};
use crate::lookup::IntoLookupValue;
use crate::payload::{is_successful_status, ServerPayload};
use crate::prefetch::PrefetchKey;
use crate::queryset::QuerySet;
use crate::schema::FieldSchema;

/// A record type backed by a model endpoint.
///
/// Network-bound operations take the [`ServerClient`] to use, and never
/// fail outright: the outcome is always a [`ServerResponse`] or a
/// [`ServerPayload`].
#[allow(async_fn_in_trait)]
pub trait Model: Serialize + DeserializeOwned + Sized {
    type Pk: Serialize
        + DeserializeOwned
        + Display
        + Debug
        + Clone
        + PartialEq
        + Send
        + Sync
        + IntoLookupValue;

    /// Base path of the model's endpoints, relative to the client's
    /// base URL, e.g. `thing` or `thing-child`.
    const ENDPOINT: &'static str;

    const FIELD_SCHEMAS: &'static [FieldSchema];

    fn pk(&self) -> Self::Pk;

    /// A query-set over every row of this model.
    fn objects() -> QuerySet<Self> {
        QuerySet::all()
    }

    fn field_schema(name: &str) -> Option<&'static FieldSchema> {
        Self::FIELD_SCHEMAS.iter().find(|f| f.field_name == name)
    }

    /// Link to the row's detail page.
    fn detail_link(&self) -> String {
        Endpoint::new(Self::ENDPOINT).part(self.pk()).url()
    }

    /// Send changed fields to the backend, returning the updated row.
    async fn update<B: Serialize + ?Sized>(
        &self,
        client: &ServerClient,
        data: &B,
    ) -> ServerPayload<Self> {
        let response = client
            .post(&endpoint::update(Self::ENDPOINT, self.pk()), data, None)
            .await;
        ServerPayload::decode(response, is_successful_status, |data| Self::deserialize(data))
    }

    async fn delete(&self, client: &ServerClient) -> ServerResponse {
        client
            .delete(&endpoint::delete(Self::ENDPOINT, self.pk()))
            .await
    }

    /// Fetch the current state of this row.
    async fn refresh<I, K>(&self, client: &ServerClient, prefetch: I) -> ServerPayload<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<PrefetchKey>,
    {
        QuerySet::<Self>::get(client, &self.pk(), prefetch).await
    }

    /// Read a computed property of this row.
    async fn property<T: DeserializeOwned>(
        &self,
        client: &ServerClient,
        name: &str,
    ) -> ServerPayload<T> {
        let response = client
            .get(&endpoint::property(Self::ENDPOINT, self.pk(), name), None)
            .await;
        ServerPayload::decode(response, is_successful_status, |data| T::deserialize(data))
    }

    /// Invoke a custom method on this row. `name` is the method's
    /// snake_case name.
    async fn call_method<A: Serialize + ?Sized>(
        &self,
        client: &ServerClient,
        name: &str,
        args: &A,
    ) -> ServerResponse {
        client
            .post(&endpoint::method(Self::ENDPOINT, name, self.pk()), args, None)
            .await
    }

    /// Invoke a custom method on the model class.
    async fn call_static<A: Serialize + ?Sized>(
        client: &ServerClient,
        name: &str,
        args: &A,
    ) -> ServerResponse {
        client
            .post(&endpoint::static_method(Self::ENDPOINT, name), args, None)
            .await
    }

    /// Rows of `R` that refer back to this row through `key`, for
    /// example `thing.related_set::<ThingChild>("parent__id")`.
    fn related_set<R: Model>(&self, key: &str) -> QuerySet<R> {
        QuerySet::related_to(key, self.pk().into_lookup_value())
    }
}
