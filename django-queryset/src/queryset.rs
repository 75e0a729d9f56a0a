//! # Chainable query-sets over a model endpoint
//!
//! A [`QuerySet`] accumulates everything needed to describe a list
//! request, and nothing happens on the network until one of its
//! terminal operations ([`retrieve`](QuerySet::retrieve),
//! [`retrieve_page`](QuerySet::retrieve_page),
//! [`values`](QuerySet::values), [`page_values`](QuerySet::page_values),
//! [`exists`](QuerySet::exists), [`count`](QuerySet::count)) is awaited.
//! Each terminal operation issues exactly one `GET` to the model's list
//! endpoint.
//!
//! Every builder method takes `&self` and returns a new query-set, so a
//! query-set can be kept as a base and refined in several directions
//! without the refinements affecting one another:
//!
//! ```rust
//! use django_queryset::{lookup::Lookups, Model, QuerySet};
//! # #[derive(serde::Serialize, serde::Deserialize)]
//! # struct Thing { id: i64 }
//! # impl Model for Thing {
//! #     type Pk = i64;
//! #     const ENDPOINT: &'static str = "thing";
//! #     const FIELD_SCHEMAS: &'static [django_queryset::schema::FieldSchema] = &[];
//! #     fn pk(&self) -> i64 { self.id }
//! # }
//!
//! let base = QuerySet::<Thing>::all()
//!     .filter(Lookups::new().exact("name", "widget"))
//!     .unwrap();
//! let large = base
//!     .filter(Lookups::new().op("number", django_queryset::Operator::Gt, 10))
//!     .unwrap();
//!
//! assert_eq!(base.serialize_query().filters.len(), 1);
//! assert_eq!(large.serialize_query().filters.len(), 2);
//! ```
//!
//! On the wire, the lookups are sent as a single `query` parameter
//! holding `{"filters": ..., "exclude": ..., "or_": [...]}`, where each
//! entry of `or_` has the same shape again. The backend keeps a row if
//! it matches `filters` and not `exclude`, or if it matches any of the
//! `or_` branches.

use core::marker::PhantomData;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ServerClient, ServerResponse, TransportError, UrlQuery};
use crate::endpoint;
use crate::lookup::{FlatLookups, IntoLookups, LookupError, Lookups};
use crate::model::Model;
use crate::ordering::OrderBy;
use crate::payload::{is_successful_status, Page, ServerPayload, ValuesRow};
use crate::prefetch::PrefetchKey;

pub const QUERY_KEY: &str = "query";
pub const PREFETCH_KEY: &str = "prefetch";
pub const ORDER_BY_KEY: &str = "order_by";
pub const DISTINCT_KEY: &str = "distinct";
pub const FIELDS_KEY: &str = "fields";
pub const VALUES_KEY: &str = "values";
pub const PAGE_NUM_KEY: &str = "page";
pub const PAGE_SIZE_KEY: &str = "pagesize";
pub const EXISTS_KEY: &str = "exists";
pub const COUNT_KEY: &str = "count";

pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// The boolean structure of a query, as sent in the `query` parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SerializedQuery {
    pub filters: FlatLookups,
    pub exclude: FlatLookups,
    pub or_: Vec<SerializedQuery>,
}

/// All the parameters of one list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub query: Option<SerializedQuery>,
    pub prefetch: Option<Vec<PrefetchKey>>,
    pub order_by: Option<Vec<OrderBy>>,
    pub distinct: Option<Vec<String>>,
    pub fields: Option<Vec<String>>,
    pub values: Option<Vec<String>>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub exists: bool,
    pub count: bool,
}

impl ListQuery {
    pub fn to_url_query(&self) -> Result<UrlQuery, serde_json::Error> {
        let mut q = UrlQuery::new();
        if let Some(query) = &self.query {
            q.push_json(QUERY_KEY, query)?;
        }
        if let Some(prefetch) = &self.prefetch {
            q.push_json(PREFETCH_KEY, prefetch)?;
        }
        if let Some(order_by) = &self.order_by {
            q.push_json(ORDER_BY_KEY, order_by)?;
        }
        if let Some(distinct) = &self.distinct {
            q.push_json(DISTINCT_KEY, distinct)?;
        }
        if let Some(fields) = &self.fields {
            q.push_json(FIELDS_KEY, fields)?;
        }
        if let Some(values) = &self.values {
            q.push_json(VALUES_KEY, values)?;
        }
        if let Some(page) = self.page {
            q.push(PAGE_NUM_KEY, page);
        }
        if let Some(page_size) = self.page_size {
            q.push(PAGE_SIZE_KEY, page_size);
        }
        if self.exists {
            q.push_json(EXISTS_KEY, &true)?;
        }
        if self.count {
            q.push_json(COUNT_KEY, &true)?;
        }
        Ok(q)
    }
}

/// A lazily evaluated query over the rows of model `M`.
///
/// Do not share one query-set between concurrently running chains
/// expecting to see each other's refinements: every builder method
/// returns a fresh value and leaves its receiver unchanged.
pub struct QuerySet<M> {
    lookups: Lookups,
    excluded_lookups: Lookups,
    filters: FlatLookups,
    exclude: FlatLookups,
    or_branches: Vec<QuerySet<M>>,
    prefetch: Option<Vec<PrefetchKey>>,
    order_by: Option<Vec<OrderBy>>,
    distinct: Option<Vec<String>>,
    fields: Option<Vec<String>>,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            lookups: self.lookups.clone(),
            excluded_lookups: self.excluded_lookups.clone(),
            filters: self.filters.clone(),
            exclude: self.exclude.clone(),
            or_branches: self.or_branches.clone(),
            prefetch: self.prefetch.clone(),
            order_by: self.order_by.clone(),
            distinct: self.distinct.clone(),
            fields: self.fields.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M> fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("lookups", &self.lookups)
            .field("excluded_lookups", &self.excluded_lookups)
            .field("or_branches", &self.or_branches)
            .field("prefetch", &self.prefetch)
            .field("order_by", &self.order_by)
            .field("distinct", &self.distinct)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<M> Default for QuerySet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> QuerySet<M> {
    pub fn new() -> Self {
        Self {
            lookups: Lookups::new(),
            excluded_lookups: Lookups::new(),
            filters: FlatLookups::default(),
            exclude: FlatLookups::default(),
            or_branches: Vec::new(),
            prefetch: None,
            order_by: None,
            distinct: None,
            fields: None,
            _marker: PhantomData,
        }
    }

    /// A query-set matching every row.
    pub fn all() -> Self {
        Self::new()
    }

    pub(crate) fn related_to(key: &str, value: Value) -> Self {
        Self {
            lookups: Lookups::new().exact(key, value.clone()),
            filters: FlatLookups::leaf(key, value),
            ..Self::new()
        }
    }

    /// Narrow to rows matching `lookups` as well as the existing
    /// filters. A key already present is replaced.
    pub fn filter<L: IntoLookups>(&self, lookups: L) -> Result<Self, LookupError> {
        let lookups = self.lookups.merge(&lookups.into_lookups()?);
        let filters = lookups.flatten()?;
        Ok(Self {
            lookups,
            filters,
            ..self.clone()
        })
    }

    /// Drop rows matching all of the excluded lookups, which are
    /// merged with any already excluded.
    pub fn exclude<L: IntoLookups>(&self, lookups: L) -> Result<Self, LookupError> {
        let excluded_lookups = self.excluded_lookups.merge(&lookups.into_lookups()?);
        let exclude = excluded_lookups.flatten()?;
        Ok(Self {
            excluded_lookups,
            exclude,
            ..self.clone()
        })
    }

    /// Also include the rows matched by `other`.
    pub fn or(&self, other: &QuerySet<M>) -> Self {
        let mut qs = self.clone();
        qs.or_branches.push(other.clone());
        qs
    }

    /// Ask the backend to embed these relations in each row. Keys
    /// accumulate across calls.
    pub fn prefetch<I, K>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PrefetchKey>,
    {
        let mut qs = self.clone();
        qs.prefetch
            .get_or_insert_with(Vec::new)
            .extend(keys.into_iter().map(Into::into));
        qs
    }

    /// Set the ordering, replacing any previous one.
    pub fn order_by<I, O>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderBy>,
    {
        let mut qs = self.clone();
        qs.order_by = Some(fields.into_iter().map(Into::into).collect());
        qs
    }

    /// Set the fields rows must be distinct on.
    pub fn distinct<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut qs = self.clone();
        qs.distinct = Some(fields.into_iter().map(Into::into).collect());
        qs
    }

    /// Restrict the serialized fields of each returned row.
    pub fn only<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut qs = self.clone();
        qs.fields = Some(fields.into_iter().map(Into::into).collect());
        qs
    }

    pub fn lookups(&self) -> &Lookups {
        &self.lookups
    }

    pub fn excluded_lookups(&self) -> &Lookups {
        &self.excluded_lookups
    }

    pub fn or_branches(&self) -> &[QuerySet<M>] {
        &self.or_branches
    }

    pub fn prefetch_keys(&self) -> Option<&[PrefetchKey]> {
        self.prefetch.as_deref()
    }

    pub fn ordering(&self) -> Option<&[OrderBy]> {
        self.order_by.as_deref()
    }

    pub fn distinct_fields(&self) -> Option<&[String]> {
        self.distinct.as_deref()
    }

    pub fn serialize_query(&self) -> SerializedQuery {
        SerializedQuery {
            filters: self.filters.clone(),
            exclude: self.exclude.clone(),
            or_: self
                .or_branches
                .iter()
                .map(QuerySet::serialize_query)
                .collect(),
        }
    }

    /// The list request this query-set stands for, before any terminal
    /// operation adds its own parameters.
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            query: Some(self.serialize_query()),
            prefetch: self.prefetch.clone(),
            order_by: self.order_by.clone(),
            distinct: self.distinct.clone(),
            fields: self.fields.clone(),
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct GetOrCreate<'a, L: ?Sized, D: ?Sized> {
    lookup: &'a L,
    defaults: &'a D,
}

fn decode_value<T: serde::de::DeserializeOwned>(data: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(data)
}

impl<M: Model> QuerySet<M> {
    async fn send(&self, client: &ServerClient, list: ListQuery) -> ServerResponse {
        let query = match list.to_url_query() {
            Ok(query) => query,
            Err(e) => return ServerResponse::Failed(TransportError::Encode(e)),
        };
        client
            .get(&endpoint::list(M::ENDPOINT), Some(&query))
            .await
    }

    /// Fetch every matching row.
    pub async fn retrieve(&self, client: &ServerClient) -> ServerPayload<Vec<M>> {
        let response = self.send(client, self.list_query()).await;
        ServerPayload::decode(response, is_successful_status, decode_value)
    }

    /// Fetch one page of matching rows. Pages are numbered from 1.
    pub async fn retrieve_page(
        &self,
        client: &ServerClient,
        page: u64,
        page_size: u64,
    ) -> ServerPayload<Page<M>> {
        let list = ListQuery {
            page: Some(page),
            page_size: Some(page_size),
            ..self.list_query()
        };
        let response = self.send(client, list).await;
        ServerPayload::decode(response, is_successful_status, decode_value)
    }

    /// Fetch only `fields` of every matching row, as plain maps.
    pub async fn values<I, S>(
        &self,
        client: &ServerClient,
        fields: I,
    ) -> ServerPayload<Vec<ValuesRow>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = ListQuery {
            values: Some(fields.into_iter().map(Into::into).collect()),
            ..self.list_query()
        };
        let response = self.send(client, list).await;
        ServerPayload::decode(response, is_successful_status, decode_value)
    }

    pub async fn page_values<I, S>(
        &self,
        client: &ServerClient,
        fields: I,
        page: u64,
        page_size: u64,
    ) -> ServerPayload<Page<ValuesRow>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = ListQuery {
            values: Some(fields.into_iter().map(Into::into).collect()),
            page: Some(page),
            page_size: Some(page_size),
            ..self.list_query()
        };
        let response = self.send(client, list).await;
        ServerPayload::decode(response, is_successful_status, decode_value)
    }

    /// Ask whether any row matches.
    pub async fn exists(&self, client: &ServerClient) -> ServerPayload<bool> {
        let list = ListQuery {
            exists: true,
            ..self.list_query()
        };
        let response = self.send(client, list).await;
        ServerPayload::decode(response, is_successful_status, decode_value)
    }

    /// Ask how many rows match.
    pub async fn count(&self, client: &ServerClient) -> ServerPayload<u64> {
        let list = ListQuery {
            count: true,
            ..self.list_query()
        };
        let response = self.send(client, list).await;
        ServerPayload::decode(response, is_successful_status, decode_value)
    }

    /// Fetch a single row by primary key. Only a 200 reply yields a
    /// model.
    pub async fn get<I, K>(client: &ServerClient, pk: &M::Pk, prefetch: I) -> ServerPayload<M>
    where
        I: IntoIterator<Item = K>,
        K: Into<PrefetchKey>,
    {
        let prefetch: Vec<PrefetchKey> = prefetch.into_iter().map(Into::into).collect();
        let mut query = UrlQuery::new();
        if !prefetch.is_empty() {
            if let Err(e) = query.push_json(PREFETCH_KEY, &prefetch) {
                return ServerPayload::decode(
                    ServerResponse::Failed(TransportError::Encode(e)),
                    |_| false,
                    decode_value,
                );
            }
        }
        let response = client
            .get(&endpoint::get(M::ENDPOINT, pk), Some(&query))
            .await;
        ServerPayload::decode(response, |status| status == 200, decode_value)
    }

    /// Create a row from `data`. Only a 201 reply yields a model; on a
    /// 400 the validation messages are left in the payload's data.
    pub async fn create<B: Serialize + ?Sized>(
        client: &ServerClient,
        data: &B,
    ) -> ServerPayload<M> {
        let response = client
            .post(&endpoint::create(M::ENDPOINT), data, None)
            .await;
        ServerPayload::decode(response, |status| status == 201, decode_value)
    }

    /// Fetch the row matching `lookup`, creating it from `lookup` and
    /// `defaults` if there is none. The flag is true when the row was
    /// created (201) and false when it already existed (200).
    pub async fn get_or_create<L, D>(
        client: &ServerClient,
        lookup: &L,
        defaults: &D,
    ) -> ServerPayload<(M, bool)>
    where
        L: Serialize + ?Sized,
        D: Serialize + ?Sized,
    {
        let body = GetOrCreate { lookup, defaults };
        let response = client
            .post(&endpoint::get_or_create(M::ENDPOINT), &body, None)
            .await;
        let created = response.status() == Some(201);
        ServerPayload::decode(
            response,
            |status| status == 200 || status == 201,
            |data| M::deserialize(data).map(|model| (model, created)),
        )
    }
}
