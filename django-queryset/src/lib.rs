//! # Typed query-sets for Django-style model endpoints
//!
//! This crate is a client for REST backends that expose Django models
//! through a fixed set of endpoints per model: a list endpoint that
//! understands Django's filtering grammar, plus get, create,
//! get-or-create, update, delete and custom method endpoints.
//!
//! The central type is [`QuerySet`], an immutable, chainable builder
//! whose terminal operations issue a single request each. Record types
//! implement [`Model`], normally with `#[derive(Model)]`, and foreign
//! keys are held in [`ForeignKey`] fields that resolve on demand.
//!
//! All network-bound operations go through an explicitly passed
//! [`ServerClient`] and never return an error: the outcome is a
//! [`ServerResponse`] (the server's reply, whatever its status, or the
//! transport failure) or a [`ServerPayload`], which adds the typed
//! value when the reply's status is one the operation accepts.
//!
//! ```rust,no_run
//! use django_queryset::{Lookups, Model, Operator, ServerClient};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize, Model)]
//! #[django(endpoint = "thing")]
//! struct Thing {
//!     #[django(pk, read_only)]
//!     id: i64,
//!     name: String,
//!     number: Option<i64>,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ServerClient::new("http://localhost:8000/api/")?;
//! let payload = Thing::objects()
//!     .filter(Lookups::new().op("number", Operator::Gte, 10))?
//!     .order_by(["-number"])
//!     .retrieve(&client)
//!     .await;
//!
//! match payload.model() {
//!     Some(things) => println!("{} things", things.len()),
//!     None => println!("failed: {:?} {:?}", payload.status(), payload.error()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The optional `wiremock` feature (on by default) provides
//! [`mock::ListEndpoint`], a mock list endpoint for tests.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod lookup;
pub mod mock;
pub mod model;
pub mod object;
pub mod ordering;
pub mod payload;
pub mod prefetch;
pub mod queryset;
pub mod related;
pub mod schema;

pub use crate::client::{
    ClientBuilder, ClientError, HeaderMiddleware, ServerClient, ServerResponse, TransportError,
    UrlQuery,
};
pub use crate::config::{ClientConfig, ConfigError};
pub use crate::lookup::{FlatLookups, IntoLookupValue, IntoLookups, LookupError, Lookups, Operator};
pub use crate::model::Model;
pub use crate::object::ObjectType;
pub use crate::ordering::OrderBy;
pub use crate::payload::{Page, ServerPayload, ValuesRow, SUCCESSFUL_STATUS_CODES};
pub use crate::prefetch::PrefetchKey;
pub use crate::queryset::{ListQuery, QuerySet, SerializedQuery};
pub use crate::related::{ForeignKey, Related, RelatedError, RelatedRef, RelatedState};
pub use crate::schema::{FieldSchema, FieldType};
pub use django_queryset_derive::{Model, ObjectType};
