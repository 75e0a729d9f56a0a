//! Typed results layered over [`ServerResponse`].

use log::warn;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::client::{ServerResponse, TransportError};

/// The statuses treated as success when deciding whether to decode a
/// typed result.
pub const SUCCESSFUL_STATUS_CODES: [u16; 8] = [200, 201, 202, 203, 204, 205, 206, 207];

pub fn is_successful_status(status: u16) -> bool {
    SUCCESSFUL_STATUS_CODES.contains(&status)
}

/// A [`ServerResponse`] together with the typed value decoded from it.
///
/// The typed slot is filled only if the server replied with a status
/// the operation accepts and the body decoded; the raw body, the status
/// and any transport error stay available in every case.
#[derive(Debug)]
pub struct ServerPayload<T> {
    model: Option<T>,
    response: ServerResponse,
    decode_error: Option<serde_json::Error>,
}

impl<T> ServerPayload<T> {
    pub(crate) fn decode<A, D>(response: ServerResponse, accept: A, decode: D) -> Self
    where
        A: Fn(u16) -> bool,
        D: FnOnce(&Value) -> Result<T, serde_json::Error>,
    {
        let result = match &response {
            ServerResponse::Reply {
                json: false,
                status,
                ..
            } if accept(*status) => Some(Err(serde_json::Error::custom(format!(
                "response with status {} is not json",
                status
            )))),
            ServerResponse::Reply { data, status, .. } if accept(*status) => Some(decode(data)),
            _ => None,
        };
        let (model, decode_error) = match result {
            Some(Ok(model)) => (Some(model), None),
            Some(Err(e)) => {
                warn!(
                    "Failed to decode response with status {:?}: {}",
                    response.status(),
                    e
                );
                (None, Some(e))
            }
            None => (None, None),
        };
        Self {
            model,
            response,
            decode_error,
        }
    }

    pub fn model(&self) -> Option<&T> {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Option<T> {
        self.model
    }

    pub fn response(&self) -> &ServerResponse {
        &self.response
    }

    pub fn data(&self) -> Option<&Value> {
        self.response.data()
    }

    pub fn status(&self) -> Option<u16> {
        self.response.status()
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.response.error()
    }

    /// Set when the status was accepted but the body did not match `T`.
    pub fn decode_error(&self) -> Option<&serde_json::Error> {
        self.decode_error.as_ref()
    }

    /// Split into the `(model, data, status, error)` tuple.
    pub fn into_parts(self) -> (Option<T>, Option<Value>, Option<u16>, Option<TransportError>) {
        let (data, status, error) = self.response.into_parts();
        (self.model, data, status, error)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ServerPayload<U> {
        ServerPayload {
            model: self.model.map(f),
            response: self.response,
            decode_error: self.decode_error,
        }
    }
}

/// One page of a paginated list.
///
/// Everything except `data` is passed through from the server as is;
/// unrecognised keys are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub num_results: u64,
    pub num_pages: u64,
    #[serde(deserialize_with = "page_number")]
    pub page: u64,
    pub data: Vec<T>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            num_results: self.num_results,
            num_pages: self.num_pages,
            page: self.page,
            data: self.data.into_iter().map(f).collect(),
            extra: self.extra,
        }
    }
}

// The backend echoes the page parameter back verbatim, so it may
// arrive as a string.
fn page_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PageNumber {
        Number(u64),
        Text(String),
    }

    match PageNumber::deserialize(deserializer)? {
        PageNumber::Number(n) => Ok(n),
        PageNumber::Text(s) => s.trim().parse().map_err(D::Error::custom),
    }
}

/// A row returned by a `values` query: the selected fields only.
pub type ValuesRow = Map<String, Value>;
