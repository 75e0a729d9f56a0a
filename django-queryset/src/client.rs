//! The HTTP transport that every model operation goes through.
//!
//! A [`ServerClient`] is built once, at startup, from a base URL and an
//! optional [`HeaderMiddleware`], and then passed by reference to each
//! operation. None of its request methods return an error: the outcome
//! is always a [`ServerResponse`], which is either the server's reply
//! (decoded body and status code, whatever the status) or the
//! [`TransportError`] that prevented a reply from arriving. A reply
//! whose body is not JSON, such as a server's HTML error page, is still
//! a reply: its text is kept as a JSON string.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::{ClientConfig, ConfigError};
use crate::payload::is_successful_status;

/// Errors raised while setting up a [`ServerClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base url '{0}' cannot have paths joined to it")]
    CannotBeABase(String),
    #[error("invalid default header '{0}'")]
    InvalidHeader(String),
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Reasons a request produced no reply from the server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot build request url for '{path}': {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e)
        } else {
            TransportError::Request(e)
        }
    }
}

/// The outcome of a single request.
///
/// Any reply from the server, including error statuses, is a
/// [`Reply`](ServerResponse::Reply); the body of a 400 carrying
/// field-level validation messages is kept for inspection. Only when
/// no reply could be obtained is the result
/// [`Failed`](ServerResponse::Failed).
///
/// `json` is false when the body was not JSON; `data` then holds the
/// body text as a [`Value::String`].
#[derive(Debug)]
pub enum ServerResponse {
    Reply { data: Value, status: u16, json: bool },
    Failed(TransportError),
}

impl ServerResponse {
    pub fn data(&self) -> Option<&Value> {
        match self {
            ServerResponse::Reply { data, .. } => Some(data),
            ServerResponse::Failed(_) => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServerResponse::Reply { status, .. } => Some(*status),
            ServerResponse::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            ServerResponse::Reply { .. } => None,
            ServerResponse::Failed(e) => Some(e),
        }
    }

    /// False for a reply whose body was not JSON, or for no reply.
    pub fn is_json(&self) -> bool {
        matches!(self, ServerResponse::Reply { json: true, .. })
    }

    /// True if the server replied with a status in the success set.
    pub fn is_success(&self) -> bool {
        self.status().map(is_successful_status).unwrap_or(false)
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            ServerResponse::Reply { data, .. } => Some(data),
            ServerResponse::Failed(_) => None,
        }
    }

    /// Split into the `(data, status, error)` triple. Exactly one of
    /// `data`/`status` (both present) and `error` is populated.
    pub fn into_parts(self) -> (Option<Value>, Option<u16>, Option<TransportError>) {
        match self {
            ServerResponse::Reply { data, status, .. } => (Some(data), Some(status), None),
            ServerResponse::Failed(e) => (None, None, Some(e)),
        }
    }
}

/// A transformation applied to the headers of every outgoing request,
/// typically to add an authentication token.
pub trait HeaderMiddleware: Send + Sync {
    fn apply(&self, headers: HeaderMap) -> HeaderMap;
}

impl<F> HeaderMiddleware for F
where
    F: Fn(HeaderMap) -> HeaderMap + Send + Sync,
{
    fn apply(&self, headers: HeaderMap) -> HeaderMap {
        self(headers)
    }
}

/// Query-string parameters for a request, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlQuery {
    pairs: Vec<(String, String)>,
}

impl UrlQuery {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn push<V: ToString>(&mut self, key: &str, value: V) -> &mut Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a parameter whose value is the JSON encoding of `value`.
    pub fn push_json<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<&mut Self, serde_json::Error> {
        let encoded = serde_json::to_string(value)?;
        self.pairs.push((key.to_string(), encoded));
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Builder for [`ServerClient`].
pub struct ClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    default_headers: BTreeMap<String, String>,
    header_middleware: Option<Arc<dyn HeaderMiddleware>>,
}

impl ClientBuilder {
    fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout: None,
            default_headers: BTreeMap::new(),
            header_middleware: None,
        }
    }

    /// Abandon any request that has not completed after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn header_middleware<H: HeaderMiddleware + 'static>(mut self, middleware: H) -> Self {
        self.header_middleware = Some(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Result<ServerClient, ClientError> {
        let base_url = parse_base_url(&self.base_url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in self.default_headers.iter() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::InvalidHeader(name.as_str().to_string()))?;
            headers.insert(name, value);
        }

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }

        Ok(ServerClient {
            base_url,
            http: http.build()?,
            default_headers: headers,
            header_middleware: self.header_middleware,
        })
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    // Paths are joined relative to the base, which must be a directory.
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    let url = Url::parse(&normalized).map_err(|source| ClientError::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientError::CannotBeABase(base_url.to_string()));
    }
    Ok(url)
}

/// A connection to a backend serving model endpoints.
///
/// Cloning is cheap; clones share the underlying connection pool and
/// header middleware.
#[derive(Clone)]
pub struct ServerClient {
    base_url: Url,
    http: reqwest::Client,
    default_headers: HeaderMap,
    header_middleware: Option<Arc<dyn HeaderMiddleware>>,
}

impl fmt::Debug for ServerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerClient")
            .field("base_url", &self.base_url.as_str())
            .field("default_headers", &self.default_headers)
            .field("header_middleware", &self.header_middleware.is_some())
            .finish()
    }
}

impl ServerClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: &str) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let mut builder = Self::builder(&config.base_url);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        for (name, value) in config.default_headers.iter() {
            builder = builder.default_header(name, value);
        }
        builder.build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The absolute URL for `path`, relative to the base URL.
    pub fn url(&self, path: &str, query: Option<&UrlQuery>) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.query_pairs_mut()
                .extend_pairs(query.pairs().iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    pub async fn get(&self, path: &str, query: Option<&UrlQuery>) -> ServerResponse {
        self.request(Method::GET, path, None, query).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        query: Option<&UrlQuery>,
    ) -> ServerResponse {
        match serde_json::to_vec(body) {
            Ok(body) => self.request(Method::POST, path, Some(body), query).await,
            Err(e) => ServerResponse::Failed(TransportError::Encode(e)),
        }
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ServerResponse {
        match serde_json::to_vec(body) {
            Ok(body) => self.request(Method::PATCH, path, Some(body), None).await,
            Err(e) => ServerResponse::Failed(TransportError::Encode(e)),
        }
    }

    pub async fn delete(&self, path: &str) -> ServerResponse {
        self.request(Method::DELETE, path, None, None).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        query: Option<&UrlQuery>,
    ) -> ServerResponse {
        let url = match self.url(path, query) {
            Ok(url) => url,
            Err(source) => {
                return ServerResponse::Failed(TransportError::Url {
                    path: path.to_string(),
                    source,
                })
            }
        };
        trace!("Request URL: {}", url);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in self.default_headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        // The middleware sees every header the request will carry.
        if let Some(middleware) = &self.header_middleware {
            headers = middleware.apply(headers);
        }

        let mut request = self.http.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("{} {} failed: {}", method, path, e);
                return ServerResponse::Failed(e.into());
            }
        };

        let status = response.status().as_u16();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("{} {} failed reading body: {}", method, path, e);
                return ServerResponse::Failed(e.into());
            }
        };
        debug!("{} {} -> {}", method, path, status);

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return ServerResponse::Reply {
                data: Value::Null,
                status,
                json: true,
            };
        }
        match serde_json::from_slice(&bytes) {
            Ok(data) => ServerResponse::Reply {
                data,
                status,
                json: true,
            },
            Err(e) => {
                debug!("{} {} body is not json: {}", method, path, e);
                ServerResponse::Reply {
                    data: Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                    status,
                    json: false,
                }
            }
        }
    }
}

#[cfg(all(test, feature = "wiremock"))]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    #[test_log::test(tokio::test)]
    async fn test_non_json_reply_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/thing/9/get/"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<h1>Not Found</h1>"))
            .mount(&server)
            .await;

        let client = ServerClient::new(&server.uri()).unwrap();
        let response = client.get("thing/9/get/", None).await;
        assert_eq!(response.status(), Some(404));
        assert_eq!(response.data(), Some(&json!("<h1>Not Found</h1>")));
        assert!(response.error().is_none());
        assert!(!response.is_json());
    }

    #[test_log::test(tokio::test)]
    async fn test_middleware_sees_default_headers() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/thing/"))
            .and(matchers::header("x-token", "rotated"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = ServerClient::builder(&server.uri())
            .default_header("x-token", "stale")
            .header_middleware(|mut headers: HeaderMap| {
                if headers.get("x-token").map(|v| v == "stale").unwrap_or(false) {
                    headers.insert("x-token", HeaderValue::from_static("rotated"));
                }
                headers
            })
            .build()
            .unwrap();

        let response = client.get("thing/", None).await;
        assert_eq!(response.status(), Some(200));
    }

    #[test_log::test(tokio::test)]
    async fn test_pk_is_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/thing/a%2Fb%3Fc%23d/get/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a/b?c#d"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ServerClient::new(&server.uri()).unwrap();
        let path = crate::endpoint::get("thing", "a/b?c#d");
        assert_eq!(path, "thing/a%2Fb%3Fc%23d/get/");

        let url = client.url(&path, None).unwrap();
        assert_eq!(url.path(), "/thing/a%2Fb%3Fc%23d/get/");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());

        let response = client.get(&path, None).await;
        assert_eq!(response.into_data(), Some(json!({"id": "a/b?c#d"})));
    }
}
