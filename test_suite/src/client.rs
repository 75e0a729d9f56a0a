#![cfg(test)]

use std::time::Duration;

use django_queryset::{
    ClientError, Model, QuerySet, ServerClient, ServerResponse, TransportError,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

use crate::models::{server_and_client, thing, Thing};

/// A client pointing at a port nothing listens on any more.
async fn dead_client() -> ServerClient {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);
    ServerClient::new(&uri).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_transport_failure_shape() {
    let client = dead_client().await;

    let response = client.get("thing/", None).await;
    assert!(matches!(
        response,
        ServerResponse::Failed(TransportError::Request(_))
    ));
    let (data, status, error) = response.into_parts();
    assert!(data.is_none());
    assert!(status.is_none());
    assert!(error.is_some());
}

#[tokio::test]
async fn test_terminal_operations_never_fail() {
    let client = dead_client().await;
    let qs = Thing::objects().filter(json!({"name": "one"})).unwrap();

    let retrieved = qs.retrieve(&client).await;
    assert!(retrieved.model().is_none());
    assert!(retrieved.status().is_none());
    assert!(retrieved.data().is_none());
    assert!(retrieved.error().is_some());

    let page = qs.retrieve_page(&client, 1, 25).await;
    assert!(page.model().is_none() && page.error().is_some());

    let values = qs.values(&client, ["name"]).await;
    assert!(values.model().is_none() && values.error().is_some());

    let page_values = qs.page_values(&client, ["name"], 1, 25).await;
    assert!(page_values.model().is_none() && page_values.error().is_some());

    let exists = qs.exists(&client).await;
    assert!(exists.model().is_none() && exists.error().is_some());

    let count = qs.count(&client).await;
    assert!(count.model().is_none() && count.error().is_some());

    let got = QuerySet::<Thing>::get(&client, &1, Vec::<&str>::new()).await;
    assert!(got.model().is_none() && got.error().is_some());

    let created = QuerySet::<Thing>::create(&client, &json!({"name": "new"})).await;
    assert!(created.model().is_none() && created.error().is_some());

    let updated = thing(1, "one", 1).update(&client, &json!({"name": "x"})).await;
    assert!(updated.model().is_none() && updated.error().is_some());

    let deleted = thing(1, "one", 1).delete(&client).await;
    assert!(!deleted.is_success());
    assert!(deleted.error().is_some());
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = ServerClient::builder(&server.uri())
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let payload = Thing::objects().retrieve(&client).await;
    assert!(matches!(payload.error(), Some(TransportError::Timeout(_))));
}

#[tokio::test]
async fn test_header_middleware() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/1/get/"))
        .and(matchers::header("authorization", "Token secret"))
        .and(matchers::header("accept", "application/json"))
        .and(matchers::header("x-client", "tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServerClient::builder(&server.uri())
        .default_header("x-client", "tests")
        .header_middleware(|mut headers: HeaderMap| {
            headers.insert(AUTHORIZATION, HeaderValue::from_static("Token secret"));
            headers
        })
        .build()
        .unwrap();

    let payload = QuerySet::<Thing>::get(&client, &1, Vec::<&str>::new()).await;
    assert_eq!(payload.model().map(Model::pk), Some(1));
}

#[tokio::test]
async fn test_post_sends_json() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/create/"))
        .and(matchers::header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 5})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client.post("thing/create/", &json!({"name": "x"}), None).await;
    assert_eq!(response.status(), Some(201));
    assert!(response.is_success());
}

#[tokio::test]
async fn test_bodies() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/text/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/empty/"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(matchers::method("PATCH"))
        .and(matchers::path("/patch/"))
        .and(matchers::body_json(json!({"a": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1})))
        .mount(&server)
        .await;

    let text = client.get("text/", None).await;
    assert!(matches!(
        &text,
        ServerResponse::Reply { status: 200, json: false, .. }
    ));
    assert_eq!(text.data(), Some(&serde_json::Value::from("<html>oops</html>")));
    assert!(text.error().is_none());

    let empty = client.get("empty/", None).await;
    assert_eq!(empty.status(), Some(202));
    assert!(empty.is_json());
    assert_eq!(empty.data(), Some(&serde_json::Value::Null));

    let patched = client.patch("patch/", &json!({"a": 1})).await;
    assert_eq!(patched.into_data(), Some(json!({"a": 1})));
}

#[tokio::test]
async fn test_base_url_with_path() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/thing/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServerClient::new(&format!("{}/api", server.uri())).unwrap();
    assert_eq!(
        client.url("thing/7/get/", None).unwrap().as_str(),
        format!("{}/api/thing/7/get/", server.uri())
    );

    let things = Thing::objects().retrieve(&client).await.into_model().unwrap();
    assert_eq!(things.len(), 1);
}

#[test]
fn test_invalid_base_url() {
    assert!(matches!(
        ServerClient::new("not a url"),
        Err(ClientError::InvalidBaseUrl { .. })
    ));
    assert!(matches!(
        ServerClient::new("mailto:someone@example.com"),
        Err(ClientError::CannotBeABase(_))
    ));
    assert!(matches!(
        ServerClient::builder("http://localhost/")
            .default_header("bad header", "x")
            .build(),
        Err(ClientError::InvalidHeader(_))
    ));
}
