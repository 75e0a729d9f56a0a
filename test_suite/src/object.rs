#![cfg(test)]

use django_queryset::ObjectType;
use serde_json::json;
use wiremock::{matchers, Mock, ResponseTemplate};

use crate::models::{server_and_client, PointPair, UserSettings};

#[tokio::test]
async fn test_call_method_sends_fields() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/point-pair/add/"))
        .and(matchers::body_json(json!({
            "__init__": {"a": 1, "b": 2},
            "__args__": {"scale": 10}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(30)))
        .expect(1)
        .mount(&server)
        .await;

    let pair = PointPair { a: 1, b: 2 };
    let response = pair.call_method(&client, "add", &json!({"scale": 10})).await;
    assert_eq!(response.status(), Some(200));
    assert_eq!(response.into_data(), Some(json!(30)));
}

#[tokio::test]
async fn test_call_static() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/point-pair/from-polar/"))
        .and(matchers::body_json(json!({"r": 1.0, "theta": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1, "b": 0})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/point-pair/explode/"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "Server Error"})),
        )
        .mount(&server)
        .await;

    let response =
        PointPair::call_static(&client, "from_polar", &json!({"r": 1.0, "theta": 0.0})).await;
    let pair: PointPair = serde_json::from_value(response.into_data().unwrap()).unwrap();
    assert_eq!(pair, PointPair { a: 1, b: 0 });

    let failed = PointPair::call_static(&client, "explode", &json!({})).await;
    assert!(!failed.is_success());
    assert_eq!(failed.status(), Some(500));
}

#[test]
fn test_endpoints() {
    assert_eq!(PointPair::ENDPOINT, "point-pair");
    assert_eq!(UserSettings::ENDPOINT, "user-settings");
}
