#![cfg(test)]

use django_queryset::mock::ListEndpoint;
use django_queryset::{Model, QuerySet, ServerClient};
use serde_json::{json, Value};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

use crate::models::{server_and_client, Thing};

fn rows() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "one", "number": 1}),
        json!({"id": 2, "name": "two", "number": 2}),
        json!({"id": 3, "name": "three", "number": 3}),
        json!({"id": 4, "name": "four", "number": 4}),
        json!({"id": 5, "name": "five", "number": 5}),
        json!({"id": 6, "name": "one", "number": 6}),
    ]
}

async fn list_server() -> (MockServer, ServerClient) {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/"))
        .respond_with(ListEndpoint::new(rows()))
        .mount(&server)
        .await;
    (server, client)
}

fn pks(things: &[Thing]) -> Vec<i64> {
    things.iter().map(Model::pk).collect()
}

#[test_log::test(tokio::test)]
async fn test_retrieve_filter_exclude() {
    let (_server, client) = list_server().await;

    let payload = Thing::objects()
        .filter(json!({"number__gte": 3}))
        .unwrap()
        .exclude(json!({"name": "four"}))
        .unwrap()
        .order_by(["id"])
        .retrieve(&client)
        .await;

    assert_eq!(payload.status(), Some(200));
    assert!(payload.error().is_none());
    assert_eq!(pks(payload.model().unwrap()), vec![3, 5, 6]);
}

#[tokio::test]
async fn test_retrieve_or() {
    let (_server, client) = list_server().await;

    let ones = Thing::objects().filter(json!({"name": "one"})).unwrap();
    let five = Thing::objects().filter(json!({"number": 5})).unwrap();
    let payload = ones.or(&five).order_by(["id"]).retrieve(&client).await;

    assert_eq!(pks(payload.model().unwrap()), vec![1, 5, 6]);
}

#[tokio::test]
async fn test_retrieve_order_and_only() {
    let (_server, client) = list_server().await;

    let payload = Thing::objects()
        .order_by(["-number"])
        .only(["id", "number"])
        .retrieve(&client)
        .await;

    let things = payload.into_model().unwrap();
    assert_eq!(pks(&things), vec![6, 5, 4, 3, 2, 1]);
    assert!(things.iter().all(|t| t.name.is_none()));
}

#[tokio::test]
async fn test_wire_format() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/"))
        .and(matchers::query_param(
            "query",
            r#"{"filters":{"name":"one"},"exclude":{},"or_":[]}"#,
        ))
        .and(matchers::query_param("order_by", r#"["-number"]"#))
        .and(matchers::query_param("prefetch", r#"["parent"]"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let payload = Thing::objects()
        .filter(json!({"name": "one"}))
        .unwrap()
        .order_by(["-number"])
        .prefetch(["parent"])
        .retrieve(&client)
        .await;
    assert_eq!(payload.model(), Some(&Vec::new()));
}

#[tokio::test]
async fn test_retrieve_page_mapping() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/"))
        .and(matchers::query_param("page", "1"))
        .and(matchers::query_param("pagesize", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "num_results": 2,
            "num_pages": 1,
            "page": 1,
            "data": [{"id": 1, "name": "one"}, {"id": 2, "name": "two"}]
        })))
        .mount(&server)
        .await;

    let payload = Thing::objects().retrieve_page(&client, 1, 25).await;
    let page = payload.model().unwrap();
    assert_eq!(page.num_results, 2);
    assert_eq!(page.num_pages, 1);
    assert_eq!(page.page, 1);
    assert_eq!(pks(&page.data), vec![1, 2]);
    assert!(page.extra.is_empty());
    assert_eq!(
        payload.data().unwrap()["data"][1],
        json!({"id": 2, "name": "two"})
    );
}

#[tokio::test]
async fn test_retrieve_page_against_mock() {
    let (_server, client) = list_server().await;
    let qs = Thing::objects().order_by(["id"]);

    let first = qs.retrieve_page(&client, 1, 4).await.into_model().unwrap();
    assert_eq!(first.num_results, 6);
    assert_eq!(first.num_pages, 2);
    assert_eq!(first.page, 1);
    assert_eq!(pks(&first.data), vec![1, 2, 3, 4]);

    let second = qs.retrieve_page(&client, 2, 4).await.into_model().unwrap();
    assert_eq!(second.page, 2);
    assert_eq!(pks(&second.data), vec![5, 6]);
}

#[tokio::test]
async fn test_values() {
    let (_server, client) = list_server().await;

    let payload = Thing::objects()
        .filter(json!({"number__lte": 2}))
        .unwrap()
        .order_by(["id"])
        .values(&client, ["name"])
        .await;
    let rows = payload.into_model().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(Value::Object(rows[0].clone()), json!({"name": "one"}));
    assert_eq!(Value::Object(rows[1].clone()), json!({"name": "two"}));
}

#[tokio::test]
async fn test_distinct_page_values() {
    let (_server, client) = list_server().await;

    let payload = Thing::objects()
        .order_by(["name"])
        .distinct(["name"])
        .page_values(&client, ["name"], 1, 2)
        .await;
    let page = payload.into_model().unwrap();
    assert_eq!(page.num_results, 5);
    assert_eq!(page.num_pages, 3);
    let names: Vec<&Value> = page.data.iter().map(|row| &row["name"]).collect();
    assert_eq!(names, vec![&json!("five"), &json!("four")]);
}

#[tokio::test]
async fn test_exists_and_count() {
    let (_server, client) = list_server().await;

    let big = Thing::objects().filter(json!({"number__gt": 5})).unwrap();
    assert_eq!(big.exists(&client).await.model(), Some(&true));

    let huge = Thing::objects().filter(json!({"number__gt": 10})).unwrap();
    assert_eq!(huge.exists(&client).await.model(), Some(&false));

    let ones = Thing::objects().filter(json!({"name": "one"})).unwrap();
    assert_eq!(ones.count(&client).await.model(), Some(&2));
    assert_eq!(Thing::objects().count(&client).await.model(), Some(&6));
}

#[tokio::test]
async fn test_error_status_keeps_body() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"detail": "You do not have permission."})),
        )
        .mount(&server)
        .await;

    let payload = Thing::objects().retrieve(&client).await;
    assert!(payload.model().is_none());
    assert!(payload.error().is_none());
    assert!(payload.decode_error().is_none());
    assert_eq!(payload.status(), Some(403));
    assert_eq!(
        payload.data(),
        Some(&json!({"detail": "You do not have permission."}))
    );

    let count = Thing::objects().count(&client).await;
    assert!(count.model().is_none());
    assert_eq!(count.status(), Some(403));
}

#[tokio::test]
async fn test_bad_rows_are_a_decode_error() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "seven"}])))
        .mount(&server)
        .await;

    let payload = Thing::objects().retrieve(&client).await;
    assert!(payload.model().is_none());
    assert!(payload.decode_error().is_some());
    assert_eq!(payload.status(), Some(200));
    let (model, data, status, error) = payload.into_parts();
    assert!(model.is_none());
    assert_eq!(data, Some(json!([{"id": "seven"}])));
    assert_eq!(status, Some(200));
    assert!(error.is_none());
}

#[tokio::test]
async fn test_mock_rejects_unknown_parameters() {
    let (_server, client) = list_server().await;
    let mut query = django_queryset::UrlQuery::new();
    query.push("bogus", 1);
    let response = client.get("thing/", Some(&query)).await;
    assert_eq!(response.status(), Some(500));
    assert!(response.error().is_none());
    assert_eq!(
        response.data(),
        Some(&Value::from("unknown query parameter `bogus`"))
    );
}

#[tokio::test]
async fn test_html_error_page_keeps_status() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/9/get/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<h1>Not Found</h1>"))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>maintenance</p>"))
        .mount(&server)
        .await;

    let missing = QuerySet::<Thing>::get(&client, &9, Vec::<&str>::new()).await;
    assert!(missing.model().is_none());
    assert!(missing.error().is_none());
    assert!(missing.decode_error().is_none());
    assert_eq!(missing.status(), Some(404));
    assert_eq!(missing.data(), Some(&Value::from("<h1>Not Found</h1>")));

    let listed = Thing::objects().retrieve(&client).await;
    assert!(listed.model().is_none());
    assert!(listed.error().is_none());
    assert!(listed.decode_error().is_some());
    assert_eq!(listed.status(), Some(200));
}

#[tokio::test]
async fn test_query_sets_are_reusable() {
    let (_server, client) = list_server().await;
    let base = QuerySet::<Thing>::all().order_by(["id"]);

    let small = base.filter(json!({"number__lt": 3})).unwrap();
    let large = base.filter(json!({"number__gt": 4})).unwrap();

    assert_eq!(pks(&small.retrieve(&client).await.into_model().unwrap()), vec![1, 2]);
    assert_eq!(pks(&large.retrieve(&client).await.into_model().unwrap()), vec![5, 6]);
    assert_eq!(base.retrieve(&client).await.into_model().unwrap().len(), 6);
}
