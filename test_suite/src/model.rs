#![cfg(test)]

use django_queryset::mock::ListEndpoint;
use django_queryset::{Model, QuerySet, ServerResponse};
use serde_json::json;
use wiremock::{matchers, Mock, ResponseTemplate};

use crate::models::{server_and_client, thing, Thing, ThingChild};

#[tokio::test]
async fn test_get_requires_200() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/1/get/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "one", "number": 1
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/2/get/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 2, "name": "two", "number": 2
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/3/get/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    let found = QuerySet::<Thing>::get(&client, &1, Vec::<&str>::new()).await;
    assert_eq!(found.model(), Some(&thing(1, "one", 1)));

    let created = QuerySet::<Thing>::get(&client, &2, Vec::<&str>::new()).await;
    assert!(created.model().is_none());
    assert_eq!(created.status(), Some(201));
    assert_eq!(created.data().unwrap()["id"], json!(2));

    let missing = QuerySet::<Thing>::get(&client, &3, Vec::<&str>::new()).await;
    assert!(missing.model().is_none());
    assert_eq!(missing.status(), Some(404));
    assert_eq!(missing.data(), Some(&json!({"detail": "Not found."})));
}

#[tokio::test]
async fn test_get_with_prefetch() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing-child/4/get/"))
        .and(matchers::query_param("prefetch", r#"["parent"]"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4,
            "name": "child",
            "parent_id": 1,
            "parent": {"id": 1, "name": "one", "number": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let child = QuerySet::<ThingChild>::get(&client, &4, ["parent"])
        .await
        .into_model()
        .unwrap();
    assert_eq!(child.parent.get(), Some(&thing(1, "one", 1)));
}

#[tokio::test]
async fn test_create_requires_201() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/create/"))
        .and(matchers::body_json(json!({"name": "new", "number": 3})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9, "name": "new", "number": 3
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/create/"))
        .and(matchers::body_json(json!({"name": "old"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "old", "number": null
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/create/"))
        .and(matchers::body_json(json!({"number": "lots"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "number": ["A valid integer is required."]
        })))
        .mount(&server)
        .await;

    let created =
        QuerySet::<Thing>::create(&client, &json!({"name": "new", "number": 3})).await;
    assert_eq!(created.model().map(Model::pk), Some(9));
    assert_eq!(created.status(), Some(201));

    let not_created = QuerySet::<Thing>::create(&client, &json!({"name": "old"})).await;
    assert!(not_created.model().is_none());
    assert_eq!(not_created.status(), Some(200));

    let invalid = QuerySet::<Thing>::create(&client, &json!({"number": "lots"})).await;
    assert!(invalid.model().is_none());
    assert!(invalid.error().is_none());
    assert_eq!(invalid.status(), Some(400));
    assert_eq!(
        invalid.data().unwrap()["number"][0],
        json!("A valid integer is required.")
    );
}

#[tokio::test]
async fn test_get_or_create() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/get-or-create/"))
        .and(matchers::body_json(json!({
            "lookup": {"name": "fresh"},
            "defaults": {"number": 3}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 10, "name": "fresh", "number": 3
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/get-or-create/"))
        .and(matchers::body_json(json!({
            "lookup": {"name": "one"},
            "defaults": {}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "one", "number": 1
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/get-or-create/"))
        .and(matchers::body_json(json!({
            "lookup": {"name": "dup"},
            "defaults": {}
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "get() returned more than one Thing"
        })))
        .mount(&server)
        .await;

    let created = QuerySet::<Thing>::get_or_create(
        &client,
        &json!({"name": "fresh"}),
        &json!({"number": 3}),
    )
    .await;
    let (model, was_created) = created.into_model().unwrap();
    assert_eq!(model.pk(), 10);
    assert!(was_created);

    let existing =
        QuerySet::<Thing>::get_or_create(&client, &json!({"name": "one"}), &json!({})).await;
    let (model, was_created) = existing.into_model().unwrap();
    assert_eq!(model, thing(1, "one", 1));
    assert!(!was_created);

    let failed =
        QuerySet::<Thing>::get_or_create(&client, &json!({"name": "dup"}), &json!({})).await;
    assert!(failed.model().is_none());
    assert_eq!(failed.status(), Some(400));
    assert!(failed.data().is_some());
}

#[tokio::test]
async fn test_update_delete_refresh() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/1/update/"))
        .and(matchers::body_json(json!({"name": "renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "renamed", "number": 1
        })))
        .mount(&server)
        .await;
    Mock::given(matchers::method("DELETE"))
        .and(matchers::path("/thing/1/delete/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/1/get/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "fresh", "number": 1
        })))
        .mount(&server)
        .await;

    let one = thing(1, "one", 1);

    let updated = one.update(&client, &json!({"name": "renamed"})).await;
    assert_eq!(updated.model(), Some(&thing(1, "renamed", 1)));

    let refreshed = one.refresh(&client, Vec::<&str>::new()).await;
    assert_eq!(refreshed.model(), Some(&thing(1, "fresh", 1)));

    let deleted = one.delete(&client).await;
    assert!(deleted.is_success());
    assert!(matches!(
        deleted,
        ServerResponse::Reply {
            data: serde_json::Value::Null,
            status: 204,
            ..
        }
    ));
}

#[tokio::test]
async fn test_property_and_methods() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/1/full-name/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("Thing One")))
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/thing-method/1/"))
        .and(matchers::body_json(json!({"a": "x", "b": "y"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("xy")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/thing/thing-static-method/"))
        .and(matchers::body_json(json!({"a": "x", "b": "y"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"joined": "x-y"})))
        .expect(1)
        .mount(&server)
        .await;

    let one = thing(1, "one", 1);

    let name = one.property::<String>(&client, "full_name").await;
    assert_eq!(name.model().map(String::as_str), Some("Thing One"));

    let wrong_type = one.property::<i64>(&client, "full_name").await;
    assert!(wrong_type.model().is_none());
    assert!(wrong_type.decode_error().is_some());

    let args = json!({"a": "x", "b": "y"});
    let result = one.call_method(&client, "thing_method", &args).await;
    assert_eq!(result.status(), Some(200));
    assert_eq!(result.data(), Some(&json!("xy")));

    let result = Thing::call_static(&client, "thing_static_method", &args).await;
    assert_eq!(result.into_data(), Some(json!({"joined": "x-y"})));
}

#[tokio::test]
async fn test_related_set() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing-child/"))
        .respond_with(ListEndpoint::new(vec![
            json!({"id": 1, "name": "a", "parent_id": 1}),
            json!({"id": 2, "name": "b", "parent_id": 2}),
            json!({"id": 3, "name": "c", "parent_id": 1}),
        ]))
        .mount(&server)
        .await;

    let one = thing(1, "one", 1);
    let children = one
        .related_set::<ThingChild>("parent__id")
        .order_by(["-id"])
        .retrieve(&client)
        .await
        .into_model()
        .unwrap();
    let ids: Vec<i64> = children.iter().map(Model::pk).collect();
    assert_eq!(ids, vec![3, 1]);
    assert!(children.iter().all(|c| !c.parent.is_loaded()));
}
