#![cfg(test)]

use django_queryset::{ForeignKey, RelatedError, RelatedRef, RelatedState};
use serde_json::json;
use wiremock::{matchers, Mock, ResponseTemplate};

use crate::models::{server_and_client, thing, Question, Thing, ThingChild};

fn child(parent_id: i64) -> ThingChild {
    serde_json::from_value(json!({"id": 1, "name": "child", "parent_id": parent_id}))
        .expect("child decodes")
}

async fn mount_thing(server: &wiremock::MockServer, id: i64, expect: u64) {
    Mock::given(matchers::method("GET"))
        .and(matchers::path(format!("/thing/{}/get/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id, "name": format!("thing {}", id), "number": id
        })))
        .expect(expect)
        .mount(server)
        .await;
}

#[test_log::test(tokio::test)]
async fn test_resolve_fetches_once() {
    let (server, client) = server_and_client().await;
    mount_thing(&server, 7, 1).await;

    let mut c = child(7);
    assert_eq!(c.parent.state(), &RelatedState::Unloaded);

    let parent = c.resolve_parent(&client).await.cloned();
    assert_eq!(parent.map(|p| p.id), Some(7));
    assert!(c.parent.is_loaded());

    let again = c.resolve_parent(&client).await;
    assert_eq!(again.and_then(|p| p.name.clone()), Some("thing 7".to_string()));

    server.verify().await;
}

#[tokio::test]
async fn test_prefetched_relation_needs_no_request() {
    let (server, client) = server_and_client().await;
    mount_thing(&server, 7, 0).await;

    let mut c: ThingChild = serde_json::from_value(json!({
        "id": 1,
        "name": "child",
        "parent_id": 7,
        "parent": {"id": 7, "name": "embedded", "number": 7}
    }))
    .unwrap();
    assert!(c.parent.is_loaded());

    let parent = c.resolve_parent(&client).await;
    assert_eq!(parent.and_then(|p| p.name.as_deref()), Some("embedded"));
}

#[tokio::test]
async fn test_stale_cache_is_refetched() {
    let (server, client) = server_and_client().await;
    mount_thing(&server, 8, 1).await;

    let mut c = child(7);
    c.set_parent(RelatedRef::ByValue(thing(7, "seven", 7)))
        .unwrap();
    c.parent_id = 8;

    let parent = c.resolve_parent(&client).await;
    assert_eq!(parent.map(|p| p.id), Some(8));
}

#[tokio::test]
async fn test_set_by_id() {
    let (server, client) = server_and_client().await;
    mount_thing(&server, 9, 1).await;

    let mut c = child(7);
    c.set_parent(RelatedRef::ById(9)).unwrap();
    assert_eq!(c.parent_id, 9);
    assert_eq!(c.parent.pending_id(), Some(&9));
    assert!(!c.parent.is_loaded());

    let parent = c.resolve_parent(&client).await;
    assert_eq!(parent.map(|p| p.id), Some(9));
    assert_eq!(c.parent.pending_id(), None);
}

#[tokio::test]
async fn test_pending_id_wins_over_sibling() {
    let (server, client) = server_and_client().await;
    mount_thing(&server, 9, 1).await;

    let mut fk = ForeignKey::<Thing>::new();
    fk.set(RelatedRef::ById(9)).unwrap();
    let parent = fk.resolve(&client, Some(7)).await;
    assert_eq!(parent.map(|p| p.id), Some(9));
}

#[test]
fn test_set_by_value_and_record() {
    let mut c = child(7);

    c.set_parent(RelatedRef::ByValue(thing(3, "three", 3)))
        .unwrap();
    assert_eq!(c.parent_id, 3);
    assert_eq!(c.parent.get(), Some(&thing(3, "three", 3)));

    let record = json!({"id": 4, "name": "four", "number": 4});
    let record = record.as_object().unwrap().clone();
    c.set_parent(RelatedRef::ByRecord(record)).unwrap();
    assert_eq!(c.parent_id, 4);
    assert_eq!(c.parent.get().map(|p| p.id), Some(4));

    let bad = json!({"id": "four"}).as_object().unwrap().clone();
    let res = c.set_parent(RelatedRef::ByRecord(bad));
    assert!(matches!(res, Err(RelatedError::Decode(_))));
    // A failed assignment leaves the previous row in place.
    assert_eq!(c.parent_id, 4);
    assert!(c.parent.is_loaded());

    c.parent.clear();
    assert_eq!(c.parent.state(), &RelatedState::Unloaded);
}

#[tokio::test]
async fn test_no_id_resolves_to_none() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut q: Question = serde_json::from_value(json!({
        "id": 1,
        "text": "why?",
        "author_email": "a@example.com",
        "published": null,
        "closes": "2021-03-14",
        "tags": [],
        "extra": {},
        "score": 0.5,
        "poll_id": null
    }))
    .unwrap();
    assert!(q.resolve_poll(&client).await.is_none());
    assert_eq!(q.poll.state(), &RelatedState::Unloaded);
}

#[tokio::test]
async fn test_failed_fetch_stays_unloaded() {
    let (server, client) = server_and_client().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/7/get/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .expect(2)
        .mount(&server)
        .await;

    let mut c = child(7);
    assert!(c.resolve_parent(&client).await.is_none());
    assert_eq!(c.parent.state(), &RelatedState::Unloaded);
    // Nothing was cached, so the next access tries again.
    assert!(c.resolve_parent(&client).await.is_none());
}

#[test]
fn test_foreign_key_serde() {
    let loaded = ForeignKey::loaded(thing(1, "one", 1));
    assert_eq!(
        serde_json::to_value(&loaded).unwrap(),
        json!({"id": 1, "name": "one", "number": 1})
    );
    assert_eq!(
        serde_json::to_value(ForeignKey::<Thing>::new()).unwrap(),
        json!(null)
    );

    let fk: ForeignKey<Thing> = serde_json::from_value(json!(null)).unwrap();
    assert!(!fk.is_loaded());
    let mut fk: ForeignKey<Thing> =
        serde_json::from_value(json!({"id": 2, "name": "two", "number": 2})).unwrap();
    assert_eq!(fk.take(), Some(thing(2, "two", 2)));
    assert!(!fk.is_loaded());
}
