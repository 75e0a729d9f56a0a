#![cfg(test)]

use chrono::NaiveDate;
use django_queryset::endpoint;
use django_queryset::lookup::{flatten, IntoLookupValue, LookupError, Lookups, Operator};
use django_queryset::{Model, OrderBy, PrefetchKey, QuerySet, SUCCESSFUL_STATUS_CODES};
use serde_json::json;

use crate::models::{Thing, ThingChild};

fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

#[test]
fn test_flatten_nested_relation() {
    let flat = flatten(&object(json!({"owner": {"id": 5}}))).unwrap();
    assert_eq!(serde_json::Value::Object(flat), json!({"owner__id": 5}));
}

#[test]
fn test_flatten_deep_and_arrays_are_leaves() {
    let flat = flatten(&object(json!({
        "name": "widget",
        "owner": {"group": {"id__in": [1, 2]}, "active": true},
        "pairs": [{"x": 1}, {"x": 2}],
        "missing": null
    })))
    .unwrap();
    assert_eq!(
        serde_json::Value::Object(flat),
        json!({
            "name": "widget",
            "owner__group__id__in": [1, 2],
            "owner__active": true,
            "pairs": [{"x": 1}, {"x": 2}],
            "missing": null
        })
    );
}

#[test]
fn test_flatten_collision() {
    let res = flatten(&object(json!({"owner__id": 1, "owner": {"id": 2}})));
    assert_eq!(res, Err(LookupError::Collision("owner__id".to_string())));
}

#[test]
fn test_lookups_builder() {
    let lookups = Lookups::new()
        .exact("name", "widget")
        .op("number", Operator::Range, (1, 5))
        .op("created", Operator::Gte, NaiveDate::from_ymd_opt(2021, 3, 14).unwrap())
        .related(
            "parent",
            Lookups::new().op("name", Operator::IStartsWith, "th"),
        );
    let flat = lookups.flatten().unwrap();
    assert_eq!(flat.len(), 4);
    assert_eq!(flat.get("number__range"), Some(&json!([1, 5])));
    assert_eq!(flat.get("created__gte"), Some(&json!("2021-03-14")));
    assert_eq!(flat.get("parent__name__istartswith"), Some(&json!("th")));
}

#[test]
fn test_lookup_values() {
    assert_eq!(None::<i64>.into_lookup_value(), json!(null));
    assert_eq!(vec!["a", "b"].into_lookup_value(), json!(["a", "b"]));
    assert_eq!(2.5f64.into_lookup_value(), json!(2.5));
    let when = NaiveDate::from_ymd_opt(2021, 3, 14)
        .unwrap()
        .and_hms_opt(15, 9, 26)
        .unwrap();
    assert_eq!(when.into_lookup_value(), json!("2021-03-14T15:09:26"));
}

#[test]
fn test_operator_names() {
    assert_eq!(Operator::IStartsWith.to_string(), "istartswith");
    assert_eq!("week_day".parse::<Operator>().unwrap(), Operator::WeekDay);
    assert_eq!("isnull".parse::<Operator>().unwrap(), Operator::IsNull);
    assert!("nonsense".parse::<Operator>().is_err());
    assert!(Operator::Quarter.is_datetime_part());
    assert!(!Operator::Gt.is_datetime_part());
}

#[test]
fn test_filter_rejects_non_objects() {
    let res = QuerySet::<Thing>::all().filter(json!([1, 2]));
    assert_eq!(res.unwrap_err(), LookupError::NotAnObject("an array"));
}

#[test]
fn test_filter_collision_at_construction() {
    let res = QuerySet::<Thing>::all().filter(json!({"parent__id": 1, "parent": {"id": 2}}));
    assert!(matches!(res, Err(LookupError::Collision(key)) if key == "parent__id"));
}

#[test]
fn test_filter_is_immutable() {
    let base = QuerySet::<Thing>::all();
    let a = base.filter(json!({"name": "one"})).unwrap();
    let ab = a.filter(json!({"number__gt": 3})).unwrap();

    assert!(base.serialize_query().filters.is_empty());
    assert_eq!(
        serde_json::to_value(&a.serialize_query().filters).unwrap(),
        json!({"name": "one"})
    );
    assert_eq!(
        serde_json::to_value(&ab.serialize_query().filters).unwrap(),
        json!({"name": "one", "number__gt": 3})
    );
}

#[test]
fn test_filter_later_keys_win() {
    let qs = QuerySet::<Thing>::all()
        .filter(json!({"name": "one"}))
        .unwrap()
        .filter(json!({"name": "two"}))
        .unwrap();
    assert_eq!(qs.serialize_query().filters.get("name"), Some(&json!("two")));
}

#[test]
fn test_exclude_keeps_filters() {
    let qs = QuerySet::<Thing>::all()
        .filter(json!({"number__gte": 3}))
        .unwrap()
        .exclude(json!({"name": "four"}))
        .unwrap()
        .exclude(json!({"number": 6}))
        .unwrap();
    let query = serde_json::to_value(qs.serialize_query()).unwrap();
    assert_eq!(
        query,
        json!({
            "filters": {"number__gte": 3},
            "exclude": {"name": "four", "number": 6},
            "or_": []
        })
    );
}

#[test]
fn test_or_composition() {
    let qs1 = QuerySet::<Thing>::all()
        .filter(json!({"name": "one"}))
        .unwrap();
    let qs2 = QuerySet::<Thing>::all()
        .filter(json!({"number": 5}))
        .unwrap()
        .exclude(json!({"name": "five"}))
        .unwrap();

    let combined = qs1.or(&qs2);
    let query = combined.serialize_query();
    assert_eq!(query.or_.len(), 1);
    assert_eq!(query.or_, vec![qs2.serialize_query()]);
    assert!(qs1.serialize_query().or_.is_empty());

    let nested = combined.or(&qs1.or(&qs2));
    assert_eq!(nested.serialize_query().or_[1].or_.len(), 1);
}

#[test]
fn test_prefetch_accumulates() {
    let base = QuerySet::<ThingChild>::all().prefetch(["parent"]);
    let more = base.prefetch([PrefetchKey::nested("parent", "parent")]);

    assert_eq!(base.prefetch_keys().map(|k| k.len()), Some(1));
    assert_eq!(
        serde_json::to_value(more.prefetch_keys().unwrap()).unwrap(),
        json!(["parent", {"parent": "parent"}])
    );
    assert_eq!(more.prefetch_keys().unwrap()[1].path(), "parent__parent");
}

#[test]
fn test_order_by_and_distinct() {
    let qs = QuerySet::<Thing>::all()
        .order_by(vec![
            OrderBy::from("name"),
            OrderBy::from("-number"),
            OrderBy::from(("-", "id")),
        ])
        .distinct(["name"]);
    assert_eq!(
        serde_json::to_value(qs.ordering().unwrap()).unwrap(),
        json!(["name", "-number", "-id"])
    );
    assert!(qs.ordering().unwrap()[2].is_descending());
    assert_eq!(qs.ordering().unwrap()[2].field(), "id");
    assert_eq!(qs.distinct_fields(), Some(&["name".to_string()][..]));

    let reordered = qs.order_by(["id"]);
    assert_eq!(reordered.ordering().unwrap().len(), 1);
}

#[test]
fn test_list_query_parameters() {
    let qs = QuerySet::<Thing>::all()
        .filter(json!({"name": "one"}))
        .unwrap()
        .prefetch(["parent"])
        .order_by(["-number"])
        .only(["id", "name"]);
    let mut list = qs.list_query();
    list.page = Some(2);
    list.page_size = Some(10);
    list.count = true;

    let query = list.to_url_query().unwrap();
    let keys: Vec<&str> = query.pairs().iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec!["query", "prefetch", "order_by", "fields", "page", "pagesize", "count"]
    );
    assert_eq!(
        query.get("query"),
        Some(r#"{"filters":{"name":"one"},"exclude":{},"or_":[]}"#)
    );
    assert_eq!(query.get("fields"), Some(r#"["id","name"]"#));
    assert_eq!(query.get("page"), Some("2"));
    assert_eq!(query.get("count"), Some("true"));
}

#[test]
fn test_endpoint_layout() {
    assert_eq!(endpoint::list("thing"), "thing/");
    assert_eq!(endpoint::get("thing", 7), "thing/7/get/");
    assert_eq!(endpoint::create("thing"), "thing/create/");
    assert_eq!(endpoint::get_or_create("thing"), "thing/get-or-create/");
    assert_eq!(endpoint::update("thing", 7), "thing/7/update/");
    assert_eq!(endpoint::delete("thing", 7), "thing/7/delete/");
    assert_eq!(endpoint::get("thing", "a/b?c"), "thing/a%2Fb%3Fc/get/");
    assert_eq!(
        endpoint::property("thing", 7, "full_name"),
        "thing/7/full-name/"
    );
    assert_eq!(
        endpoint::method("thing", "thing_method", 7),
        "thing/thing-method/7/"
    );
    assert_eq!(
        endpoint::static_method("thing-child", "thing_static_method"),
        "thing-child/thing-static-method/"
    );
}

#[test]
fn test_related_set_and_links() {
    let thing = crate::models::thing(3, "three", 3);
    let children = thing.related_set::<ThingChild>("parent__id");
    assert_eq!(
        children.serialize_query().filters.get("parent__id"),
        Some(&json!(3))
    );

    let named = children.filter(json!({"name": "child"})).unwrap();
    assert_eq!(named.serialize_query().filters.len(), 2);

    assert_eq!(thing.detail_link(), "thing/3/");
    assert_eq!(Thing::objects().serialize_query().filters.len(), 0);
}

#[test]
fn test_success_set() {
    assert_eq!(
        SUCCESSFUL_STATUS_CODES,
        [200, 201, 202, 203, 204, 205, 206, 207]
    );
}
