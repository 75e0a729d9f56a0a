#![cfg(test)]

use django_queryset::schema::{FieldSchema, FieldType};
use django_queryset::Model;

use crate::models::{Question, Thing, ThingChild};

fn names<M: Model>() -> Vec<&'static str> {
    M::FIELD_SCHEMAS.iter().map(|f| f.field_name).collect()
}

#[test]
fn test_thing_schema() {
    assert_eq!(Thing::ENDPOINT, "thing");
    assert_eq!(names::<Thing>(), vec!["id", "name", "number"]);
    assert_eq!(
        Thing::field_schema("id"),
        Some(&FieldSchema {
            field_name: "id",
            field_type: FieldType::AutoField,
            nullable: false,
            read_only: true,
            related_model: None,
        })
    );
    let name = Thing::field_schema("name").unwrap();
    assert_eq!(name.field_type, FieldType::CharField);
    assert!(name.nullable);
    assert!(!name.read_only);
    assert!(Thing::field_schema("parent").is_none());
}

#[test]
fn test_foreign_key_schema() {
    assert_eq!(ThingChild::ENDPOINT, "thing-child");
    assert_eq!(names::<ThingChild>(), vec!["id", "name", "parent_id"]);

    let parent = ThingChild::field_schema("parent_id").unwrap();
    assert_eq!(parent.field_type, FieldType::ForeignKey);
    assert_eq!(parent.related_model, Some("thing"));
    assert!(!parent.nullable);
    assert!(parent.field_type.is_relation());
}

#[test]
fn test_inferred_and_explicit_types() {
    let schema = |name: &str| Question::field_schema(name).unwrap();

    assert_eq!(schema("author_email").field_type, FieldType::EmailField);
    assert_eq!(schema("text").field_type, FieldType::CharField);
    assert_eq!(schema("published").field_type, FieldType::DateTimeField);
    assert!(schema("published").nullable);
    assert_eq!(schema("closes").field_type, FieldType::DateField);
    assert_eq!(schema("tags").field_type, FieldType::ArrayField);
    assert_eq!(schema("extra").field_type, FieldType::JSONField);
    assert_eq!(schema("score").field_type, FieldType::FloatField);
    assert!(schema("score").read_only);
    assert_eq!(schema("poll_id").related_model, Some("thing"));
    assert!(schema("poll_id").nullable);

    assert!(Question::field_schema("scratch").is_none());
    assert!(Question::field_schema("poll").is_none());
}

#[test]
fn test_field_type_names() {
    assert_eq!("JSONField".parse::<FieldType>().unwrap(), FieldType::JSONField);
    assert_eq!(FieldType::OneToOneField.to_string(), "OneToOneField");
    assert_eq!(FieldType::ManyToManyField.as_ref(), "ManyToManyField");
    assert!("VarCharField".parse::<FieldType>().is_err());
    assert!(!FieldType::CharField.is_relation());
}
