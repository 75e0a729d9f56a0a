//! # Build and flatten Django lookups
//!
//! Django expresses a filter as a set of keyword arguments, one per
//! criterion. The simplest ones are a bare field name, like `name`,
//! which means the column must equal the value given. An operator can
//! be appended with a double underscore, like `name__startswith` or
//! `number__gt`, and related tables are crossed in the same way, so
//! `owner__id__in` means "the `id` of the row's `owner` is one of the
//! given values".
//!
//! On the client side it is much more natural to write relation
//! filters as nested objects, for example `{"owner": {"id": 5}}`.
//! A [`Lookups`] value holds exactly that nested form, and
//! [`flatten`](Lookups::flatten) turns it into the dunder-joined
//! [`FlatLookups`] the backend expects, here `{"owner__id": 5}`.
//!
//! Arrays are always leaves: they are the right hand side of `in`
//! and `range` lookups and are never descended into. Two different
//! paths that flatten to the same key (`{"owner__id": 1, "owner":
//! {"id": 2}}`) are rejected with [`LookupError::Collision`].
//!
//! Example:
//! ```rust
//! use django_queryset::lookup::{Lookups, Operator};
//!
//! let lookups = Lookups::new()
//!     .exact("name", "widget")
//!     .related("owner", Lookups::new().op("id", Operator::In, vec![1, 2]));
//!
//! let flat = lookups.flatten().unwrap();
//! assert_eq!(flat.get("name"), Some(&serde_json::json!("widget")));
//! assert_eq!(flat.get("owner__id__in"), Some(&serde_json::json!([1, 2])));
//! ```

use std::fmt::Display;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while building lookups.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Lookups were supplied as a JSON value that is not an object.
    #[error("lookups must be a JSON object, not {0}")]
    NotAnObject(&'static str),
    /// Two different nested paths flatten to the same key.
    #[error("lookup key '{0}' is produced by more than one path")]
    Collision(String),
}

/// The lookup operators understood by Django's filtering grammar.
///
/// The string form of each variant is the suffix used on the wire, so
/// `Operator::StartsWith.to_string()` is `"startswith"` and
/// `"week_day".parse::<Operator>()` is `Ok(Operator::WeekDay)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
pub enum Operator {
    #[strum(serialize = "exact")]
    Exact,
    #[strum(serialize = "iexact")]
    IExact,
    #[strum(serialize = "gt")]
    Gt,
    #[strum(serialize = "gte")]
    Gte,
    #[strum(serialize = "lt")]
    Lt,
    #[strum(serialize = "lte")]
    Lte,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "contains")]
    Contains,
    #[strum(serialize = "icontains")]
    IContains,
    #[strum(serialize = "startswith")]
    StartsWith,
    #[strum(serialize = "istartswith")]
    IStartsWith,
    #[strum(serialize = "endswith")]
    EndsWith,
    #[strum(serialize = "iendswith")]
    IEndsWith,
    #[strum(serialize = "range")]
    Range,
    #[strum(serialize = "isnull")]
    IsNull,
    #[strum(serialize = "regex")]
    Regex,
    #[strum(serialize = "iregex")]
    IRegex,
    #[strum(serialize = "year")]
    Year,
    #[strum(serialize = "month")]
    Month,
    #[strum(serialize = "day")]
    Day,
    #[strum(serialize = "week_day")]
    WeekDay,
    #[strum(serialize = "week")]
    Week,
    #[strum(serialize = "quarter")]
    Quarter,
    #[strum(serialize = "hour")]
    Hour,
    #[strum(serialize = "minute")]
    Minute,
    #[strum(serialize = "second")]
    Second,
    #[strum(serialize = "date")]
    Date,
    #[strum(serialize = "time")]
    Time,
}

impl Operator {
    /// True for the operators that extract part of a date or datetime
    /// (`year`, `month`, ..., `time`) rather than compare the value
    /// itself.
    pub fn is_datetime_part(&self) -> bool {
        matches!(
            self,
            Operator::Year
                | Operator::Month
                | Operator::Day
                | Operator::WeekDay
                | Operator::Week
                | Operator::Quarter
                | Operator::Hour
                | Operator::Minute
                | Operator::Second
                | Operator::Date
                | Operator::Time
        )
    }
}

/// A value that can appear on the right hand side of a lookup.
pub trait IntoLookupValue {
    fn into_lookup_value(self) -> Value;
}

macro_rules! json_lookup_value {
    ($($t:ty),*) => {
        $(
            impl IntoLookupValue for $t {
                fn into_lookup_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

json_lookup_value!(
    i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, f32, f64, bool, String, &str
);

impl IntoLookupValue for Value {
    fn into_lookup_value(self) -> Value {
        self
    }
}

impl<T: IntoLookupValue> IntoLookupValue for Option<T> {
    fn into_lookup_value(self) -> Value {
        self.map(IntoLookupValue::into_lookup_value)
            .unwrap_or(Value::Null)
    }
}

impl<T: IntoLookupValue> IntoLookupValue for Vec<T> {
    fn into_lookup_value(self) -> Value {
        Value::Array(
            self.into_iter()
                .map(IntoLookupValue::into_lookup_value)
                .collect(),
        )
    }
}

/// A pair is sent as a two element array, as `range` expects.
impl<T: IntoLookupValue> IntoLookupValue for (T, T) {
    fn into_lookup_value(self) -> Value {
        Value::Array(vec![self.0.into_lookup_value(), self.1.into_lookup_value()])
    }
}

impl IntoLookupValue for chrono::NaiveDate {
    fn into_lookup_value(self) -> Value {
        Value::String(self.format("%Y-%m-%d").to_string())
    }
}

impl IntoLookupValue for chrono::NaiveTime {
    fn into_lookup_value(self) -> Value {
        Value::String(self.format("%H:%M:%S%.f").to_string())
    }
}

impl IntoLookupValue for chrono::NaiveDateTime {
    fn into_lookup_value(self) -> Value {
        Value::String(self.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

impl<Tz> IntoLookupValue for chrono::DateTime<Tz>
where
    Tz: chrono::TimeZone,
    Tz::Offset: Display,
{
    fn into_lookup_value(self) -> Value {
        Value::String(self.to_rfc3339())
    }
}

/// A set of lookups in nested form.
///
/// Keys are field names, optionally with an operator suffix. A value
/// that is itself an object is a filter on a related model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Lookups(Map<String, Value>);

impl Lookups {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Require `field` to equal `value`.
    pub fn exact<V: IntoLookupValue>(mut self, field: &str, value: V) -> Self {
        self.0.insert(field.to_string(), value.into_lookup_value());
        self
    }

    /// Apply `op` to `field`, producing a `field__op` key.
    pub fn op<V: IntoLookupValue>(mut self, field: &str, op: Operator, value: V) -> Self {
        self.0
            .insert(format!("{}__{}", field, op), value.into_lookup_value());
        self
    }

    /// Filter on the model related through `relation`.
    pub fn related(mut self, relation: &str, lookups: Lookups) -> Self {
        self.0.insert(relation.to_string(), Value::Object(lookups.0));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Combine two sets of lookups. Top-level keys in `other` replace
    /// those in `self`; nested relation filters are not merged
    /// recursively.
    pub fn merge(&self, other: &Lookups) -> Lookups {
        let mut merged = self.0.clone();
        for (key, value) in other.0.iter() {
            merged.insert(key.clone(), value.clone());
        }
        Lookups(merged)
    }

    /// Produce the dunder-joined form of these lookups.
    pub fn flatten(&self) -> Result<FlatLookups, LookupError> {
        flatten(&self.0).map(FlatLookups)
    }
}

impl From<Map<String, Value>> for Lookups {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Lookups {
    type Error = LookupError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(LookupError::NotAnObject("null")),
            Value::Bool(_) => Err(LookupError::NotAnObject("a boolean")),
            Value::Number(_) => Err(LookupError::NotAnObject("a number")),
            Value::String(_) => Err(LookupError::NotAnObject("a string")),
            Value::Array(_) => Err(LookupError::NotAnObject("an array")),
        }
    }
}

/// Anything that can be used as the argument to
/// [`filter`](crate::QuerySet::filter) or
/// [`exclude`](crate::QuerySet::exclude).
pub trait IntoLookups {
    fn into_lookups(self) -> Result<Lookups, LookupError>;
}

impl IntoLookups for Lookups {
    fn into_lookups(self) -> Result<Lookups, LookupError> {
        Ok(self)
    }
}

impl IntoLookups for Map<String, Value> {
    fn into_lookups(self) -> Result<Lookups, LookupError> {
        Ok(Lookups(self))
    }
}

impl IntoLookups for Value {
    fn into_lookups(self) -> Result<Lookups, LookupError> {
        Lookups::try_from(self)
    }
}

/// Lookups in the flat, dunder-joined form sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlatLookups(Map<String, Value>);

impl FlatLookups {
    pub(crate) fn leaf(key: &str, value: Value) -> Self {
        let mut map = Map::new();
        map.insert(key.to_string(), value);
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Flatten a nested lookup object into dunder-joined keys.
///
/// Objects are descended into and their keys prefixed with the parent
/// key and `__`. Every other value, arrays included, is a leaf. The
/// input must be acyclic, which JSON values always are.
pub fn flatten(lookups: &Map<String, Value>) -> Result<Map<String, Value>, LookupError> {
    let mut flat = Map::new();
    flatten_into(lookups, None, &mut flat)?;
    Ok(flat)
}

fn flatten_into(
    lookups: &Map<String, Value>,
    prefix: Option<&str>,
    flat: &mut Map<String, Value>,
) -> Result<(), LookupError> {
    for (key, value) in lookups {
        let path = match prefix {
            Some(prefix) => format!("{}__{}", prefix, key),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten_into(inner, Some(&path), flat)?,
            leaf => {
                if flat.insert(path.clone(), leaf.clone()).is_some() {
                    return Err(LookupError::Collision(path));
                }
            }
        }
    }
    Ok(())
}
