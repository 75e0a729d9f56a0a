#![cfg(feature = "wiremock")]
//! A mock model list endpoint for [`wiremock`].
//!
//! [`ListEndpoint`] serves a fixed set of JSON rows and answers list
//! requests the way the backend does: it evaluates the `query`
//! parameter's filters, exclusions and `or_` branches against each
//! row, then applies `order_by`, `distinct`, `values`/`fields`
//! projection, and finally `exists`, `count` or `page`/`pagesize`.
//!
//! Example:
//! ```rust
//! use django_queryset::mock::ListEndpoint;
//! use serde_json::json;
//! use wiremock::{Mock, MockServer, matchers};
//!
//! # tokio_test::block_on(async {
//! let server = MockServer::start().await;
//! let rows = vec![
//!     json!({"id": 1, "name": "a", "number": 1}),
//!     json!({"id": 2, "name": "b", "number": 2}),
//! ];
//! Mock::given(matchers::method("GET"))
//!     .and(matchers::path("/thing/"))
//!     .respond_with(ListEndpoint::new(rows))
//!     .mount(&server)
//!     .await;
//!
//! let body: serde_json::Value = reqwest::get(&format!(
//!     "{}/thing/?query={}",
//!     server.uri(),
//!     r#"{"filters":{"number__gt":1},"exclude":{},"or_":[]}"#
//! ))
//! .await
//! .expect("request")
//! .json()
//! .await
//! .expect("json");
//! assert_eq!(body, json!([{"id": 2, "name": "b", "number": 2}]));
//! # });
//! ```

use core::cmp::Ordering;
use std::collections::HashSet;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::{debug, trace};
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use wiremock::http::Url;
use wiremock::{Request, Respond, ResponseTemplate};

use crate::lookup::Operator;
use crate::queryset::{
    COUNT_KEY, DEFAULT_PAGE_SIZE, DISTINCT_KEY, EXISTS_KEY, FIELDS_KEY, ORDER_BY_KEY, PAGE_NUM_KEY,
    PAGE_SIZE_KEY, PREFETCH_KEY, QUERY_KEY, VALUES_KEY,
};

#[derive(Debug, Error)]
pub enum MockError {
    #[error("unknown query parameter `{0}`")]
    UnknownQueryParameter(String),
    #[error("bad json in query parameter `{key}`: {source}")]
    BadJson {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("expected integer value in query")]
    BadIntegerInQuery(#[from] ParseIntError),
    #[error("operator `{0}` needs a {1} argument")]
    BadArgument(Operator, &'static str),
    #[error("bad regex in query: {0}")]
    BadRegex(#[from] regex::Error),
    #[error("page size must be at least 1")]
    ZeroPageSize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Query {
    filters: Map<String, Value>,
    exclude: Map<String, Value>,
    or_: Vec<Query>,
}

impl Query {
    fn matches(&self, row: &Value) -> Result<bool, MockError> {
        let mut keep = all_match(&self.filters, row)?;
        if keep && !self.exclude.is_empty() {
            keep = !all_match(&self.exclude, row)?;
        }
        if keep {
            return Ok(true);
        }
        for branch in &self.or_ {
            if branch.matches(row)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn all_match(lookups: &Map<String, Value>, row: &Value) -> Result<bool, MockError> {
    for (key, arg) in lookups {
        if !lookup_matches(key, arg, row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn split_lookup(key: &str) -> (Vec<&str>, Operator) {
    let mut segments: Vec<&str> = key.split("__").collect();
    if segments.len() > 1 {
        if let Some(op) = segments.last().and_then(|s| Operator::from_str(s).ok()) {
            segments.pop();
            return (segments, op);
        }
    }
    (segments, Operator::Exact)
}

/// Every value reachable along `path`. Arrays along the way fan out,
/// and a relation that was not embedded is looked up through its
/// `<relation>_id` column when the path ends in `id`.
fn resolve<'a>(row: &'a Value, path: &[&str]) -> Vec<&'a Value> {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return vec![row],
    };
    match row {
        Value::Array(items) => items.iter().flat_map(|item| resolve(item, path)).collect(),
        Value::Object(map) => match map.get(*first) {
            Some(value) => resolve(value, rest),
            None if rest == ["id"] => map
                .get(&format!("{}_id", first))
                .into_iter()
                .collect(),
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn lookup_matches(key: &str, arg: &Value, row: &Value) -> Result<bool, MockError> {
    let (path, op) = split_lookup(key);
    let values = resolve(row, &path);

    if op == Operator::IsNull {
        let want_null = arg
            .as_bool()
            .ok_or(MockError::BadArgument(op, "boolean"))?;
        let is_null = values.iter().all(|v| v.is_null());
        return Ok(is_null == want_null);
    }

    for value in values {
        if value_matches(op, value, arg)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn value_matches(op: Operator, value: &Value, arg: &Value) -> Result<bool, MockError> {
    if op.is_datetime_part() {
        return datetime_part_matches(op, value, arg);
    }
    Ok(match op {
        Operator::Exact => value == arg,
        Operator::IExact => match (value.as_str(), arg.as_str()) {
            (Some(v), Some(a)) => v.to_lowercase() == a.to_lowercase(),
            _ => value == arg,
        },
        Operator::Gt => compare(value, arg) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(value, arg),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        Operator::Lt => compare(value, arg) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(value, arg),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        Operator::In => arg
            .as_array()
            .ok_or(MockError::BadArgument(op, "list"))?
            .iter()
            .any(|a| a == value),
        Operator::Range => match arg.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                matches!(
                    compare(value, low),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                ) && matches!(
                    compare(value, high),
                    Some(Ordering::Less) | Some(Ordering::Equal)
                )
            }
            _ => return Err(MockError::BadArgument(op, "two element list")),
        },
        Operator::Contains => contains(value, arg, false),
        Operator::IContains => contains(value, arg, true),
        Operator::StartsWith => text_test(value, arg, false, |v, a| v.starts_with(a)),
        Operator::IStartsWith => text_test(value, arg, true, |v, a| v.starts_with(a)),
        Operator::EndsWith => text_test(value, arg, false, |v, a| v.ends_with(a)),
        Operator::IEndsWith => text_test(value, arg, true, |v, a| v.ends_with(a)),
        Operator::Regex | Operator::IRegex => {
            let pattern = arg.as_str().ok_or(MockError::BadArgument(op, "string"))?;
            let re = RegexBuilder::new(pattern)
                .case_insensitive(op == Operator::IRegex)
                .build()?;
            value.as_str().map(|v| re.is_match(v)).unwrap_or(false)
        }
        _ => false,
    })
}

fn text_test<F: Fn(&str, &str) -> bool>(value: &Value, arg: &Value, fold: bool, test: F) -> bool {
    match (value.as_str(), arg.as_str()) {
        (Some(v), Some(a)) if fold => test(&v.to_lowercase(), &a.to_lowercase()),
        (Some(v), Some(a)) => test(v, a),
        _ => false,
    }
}

fn contains(value: &Value, arg: &Value, fold: bool) -> bool {
    match (value, arg) {
        (Value::Array(items), Value::Array(wanted)) => wanted.iter().all(|w| items.contains(w)),
        (Value::Array(items), other) => items.contains(other),
        _ => text_test(value, arg, fold, |v, a| v.contains(a)),
    }
}

/// Order two JSON values the way the database would order the
/// underlying column. Values of different kinds do not compare, except
/// that null sorts first.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn datetime_part_matches(op: Operator, value: &Value, arg: &Value) -> Result<bool, MockError> {
    let dt = match value.as_str().and_then(parse_datetime) {
        Some(dt) => dt,
        None => return Ok(false),
    };
    let part = match op {
        Operator::Date => {
            return Ok(Value::String(dt.date().format("%Y-%m-%d").to_string()) == *arg)
        }
        Operator::Time => {
            return Ok(Value::String(dt.time().format("%H:%M:%S").to_string()) == *arg)
        }
        Operator::Year => i64::from(dt.year()),
        Operator::Month => i64::from(dt.month()),
        Operator::Day => i64::from(dt.day()),
        // Sunday is 1, Saturday is 7.
        Operator::WeekDay => i64::from(dt.weekday().number_from_sunday()),
        Operator::Week => i64::from(dt.iso_week().week()),
        Operator::Quarter => i64::from((dt.month() - 1) / 3 + 1),
        Operator::Hour => i64::from(dt.hour()),
        Operator::Minute => i64::from(dt.minute()),
        Operator::Second => i64::from(dt.second()),
        _ => return Ok(false),
    };
    let want = arg.as_i64().ok_or(MockError::BadArgument(op, "integer"))?;
    Ok(part == want)
}

static NULL: Value = Value::Null;

fn sort_key<'a>(row: &'a Value, field: &str) -> &'a Value {
    let path: Vec<&str> = field.split("__").collect();
    resolve(row, &path).into_iter().next().unwrap_or(&NULL)
}

fn order_rows(rows: &mut [Value], fields: &[String]) {
    rows.sort_by(|a, b| {
        for field in fields {
            let (name, descending) = match field.strip_prefix('-') {
                Some(name) => (name, true),
                None => (field.as_str(), false),
            };
            let ord = compare(sort_key(a, name), sort_key(b, name)).unwrap_or(Ordering::Equal);
            let ord = if descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn distinct_rows(rows: Vec<Value>, fields: &[String]) -> Vec<Value> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| {
            let key = if fields.is_empty() {
                row.to_string()
            } else {
                let parts: Vec<&Value> = fields.iter().map(|f| sort_key(row, f)).collect();
                serde_json::to_string(&parts).unwrap_or_default()
            };
            seen.insert(key)
        })
        .collect()
}

fn project(row: &Value, fields: &[String]) -> Value {
    let mut map = Map::new();
    for field in fields {
        map.insert(field.clone(), sort_key(row, field).clone());
    }
    Value::Object(map)
}

/// Where a [`ListEndpoint`] gets its rows from on each request.
pub trait RowSource {
    type Rows: AsRef<Vec<Value>>;
    fn get(&self) -> Self::Rows;
}

impl RowSource for Vec<Value> {
    type Rows = Self;
    fn get(&self) -> Self::Rows {
        self.clone()
    }
}

impl RowSource for Arc<Vec<Value>> {
    type Rows = Self;
    fn get(&self) -> Self::Rows {
        self.clone()
    }
}

#[derive(Default)]
struct ListParams {
    query: Query,
    order_by: Vec<String>,
    distinct: Option<Vec<String>>,
    fields: Option<Vec<String>>,
    values: Option<Vec<String>>,
    page: Option<String>,
    page_size: Option<u64>,
    exists: bool,
    count: bool,
}

fn parse_json<T: serde::de::DeserializeOwned>(key: &str, value: &str) -> Result<T, MockError> {
    serde_json::from_str(value).map_err(|source| MockError::BadJson {
        key: key.to_string(),
        source,
    })
}

impl ListParams {
    fn from_url(url: &Url) -> Result<Self, MockError> {
        let mut params = ListParams::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                QUERY_KEY => params.query = parse_json(&key, &value)?,
                ORDER_BY_KEY => params.order_by = parse_json(&key, &value)?,
                DISTINCT_KEY => params.distinct = Some(parse_json(&key, &value)?),
                FIELDS_KEY => params.fields = Some(parse_json(&key, &value)?),
                VALUES_KEY => params.values = Some(parse_json(&key, &value)?),
                PAGE_NUM_KEY => params.page = Some(value.to_string()),
                PAGE_SIZE_KEY => params.page_size = Some(u64::from_str(&value)?),
                EXISTS_KEY => params.exists = parse_json(&key, &value)?,
                COUNT_KEY => params.count = parse_json(&key, &value)?,
                // Rows are served with whatever they embed already.
                PREFETCH_KEY => {}
                _ => return Err(MockError::UnknownQueryParameter(key.to_string())),
            }
        }
        Ok(params)
    }
}

/// A [`Respond`] implementation serving a model's list endpoint from
/// JSON rows.
pub struct ListEndpoint<T> {
    row_source: T,
}

impl<T: RowSource + Send + Sync> ListEndpoint<T> {
    pub fn new(row_source: T) -> Self {
        Self { row_source }
    }

    fn body(&self, url: &Url) -> Result<Value, MockError> {
        let params = ListParams::from_url(url)?;
        let data = self.row_source.get();

        let mut rows = Vec::new();
        for row in data.as_ref() {
            if params.query.matches(row)? {
                rows.push(row.clone());
            }
        }
        trace!("{} of {} rows match", rows.len(), data.as_ref().len());

        if params.exists {
            return Ok(Value::Bool(!rows.is_empty()));
        }
        if params.count {
            return Ok(Value::from(rows.len()));
        }

        order_rows(&mut rows, &params.order_by);
        if let Some(fields) = &params.distinct {
            rows = distinct_rows(rows, fields);
        }
        if let Some(fields) = params.values.as_ref().or(params.fields.as_ref()) {
            if !fields.is_empty() {
                rows = rows.iter().map(|row| project(row, fields)).collect();
            }
        }

        let page = match params.page {
            Some(page) => page,
            None => return Ok(Value::Array(rows)),
        };
        let page_num = u64::from_str(page.trim())?;
        let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(MockError::ZeroPageSize);
        }
        let num_results = rows.len() as u64;
        let num_pages = num_results.div_ceil(page_size).max(1);
        let current = page_num.clamp(1, num_pages);
        // Below num_results, since current never passes the last page.
        let skip = (current - 1).saturating_mul(page_size);
        let data: Vec<Value> = rows
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(page_size).unwrap_or(usize::MAX))
            .collect();

        let mut map = Map::new();
        map.insert("num_results".to_string(), Value::from(num_results));
        map.insert("num_pages".to_string(), Value::from(num_pages));
        // Echoed back as it arrived.
        map.insert("page".to_string(), Value::String(page));
        map.insert("data".to_string(), Value::Array(data));
        Ok(Value::Object(map))
    }
}

impl<T: RowSource + Send + Sync> Respond for ListEndpoint<T> {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        trace!("Request URL: {}", request.url);
        match self.body(&request.url) {
            Ok(body) => ResponseTemplate::new(200).set_body_json(body),
            Err(e) => {
                debug!("Failed to respond to {}: {}", request.url, e);
                ResponseTemplate::new(500).set_body_string(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "alpha", "number": 5, "parent_id": null, "tags": ["x"]}),
            json!({"id": 2, "name": "Beta", "number": 10, "parent_id": 1,
                   "parent": {"id": 1, "name": "alpha"}, "tags": ["x", "y"]}),
            json!({"id": 3, "name": "gamma", "number": 15, "parent_id": 1, "tags": []}),
        ]
    }

    fn ids(query: Value) -> Vec<i64> {
        let query: Query = serde_json::from_value(query).unwrap();
        rows()
            .iter()
            .filter(|row| query.matches(row).unwrap())
            .map(|row| row["id"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_filters_and_exclude() {
        assert_eq!(ids(json!({"filters": {"number__gte": 10}})), vec![2, 3]);
        assert_eq!(
            ids(json!({"filters": {"number__gte": 10}, "exclude": {"name": "gamma"}})),
            vec![2]
        );
        assert_eq!(ids(json!({"filters": {"name__istartswith": "b"}})), vec![2]);
        assert_eq!(ids(json!({"filters": {"number__range": [4, 10]}})), vec![1, 2]);
        assert_eq!(ids(json!({"filters": {"id__in": [1, 3]}})), vec![1, 3]);
        assert_eq!(ids(json!({"filters": {"name__regex": "^[ag]"}})), vec![1, 3]);
    }

    #[test]
    fn test_or_branches() {
        let query = json!({
            "filters": {"name": "alpha"},
            "or_": [{"filters": {"number": 15}}]
        });
        assert_eq!(ids(query), vec![1, 3]);
    }

    #[test]
    fn test_relations() {
        assert_eq!(ids(json!({"filters": {"parent__id": 1}})), vec![2, 3]);
        assert_eq!(ids(json!({"filters": {"parent__name": "alpha"}})), vec![2]);
        assert_eq!(ids(json!({"filters": {"parent_id__isnull": true}})), vec![1]);
        assert_eq!(ids(json!({"filters": {"tags__contains": "y"}})), vec![2]);
    }

    #[test]
    fn test_datetime_parts() {
        let row = json!({"when": "2021-03-14T15:09:26"});
        assert!(lookup_matches("when__year", &json!(2021), &row).unwrap());
        assert!(lookup_matches("when__quarter", &json!(1), &row).unwrap());
        // 2021-03-14 was a Sunday.
        assert!(lookup_matches("when__week_day", &json!(1), &row).unwrap());
        assert!(lookup_matches("when__date", &json!("2021-03-14"), &row).unwrap());
        assert!(!lookup_matches("when__hour", &json!(16), &row).unwrap());
    }

    #[test]
    fn test_bad_arguments() {
        let row = json!({"id": 1});
        assert!(matches!(
            lookup_matches("id__in", &json!(1), &row),
            Err(MockError::BadArgument(Operator::In, _))
        ));
        assert!(matches!(
            lookup_matches("id__isnull", &json!("yes"), &row),
            Err(MockError::BadArgument(Operator::IsNull, _))
        ));
    }

    fn list_body(query: &str) -> Result<Value, MockError> {
        let url = Url::parse(&format!("http://localhost/thing/?{}", query)).unwrap();
        ListEndpoint::new(rows()).body(&url)
    }

    #[test]
    fn test_page_sizes() {
        let body = list_body("page=1&pagesize=18446744073709551615").unwrap();
        assert_eq!(body["num_pages"], json!(1));
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let body = list_body("page=9&pagesize=2").unwrap();
        assert_eq!(body["num_pages"], json!(2));
        assert_eq!(body["page"], json!("9"));
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        assert!(matches!(
            list_body("page=1&pagesize=0"),
            Err(MockError::ZeroPageSize)
        ));
        assert!(matches!(
            list_body("page=1&pagesize=-1"),
            Err(MockError::BadIntegerInQuery(_))
        ));
    }

    #[test]
    fn test_ordering_and_distinct() {
        let mut data = rows();
        order_rows(&mut data, &["-number".to_string()]);
        let order: Vec<_> = data.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![3, 2, 1]);

        let distinct = distinct_rows(data, &["parent_id".to_string()]);
        assert_eq!(distinct.len(), 2);
    }
}
