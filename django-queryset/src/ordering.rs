//! Ordering expressions for query-sets.
//!
//! Django orders results by a list of field names in priority order,
//! where a leading `-` reverses the natural order of that field. So
//! `["number", "-name"]` sorts by `number`, breaking ties with `name`
//! in descending order.

use std::fmt;

use serde::{Serialize, Serializer};

/// One entry in an `order_by` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderBy {
    Ascending(String),
    Descending(String),
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        OrderBy::Ascending(field.to_string())
    }

    pub fn desc(field: &str) -> Self {
        OrderBy::Descending(field.to_string())
    }

    pub fn field(&self) -> &str {
        match self {
            OrderBy::Ascending(field) | OrderBy::Descending(field) => field,
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, OrderBy::Descending(_))
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBy::Ascending(field) => write!(f, "{}", field),
            OrderBy::Descending(field) => write!(f, "-{}", field),
        }
    }
}

impl Serialize for OrderBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for OrderBy {
    fn from(expr: &str) -> Self {
        match expr.strip_prefix('-') {
            Some(field) => OrderBy::Descending(field.to_string()),
            None => OrderBy::Ascending(expr.to_string()),
        }
    }
}

impl From<String> for OrderBy {
    fn from(expr: String) -> Self {
        OrderBy::from(expr.as_str())
    }
}

/// A `(direction, field)` pair, where a direction of `"-"` means
/// descending and anything else ascending.
impl From<(&str, &str)> for OrderBy {
    fn from((direction, field): (&str, &str)) -> Self {
        if direction == "-" {
            OrderBy::desc(field)
        } else {
            OrderBy::asc(field)
        }
    }
}
