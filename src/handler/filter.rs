//! Row predicates applied to fetched rows before they count toward a limit
//!
//! No type coercion: a string never matches a number. Missing and NULL
//! columns never match.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::Row;

/// Anything that can accept or reject a fetched row
pub trait RowPredicate {
    fn matches(&self, row: &Row) -> bool;
}

impl<F> RowPredicate for F
where
    F: Fn(&Row) -> bool,
{
    fn matches(&self, row: &Row) -> bool {
        self(row)
    }
}

/// Comparison applied by one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

/// `column <op> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    pub fn gte(column: impl Into<String>, value: Value) -> Self {
        Self::new(column, FilterOp::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: Value) -> Self {
        Self::new(column, FilterOp::Lt, value)
    }

    fn matches(&self, row: &Row) -> bool {
        let actual = match row.get(&self.column) {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };

        if self.op == FilterOp::Eq {
            return actual == &self.value;
        }

        match compare(actual, &self.value) {
            Some(ord) => match self.op {
                FilterOp::Gte => ord != Ordering::Less,
                FilterOp::Gt => ord == Ordering::Greater,
                FilterOp::Lte => ord != Ordering::Greater,
                FilterOp::Lt => ord == Ordering::Less,
                FilterOp::Eq => ord == Ordering::Equal,
            },
            None => false,
        }
    }
}

/// Order two values of the same kind; numbers and strings only
fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                return Some(ai.cmp(&bi));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of column conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowFilter {
    conditions: Vec<Condition>,
}

impl RowFilter {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl RowPredicate for RowFilter {
    fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        Row::from_json(value).unwrap()
    }

    #[test]
    fn test_equality_without_coercion() {
        let r = row(json!({"id": 123, "name": "a"}));
        assert!(RowFilter::default().and(Condition::eq("id", json!(123))).matches(&r));
        assert!(!RowFilter::default().and(Condition::eq("id", json!("123"))).matches(&r));
    }

    #[test]
    fn test_range_conditions() {
        let r = row(json!({"id": 25}));
        assert!(Condition::gte("id", json!(25)).matches(&r));
        assert!(!Condition::new("id", FilterOp::Gt, json!(25)).matches(&r));
        assert!(Condition::new("id", FilterOp::Lte, json!(25.5)).matches(&r));
        assert!(!Condition::lt("id", json!(25)).matches(&r));
    }

    #[test]
    fn test_string_ordering() {
        let r = row(json!({"name": "m"}));
        assert!(Condition::gte("name", json!("a")).matches(&r));
        assert!(!Condition::gte("name", json!(1)).matches(&r));
    }

    #[test]
    fn test_missing_and_null_never_match() {
        let r = row(json!({"name": null}));
        assert!(!Condition::eq("name", json!(null)).matches(&r));
        assert!(!Condition::eq("absent", json!(1)).matches(&r));
    }

    #[test]
    fn test_conjunction() {
        let r = row(json!({"id": 5, "grp": "a"}));
        let filter = RowFilter::new(vec![
            Condition::gte("id", json!(1)),
            Condition::eq("grp", json!("a")),
        ]);
        assert!(filter.matches(&r));
        assert!(!filter.and(Condition::lt("id", json!(5))).matches(&r));
    }

    #[test]
    fn test_closure_predicate() {
        let even = |r: &Row| r.get("id").and_then(Value::as_i64).map_or(false, |v| v % 2 == 0);
        assert!(even.matches(&row(json!({"id": 4}))));
        assert!(!even.matches(&row(json!({"id": 3}))));
    }

    #[test]
    fn test_filter_deserialises_from_list() {
        let filter: RowFilter =
            serde_json::from_value(json!([{"column": "id", "op": "gt", "value": 2}])).unwrap();
        assert!(filter.matches(&row(json!({"id": 3}))));
        assert!(!filter.matches(&row(json!({"id": 2}))));
    }
}
