//! Row filtering for table reads

use super::{Collection, Record};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
enum Filter {
    Eq(String, Value),
    ContainsIgnoreCase(String, String),
}

/// Collection read with equality / substring filters, one sort key and a limit
#[derive(Debug, Clone)]
pub struct Query {
    pub collection: Collection,
    filters: Vec<Filter>,
    order: Option<(String, Order)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Query over the collection of a record type
    pub fn of<T: Record>() -> Self {
        Self::new(T::COLLECTION)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl serde::Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.filters.push(Filter::Eq(field.into(), value));
        self
    }

    /// Case-insensitive substring match on a string field (`ilike '%term%'`)
    pub fn contains(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.filters.push(Filter::ContainsIgnoreCase(
            field.into(),
            term.into().to_lowercase(),
        ));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order = Some((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(field, expected) => row.get(field).unwrap_or(&Value::Null) == expected,
            Filter::ContainsIgnoreCase(field, term) => row
                .get(field)
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(term.as_str()))
                .unwrap_or(false),
        })
    }

    /// Filter, sort and truncate a full scan
    pub fn apply(&self, rows: Vec<Value>) -> Vec<Value> {
        let mut rows: Vec<Value> = rows.into_iter().filter(|r| self.matches(r)).collect();

        if let Some((field, order)) = &self.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        rows
    }
}

/// Numbers numerically, RFC 3339 timestamps chronologically, other strings lexically
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) | (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None) | (Some(_), Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": "1", "status": "active", "card_number": "C-20250614-AB12CD", "created_at": "2025-06-14T10:00:00Z"}),
            json!({"id": "2", "status": "winner", "card_number": "C-20250614-FF0011", "created_at": "2025-06-14T09:00:00.5Z"}),
            json!({"id": "3", "status": "active", "card_number": "C-20250615-AB9999", "created_at": "2025-06-15T08:00:00Z"}),
        ]
    }

    #[test]
    fn test_eq_filter() {
        let result = Query::new(Collection::BingoCards).eq("status", "active").apply(rows());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let result = Query::new(Collection::BingoCards)
            .contains("card_number", "ab")
            .apply(rows());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_order_by_timestamp_desc_with_limit() {
        let result = Query::new(Collection::BingoCards)
            .order_by("created_at", Order::Desc)
            .limit(2)
            .apply(rows());
        let ids: Vec<&str> = result.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_missing_field_does_not_match_eq() {
        let result = Query::new(Collection::BingoCards)
            .eq("group_id", "g1")
            .apply(rows());
        assert!(result.is_empty());
    }
}
