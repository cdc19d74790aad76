//! Filtering, ordering and pagination of list results
//!
//! Filters are a disjunction of conjunctions: `a=x AND b=y OR c=z`. Terms
//! match as case-sensitive substrings with `*` wildcards stripped. Order
//! clauses are comma separated, each `<field>` or `<field> asc|desc`.

use std::cmp::Ordering;

use serde::Deserialize;

use crate::error::{Result, ServiceError};

const INVALID_PAGE_SIZE: &str = "invalid pageSize: must be greater than 0";
const INVALID_OFFSET: &str = "invalid offset: must be greater than or equal to 0";
const INVALID_FILTER: &str = "invalid filter field";
const INVALID_ORDER_BY: &str = "invalid orderBy field";

/// List query parameters as they arrive on the wire
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Page size; 0 or absent returns everything
    #[serde(default)]
    pub page_size: Option<i32>,
    /// Index of the first element of the page
    #[serde(default)]
    pub offset: Option<i32>,
    /// Order clauses
    #[serde(default)]
    pub order_by: Option<String>,
    /// Filter expression
    #[serde(default)]
    pub filter: Option<String>,
}

/// An entity the query engine can filter and order
pub trait Queryable {
    /// Fields accepted in filter terms
    const FILTER_FIELDS: &'static [&'static str];
    /// Fields accepted in order clauses
    const ORDER_FIELDS: &'static [&'static str];

    /// Value of a field, None for unknown fields
    fn field_value(&self, field: &str) -> Option<&str>;
}

/// A filtered, ordered page plus the pre-pagination count
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    /// Elements of the page
    pub items: Vec<T>,
    /// Count after filtering
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Term {
    field: String,
    value: String,
}

/// Parsed filter expression: OR of ANDs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    any_of: Vec<Vec<Term>>,
}

impl Filter {
    /// Parse a filter expression; empty or blank means no filter
    pub fn parse(expr: &str) -> Result<Self> {
        if expr.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut any_of = Vec::new();
        for disjunct in expr.split(" OR ") {
            let mut all_of = Vec::new();
            for raw in disjunct.split(" AND ") {
                let (field, value) = raw
                    .trim()
                    .split_once('=')
                    .ok_or_else(|| ServiceError::bad_input(INVALID_FILTER))?;
                let field = field.trim();
                if field.is_empty() || field.contains(char::is_whitespace) || value.contains('=')
                {
                    return Err(ServiceError::bad_input(INVALID_FILTER));
                }
                all_of.push(Term {
                    field: field.to_string(),
                    value: value.trim().replace('*', ""),
                });
            }
            any_of.push(all_of);
        }
        Ok(Self { any_of })
    }

    /// True if no terms were given
    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }

    /// Evaluate against an entity
    pub fn matches<T: Queryable>(&self, item: &T) -> bool {
        if self.is_empty() {
            return true;
        }
        self.any_of
            .iter()
            .any(|all_of| all_of.iter().all(|term| term_matches(item, term)))
    }
}

fn term_matches<T: Queryable>(item: &T, term: &Term) -> bool {
    if !T::FILTER_FIELDS.contains(&term.field.as_str()) {
        return false;
    }
    item.field_value(&term.field)
        .map(|v| v.contains(term.value.as_str()))
        .unwrap_or(false)
}

/// One order clause
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderClause {
    /// Field name
    pub field: String,
    /// Descending order
    pub descending: bool,
}

/// Parse order clauses, checking fields against `allowed`
pub fn parse_order_by(expr: &str, allowed: &[&str]) -> Result<Vec<OrderClause>> {
    let mut clauses = Vec::new();
    for raw in expr.split(',') {
        let mut parts = raw.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| ServiceError::bad_input(INVALID_ORDER_BY))?;
        let descending = match parts.next() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(_) => return Err(ServiceError::bad_input(INVALID_ORDER_BY)),
        };
        if parts.next().is_some() || !allowed.contains(&field) {
            return Err(ServiceError::bad_input(INVALID_ORDER_BY));
        }
        clauses.push(OrderClause {
            field: field.to_string(),
            descending,
        });
    }
    Ok(clauses)
}

fn compare<T: Queryable>(a: &T, b: &T, clauses: &[OrderClause]) -> Ordering {
    for clause in clauses {
        let left = a.field_value(&clause.field).unwrap_or_default();
        let right = b.field_value(&clause.field).unwrap_or_default();
        let ord = if clause.descending {
            right.cmp(left)
        } else {
            left.cmp(right)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn validated_window(params: &QueryParams) -> Result<(usize, usize)> {
    let page_size = params.page_size.unwrap_or(0);
    let offset = params.offset.unwrap_or(0);
    if page_size < 0 {
        return Err(ServiceError::bad_input(INVALID_PAGE_SIZE));
    }
    if offset < 0 {
        return Err(ServiceError::bad_input(INVALID_OFFSET));
    }
    if page_size == 0 && offset > 0 {
        return Err(ServiceError::bad_input(INVALID_PAGE_SIZE));
    }
    // Non-negative i32 always fits in usize
    Ok((page_size as usize, offset as usize))
}

/// Filter, order and paginate `items`
///
/// Parameters are validated before any element is touched, so a bad
/// request never yields a partial result.
pub fn apply<T: Queryable>(items: Vec<T>, params: &QueryParams) -> Result<Page<T>> {
    let (page_size, offset) = validated_window(params)?;
    let filter = match params.filter.as_deref() {
        Some(expr) => Filter::parse(expr)?,
        None => Filter::default(),
    };
    let clauses = match params.order_by.as_deref() {
        Some(expr) => parse_order_by(expr, T::ORDER_FIELDS)?,
        None => Vec::new(),
    };

    let mut selected: Vec<T> = items.into_iter().filter(|i| filter.matches(i)).collect();
    if !clauses.is_empty() {
        selected.sort_by(|a, b| compare(a, b, &clauses));
    }
    let total = selected.len();

    if page_size == 0 {
        return Ok(Page {
            items: selected,
            total,
        });
    }
    if offset >= total {
        return Ok(Page {
            items: Vec::new(),
            total,
        });
    }
    let items = selected.into_iter().skip(offset).take(page_size).collect();
    Ok(Page { items, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        name: String,
        version: String,
    }

    impl Queryable for Item {
        const FILTER_FIELDS: &'static [&'static str] = &["name", "version"];
        const ORDER_FIELDS: &'static [&'static str] = &["name", "version"];

        fn field_value(&self, field: &str) -> Option<&str> {
            match field {
                "name" => Some(&self.name),
                "version" => Some(&self.version),
                _ => None,
            }
        }
    }

    fn item(name: &str, version: &str) -> Item {
        Item {
            name: name.into(),
            version: version.into(),
        }
    }

    fn items() -> Vec<Item> {
        vec![
            item("c-3", "v1.30"),
            item("c-1", "v1.29"),
            item("c-2", "v1.30"),
        ]
    }

    fn names(page: &Page<Item>) -> Vec<&str> {
        page.items.iter().map(|i| i.name.as_str()).collect()
    }

    fn params(page_size: i32, offset: i32, order_by: &str, filter: &str) -> QueryParams {
        QueryParams {
            page_size: Some(page_size),
            offset: Some(offset),
            order_by: (!order_by.is_empty()).then(|| order_by.to_string()),
            filter: (!filter.is_empty()).then(|| filter.to_string()),
        }
    }

    #[test]
    fn test_paginated_ordered_list() {
        let page = apply(items(), &params(2, 1, "name", "")).unwrap();
        assert_eq!(names(&page), vec!["c-2", "c-3"]);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_no_params_returns_everything_in_input_order() {
        let page = apply(items(), &QueryParams::default()).unwrap();
        assert_eq!(names(&page), vec!["c-3", "c-1", "c-2"]);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_descending_and_multi_clause() {
        let page = apply(items(), &params(0, 0, "version desc, name", "")).unwrap();
        assert_eq!(names(&page), vec!["c-2", "c-3", "c-1"]);
    }

    #[test]
    fn test_offset_past_end_is_empty_not_error() {
        let page = apply(items(), &params(2, 5, "", "")).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_offset_without_page_size_rejected() {
        let err = apply(items(), &params(0, 1, "", "")).unwrap_err();
        assert_eq!(err, ServiceError::bad_input(INVALID_PAGE_SIZE));
    }

    #[test]
    fn test_negative_values_rejected() {
        assert!(apply(items(), &params(-1, 0, "", "")).is_err());
        assert!(apply(items(), &params(1, -1, "", "")).is_err());
    }

    #[test]
    fn test_and_filter() {
        let page = apply(items(), &params(0, 0, "name", "name=c AND version=1.30")).unwrap();
        assert_eq!(names(&page), vec!["c-2", "c-3"]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_or_filter_and_wildcards() {
        let page = apply(items(), &params(0, 0, "name", "name=*1 OR name=c-3*")).unwrap();
        assert_eq!(names(&page), vec!["c-1", "c-3"]);
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        let page = apply(items(), &params(0, 0, "", "name=C-1")).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_unknown_filter_field_matches_nothing() {
        let page = apply(items(), &params(0, 0, "", "owner=bob")).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_malformed_filter_rejected() {
        for bad in ["name", "name=a and version=b", "=x", "name=a=b"] {
            let err = Filter::parse(bad).unwrap_err();
            assert_eq!(err, ServiceError::bad_input(INVALID_FILTER), "{}", bad);
        }
    }

    #[test]
    fn test_blank_filter_is_no_filter() {
        assert!(Filter::parse("  ").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_order_by() {
        for bad in ["name badasc", "owner", "name asc desc", "", "name,"] {
            let err = parse_order_by(bad, Item::ORDER_FIELDS).unwrap_err();
            assert_eq!(err, ServiceError::bad_input(INVALID_ORDER_BY), "{:?}", bad);
        }
    }

    #[test]
    fn test_query_params_from_query_string_shape() {
        let p: QueryParams = serde_json::from_value(serde_json::json!({
            "pageSize": 10,
            "offset": 0,
            "orderBy": "name desc",
            "filter": "name=a"
        }))
        .unwrap();
        assert_eq!(p.page_size, Some(10));
        assert_eq!(p.order_by.as_deref(), Some("name desc"));
    }
}
