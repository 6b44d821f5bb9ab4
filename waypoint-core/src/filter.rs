//! Record filters and orderings for store selects
//!
//! Filters are evaluated by in-memory stores directly and translated by
//! remote stores into their own query language.

use crate::{FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// In list of values
    In,
    /// Field is null or absent
    IsNull,
    /// Field holds a value
    NotNull,
}

/// One field comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    pub field: String,
    pub operator: FilterOperator,
    /// Compared values; one for Eq/Ne, any number for In, none otherwise
    pub values: Vec<FieldValue>,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, values: Vec<FieldValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            values,
        }
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOperator::Eq, vec![value.into()])
    }

    /// Create an inequality filter.
    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOperator::Ne, vec![value.into()])
    }

    /// Create a membership filter.
    pub fn is_in(field: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Self::new(field, FilterOperator::In, values)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, Vec::new())
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::NotNull, Vec::new())
    }

    /// Evaluate against a record.
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.field);
        match self.operator {
            FilterOperator::Eq => self.values.first() == Some(&value),
            FilterOperator::Ne => self.values.first() != Some(&value),
            FilterOperator::In => self.values.contains(&value),
            FilterOperator::IsNull => value.is_null(),
            FilterOperator::NotNull => !value.is_null(),
        }
    }
}

/// Conjunction of field comparisons. Empty selects everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub all_of: Vec<FilterExpr>,
}

impl RecordFilter {
    /// Filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a comparison.
    pub fn and(mut self, expr: FilterExpr) -> Self {
        self.all_of.push(expr);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.all_of.iter().all(|expr| expr.matches(record))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordering of a select; ties fall back to record id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOrder {
    pub keys: Vec<SortKey>,
}

impl RecordOrder {
    /// Order by record id only.
    pub fn by_id() -> Self {
        Self::default()
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(SortKey {
            field: field.into(),
            direction: SortDirection::Asc,
        });
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(SortKey {
            field: field.into(),
            direction: SortDirection::Desc,
        });
        self
    }

    /// Compare two records under this ordering.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let ord = compare_values(&a.get(&key.field), &b.get(&key.field));
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }
}

/// Total order over field values: nulls first, then by kind, then by value.
pub fn compare_values(a: &FieldValue, b: &FieldValue) -> Ordering {
    use FieldValue::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Text(x), Text(y)) => x.cmp(y),
        (Integer(x), Integer(y)) => x.cmp(y),
        (Numeric(x), Numeric(y)) => x.total_cmp(y),
        (Integer(x), Numeric(y)) => (*x as f64).total_cmp(y),
        (Numeric(x), Integer(y)) => x.total_cmp(&(*y as f64)),
        (Date(x), Date(y)) => x.cmp(y),
        (Boolean(x), Boolean(y)) => x.cmp(y),
        (x, y) => x.kind().cmp(y.kind()),
    }
}
