//! Roadmap records, typed field values and multi-field patches

use crate::{DataType, EditError, EditResult, RecordId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved key addressing a record's id (read-only).
pub const ID_KEY: &str = "id";
/// Reserved key addressing the manual backlog position.
pub const SORT_ORDER_KEY: &str = "sort_order";
/// Reserved key addressing the priority rank.
pub const PRIORITY_RANK_KEY: &str = "priority_rank";

/// True if `field_key` addresses a system-managed record attribute.
pub fn is_reserved_key(field_key: &str) -> bool {
    matches!(field_key, ID_KEY | SORT_ORDER_KEY | PRIORITY_RANK_KEY)
}

// ============================================================================
// FIELD VALUES
// ============================================================================

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Numeric(f64),
    Date(NaiveDate),
    Boolean(bool),
}

impl FieldValue {
    /// Data type of a non-null value.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(_) => Some(DataType::Text),
            FieldValue::Integer(_) => Some(DataType::Integer),
            FieldValue::Numeric(_) => Some(DataType::Numeric),
            FieldValue::Date(_) => Some(DataType::Date),
            FieldValue::Boolean(_) => Some(DataType::Boolean),
        }
    }

    /// Whether this value can be stored in a column of `data_type`.
    ///
    /// Null fits every column; integers also fit numeric columns.
    pub fn fits(&self, data_type: DataType) -> bool {
        match (self, data_type) {
            (FieldValue::Null, _) => true,
            (FieldValue::Integer(_), DataType::Numeric) => true,
            (value, expected) => value.data_type() == Some(expected),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self.data_type() {
            Some(data_type) => data_type.as_db_str(),
            None => "null",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Numeric(n) => write!(f, "{}", n),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Numeric(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

// ============================================================================
// RECORD PATCH
// ============================================================================

/// Ordered set of field changes applied to one record in a single write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordPatch(BTreeMap<String, FieldValue>);

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field_key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field_key, value);
        self
    }

    /// Set a field, replacing any earlier value for it.
    pub fn insert(&mut self, field_key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field_key.into(), value.into());
    }

    pub fn get(&self, field_key: &str) -> Option<&FieldValue> {
        self.0.get(field_key)
    }

    pub fn remove(&mut self, field_key: &str) -> Option<FieldValue> {
        self.0.remove(field_key)
    }

    pub fn contains(&self, field_key: &str) -> bool {
        self.0.contains_key(field_key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field keys in the patch, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into this patch; later values win.
    pub fn merge(&mut self, other: RecordPatch) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(String, FieldValue)> for RecordPatch {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for RecordPatch {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// One roadmap entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Dense manual backlog position
    pub sort_order: i64,
    /// Dense rank for non-terminal records, None otherwise
    pub priority_rank: Option<i64>,
    /// User-visible attributes keyed by field key
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(id: i64, sort_order: i64) -> Self {
        Self {
            id: RecordId(id),
            sort_order,
            priority_rank: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter for non-reserved keys.
    pub fn with_field(mut self, field_key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field_key.into(), value.into());
        self
    }

    pub fn with_priority_rank(mut self, rank: Option<i64>) -> Self {
        self.priority_rank = rank;
        self
    }

    /// Current value of a field; reserved keys read the system attributes.
    ///
    /// Absent fields read as `Null`.
    pub fn get(&self, field_key: &str) -> FieldValue {
        match field_key {
            ID_KEY => FieldValue::Integer(self.id.get()),
            SORT_ORDER_KEY => FieldValue::Integer(self.sort_order),
            PRIORITY_RANK_KEY => self.priority_rank.into(),
            _ => self.fields.get(field_key).cloned().unwrap_or_default(),
        }
    }

    /// Text value of a field, if it holds text.
    pub fn text(&self, field_key: &str) -> Option<&str> {
        self.fields.get(field_key).and_then(FieldValue::as_text)
    }

    /// Check that `value` can be written to `field_key`.
    pub fn check_field(field_key: &str, value: &FieldValue) -> EditResult<()> {
        match field_key {
            ID_KEY => Err(EditError::ReadOnlyField {
                field_key: field_key.to_string(),
            }),
            SORT_ORDER_KEY if value.as_integer().is_none() => Err(EditError::TypeMismatch {
                field_key: field_key.to_string(),
                expected: DataType::Integer,
                got: value.kind().to_string(),
            }),
            PRIORITY_RANK_KEY if !value.is_null() && value.as_integer().is_none() => {
                Err(EditError::TypeMismatch {
                    field_key: field_key.to_string(),
                    expected: DataType::Integer,
                    got: value.kind().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Write one field, routing reserved keys to the system attributes.
    pub fn set(&mut self, field_key: &str, value: FieldValue) -> EditResult<()> {
        Self::check_field(field_key, &value)?;
        match field_key {
            SORT_ORDER_KEY => {
                if let Some(n) = value.as_integer() {
                    self.sort_order = n;
                }
            }
            PRIORITY_RANK_KEY => self.priority_rank = value.as_integer(),
            _ => {
                self.fields.insert(field_key.to_string(), value);
            }
        }
        Ok(())
    }

    /// Apply every change in `patch`, or none if any change is invalid.
    pub fn apply(&mut self, patch: &RecordPatch) -> EditResult<()> {
        for (field_key, value) in patch.iter() {
            Self::check_field(field_key, value)?;
        }
        for (field_key, value) in patch.iter() {
            self.set(field_key, value.clone())?;
        }
        Ok(())
    }

    /// Values of `field_keys` as they are now, as a restorable patch.
    pub fn capture(&self, field_keys: impl IntoIterator<Item = impl AsRef<str>>) -> RecordPatch {
        field_keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                (key.to_string(), self.get(key))
            })
            .collect()
    }
}

/// Record to be inserted; the store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Backlog position; the store appends at the end when absent
    pub sort_order: Option<i64>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl NewRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field_key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field_key.into(), value.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_route_to_system_fields() {
        let mut record = Record::new(1, 4);
        record.set(PRIORITY_RANK_KEY, FieldValue::Integer(2)).unwrap();
        record.set(SORT_ORDER_KEY, FieldValue::Integer(9)).unwrap();
        assert_eq!(record.priority_rank, Some(2));
        assert_eq!(record.sort_order, 9);
        assert!(record.fields.is_empty());

        record.set(PRIORITY_RANK_KEY, FieldValue::Null).unwrap();
        assert_eq!(record.priority_rank, None);
        assert_eq!(record.get(PRIORITY_RANK_KEY), FieldValue::Null);
    }

    #[test]
    fn test_id_is_read_only() {
        let mut record = Record::new(1, 0);
        let err = record.set(ID_KEY, FieldValue::Integer(5)).unwrap_err();
        assert!(matches!(err, EditError::ReadOnlyField { .. }));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut record = Record::new(1, 0).with_field("title", "Old");
        let patch = RecordPatch::new()
            .with("title", "New")
            .with(SORT_ORDER_KEY, "not a number");
        assert!(record.apply(&patch).is_err());
        assert_eq!(record.text("title"), Some("Old"));
    }

    #[test]
    fn test_capture_reads_missing_as_null() {
        let record = Record::new(1, 0).with_field("a", 1i64);
        let captured = record.capture(["a", "b"]);
        assert_eq!(captured.get("a"), Some(&FieldValue::Integer(1)));
        assert_eq!(captured.get("b"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_value_fits_data_type() {
        assert!(FieldValue::Null.fits(DataType::Date));
        assert!(FieldValue::Integer(3).fits(DataType::Numeric));
        assert!(!FieldValue::Numeric(3.5).fits(DataType::Integer));
        assert!(!FieldValue::from("x").fits(DataType::Boolean));
    }

    #[test]
    fn test_patch_merge_later_wins() {
        let mut a = RecordPatch::new().with("x", 1i64).with("y", 1i64);
        a.merge(RecordPatch::new().with("y", 2i64));
        assert_eq!(a.get("y"), Some(&FieldValue::Integer(2)));
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_field_value_serde_shape() {
        let json = serde_json::to_value(FieldValue::from("Completed")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "value": "Completed"}));
    }
}
