//! Core record types for blackbox.
//!
//! Two record variants exist: [`ErrorRecord`] for application failures and
//! [`HistoryRecord`] for user actions. Both carry a `kind` discriminant in
//! their JSON form so stored or imported data can be routed back to the
//! right variant.

use std::backtrace::Backtrace;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The variant of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// An application error.
    Error,
    /// A user action.
    History,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::History => write!(f, "history"),
        }
    }
}

/// An application error captured at a point in time.
///
/// `ErrorRecord::new` captures the current call stack synchronously, so a
/// freshly built record always has its stack trace. Records read back from
/// storage or imported JSON may not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    kind: RecordKind,
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack_trace: Option<String>,
}

/// A user action captured at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    kind: RecordKind,
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    timestamp: DateTime<Utc>,
}

/// Fields accepted by [`ErrorRecord::merge_json`]. Absent fields stay as they are.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPatch {
    kind: Option<RecordKind>,
    key: Option<String>,
    description: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    stack_trace: Option<String>,
}

/// Fields accepted by [`HistoryRecord::merge_json`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryPatch {
    kind: Option<RecordKind>,
    key: Option<String>,
    description: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

fn check_kind(found: RecordKind, expected: RecordKind) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::invalid_record(format!(
            "expected a {expected} record, found a {found} record"
        )))
    }
}

/// Read the `kind` discriminant out of a parsed JSON object.
fn kind_of(value: &serde_json::Value) -> Result<RecordKind> {
    let kind = value
        .get("kind")
        .ok_or_else(|| Error::invalid_record("missing \"kind\" discriminant"))?;
    serde_json::from_value(kind.clone())
        .map_err(|_| Error::invalid_record(format!("unknown record kind {kind}")))
}

impl ErrorRecord {
    /// Create a new error record stamped with the current time and call stack.
    #[must_use]
    pub fn new(key: impl Into<String>, description: Option<String>) -> Self {
        let mut record = Self::without_stack_trace(key, description);
        record.stack_trace = Some(Backtrace::force_capture().to_string());
        record
    }

    /// Create a new error record without capturing a stack trace.
    #[must_use]
    pub fn without_stack_trace(key: impl Into<String>, description: Option<String>) -> Self {
        Self {
            kind: RecordKind::Error,
            key: key.into(),
            description,
            timestamp: Utc::now(),
            stack_trace: None,
        }
    }

    /// Parse a full error record from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::InvalidRecord`]
    /// when the `kind` discriminant is missing or names another variant.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        check_kind(kind_of(&value)?, RecordKind::Error)?;
        serde_json::from_value(value).map_err(|e| Error::invalid_record(e.to_string()))
    }

    /// Serialize this record to its canonical JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Overwrite the fields present in `json`, leaving the others untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or declares a different kind.
    /// The record is unchanged on error.
    pub fn merge_json(&mut self, json: &str) -> Result<()> {
        let patch: ErrorPatch = serde_json::from_str(json)?;
        if let Some(kind) = patch.kind {
            check_kind(kind, RecordKind::Error)?;
        }
        if let Some(key) = patch.key {
            self.key = key;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(stack_trace) = patch.stack_trace {
            self.stack_trace = Some(stack_trace);
        }
        Ok(())
    }

    /// Check that this record can be appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the kind is wrong or the key is empty.
    pub fn validate(&self) -> Result<()> {
        check_kind(self.kind, RecordKind::Error)?;
        if self.key.trim().is_empty() {
            return Err(Error::invalid_record("error key must not be empty"));
        }
        Ok(())
    }

    /// The record kind as declared by its data.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// The error key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// When the record was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The captured stack trace, if any.
    #[must_use]
    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }
}

impl HistoryRecord {
    /// Create a new history record stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, description: Option<String>) -> Self {
        Self {
            kind: RecordKind::History,
            key: key.into(),
            description,
            timestamp: Utc::now(),
        }
    }

    /// Parse a full history record from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::InvalidRecord`]
    /// when the `kind` discriminant is missing or names another variant.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        check_kind(kind_of(&value)?, RecordKind::History)?;
        serde_json::from_value(value).map_err(|e| Error::invalid_record(e.to_string()))
    }

    /// Serialize this record to its canonical JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Overwrite the fields present in `json`, leaving the others untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or declares a different kind.
    pub fn merge_json(&mut self, json: &str) -> Result<()> {
        let patch: HistoryPatch = serde_json::from_str(json)?;
        if let Some(kind) = patch.kind {
            check_kind(kind, RecordKind::History)?;
        }
        if let Some(key) = patch.key {
            self.key = key;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
        Ok(())
    }

    /// Check that this record can be appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the kind is wrong or the key is empty.
    pub fn validate(&self) -> Result<()> {
        check_kind(self.kind, RecordKind::History)?;
        if self.key.trim().is_empty() {
            return Err(Error::invalid_record("history key must not be empty"));
        }
        Ok(())
    }

    /// The record kind as declared by its data.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// The history key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// When the record was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Either kind of record, routed by its `kind` discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// An error record.
    Error(ErrorRecord),
    /// A history record.
    History(HistoryRecord),
}

impl Record {
    /// Parse a record of either kind from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] when the discriminant is missing or unknown.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let record = match kind_of(&value)? {
            RecordKind::Error => Self::Error(
                serde_json::from_value(value).map_err(|e| Error::invalid_record(e.to_string()))?,
            ),
            RecordKind::History => Self::History(
                serde_json::from_value(value).map_err(|e| Error::invalid_record(e.to_string()))?,
            ),
        };
        Ok(record)
    }

    /// The record kind.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Error(record) => record.kind(),
            Self::History(record) => record.kind(),
        }
    }

    /// When the record was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Error(record) => record.timestamp(),
            Self::History(record) => record.timestamp(),
        }
    }
}

impl From<ErrorRecord> for Record {
    fn from(record: ErrorRecord) -> Self {
        Self::Error(record)
    }
}

impl From<HistoryRecord> for Record {
    fn from(record: HistoryRecord) -> Self {
        Self::History(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_display() {
        assert_eq!(RecordKind::Error.to_string(), "error");
        assert_eq!(RecordKind::History.to_string(), "history");
    }

    #[test]
    fn test_error_record_new_captures_stack() {
        let record = ErrorRecord::new("crash", Some("The app crashed".to_string()));

        assert_eq!(record.kind(), RecordKind::Error);
        assert_eq!(record.key(), "crash");
        assert_eq!(record.description(), Some("The app crashed"));
        assert!(record.stack_trace().is_some());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_error_record_without_stack_trace() {
        let record = ErrorRecord::without_stack_trace("crash", None);
        assert!(record.stack_trace().is_none());
        assert!(record.description().is_none());
    }

    #[test]
    fn test_error_json_uses_camel_case_and_kind() {
        let mut record = ErrorRecord::without_stack_trace("crash", None);
        record.merge_json(r#"{"stackTrace": "at main"}"#).unwrap();

        let json = record.to_json().unwrap();
        assert!(json.contains(r#""kind":"error""#));
        assert!(json.contains(r#""stackTrace":"at main""#));
        assert!(!json.contains("description"));
    }

    #[test]
    fn test_error_round_trip() {
        let record = ErrorRecord::new("crash", Some("boom".to_string()));
        let parsed = ErrorRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_history_round_trip() {
        let record = HistoryRecord::new("click", Some("Clicked save".to_string()));
        let parsed = HistoryRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_merge_leaves_absent_fields() {
        let mut record = HistoryRecord::new("click", Some("original".to_string()));
        let timestamp = record.timestamp();

        record.merge_json(r#"{"key": "scroll"}"#).unwrap();

        assert_eq!(record.key(), "scroll");
        assert_eq!(record.description(), Some("original"));
        assert_eq!(record.timestamp(), timestamp);
    }

    #[test]
    fn test_merge_replaces_timestamp() {
        let mut record = ErrorRecord::without_stack_trace("crash", None);
        record
            .merge_json(r#"{"timestamp": "2020-01-02T03:04:05.006Z"}"#)
            .unwrap();
        assert_eq!(
            record.timestamp().to_rfc3339(),
            "2020-01-02T03:04:05.006+00:00"
        );
    }

    #[test]
    fn test_merge_rejects_other_kind() {
        let mut record = ErrorRecord::without_stack_trace("crash", None);
        let before = record.clone();

        let err = record
            .merge_json(r#"{"kind": "history", "key": "other"}"#)
            .unwrap_err();

        assert!(err.is_invalid_record());
        assert_eq!(record, before);
    }

    #[test]
    fn test_merge_into_fresh_instance() {
        let source = ErrorRecord::new("crash", Some("boom".to_string()));
        let mut target = ErrorRecord::without_stack_trace("placeholder", None);

        target.merge_json(&source.to_json().unwrap()).unwrap();

        assert_eq!(target, source);
    }

    #[test]
    fn test_from_json_rejects_wrong_kind() {
        let history = HistoryRecord::new("click", None).to_json().unwrap();
        let err = ErrorRecord::from_json(&history).unwrap_err();
        assert!(err.is_invalid_record());
    }

    #[test]
    fn test_from_json_rejects_missing_kind() {
        let json = r#"{"key": "click", "timestamp": "2024-01-01T00:00:00Z"}"#;
        let err = HistoryRecord::from_json(json).unwrap_err();
        assert!(err.is_invalid_record());
    }

    #[test]
    fn test_from_json_malformed_is_json_error() {
        let err = ErrorRecord::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_validate_empty_key() {
        let record = HistoryRecord::new("  ", None);
        assert!(record.validate().unwrap_err().is_invalid_record());
    }

    #[test]
    fn test_serde_accepts_mismatched_kind_but_validate_rejects() {
        let json = r#"{"kind": "history", "key": "x", "timestamp": "2024-01-01T00:00:00Z"}"#;
        let record: ErrorRecord = serde_json::from_str(json).unwrap();
        assert!(record.validate().unwrap_err().is_invalid_record());
    }

    #[test]
    fn test_record_routes_by_kind() {
        let error = ErrorRecord::new("crash", None).to_json().unwrap();
        let history = HistoryRecord::new("click", None).to_json().unwrap();

        assert_eq!(Record::from_json(&error).unwrap().kind(), RecordKind::Error);
        assert_eq!(
            Record::from_json(&history).unwrap().kind(),
            RecordKind::History
        );
    }

    #[test]
    fn test_record_unknown_kind() {
        let err = Record::from_json(r#"{"kind": "warning", "key": "x"}"#).unwrap_err();
        assert!(err.is_invalid_record());
    }

    #[test]
    fn test_record_from_variants() {
        let record: Record = HistoryRecord::new("click", None).into();
        assert!(matches!(record, Record::History(_)));

        let record: Record = ErrorRecord::without_stack_trace("crash", None).into();
        assert!(matches!(record, Record::Error(_)));
    }
}
