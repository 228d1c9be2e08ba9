//! Document record model, single-field edits, and list filters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opaque record identifier as assigned by the remote service.
///
/// The service may use JSON integers or strings; the original form is kept so
/// it round-trips unchanged in request paths and write bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric identifier.
    Int(i64),
    /// String identifier.
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(value) => write!(f, "{value}"),
            RecordId::Text(value) => f.write_str(value),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.parse::<i64>() {
            Ok(id) => RecordId::Int(id),
            Err(_) => RecordId::Text(value.to_string()),
        })
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

/// One document entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier assigned by the remote service.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Location of the document file.
    pub file: String,
    /// Selection flag.
    #[serde(default)]
    pub selected: bool,
    /// Fields the service returned that the client does not interpret.
    /// Writes echo them back so the remote always receives a complete record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Build a record with no extra fields.
    pub fn new(
        id: impl Into<RecordId>,
        name: impl Into<String>,
        file: impl Into<String>,
        selected: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            file: file.into(),
            selected,
            extra: Map::new(),
        }
    }
}

/// Errors raised when a field edit cannot be interpreted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
    /// The field does not exist or is not editable.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// The value does not have the expected type.
    #[error("invalid value for {field}: expected {expected}")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
    },
}

/// Replacement of exactly one editable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEdit {
    /// New display name.
    Name(String),
    /// New file location.
    File(String),
    /// New selection flag.
    Selected(bool),
}

impl RecordEdit {
    /// Wire name of the edited field.
    pub fn field_name(&self) -> &'static str {
        match self {
            RecordEdit::Name(_) => "name",
            RecordEdit::File(_) => "file",
            RecordEdit::Selected(_) => "selected",
        }
    }

    /// Interpret a `(field, value)` pair coming from a dynamic form.
    pub fn from_field(field: &str, value: Value) -> Result<Self, EditError> {
        match field {
            "name" => match value {
                Value::String(name) => Ok(RecordEdit::Name(name)),
                _ => Err(EditError::InvalidValue {
                    field: "name",
                    expected: "string",
                }),
            },
            "file" => match value {
                Value::String(file) => Ok(RecordEdit::File(file)),
                _ => Err(EditError::InvalidValue {
                    field: "file",
                    expected: "string",
                }),
            },
            "selected" => match value {
                Value::Bool(selected) => Ok(RecordEdit::Selected(selected)),
                _ => Err(EditError::InvalidValue {
                    field: "selected",
                    expected: "boolean",
                }),
            },
            other => Err(EditError::UnknownField(other.to_string())),
        }
    }

    /// Produce a new record with this edit applied; the input is untouched.
    pub fn apply(&self, record: &Record) -> Record {
        let mut updated = record.clone();
        match self {
            RecordEdit::Name(name) => updated.name = name.clone(),
            RecordEdit::File(file) => updated.file = file.clone(),
            RecordEdit::Selected(selected) => updated.selected = *selected,
        }
        updated
    }
}

/// Which records the list shows and fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterState {
    /// Every record.
    #[default]
    All,
    /// Only records with `selected == true`.
    Selected,
    /// Only records with `selected == false`.
    Unselected,
}

impl FilterState {
    /// Value of the `selected` query parameter, `None` for no parameter.
    pub fn query_value(self) -> Option<bool> {
        match self {
            FilterState::All => None,
            FilterState::Selected => Some(true),
            FilterState::Unselected => Some(false),
        }
    }

    /// Whether a record passes this filter.
    pub fn matches(self, record: &Record) -> bool {
        match self.query_value() {
            None => true,
            Some(selected) => record.selected == selected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterState::All => "all",
            FilterState::Selected => "selected",
            FilterState::Unselected => "unselected",
        }
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterState::All),
            "selected" => Ok(FilterState::Selected),
            "unselected" => Ok(FilterState::Unselected),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

/// File payload submitted to the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// File name sent with the multipart part.
    pub file_name: String,
    /// MIME type of the payload.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Default MIME type for uploaded documents.
    pub const PDF_CONTENT_TYPE: &'static str = "application/pdf";

    /// Build a PDF upload payload.
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: Self::PDF_CONTENT_TYPE.to_string(),
            bytes,
        }
    }
}
