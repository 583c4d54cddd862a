//! Field parser error types

use serde::Serialize;
use std::fmt;

use crate::utils::preview_raw;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// Text is not `<integer> <unit> ago`
    UnrecognizedTimeFormat,
    /// A text block does not have the shape its schema describes
    SchemaMismatch,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnrecognizedTimeFormat => "unrecognized time format",
            Self::SchemaMismatch => "schema mismatch",
        })
    }
}

/// Raw text that could not be turned into typed fields.
///
/// Always carries the offending text so skip warnings can show it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail} [raw: {}]", preview_raw(.raw))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub raw: String,
    pub detail: String,
}

impl ParseError {
    pub fn unrecognized_time(raw: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::UnrecognizedTimeFormat,
            raw: raw.into(),
            detail: "expected '<integer> <unit> ago'".to_string(),
        }
    }

    pub fn schema_mismatch(raw: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::SchemaMismatch,
            raw: raw.into(),
            detail: detail.into(),
        }
    }
}

/// A block schema that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block schema: {0}")]
pub struct SchemaError(pub String);
