//! Discussion-scoped record assembly

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

use super::{ContentRecord, record_id};
use crate::field_parser::ParsedFields;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("required field '{field}' is empty at position {position}")]
    MissingField { field: &'static str, position: usize },

    #[error("discussion {discussion_id} already has a root record")]
    DuplicateRoot { discussion_id: String },
}

/// Non-fatal oddity noticed while assembling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyWarning {
    pub discussion_id: String,
    pub record_id: String,
    pub message: String,
}

/// Where a record sits in its discussion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub parent_id: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub is_root: bool,
    pub position: usize,
}

impl RecordContext {
    #[must_use]
    pub fn root(captured_at: DateTime<Utc>) -> Self {
        Self {
            parent_id: None,
            captured_at,
            is_root: true,
            position: 0,
        }
    }

    #[must_use]
    pub fn reply(parent_id: impl Into<String>, position: usize, captured_at: DateTime<Utc>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            captured_at,
            is_root: false,
            position,
        }
    }
}

/// Builds the records of one discussion.
#[derive(Debug)]
pub struct RecordAssembler {
    discussion_id: String,
    root_id: Option<String>,
    root_title: Option<String>,
    assembled: HashSet<String>,
    warnings: Vec<AssemblyWarning>,
}

impl RecordAssembler {
    pub fn new(discussion_id: impl Into<String>) -> Self {
        Self {
            discussion_id: discussion_id.into(),
            root_id: None,
            root_title: None,
            assembled: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn discussion_id(&self) -> &str {
        &self.discussion_id
    }

    /// Id of the root record, once assembled.
    #[must_use]
    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    #[must_use]
    pub fn warnings(&self) -> &[AssemblyWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<AssemblyWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Build a record and append it to `pending`.
    pub fn assemble(
        &mut self,
        fields: ParsedFields,
        context: RecordContext,
        pending: &mut Vec<ContentRecord>,
    ) -> Result<ContentRecord, AssembleError> {
        let position = context.position;
        if fields.author.trim().is_empty() {
            return Err(AssembleError::MissingField {
                field: "author",
                position,
            });
        }
        if fields.body.trim().is_empty() {
            return Err(AssembleError::MissingField {
                field: "body",
                position,
            });
        }
        if context.is_root && self.root_id.is_some() {
            return Err(AssembleError::DuplicateRoot {
                discussion_id: self.discussion_id.clone(),
            });
        }

        let id = record_id(&self.discussion_id, &fields.author, position);

        if let Some(parent) = context.parent_id.as_deref()
            && !self.assembled.contains(parent)
        {
            warn!(
                discussion = %self.discussion_id,
                record = %id,
                parent,
                position,
                "parent record not assembled in this discussion"
            );
            self.warnings.push(AssemblyWarning {
                discussion_id: self.discussion_id.clone(),
                record_id: id.clone(),
                message: format!("dangling parent_id {parent}"),
            });
        }

        let title = fields
            .title
            .or_else(|| self.root_title.clone())
            .unwrap_or_default();

        let record = ContentRecord {
            record_id: id.clone(),
            discussion_id: self.discussion_id.clone(),
            author: fields.author,
            title: title.clone(),
            body: fields.body,
            posted_approx: fields.relative_time.approximate_instant(context.captured_at),
            relative_time: fields.relative_time,
            captured_at: context.captured_at,
            is_root: context.is_root,
            parent_id: context.parent_id,
            position,
        };

        if context.is_root {
            self.root_id = Some(id.clone());
            self.root_title = Some(title);
        }
        self.assembled.insert(id);
        pending.push(record.clone());
        Ok(record)
    }
}
