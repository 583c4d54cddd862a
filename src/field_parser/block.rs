//! Positional parsing of multi-line text blocks
//!
//! Some sites give reply containers no per-field markup worth targeting. The
//! container's rendered text still has a stable line layout, e.g.
//!
//! ```text
//! level 1
//! alice
//! ·
//! 5 days ago
//! First paragraph.
//! Second paragraph.
//! ```
//!
//! A [`BlockSchema`] names which line (or run of lines) holds each field. An
//! optional anchor, typically the relative-time line, lets slots be addressed
//! relative to it so a variable-length preamble does not shift them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::errors::{ParseError, SchemaError};
use super::normalize::join_fragments;
use super::relative_time::is_relative_time;

/// Where a field's value sits in the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSlot {
    /// Zero-based line index
    Index(usize),
    /// One-based offset from the end; `from_end(1)` is the last line
    FromEnd(usize),
    /// Every line from this index on, joined with spaces
    RestFrom(usize),
    /// Line at a signed offset from the anchor line
    AnchorOffset(i64),
    /// Every line after the anchor, joined with spaces
    AfterAnchor,
}

impl LineSlot {
    const fn needs_anchor(&self) -> bool {
        matches!(self, Self::AnchorOffset(_) | Self::AfterAnchor)
    }
}

/// How the anchor line is recognized. The first matching line wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockAnchor {
    /// A line that is exactly a relative time
    RelativeTime,
    /// A line matching this regex
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    pub line: LineSlot,
    /// Regex the value must match. With a capture group, group 1 becomes
    /// the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldRule {
    pub fn new(name: impl Into<String>, line: LineSlot) -> Self {
        Self {
            name: name.into(),
            line,
            pattern: None,
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchema {
    pub fields: Vec<FieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<BlockAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_lines: Option<usize>,
    #[serde(default = "default_true")]
    pub skip_blank_lines: bool,
}

impl BlockSchema {
    #[must_use]
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self {
            fields,
            anchor: None,
            min_lines: None,
            skip_blank_lines: true,
        }
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: BlockAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    #[must_use]
    pub fn with_min_lines(mut self, min_lines: usize) -> Self {
        self.min_lines = Some(min_lines);
        self
    }
}

#[derive(Debug, Clone)]
enum CompiledAnchor {
    RelativeTime,
    Pattern(Regex),
}

impl CompiledAnchor {
    fn matches(&self, line: &str) -> bool {
        match self {
            Self::RelativeTime => is_relative_time(line),
            Self::Pattern(re) => re.is_match(line),
        }
    }
}

/// Compiled [`BlockSchema`], reusable across blocks.
#[derive(Debug, Clone)]
pub struct BlockParser {
    fields: Vec<(FieldRule, Option<Regex>)>,
    anchor: Option<CompiledAnchor>,
    min_lines: usize,
    skip_blank_lines: bool,
}

impl BlockParser {
    pub fn new(schema: &BlockSchema) -> Result<Self, SchemaError> {
        if schema.fields.is_empty() {
            return Err(SchemaError("no fields declared".to_string()));
        }

        let anchor = match &schema.anchor {
            None => None,
            Some(BlockAnchor::RelativeTime) => Some(CompiledAnchor::RelativeTime),
            Some(BlockAnchor::Pattern(p)) => Some(CompiledAnchor::Pattern(
                Regex::new(p).map_err(|e| SchemaError(format!("anchor pattern {p:?}: {e}")))?,
            )),
        };

        let mut fields: Vec<(FieldRule, Option<Regex>)> = Vec::with_capacity(schema.fields.len());
        for rule in &schema.fields {
            if rule.line.needs_anchor() && anchor.is_none() {
                return Err(SchemaError(format!(
                    "field '{}' is anchor-relative but no anchor is declared",
                    rule.name
                )));
            }
            if fields.iter().any(|(r, _)| r.name == rule.name) {
                return Err(SchemaError(format!("field '{}' declared twice", rule.name)));
            }
            let pattern = rule
                .pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| SchemaError(format!("pattern for field '{}': {e}", rule.name)))?;
            fields.push((rule.clone(), pattern));
        }

        Ok(Self {
            fields,
            anchor,
            min_lines: schema.min_lines.unwrap_or(0),
            skip_blank_lines: schema.skip_blank_lines,
        })
    }

    /// Extract every declared field from `text`.
    pub fn parse(&self, text: &str) -> Result<BTreeMap<String, String>, ParseError> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !self.skip_blank_lines || !l.is_empty())
            .collect();

        if lines.len() < self.min_lines {
            return Err(ParseError::schema_mismatch(
                text,
                format!("expected at least {} lines, found {}", self.min_lines, lines.len()),
            ));
        }

        let anchor_index = match &self.anchor {
            None => None,
            Some(anchor) => Some(
                lines
                    .iter()
                    .position(|l| anchor.matches(l))
                    .ok_or_else(|| ParseError::schema_mismatch(text, "anchor line not found"))?,
            ),
        };

        let mut out = BTreeMap::new();
        for (rule, pattern) in &self.fields {
            let value = slot_value(&lines, &rule.line, anchor_index).ok_or_else(|| {
                ParseError::schema_mismatch(
                    text,
                    format!("field '{}': {:?} is out of range for {} lines", rule.name, rule.line, lines.len()),
                )
            })?;

            let value = match pattern {
                None => value,
                Some(re) => {
                    let captures = re.captures(&value).ok_or_else(|| {
                        ParseError::schema_mismatch(
                            text,
                            format!("field '{}': {value:?} does not match {:?}", rule.name, re.as_str()),
                        )
                    })?;
                    captures
                        .get(1)
                        .or_else(|| captures.get(0))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default()
                }
            };

            out.insert(rule.name.clone(), value);
        }
        Ok(out)
    }
}

/// Convenience wrapper compiling `schema` for a single parse.
pub fn parse_block(text: &str, schema: &BlockSchema) -> Result<BTreeMap<String, String>, ParseError> {
    let parser = BlockParser::new(schema)
        .map_err(|e| ParseError::schema_mismatch(text, e.to_string()))?;
    parser.parse(text)
}

fn slot_value(lines: &[&str], slot: &LineSlot, anchor: Option<usize>) -> Option<String> {
    let single = |idx: usize| lines.get(idx).map(|l| (*l).to_string());
    let rest = |from: usize| {
        let joined = join_fragments(lines.get(from..)?.iter().copied());
        (!joined.is_empty()).then_some(joined)
    };

    match *slot {
        LineSlot::Index(i) => single(i),
        LineSlot::FromEnd(n) => {
            if n == 0 {
                return None;
            }
            single(lines.len().checked_sub(n)?)
        }
        LineSlot::RestFrom(i) => rest(i),
        LineSlot::AnchorOffset(k) => {
            let idx = i64::try_from(anchor?).ok()?.checked_add(k)?;
            single(usize::try_from(idx).ok()?)
        }
        LineSlot::AfterAnchor => rest(anchor? + 1),
    }
}
