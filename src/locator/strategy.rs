//! Declarative strategy types stored in site profiles

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::browser::Selector;

/// What a locator lookup is for, independent of how a site marks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticTarget {
    /// Link from a listing page to one discussion
    DiscussionLink,
    /// Container of the discussion's opening post
    RootPost,
    /// Container of one reply
    Comment,
    Author,
    Title,
    Timestamp,
    Body,
    /// Control that advances pagination
    NextPage,
    /// "View entire discussion" style control
    ExpandThread,
}

impl SemanticTarget {
    pub const ALL: [Self; 9] = [
        Self::DiscussionLink,
        Self::RootPost,
        Self::Comment,
        Self::Author,
        Self::Title,
        Self::Timestamp,
        Self::Body,
        Self::NextPage,
        Self::ExpandThread,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiscussionLink => "discussion_link",
            Self::RootPost => "root_post",
            Self::Comment => "comment",
            Self::Author => "author",
            Self::Title => "title",
            Self::Timestamp => "timestamp",
            Self::Body => "body",
            Self::NextPage => "next_page",
            Self::ExpandThread => "expand_thread",
        }
    }
}

impl fmt::Display for SemanticTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter on an element's rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPredicate {
    Equals(String),
    Contains(String),
    /// Regular expression, searched anywhere in the text
    Matches(String),
}

/// Which raw value of a matched element the caller gets back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    #[default]
    Text,
    Attribute(String),
}

/// One way of finding a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextPredicate>,
}

impl LocatorStrategy {
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            text: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, predicate: TextPredicate) -> Self {
        self.text = Some(predicate);
        self
    }
}

impl From<Selector> for LocatorStrategy {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

/// Configuration of one semantic target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Tried in order; the first strategy with a usable match wins
    pub strategies: Vec<LocatorStrategy>,
    /// Zero matches is a valid outcome
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub value: ValueSource,
}

impl TargetSpec {
    #[must_use]
    pub fn new(strategies: impl IntoIterator<Item = impl Into<LocatorStrategy>>) -> Self {
        Self {
            strategies: strategies.into_iter().map(Into::into).collect(),
            optional: false,
            value: ValueSource::Text,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.value = ValueSource::Attribute(name.into());
        self
    }
}

/// [`TextPredicate`] with its regex compiled.
#[derive(Debug, Clone)]
pub(crate) enum CompiledPredicate {
    Equals(String),
    Contains(String),
    Matches(Regex),
}

impl CompiledPredicate {
    pub(crate) fn compile(predicate: &TextPredicate) -> Result<Self, regex::Error> {
        Ok(match predicate {
            TextPredicate::Equals(v) => Self::Equals(v.trim().to_string()),
            TextPredicate::Contains(v) => Self::Contains(v.clone()),
            TextPredicate::Matches(pattern) => Self::Matches(Regex::new(pattern)?),
        })
    }

    pub(crate) fn accepts(&self, text: &str) -> bool {
        match self {
            Self::Equals(v) => text.trim() == v,
            Self::Contains(v) => text.contains(v.as_str()),
            Self::Matches(re) => re.is_match(text),
        }
    }
}
