//! Locator error types

use super::strategy::SemanticTarget;
use crate::browser::DriverError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocateError {
    /// Every strategy came back empty for a required target
    #[error("{target} not found after {strategies_tried} strategies")]
    NotFound {
        target: SemanticTarget,
        strategies_tried: usize,
    },

    #[error("no strategies configured for {0}")]
    Unconfigured(SemanticTarget),

    #[error("driver failed while locating {target}: {source}")]
    Driver {
        target: SemanticTarget,
        #[source]
        source: DriverError,
    },

    #[error("{target} has an empty strategy list")]
    EmptyStrategies { target: SemanticTarget },

    #[error("invalid text pattern {pattern:?} for {target}: {reason}")]
    InvalidPattern {
        target: SemanticTarget,
        pattern: String,
        reason: String,
    },
}

impl LocateError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The underlying driver failure, if any.
    #[must_use]
    pub const fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver { source, .. } => Some(source),
            _ => None,
        }
    }
}
