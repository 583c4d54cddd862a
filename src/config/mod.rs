//! Configuration module for discussion extraction
//!
//! This module provides the `ExtractionConfig` struct, its type-safe builder,
//! and JSON site profiles that feed the builder.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod profile;
pub mod types;

// Re-exports for public API
pub use builder::{ExtractionConfigBuilder, WithStartUrl, WithStorageDir};
pub use profile::SiteProfile;
pub use types::{ConfigError, ExtractionConfig, LazyLoad};
