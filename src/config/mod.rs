//! Configuration module for appfleet.
//!
//! This module handles everything on the desired-state side:
//! - Discovering and loading declarative sources (templated YAML)
//! - Merging them into one layered settings tree
//! - Resolving per-target desired state for every category
//! - Validation of the merged tree

mod merge;
mod parser;
mod resolver;
mod settings;
mod source;
mod target;
mod validator;

pub use merge::{deep_merge, merge_all};
pub use parser::{ConfigParser, ALL_KEY, API_KEY_VAR};
pub use resolver::{ConfigResolver, DesiredState};
pub use settings::{
    AppMap, ConfigEntry, Layered, ListCategory, ListEntry, MapCategory, Scalar, ScaleSpec,
    Settings, StackEntry,
};
pub use source::{discover_sources, merge_order, ConfigSource, SourceKind, APP_CONFIG_DIR, DEFAULT_CONFIG_FILE};
pub use target::{EnvironmentClass, TargetId, SEPARATOR};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
