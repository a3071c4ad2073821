//! Target identifiers and environment classification.
//!
//! A target is one (app, environment) pair, written `app:env` on the
//! command line and in reports.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::TargetError;

/// Separator between app and environment in a target identifier.
pub const SEPARATOR: char = ':';

#[allow(clippy::expect_used)]
static PRODUCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)^(?:production|prod|live)").expect("static pattern"));

#[allow(clippy::expect_used)]
static STAGING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)^(?:staging|stage)").expect("static pattern"));

/// One app-environment pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId {
    /// App name as declared under `apps`.
    pub app: String,
    /// Environment name as declared under the app.
    pub environment: String,
}

impl TargetId {
    /// Creates a target from its two components.
    #[must_use]
    pub fn new(app: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            environment: environment.into(),
        }
    }

    /// Classifies this target's environment.
    #[must_use]
    pub fn class(&self) -> EnvironmentClass {
        EnvironmentClass::of(&self.environment)
    }

    /// Returns true if the environment name looks like production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.class() == EnvironmentClass::Production
    }
}

impl FromStr for TargetId {
    type Err = TargetError;

    /// Parses `app:env`. Exactly two non-empty components are required.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(app), Some(env), None) if !app.is_empty() && !env.is_empty() => {
                Ok(Self::new(app, env))
            }
            _ => Err(TargetError::Malformed {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.app, self.environment)
    }
}

/// Broad classification of environment names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentClass {
    /// `production`, `prod` or `live` (any case).
    Production,
    /// `staging` or `stage` (any case).
    Staging,
    /// Anything else.
    Other,
}

impl EnvironmentClass {
    /// Classifies an environment name.
    #[must_use]
    pub fn of(environment: &str) -> Self {
        if PRODUCTION.is_match(environment) {
            Self::Production
        } else if STAGING.is_match(environment) {
            Self::Staging
        } else {
            Self::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        let target: TargetId = "awesomeapp:staging".parse().unwrap();
        assert_eq!(target.app, "awesomeapp");
        assert_eq!(target.environment, "staging");
        assert_eq!(target.to_string(), "awesomeapp:staging");
    }

    #[test]
    fn test_parse_malformed_target() {
        for input in ["awesomeapp", "awesomeapp:", ":staging", "a:b:c", ""] {
            assert!(
                matches!(input.parse::<TargetId>(), Err(TargetError::Malformed { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_environment_class() {
        assert_eq!(EnvironmentClass::of("production"), EnvironmentClass::Production);
        assert_eq!(EnvironmentClass::of("PROD"), EnvironmentClass::Production);
        assert_eq!(EnvironmentClass::of("Live"), EnvironmentClass::Production);
        assert_eq!(EnvironmentClass::of("staging"), EnvironmentClass::Staging);
        assert_eq!(EnvironmentClass::of("Stage"), EnvironmentClass::Staging);
        assert_eq!(EnvironmentClass::of("development"), EnvironmentClass::Other);
        assert_eq!(EnvironmentClass::of("demo"), EnvironmentClass::Other);
    }
}
