//! Consistency checks for the merged settings tree.
//!
//! Settings that reference apps or environments missing from `apps` are
//! harmless (their values are never used) and only produce warnings. An app
//! without environments or with an empty platform identifier is an error.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ConfigError, FleetError, Result};

use super::settings::{ConfigEntry, Layered, ListEntry, Settings, StackEntry};

/// Validator for the settings tree.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing everything found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a settings tree.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, settings: &Settings) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_apps(settings, &mut result);

        let stack_envs = |entry: &StackEntry| -> Vec<String> {
            match entry {
                StackEntry::PerEnvironment(envs) => envs.keys().cloned().collect(),
                StackEntry::Flat(_) => Vec::new(),
            }
        };
        Self::check_references(settings, "stacks", &settings.stacks, stack_envs, &mut result);
        Self::check_references(settings, "config", &settings.config, map_envs, &mut result);
        Self::check_references(settings, "scale", &settings.scale, map_envs, &mut result);
        Self::check_references(settings, "domains", &settings.domains, list_envs, &mut result);
        Self::check_references(
            settings,
            "collaborators",
            &settings.collaborators,
            list_envs,
            &mut result,
        );
        Self::check_references(settings, "addons", &settings.addons, list_envs, &mut result);

        if settings
            .domains
            .per_app
            .values()
            .any(|entry| matches!(entry, ListEntry::Flat(_)))
        {
            result.warnings.push(String::from(
                "domains: app-wide domain lists are ignored, list domains per environment",
            ));
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(FleetError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        }
    }

    fn validate_apps(settings: &Settings, result: &mut ValidationResult) {
        if settings.apps.is_empty() {
            result
                .warnings
                .push(String::from("apps: no apps are configured"));
        }

        for (app, envs) in &settings.apps {
            if envs.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("apps.{app}"),
                    message: format!("App '{app}' declares no environments"),
                });
            }
            for (env, platform_app) in envs {
                if platform_app.trim().is_empty() {
                    result.errors.push(ValidationError {
                        field: format!("apps.{app}.{env}"),
                        message: format!("Target '{app}:{env}' has an empty platform app name"),
                    });
                }
            }
        }
    }

    fn check_references<A, P>(
        settings: &Settings,
        category: &str,
        layered: &Layered<A, P>,
        environments_of: impl Fn(&P) -> Vec<String>,
        result: &mut ValidationResult,
    ) {
        for (app, entry) in &layered.per_app {
            let Some(envs) = settings.apps.get(app) else {
                result
                    .warnings
                    .push(format!("{category}.{app}: app '{app}' is not configured"));
                continue;
            };
            for env in environments_of(entry) {
                if !envs.contains_key(&env) {
                    result.warnings.push(format!(
                        "{category}.{app}.{env}: app '{app}' has no environment '{env}'"
                    ));
                }
            }
        }
    }
}

fn map_envs<V>(entries: &IndexMap<String, ConfigEntry<V>>) -> Vec<String> {
    entries
        .iter()
        .filter(|(_, entry)| matches!(entry, ConfigEntry::EnvironmentOverride(_)))
        .map(|(env, _)| env.clone())
        .collect()
}

fn list_envs(entry: &ListEntry) -> Vec<String> {
    match entry {
        ListEntry::PerEnvironment(envs) => envs.keys().cloned().collect(),
        ListEntry::Flat(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(s: &str) -> Settings {
        Settings::from_tree(&serde_yaml::from_str(s).unwrap()).unwrap()
    }

    #[test]
    fn test_valid_settings() {
        let settings = settings(
            "apps: {awesomeapp: {staging: awesomeapp-staging}}\n\
             config: {awesomeapp: {staging: {A: '1'}}}",
        );
        let result = ConfigValidator::new().validate(&settings).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unknown_references_are_warnings() {
        let settings = settings(
            "apps: {awesomeapp: {staging: awesomeapp-staging}}\n\
             domains: {ghostapp: {staging: [g.example.com]}}\n\
             collaborators: {awesomeapp: {qa: [qa@example.com]}}",
        );
        let result = ConfigValidator::new().validate(&settings).unwrap();

        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].contains("ghostapp"));
        assert!(result.warnings[1].contains("qa"));
    }

    #[test]
    fn test_empty_platform_name_is_error() {
        let settings = settings("apps: {awesomeapp: {staging: ''}}");
        let result = ConfigValidator::new().validate(&settings);
        assert!(matches!(
            result,
            Err(FleetError::Config(ConfigError::ValidationError { .. }))
        ));
    }
}
