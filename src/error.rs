//! Error types for the appfleet reconciliation system.
//!
//! This module provides the error hierarchy for every stage of a run:
//! loading declarative sources, resolving targets, talking to the hosting
//! platform, and executing mutation commands.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for appfleet.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Configuration loading errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Target identifier errors.
    #[error("Invalid target: {0}")]
    Target(#[from] TargetError),

    /// Remote platform errors.
    #[error("Platform error: {0}")]
    Remote(#[from] RemoteError),

    /// Shell command errors.
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Target selection errors.
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while loading declarative sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source file does not exist.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A source could not be parsed as structured data.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Template expansion failed before parsing.
    #[error("Failed to expand template in {location}: {message}")]
    TemplateError {
        /// Description of the template error.
        message: String,
        /// Source the template came from.
        location: String,
    },

    /// A category has a value of the wrong shape.
    #[error("Invalid value for '{category}.{key}': {message}")]
    InvalidShape {
        /// Settings category (config, scale, ...).
        category: String,
        /// Key inside the category.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Errors raised while resolving an `app:env` target identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    /// The identifier is not exactly `app:env`.
    #[error("'{input}' is not of the form <app>:<environment>")]
    Malformed {
        /// The rejected identifier.
        input: String,
    },

    /// The app is not declared under `apps`.
    #[error("App '{app}' is not configured")]
    UnknownApp {
        /// The unknown app name.
        app: String,
    },

    /// The app exists but has no such environment.
    #[error("App '{app}' has no environment '{environment}'")]
    UnknownEnvironment {
        /// The app name.
        app: String,
        /// The unknown environment name.
        environment: String,
    },
}

/// Errors returned by the hosting platform API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Authentication failed.
    #[error("Platform authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Platform API request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// App not found on the platform.
    #[error("App not found on platform: {app}")]
    NotFound {
        /// The platform app identifier.
        app: String,
    },

    /// Network error.
    #[error("Network error communicating with platform: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from platform API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Errors raised by the shell collaborator.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command ran and reported failure.
    #[error("*** command \"{command}\" failed ({status})")]
    Failed {
        /// Rendered command line.
        command: String,
        /// Exit status description.
        status: String,
    },

    /// The command could not be started.
    #[error("Failed to start \"{command}\": {message}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Description of the spawn failure.
        message: String,
    },
}

/// Errors raised while choosing which targets to run against.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// The settings tree defines no apps at all.
    #[error("No apps are configured. Add an `apps` section or an app file under config/appfleet/")]
    NoAppsConfigured,

    /// Nothing was selected and the choice is ambiguous.
    #[error("No target selected. Pass -t <app>:<environment>, --env <name> or --all")]
    NoTargetSelected,
}

/// Result type alias for appfleet operations.
pub type Result<T> = std::result::Result<T, FleetError>;

impl FleetError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error must abort the whole run.
    ///
    /// Remote errors are scoped to one target and category; everything
    /// else means the run can no longer be trusted to continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Remote(_))
    }
}

impl ConfigError {
    /// Creates a parse error for a given source.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Creates an invalid-shape error for a category key.
    #[must_use]
    pub fn shape(
        category: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidShape {
            category: category.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl RemoteError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_errors_are_not_fatal() {
        let err = FleetError::from(RemoteError::network("connection reset"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_command_and_config_errors_are_fatal() {
        let err = FleetError::from(CommandError::Failed {
            command: String::from("heroku domains:add a.com --app a"),
            status: String::from("exit status: 1"),
        });
        assert!(err.is_fatal());

        let err = FleetError::from(ConfigError::MissingEnvVar {
            name: String::from("HEROKU_API_KEY"),
        });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_command_failure_message_names_command() {
        let err = CommandError::Failed {
            command: String::from("heroku access:add a@b.c --app x"),
            status: String::from("exit status: 2"),
        };
        assert!(err.to_string().contains("heroku access:add a@b.c --app x"));
    }
}
