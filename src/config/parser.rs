//! Configuration parser for loading declarative sources.
//!
//! Each source is expanded as a handlebars template, parsed as YAML and
//! namespaced according to its [`SourceKind`] before the trees are merged.

use handlebars::Handlebars;
use serde_json::json;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, FleetError, Result};

use super::merge::merge_all;
use super::source::{merge_order, ConfigSource, SourceKind};

/// Reserved key holding settings shared by every app.
pub const ALL_KEY: &str = "all";

/// Category that defines the universe of targets.
const APPS_KEY: &str = "apps";

/// Alias for `apps` accepted in per-app files.
const ENV_KEY: &str = "env";

/// Environment variable holding the platform API token.
pub const API_KEY_VAR: &str = "HEROKU_API_KEY";

/// Configuration parser for loading declarative sources.
#[derive(Debug)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
    /// Template engine used before YAML parsing.
    templates: Handlebars<'static>,
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub fn new() -> Self {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        Self {
            base_path: None,
            templates,
        }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads and merges all sources into one settings tree.
    ///
    /// Per-app sources are merged first and the global source last, so
    /// global values override on scalar collisions.
    ///
    /// # Errors
    ///
    /// Returns an error if any source is missing or fails to parse.
    pub fn load_tree(&self, sources: &[ConfigSource]) -> Result<Value> {
        let mut ordered = sources.to_vec();
        merge_order(&mut ordered);

        let trees = ordered
            .iter()
            .map(|source| self.load_source(source))
            .collect::<Result<Vec<_>>>()?;

        Ok(merge_all(trees))
    }

    /// Loads one source and applies its namespacing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, expanded or parsed.
    pub fn load_source(&self, source: &ConfigSource) -> Result<Value> {
        let path = self.resolve(&source.path);
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(FleetError::Config(ConfigError::FileNotFound { path }));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            FleetError::Config(ConfigError::parse(
                format!("Failed to read file: {e}"),
                path.display().to_string(),
            ))
        })?;

        let app = match &source.kind {
            SourceKind::App { name } => Some(name.as_str()),
            SourceKind::Global | SourceKind::Tree => None,
        };
        let expanded = self.expand(&content, app, &path)?;
        let tree = Self::parse_yaml(&expanded, Some(&path))?;

        Ok(namespace(tree, &source.kind))
    }

    /// Expands template expressions in a source.
    ///
    /// Templates see `env` (the process environment) and, for per-app
    /// files, `app`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is malformed.
    pub fn expand(&self, content: &str, app: Option<&str>, source: &Path) -> Result<String> {
        let env: serde_json::Map<String, serde_json::Value> = std::env::vars()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        let context = json!({ "env": env, "app": app });

        self.templates
            .render_template(content, &context)
            .map_err(|e| {
                FleetError::Config(ConfigError::TemplateError {
                    message: e.to_string(),
                    location: source.display().to_string(),
                })
            })
    }

    /// Parses a YAML document. An empty document is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(content: &str, source: Option<&Path>) -> Result<Value> {
        debug!("Parsing YAML configuration");

        let value: Value = serde_yaml::from_str(content).map_err(|e| {
            FleetError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        match value {
            Value::Null => Ok(Value::Mapping(Mapping::new())),
            Value::Mapping(_) => Ok(value),
            _ => Err(FleetError::Config(ConfigError::ParseError {
                message: String::from("top level of a configuration file must be a mapping"),
                location: source.map(|p| p.display().to_string()),
            })),
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.resolve(Path::new(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                FleetError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the platform API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not set.
    pub fn get_api_key() -> Result<String> {
        std::env::var(API_KEY_VAR).map_err(|_| {
            FleetError::Config(ConfigError::MissingEnvVar {
                name: String::from(API_KEY_VAR),
            })
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Applies source-specific namespacing to a parsed tree.
fn namespace(tree: Value, kind: &SourceKind) -> Value {
    let Value::Mapping(map) = tree else {
        return tree;
    };

    let namespaced: Mapping = match kind {
        SourceKind::Tree => map,
        SourceKind::Global => map
            .into_iter()
            .map(|(key, value)| {
                if key.as_str() == Some(APPS_KEY) {
                    (key, value)
                } else {
                    (key, wrap(ALL_KEY, value))
                }
            })
            .collect(),
        SourceKind::App { name } => map
            .into_iter()
            .map(|(key, value)| {
                let key = if key.as_str() == Some(ENV_KEY) {
                    Value::String(String::from(APPS_KEY))
                } else {
                    key
                };
                (key, wrap(name, value))
            })
            .collect(),
    };

    Value::Mapping(namespaced)
}

fn wrap(key: &str, value: Value) -> Value {
    let mut map = Mapping::new();
    map.insert(Value::String(key.to_string()), value);
    Value::Mapping(map)
}
