//! Typed settings tree.
//!
//! The merged YAML tree is converted once into these types. Every layered
//! category is split into its shared `all` value and its per-app values, so
//! an app literally named `all` can never shadow the shared layer.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;

use crate::error::{ConfigError, Result};

use super::parser::ALL_KEY;

/// App name → environment name → platform app identifier.
pub type AppMap = IndexMap<String, IndexMap<String, String>>;

/// A category split into its global layer and its per-app layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Layered<A, P> {
    /// Value under the reserved `all` key.
    pub all: Option<A>,
    /// Values keyed by app name.
    pub per_app: IndexMap<String, P>,
}

impl<A, P> Default for Layered<A, P> {
    fn default() -> Self {
        Self {
            all: None,
            per_app: IndexMap::new(),
        }
    }
}

/// An app-level entry of a mapping category (`config`, `scale`).
///
/// Nested mappings are overrides for the environment named by the key;
/// everything else applies to every environment of the app.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigEntry<V> {
    /// Environment-scoped mapping.
    EnvironmentOverride(IndexMap<String, V>),
    /// App-wide value.
    Scalar(V),
}

/// App-level value of the `stacks` category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StackEntry {
    /// Stack per environment.
    PerEnvironment(IndexMap<String, String>),
    /// One stack for every environment of the app.
    Flat(String),
}

/// App-level value of a list category (`domains`, `collaborators`, `addons`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ListEntry {
    /// List per environment.
    PerEnvironment(IndexMap<String, Vec<String>>),
    /// One list for every environment of the app.
    Flat(Vec<String>),
}

/// A scalar config value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// No value (`FOO:` or `FOO: ~`); set as an empty string.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Desired formation for one process type: a count, or `[count, size]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScaleSpec {
    /// Process count only.
    Quantity(u32),
    /// Process count and dyno size.
    Sized(u32, String),
}

impl ScaleSpec {
    /// Desired process count.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        match self {
            Self::Quantity(q) | Self::Sized(q, _) => *q,
        }
    }

    /// Desired dyno size, if any.
    #[must_use]
    pub fn size(&self) -> Option<&str> {
        match self {
            Self::Quantity(_) => None,
            Self::Sized(_, size) => Some(size),
        }
    }
}

impl fmt::Display for ScaleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Sized(q, size) => write!(f, "{q}:{size}"),
        }
    }
}

/// A mapping category.
pub type MapCategory<V> = Layered<IndexMap<String, V>, IndexMap<String, ConfigEntry<V>>>;

/// A list category.
pub type ListCategory = Layered<Vec<String>, ListEntry>;

/// The fully merged, typed settings tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// Universe of targets.
    pub apps: AppMap,
    /// Runtime stack per target.
    pub stacks: Layered<String, StackEntry>,
    /// Config vars per target.
    pub config: MapCategory<Scalar>,
    /// Process formation per target.
    pub scale: MapCategory<ScaleSpec>,
    /// Custom domains per target.
    pub domains: ListCategory,
    /// Collaborator emails per target.
    pub collaborators: ListCategory,
    /// Add-ons (`name[:slug]`) per target.
    pub addons: ListCategory,
}

impl Settings {
    /// Converts a merged YAML tree into typed settings.
    ///
    /// Missing categories are empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a category holds a value of the wrong shape.
    pub fn from_tree(tree: &Value) -> Result<Self> {
        Ok(Self {
            apps: category_apps(tree)?,
            stacks: layered(tree, "stacks")?,
            config: layered(tree, "config")?,
            scale: layered(tree, "scale")?,
            domains: layered(tree, "domains")?,
            collaborators: layered(tree, "collaborators")?,
            addons: layered(tree, "addons")?,
        })
    }
}

fn category_apps(tree: &Value) -> Result<AppMap> {
    match tree.get("apps") {
        None | Some(Value::Null) => Ok(AppMap::new()),
        Some(value) => {
            let apps: IndexMap<String, Option<IndexMap<String, String>>> =
                serde_yaml::from_value(value.clone())
                    .map_err(|e| ConfigError::shape("apps", "*", e.to_string()))?;
            Ok(apps
                .into_iter()
                .map(|(app, envs)| (app, envs.unwrap_or_default()))
                .collect())
        }
    }
}

fn layered<A, P>(tree: &Value, category: &str) -> Result<Layered<A, P>>
where
    A: DeserializeOwned,
    P: DeserializeOwned,
{
    let mut layered = Layered::default();

    let map = match tree.get(category) {
        None | Some(Value::Null) => return Ok(layered),
        Some(Value::Mapping(map)) => map,
        Some(_) => {
            return Err(ConfigError::shape(category, "*", "expected a mapping of apps").into());
        }
    };

    for (key, value) in map {
        let Some(key) = key.as_str() else {
            return Err(ConfigError::shape(category, format!("{key:?}"), "keys must be strings").into());
        };
        if value.is_null() {
            continue;
        }
        if key == ALL_KEY {
            layered.all = Some(convert(category, key, value)?);
        } else {
            layered
                .per_app
                .insert(key.to_string(), convert(category, key, value)?);
        }
    }

    Ok(layered)
}

fn convert<T: DeserializeOwned>(category: &str, key: &str, value: &Value) -> Result<T> {
    serde_yaml::from_value(value.clone())
        .map_err(|e| ConfigError::shape(category, key, e.to_string()).into())
}
