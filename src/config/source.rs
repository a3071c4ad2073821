//! Declarative source descriptors and discovery.
//!
//! A run reads one default/global file plus any number of per-app files:
//!
//! ```text
//! config/appfleet.yml            # global settings, namespaced under `all`
//! config/appfleet/<app>.yml      # per-app settings, namespaced under <app>
//! ```

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, FleetError, Result};

/// Default/global settings file, relative to the root.
pub const DEFAULT_CONFIG_FILE: &str = "config/appfleet.yml";

/// Directory holding per-app settings files, relative to the root.
pub const APP_CONFIG_DIR: &str = "config/appfleet";

/// How a source's top-level keys are namespaced before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Global defaults: every category lands under `all`.
    Global,
    /// Settings for a single app: every category lands under the app name.
    App {
        /// App the file belongs to.
        name: String,
    },
    /// A tree that is already keyed by `all`/app and is merged verbatim.
    Tree,
}

/// One declarative source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    /// Path to the YAML (template) file.
    pub path: PathBuf,
    /// Namespacing applied to the file.
    pub kind: SourceKind,
}

impl ConfigSource {
    /// Global source at `path`.
    #[must_use]
    pub fn global(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: SourceKind::Global,
        }
    }

    /// Per-app source at `path`; the app name is the file stem.
    #[must_use]
    pub fn app(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            kind: SourceKind::App { name },
        }
    }

    /// Pre-keyed source at `path`.
    #[must_use]
    pub fn tree(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: SourceKind::Tree,
        }
    }

    /// Merge rank: per-app files first, then trees, the global file last.
    const fn rank(&self) -> u8 {
        match self.kind {
            SourceKind::App { .. } => 0,
            SourceKind::Tree => 1,
            SourceKind::Global => 2,
        }
    }
}

/// Orders sources for merging: per-app files first, global last.
///
/// The sort is stable, so sources of the same kind keep their order.
pub fn merge_order(sources: &mut [ConfigSource]) {
    sources.sort_by_key(ConfigSource::rank);
}

/// Discovers the standard sources under `root`.
///
/// Per-app files are returned sorted by file name, followed by the
/// global file.
///
/// # Errors
///
/// Returns an error if the global file is missing or the app directory
/// cannot be read.
pub fn discover_sources(root: impl AsRef<Path>) -> Result<Vec<ConfigSource>> {
    let root = root.as_ref();
    let default_path = root.join(DEFAULT_CONFIG_FILE);

    if !default_path.exists() {
        return Err(FleetError::Config(ConfigError::FileNotFound {
            path: default_path,
        }));
    }

    let mut app_files = Vec::new();
    let app_dir = root.join(APP_CONFIG_DIR);
    if app_dir.is_dir() {
        for entry in std::fs::read_dir(&app_dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if path.is_file() && is_yaml {
                app_files.push(path);
            }
        }
    } else {
        debug!("No per-app directory at: {}", app_dir.display());
    }
    app_files.sort();

    let mut sources: Vec<ConfigSource> = app_files.into_iter().map(ConfigSource::app).collect();
    sources.push(ConfigSource::global(default_path));

    info!("Discovered {} configuration sources", sources.len());
    Ok(sources)
}
