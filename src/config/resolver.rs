//! Layered configuration resolution.
//!
//! [`ConfigResolver`] owns the merged settings tree and answers desired-state
//! queries for one target. Precedence, lowest to highest, is
//! `all` → app-wide → app+environment. Mapping categories are overridden key
//! by key; list categories are unioned.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TargetError};

use super::parser::ConfigParser;
use super::settings::{ConfigEntry, ListCategory, ListEntry, MapCategory, ScaleSpec, Settings, StackEntry};
use super::source::ConfigSource;
use super::target::TargetId;

/// Resolves desired state per target from the merged settings tree.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    settings: Settings,
}

impl ConfigResolver {
    /// Loads and merges `sources` into a resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is missing, a template or YAML document
    /// is malformed, or a category has the wrong shape.
    pub fn load(parser: &ConfigParser, sources: &[ConfigSource]) -> Result<Self> {
        let tree = parser.load_tree(sources)?;
        let settings = Settings::from_tree(&tree)?;
        debug!("Loaded settings for {} apps", settings.apps.len());
        Ok(Self::from_settings(settings))
    }

    /// Wraps an already typed settings tree.
    #[must_use]
    pub const fn from_settings(settings: Settings) -> Self {
        Self { settings }
    }

    /// The underlying settings tree.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Names of all configured apps.
    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.settings.apps.keys().map(String::as_str)
    }

    /// Splits and checks an `app:env` identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is malformed or names an app or
    /// environment that is not declared under `apps`.
    pub fn resolve_target(&self, target: &str) -> Result<TargetId> {
        let target: TargetId = target.parse()?;
        let Some(envs) = self.settings.apps.get(&target.app) else {
            return Err(TargetError::UnknownApp { app: target.app }.into());
        };
        if !envs.contains_key(&target.environment) {
            return Err(TargetError::UnknownEnvironment {
                app: target.app,
                environment: target.environment,
            }
            .into());
        }
        Ok(target)
    }

    /// Platform app identifier for a target.
    #[must_use]
    pub fn platform_app(&self, target: &TargetId) -> Option<&str> {
        self.settings
            .apps
            .get(&target.app)
            .and_then(|envs| envs.get(&target.environment))
            .map(String::as_str)
    }

    /// All targets in declaration order, optionally limited to one
    /// environment name.
    #[must_use]
    pub fn app_environments(&self, env_filter: Option<&str>) -> Vec<TargetId> {
        self.settings
            .apps
            .iter()
            .flat_map(|(app, envs)| envs.keys().map(move |env| TargetId::new(app, env)))
            .filter(|target| env_filter.is_none_or(|env| env.is_empty() || target.environment == env))
            .collect()
    }

    /// Distinct environment names across all apps.
    #[must_use]
    pub fn all_environment_names(&self) -> IndexSet<String> {
        self.settings
            .apps
            .values()
            .flat_map(|envs| envs.keys().cloned())
            .collect()
    }

    /// Runtime stack: app+env, else app-wide, else `all`.
    #[must_use]
    pub fn stack(&self, target: &TargetId) -> Option<&str> {
        let stacks = &self.settings.stacks;
        let per_app = stacks.per_app.get(&target.app).and_then(|entry| match entry {
            StackEntry::PerEnvironment(envs) => envs.get(&target.environment),
            StackEntry::Flat(stack) => Some(stack),
        });
        per_app.or(stacks.all.as_ref()).map(String::as_str)
    }

    /// Config vars after layering, rendered as strings.
    #[must_use]
    pub fn config(&self, target: &TargetId) -> IndexMap<String, String> {
        layer_map(&self.settings.config, target)
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect()
    }

    /// Process formation after layering.
    #[must_use]
    pub fn scale(&self, target: &TargetId) -> IndexMap<String, ScaleSpec> {
        layer_map(&self.settings.scale, target)
    }

    /// Custom domains for exactly this app+environment.
    #[must_use]
    pub fn domains(&self, target: &TargetId) -> Vec<String> {
        match self.settings.domains.per_app.get(&target.app) {
            Some(ListEntry::PerEnvironment(envs)) => {
                envs.get(&target.environment).cloned().unwrap_or_default()
            }
            Some(ListEntry::Flat(_)) | None => Vec::new(),
        }
    }

    /// Collaborators: union of `all`, app-wide and app+env entries.
    #[must_use]
    pub fn collaborators(&self, target: &TargetId) -> Vec<String> {
        union_list(&self.settings.collaborators, target)
    }

    /// Add-ons (`name[:slug]`): union of `all`, app-wide and app+env entries.
    #[must_use]
    pub fn addons(&self, target: &TargetId) -> Vec<String> {
        union_list(&self.settings.addons, target)
    }

    /// Every category resolved for one target.
    #[must_use]
    pub fn desired_state(&self, target: &TargetId) -> DesiredState {
        DesiredState {
            target: target.to_string(),
            app: self.platform_app(target).map(str::to_string),
            stack: self.stack(target).map(str::to_string),
            config: self.config(target),
            scale: self.scale(target),
            domains: self.domains(target),
            collaborators: self.collaborators(target),
            addons: self.addons(target),
        }
    }
}

/// Resolved desired state of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredState {
    /// `app:env` identifier.
    pub target: String,
    /// Platform app name.
    pub app: Option<String>,
    /// Runtime stack.
    pub stack: Option<String>,
    /// Config vars.
    pub config: IndexMap<String, String>,
    /// Process formation.
    pub scale: IndexMap<String, ScaleSpec>,
    /// Custom domains.
    pub domains: Vec<String>,
    /// Collaborator emails.
    pub collaborators: Vec<String>,
    /// Add-ons.
    pub addons: Vec<String>,
}

/// Shallow key-wise layering of a mapping category.
///
/// Environment-scoped entries are excluded from the app-wide layer.
fn layer_map<V: Clone>(category: &MapCategory<V>, target: &TargetId) -> IndexMap<String, V> {
    let mut merged = category.all.clone().unwrap_or_default();

    if let Some(app) = category.per_app.get(&target.app) {
        for (key, entry) in app {
            if let ConfigEntry::Scalar(value) = entry {
                merged.insert(key.clone(), value.clone());
            }
        }
        if let Some(ConfigEntry::EnvironmentOverride(env)) = app.get(&target.environment) {
            for (key, value) in env {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    merged
}

/// Ordered, deduplicated union of a list category's layers.
fn union_list(category: &ListCategory, target: &TargetId) -> Vec<String> {
    let mut merged: IndexSet<String> = category.all.iter().flatten().cloned().collect();

    match category.per_app.get(&target.app) {
        Some(ListEntry::Flat(items)) => merged.extend(items.iter().cloned()),
        Some(ListEntry::PerEnvironment(envs)) => {
            if let Some(items) = envs.get(&target.environment) {
                merged.extend(items.iter().cloned());
            }
        }
        None => {}
    }

    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FleetError;

    const FIXTURE: &str = r"
apps:
  awesomeapp:
    staging: awesomeapp-staging
    production: awesomeapp-production
  mediocreapp:
    development: mediocreapp-development
stacks:
  all: bamboo-mri-1.9.2
  awesomeapp:
    staging: bamboo-ree-1.8.7
config:
  all:
    BUNDLE_WITHOUT: 'test:development'
    CONFIG_VAR1: config1-default
    SHARED: from-all
  awesomeapp:
    SHARED: from-app
    CONFIG_VAR1: config1-app
    staging:
      STAGING_CONFIG: special-staging
      CONFIG_VAR1: config1-staging
scale:
  all:
    web: 1
    worker: 0
  awesomeapp:
    staging:
      web: 2
      worker: 1
    production:
      web: 3
      worker: [2, standard-2x]
domains:
  awesomeapp:
    staging: [staging.awesomeapp.com]
    production: [awesomeapp.com, www.awesomeapp.com]
collaborators:
  all: [all-user1@somedomain.com, all-user2@somedomain.com]
  awesomeapp:
    staging: [staging-user@somedomain.com, all-user1@somedomain.com]
    production: [production-user@somedomain.com]
  mediocreapp:
    development: [mediocre-user@example.com]
addons:
  all: ['scheduler:standard', 'newrelic:bronze']
  awesomeapp:
    production: ['ssl:piggyback']
";

    fn resolver() -> ConfigResolver {
        let tree = serde_yaml::from_str(FIXTURE).unwrap();
        ConfigResolver::from_settings(Settings::from_tree(&tree).unwrap())
    }

    fn target(s: &str) -> TargetId {
        s.parse().unwrap()
    }

    #[test]
    fn test_app_environments() {
        let resolver = resolver();
        let all: Vec<String> = resolver
            .app_environments(None)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            all,
            [
                "awesomeapp:staging",
                "awesomeapp:production",
                "mediocreapp:development"
            ]
        );

        let staging = resolver.app_environments(Some("staging"));
        assert_eq!(staging, [target("awesomeapp:staging")]);
    }

    #[test]
    fn test_all_environment_names() {
        let names: Vec<String> = resolver().all_environment_names().into_iter().collect();
        assert_eq!(names, ["staging", "production", "development"]);
    }

    #[test]
    fn test_resolve_target() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve_target("awesomeapp:staging").unwrap(),
            target("awesomeapp:staging")
        );
        assert_eq!(
            resolver.platform_app(&target("awesomeapp:production")),
            Some("awesomeapp-production")
        );
    }

    #[test]
    fn test_resolve_target_errors() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve_target("awesomeapp"),
            Err(FleetError::Target(TargetError::Malformed { .. }))
        ));
        assert!(matches!(
            resolver.resolve_target("unknown:staging"),
            Err(FleetError::Target(TargetError::UnknownApp { .. }))
        ));
        assert!(matches!(
            resolver.resolve_target("awesomeapp:qa"),
            Err(FleetError::Target(TargetError::UnknownEnvironment { .. }))
        ));
    }

    #[test]
    fn test_stack_precedence() {
        let resolver = resolver();
        assert_eq!(resolver.stack(&target("awesomeapp:staging")), Some("bamboo-ree-1.8.7"));
        assert_eq!(resolver.stack(&target("awesomeapp:production")), Some("bamboo-mri-1.9.2"));
        assert_eq!(resolver.stack(&target("mediocreapp:development")), Some("bamboo-mri-1.9.2"));
    }

    #[test]
    fn test_stack_app_wide_value() {
        let tree = serde_yaml::from_str(
            "apps: {a: {staging: a-s, production: a-p}}\nstacks: {all: S1, a: S3}",
        )
        .unwrap();
        let resolver = ConfigResolver::from_settings(Settings::from_tree(&tree).unwrap());
        assert_eq!(resolver.stack(&target("a:staging")), Some("S3"));
    }

    #[test]
    fn test_stack_missing_is_none() {
        let resolver = ConfigResolver::default();
        assert_eq!(resolver.stack(&target("a:staging")), None);
    }

    #[test]
    fn test_stack_scenario() {
        let tree = serde_yaml::from_str(
            "apps: {awesomeapp: {staging: awesomeapp-staging, production: awesomeapp-production}}\n\
             stacks: {all: S1, awesomeapp: {staging: S2}}",
        )
        .unwrap();
        let resolver = ConfigResolver::from_settings(Settings::from_tree(&tree).unwrap());
        assert_eq!(resolver.stack(&target("awesomeapp:staging")), Some("S2"));
        assert_eq!(resolver.stack(&target("awesomeapp:production")), Some("S1"));
    }

    #[test]
    fn test_config_layering() {
        let config = resolver().config(&target("awesomeapp:staging"));

        assert_eq!(config["STAGING_CONFIG"], "special-staging");
        assert_eq!(config["BUNDLE_WITHOUT"], "test:development");
        // staging beats app-wide beats all
        assert_eq!(config["CONFIG_VAR1"], "config1-staging");
        assert_eq!(config["SHARED"], "from-app");
        assert!(!config.contains_key("staging"));
    }

    #[test]
    fn test_config_other_environment_gets_app_wide_layer() {
        let config = resolver().config(&target("awesomeapp:production"));
        assert_eq!(config["CONFIG_VAR1"], "config1-app");
        assert!(!config.contains_key("STAGING_CONFIG"));
    }

    #[test]
    fn test_scale_layering() {
        let resolver = resolver();

        let scale = resolver.scale(&target("mediocreapp:development"));
        assert_eq!(scale["web"], ScaleSpec::Quantity(1));
        assert_eq!(scale["worker"], ScaleSpec::Quantity(0));

        let scale = resolver.scale(&target("awesomeapp:staging"));
        assert_eq!(scale["web"], ScaleSpec::Quantity(2));
        assert_eq!(scale["worker"], ScaleSpec::Quantity(1));

        let scale = resolver.scale(&target("awesomeapp:production"));
        assert_eq!(scale["web"], ScaleSpec::Quantity(3));
        assert_eq!(scale["worker"], ScaleSpec::Sized(2, String::from("standard-2x")));
    }

    #[test]
    fn test_domains_are_environment_specific() {
        let resolver = resolver();

        let staging = resolver.domains(&target("awesomeapp:staging"));
        assert_eq!(staging, ["staging.awesomeapp.com"]);
        assert!(!staging.contains(&String::from("awesomeapp.com")));

        let production = resolver.domains(&target("awesomeapp:production"));
        assert_eq!(production, ["awesomeapp.com", "www.awesomeapp.com"]);

        assert!(resolver.domains(&target("mediocreapp:development")).is_empty());
    }

    #[test]
    fn test_collaborators_union() {
        let resolver = resolver();

        let staging = resolver.collaborators(&target("awesomeapp:staging"));
        assert_eq!(
            staging,
            [
                "all-user1@somedomain.com",
                "all-user2@somedomain.com",
                "staging-user@somedomain.com"
            ]
        );
        assert!(!staging.contains(&String::from("production-user@somedomain.com")));

        let development = resolver.collaborators(&target("mediocreapp:development"));
        assert_eq!(development.len(), 3);
        assert!(development.contains(&String::from("mediocre-user@example.com")));
        assert!(!development.contains(&String::from("staging-user@somedomain.com")));
    }

    #[test]
    fn test_union_keeps_every_layer() {
        let resolver = resolver();
        let target = target("awesomeapp:production");
        let addons = resolver.addons(&target);

        for addon in ["scheduler:standard", "newrelic:bronze", "ssl:piggyback"] {
            assert!(addons.contains(&String::from(addon)));
        }

        let staging = resolver.addons(&TargetId::new("awesomeapp", "staging"));
        assert!(!staging.contains(&String::from("ssl:piggyback")));
    }

    #[test]
    fn test_app_named_all_does_not_shadow_global_layer() {
        let tree = serde_yaml::from_str(
            "apps: {all: {staging: all-staging}}\ncollaborators: {all: [a@example.com]}",
        )
        .unwrap();
        let resolver = ConfigResolver::from_settings(Settings::from_tree(&tree).unwrap());
        let target = resolver.resolve_target("all:staging").unwrap();

        assert_eq!(resolver.collaborators(&target), ["a@example.com"]);
        assert!(resolver.settings().collaborators.per_app.is_empty());
    }

    #[test]
    fn test_missing_categories_are_empty() {
        let tree = serde_yaml::from_str("apps: {a: {staging: a-staging}}").unwrap();
        let resolver = ConfigResolver::from_settings(Settings::from_tree(&tree).unwrap());
        let target = target("a:staging");

        assert!(resolver.config(&target).is_empty());
        assert!(resolver.scale(&target).is_empty());
        assert!(resolver.domains(&target).is_empty());
        assert!(resolver.collaborators(&target).is_empty());
        assert!(resolver.addons(&target).is_empty());
    }

    #[test]
    fn test_desired_state_snapshot() {
        let resolver = resolver();
        let state = resolver.desired_state(&target("awesomeapp:production"));

        assert_eq!(state.app.as_deref(), Some("awesomeapp-production"));
        assert_eq!(state.stack.as_deref(), Some("bamboo-mri-1.9.2"));
        assert_eq!(state.domains, ["awesomeapp.com", "www.awesomeapp.com"]);
        assert_eq!(state.scale["worker"], ScaleSpec::Sized(2, String::from("standard-2x")));
        assert!(state.addons.contains(&String::from("ssl:piggyback")));
    }

    #[test]
    fn test_unset_template_variable_loads_as_empty_value() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("global.yml"),
            "apps:\n  awesomeapp:\n    staging: awesomeapp-staging\n\
             config:\n  SECRET: {{env.APPFLEET_TEST_NEVER_SET}}\n  EMPTY: ~\n  KEPT: value\n",
        )
        .unwrap();

        let parser = ConfigParser::new().with_base_path(temp.path());
        let resolver = ConfigResolver::load(&parser, &[ConfigSource::global("global.yml")]).unwrap();
        let config = resolver.config(&target("awesomeapp:staging"));

        assert_eq!(config["SECRET"], "");
        assert_eq!(config["EMPTY"], "");
        assert_eq!(config["KEPT"], "value");
    }
}
