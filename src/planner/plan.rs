//! Plan types and construction.
//!
//! A [`CategoryPlan`] holds the actions for one target and one category in
//! execution order: upgrades, then removals (staged only), then additions.
//! [`StagedCommands`] accumulates what an operator has to review for one
//! target and turns into a [`StagedReport`] when the target is done.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use crate::config::{ScaleSpec, TargetId};
use crate::platform::ShellCommand;

use super::diff::{diff_addons, diff_config, diff_set, AddonSpec};

/// Installed when no desired add-on looks like a database.
pub const DEFAULT_DATABASE_ADDON: &str = "heroku-postgresql";

#[allow(clippy::expect_used)]
static DATABASE_ADDON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(postgres|shared-database|mysql|cleardb|jawsdb|mongo)")
        .expect("static pattern")
});

/// A resource category handled by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Platform app existence.
    Apps,
    /// Runtime stack.
    Stacks,
    /// Collaborators.
    Collaborators,
    /// Config vars.
    Config,
    /// Add-ons.
    Addons,
    /// Custom domains.
    Domains,
    /// Process formation.
    Scale,
}

impl Category {
    /// Categories `setup` runs when none are named.
    pub const SETUP_ORDER: [Self; 6] = [
        Self::Apps,
        Self::Stacks,
        Self::Collaborators,
        Self::Config,
        Self::Addons,
        Self::Domains,
    ];

    /// Category name as used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::Stacks => "stacks",
            Self::Collaborators => "collaborators",
            Self::Config => "config",
            Self::Addons => "addons",
            Self::Domains => "domains",
            Self::Scale => "scale",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation against a platform app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create the platform app.
    CreateApp {
        /// Platform app name.
        app: String,
        /// Stack to create it on.
        stack: Option<String>,
    },
    /// Move the app to another stack.
    MigrateStack {
        /// Platform app name.
        app: String,
        /// Target stack.
        stack: String,
    },
    /// Grant access to a collaborator.
    AddCollaborator {
        /// Platform app name.
        app: String,
        /// Collaborator email.
        email: String,
    },
    /// Revoke a collaborator's access.
    RemoveCollaborator {
        /// Platform app name.
        app: String,
        /// Collaborator email.
        email: String,
    },
    /// Set config vars.
    SetConfig {
        /// Platform app name.
        app: String,
        /// Vars to set.
        vars: IndexMap<String, String>,
    },
    /// Clear the application cache after a config change.
    ClearCache {
        /// Platform app name.
        app: String,
    },
    /// Provision an add-on.
    AddAddon {
        /// Platform app name.
        app: String,
        /// Add-on to create.
        addon: AddonSpec,
    },
    /// Change an add-on's plan.
    UpgradeAddon {
        /// Platform app name.
        app: String,
        /// Add-on service name.
        name: String,
        /// Current slug.
        from: Option<String>,
        /// Desired slug.
        to: String,
    },
    /// Destroy an add-on.
    RemoveAddon {
        /// Platform app name.
        app: String,
        /// Add-on to destroy.
        addon: AddonSpec,
    },
    /// Attach a custom domain.
    AddDomain {
        /// Platform app name.
        app: String,
        /// Hostname.
        hostname: String,
    },
    /// Detach a custom domain.
    RemoveDomain {
        /// Platform app name.
        app: String,
        /// Hostname.
        hostname: String,
    },
    /// Scale one process type.
    Scale {
        /// Platform app name.
        app: String,
        /// Process type.
        process: String,
        /// Desired formation.
        spec: ScaleSpec,
    },
}

impl Action {
    /// Returns true for actions that may lose data when applied.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::RemoveCollaborator { .. } | Self::RemoveAddon { .. } | Self::RemoveDomain { .. }
        )
    }

    /// The platform CLI command for this action, or `None` for actions
    /// applied through the API.
    #[must_use]
    pub fn shell_command(&self) -> Option<ShellCommand> {
        let command = match self {
            Self::CreateApp { .. } | Self::Scale { .. } => return None,
            Self::MigrateStack { app, stack } => {
                ShellCommand::platform(["stack:set", stack.as_str()], app)
            }
            Self::AddCollaborator { app, email } => {
                ShellCommand::platform(["access:add", email.as_str()], app)
            }
            Self::RemoveCollaborator { app, email } => {
                ShellCommand::platform(["access:remove", email.as_str()], app)
            }
            Self::SetConfig { app, vars } => {
                let mut args = vec![String::from("config:set")];
                args.extend(vars.iter().map(|(k, v)| format!("{k}={v}")));
                ShellCommand::platform(args, app)
            }
            Self::ClearCache { app } => ShellCommand::platform(
                ["run", "rails", "runner", "Rails.cache.clear"],
                app,
            ),
            Self::AddAddon { app, addon } => {
                ShellCommand::platform([String::from("addons:create"), addon.full_name()], app)
            }
            Self::UpgradeAddon { app, name, to, .. } => ShellCommand::platform(
                [String::from("addons:upgrade"), name.clone(), format!("{name}:{to}")],
                app,
            ),
            Self::RemoveAddon { app, addon } => ShellCommand::platform(
                ["addons:destroy", addon.name.as_str(), "--confirm", app.as_str()],
                app,
            ),
            Self::AddDomain { app, hostname } => {
                ShellCommand::platform(["domains:add", hostname.as_str()], app)
            }
            Self::RemoveDomain { app, hostname } => {
                ShellCommand::platform(["domains:remove", hostname.as_str()], app)
            }
        };
        Some(command)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(command) = self.shell_command() {
            write!(f, "{command}")?;
            if let Self::UpgradeAddon {
                name,
                from: Some(from),
                ..
            } = self
            {
                write!(f, " (was {name}:{from})")?;
            }
            return Ok(());
        }
        match self {
            Self::CreateApp { app, stack } => {
                write!(f, "create app {app}")?;
                if let Some(stack) = stack {
                    write!(f, " on {stack}")?;
                }
                Ok(())
            }
            Self::Scale { app, process, spec } => write!(f, "scale {app} {process}={spec}"),
            _ => Ok(()),
        }
    }
}

/// Ordered actions for one target and one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryPlan {
    /// Category this plan belongs to.
    pub category: Category,
    /// Executed first.
    pub upgrades: Vec<Action>,
    /// Never executed, only staged for the report.
    pub removals: Vec<Action>,
    /// Executed after the upgrades.
    pub additions: Vec<Action>,
}

impl CategoryPlan {
    /// An empty plan.
    #[must_use]
    pub const fn empty(category: Category) -> Self {
        Self {
            category,
            upgrades: Vec::new(),
            removals: Vec::new(),
            additions: Vec::new(),
        }
    }

    /// Returns true if nothing needs to happen.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.upgrades.is_empty() && self.removals.is_empty() && self.additions.is_empty()
    }

    /// Number of actions in the plan.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.upgrades.len() + self.removals.len() + self.additions.len()
    }

    /// Creates the app unless it already exists.
    #[must_use]
    pub fn create_app(app: &str, exists: bool, stack: Option<&str>) -> Self {
        let mut plan = Self::empty(Category::Apps);
        if !exists {
            plan.additions.push(Action::CreateApp {
                app: app.to_string(),
                stack: stack.map(str::to_string),
            });
        }
        plan
    }

    /// Migrates the stack when a desired stack is set and differs.
    #[must_use]
    pub fn stack(app: &str, desired: Option<&str>, observed: Option<&str>) -> Self {
        let mut plan = Self::empty(Category::Stacks);
        if let Some(stack) = desired.filter(|s| !s.is_empty()) {
            if observed != Some(stack) {
                plan.additions.push(Action::MigrateStack {
                    app: app.to_string(),
                    stack: stack.to_string(),
                });
            }
        }
        plan
    }

    /// Syncs collaborators. Every `implicit` email is desired and can
    /// never be removed.
    #[must_use]
    pub fn collaborators(
        app: &str,
        desired: &[String],
        observed: &[String],
        implicit: &[String],
    ) -> Self {
        let mut desired = desired.to_vec();
        for email in implicit {
            if !desired.contains(email) {
                desired.push(email.clone());
            }
        }

        let diff = diff_set(&desired, observed);
        let mut plan = Self::empty(Category::Collaborators);
        plan.removals = diff
            .to_remove
            .into_iter()
            .map(|email| Action::RemoveCollaborator {
                app: app.to_string(),
                email,
            })
            .collect();
        plan.additions = diff
            .to_add
            .into_iter()
            .map(|email| Action::AddCollaborator {
                app: app.to_string(),
                email,
            })
            .collect();
        plan
    }

    /// Sets missing or changed config vars. The cache is cleared afterwards
    /// when code has been deployed to the app.
    #[must_use]
    pub fn config(
        app: &str,
        desired: &IndexMap<String, String>,
        observed: &IndexMap<String, String>,
        deployed: bool,
    ) -> Self {
        let mut plan = Self::empty(Category::Config);
        let vars = diff_config(desired, observed);
        if vars.is_empty() {
            return plan;
        }
        plan.additions.push(Action::SetConfig {
            app: app.to_string(),
            vars,
        });
        if deployed {
            plan.additions.push(Action::ClearCache {
                app: app.to_string(),
            });
        }
        plan
    }

    /// Syncs add-ons, upgrading plans in place.
    #[must_use]
    pub fn addons(app: &str, desired: &[String], observed: &[String]) -> Self {
        let diff = diff_addons(desired, observed);
        let mut plan = Self::empty(Category::Addons);
        plan.upgrades = diff
            .upgrades
            .into_iter()
            .map(|upgrade| Action::UpgradeAddon {
                app: app.to_string(),
                name: upgrade.name,
                from: upgrade.from,
                to: upgrade.to,
            })
            .collect();
        plan.removals = diff
            .to_remove
            .into_iter()
            .map(|addon| Action::RemoveAddon {
                app: app.to_string(),
                addon,
            })
            .collect();
        plan.additions = diff
            .to_add
            .into_iter()
            .map(|addon| Action::AddAddon {
                app: app.to_string(),
                addon,
            })
            .collect();
        plan
    }

    /// Syncs custom domains.
    #[must_use]
    pub fn domains(app: &str, desired: &[String], observed: &[String]) -> Self {
        let diff = diff_set(desired, observed);
        let mut plan = Self::empty(Category::Domains);
        plan.removals = diff
            .to_remove
            .into_iter()
            .map(|hostname| Action::RemoveDomain {
                app: app.to_string(),
                hostname,
            })
            .collect();
        plan.additions = diff
            .to_add
            .into_iter()
            .map(|hostname| Action::AddDomain {
                app: app.to_string(),
                hostname,
            })
            .collect();
        plan
    }

    /// Applies every desired formation, whatever is running now.
    #[must_use]
    pub fn scale(app: &str, desired: &IndexMap<String, ScaleSpec>) -> Self {
        let mut plan = Self::empty(Category::Scale);
        plan.additions = desired
            .iter()
            .map(|(process, spec)| Action::Scale {
                app: app.to_string(),
                process: process.clone(),
                spec: spec.clone(),
            })
            .collect();
        plan
    }
}

/// Adds the default database add-on unless a database is already desired.
#[must_use]
pub fn with_default_database(mut desired: Vec<String>) -> Vec<String> {
    let has_database = desired
        .iter()
        .any(|addon| DATABASE_ADDON.is_match(&AddonSpec::parse(addon).name));
    if !has_database {
        desired.push(String::from(DEFAULT_DATABASE_ADDON));
    }
    desired
}

/// Upgrades applied and removals withheld for one target.
#[derive(Debug)]
pub struct StagedCommands {
    target: TargetId,
    app: String,
    upgrades: Vec<Action>,
    removals: Vec<Action>,
}

impl StagedCommands {
    /// Starts an empty accumulator for one target.
    #[must_use]
    pub fn new(target: TargetId, app: impl Into<String>) -> Self {
        Self {
            target,
            app: app.into(),
            upgrades: Vec::new(),
            removals: Vec::new(),
        }
    }

    /// Records an upgrade that was applied.
    pub fn record_upgrade(&mut self, action: Action) {
        self.upgrades.push(action);
    }

    /// Stages a removal for the report.
    pub fn stage_removal(&mut self, action: Action) {
        self.removals.push(action);
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.upgrades.is_empty() && self.removals.is_empty()
    }

    /// Consumes the accumulator into its printable report.
    #[must_use]
    pub fn into_report(self) -> StagedReport {
        StagedReport {
            target: self.target.to_string(),
            app: self.app,
            upgrades: self.upgrades.iter().map(ToString::to_string).collect(),
            removals: self.removals.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Commands an operator should review for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagedReport {
    /// `app:env` identifier.
    pub target: String,
    /// Platform app name.
    pub app: String,
    /// Upgrade commands that were run.
    pub upgrades: Vec<String>,
    /// Removal commands that were not run.
    pub removals: Vec<String>,
}

impl StagedReport {
    /// Returns true if there is nothing to report.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.upgrades.is_empty() && self.removals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_collaborators_keep_implicit_users() {
        let plan = CategoryPlan::collaborators(
            "awesomeapp-staging",
            &strings(&["dev@example.com"]),
            &strings(&["me@example.com", "owner@example.com", "old@example.com"]),
            &strings(&["me@example.com", "owner@example.com"]),
        );

        assert_eq!(
            plan.removals,
            vec![Action::RemoveCollaborator {
                app: String::from("awesomeapp-staging"),
                email: String::from("old@example.com"),
            }]
        );
        assert_eq!(plan.additions.len(), 1);
        assert_eq!(
            plan.additions[0].to_string(),
            "heroku access:add dev@example.com --app awesomeapp-staging"
        );
    }

    #[test]
    fn test_config_clears_cache_only_after_deploy() {
        let desired = IndexMap::from([(String::from("A"), String::from("1"))]);
        let observed = IndexMap::new();

        let released = CategoryPlan::config("app", &desired, &observed, true);
        assert_eq!(released.additions.len(), 2);
        assert!(matches!(released.additions[1], Action::ClearCache { .. }));

        let fresh = CategoryPlan::config("app", &desired, &observed, false);
        assert_eq!(fresh.additions.len(), 1);
    }

    #[test]
    fn test_config_without_changes_is_empty() {
        let vars = IndexMap::from([(String::from("A"), String::from("1"))]);
        assert!(CategoryPlan::config("app", &vars, &vars, true).is_empty());
    }

    #[test]
    fn test_addon_plan_ordering() {
        let plan = CategoryPlan::addons(
            "app",
            &strings(&["ssl:unlimited", "scheduler:standard"]),
            &strings(&["ssl:piggyback", "papertrail:choklad"]),
        );

        assert_eq!(plan.upgrades.len(), 1);
        assert_eq!(
            plan.upgrades[0].to_string(),
            "heroku addons:upgrade ssl ssl:unlimited --app app (was ssl:piggyback)"
        );
        assert_eq!(
            plan.removals[0].to_string(),
            "heroku addons:destroy papertrail --confirm app --app app"
        );
        assert_eq!(
            plan.additions[0].to_string(),
            "heroku addons:create scheduler:standard --app app"
        );
        assert!(plan.removals[0].is_destructive());
        assert!(!plan.upgrades[0].is_destructive());
    }

    #[test]
    fn test_single_upgrade_names_both_plans() {
        let plan = CategoryPlan::addons("app", &strings(&["ssl:unlimited"]), &strings(&["ssl:piggyback"]));

        assert_eq!(plan.len(), 1);
        let line = plan.upgrades[0].to_string();
        assert!(line.contains("ssl:piggyback"));
        assert!(line.contains("ssl:unlimited"));

        let mut staged = StagedCommands::new(TargetId::new("app", "production"), "app");
        staged.record_upgrade(plan.upgrades[0].clone());
        let report = staged.into_report();
        assert!(report.upgrades[0].contains("piggyback"));
        assert!(report.upgrades[0].contains("unlimited"));
    }

    #[test]
    fn test_default_database_injection() {
        let desired = with_default_database(strings(&["scheduler:standard"]));
        assert_eq!(desired, strings(&["scheduler:standard", "heroku-postgresql"]));

        let desired = with_default_database(strings(&["heroku-postgresql:standard-0"]));
        assert_eq!(desired.len(), 1);

        let desired = with_default_database(strings(&["mongolab:sandbox"]));
        assert_eq!(desired.len(), 1);
    }

    #[test]
    fn test_stack_migration_only_on_change() {
        assert!(CategoryPlan::stack("app", Some("heroku-24"), Some("heroku-24")).is_empty());
        assert!(CategoryPlan::stack("app", None, Some("heroku-22")).is_empty());

        let plan = CategoryPlan::stack("app", Some("heroku-24"), Some("heroku-22"));
        assert_eq!(
            plan.additions[0].to_string(),
            "heroku stack:set heroku-24 --app app"
        );
    }

    #[test]
    fn test_scale_always_applies() {
        let desired = IndexMap::from([
            (String::from("web"), ScaleSpec::Quantity(2)),
            (String::from("worker"), ScaleSpec::Sized(1, String::from("standard-2x"))),
        ]);
        let plan = CategoryPlan::scale("app", &desired);

        assert_eq!(plan.additions.len(), 2);
        assert_eq!(plan.additions[1].to_string(), "scale app worker=1:standard-2x");
    }

    #[test]
    fn test_create_app_skips_existing() {
        assert!(CategoryPlan::create_app("app", true, None).is_empty());
        let plan = CategoryPlan::create_app("app", false, Some("heroku-24"));
        assert_eq!(plan.additions[0].to_string(), "create app app on heroku-24");
    }

    #[test]
    fn test_staged_report() {
        let mut staged = StagedCommands::new(TargetId::new("awesomeapp", "staging"), "awesomeapp-staging");
        assert!(staged.is_empty());
        staged.stage_removal(Action::RemoveDomain {
            app: String::from("awesomeapp-staging"),
            hostname: String::from("old.example.com"),
        });

        let report = staged.into_report();
        assert_eq!(report.target, "awesomeapp:staging");
        assert_eq!(
            report.removals,
            vec![String::from(
                "heroku domains:remove old.example.com --app awesomeapp-staging"
            )]
        );
        assert!(report.upgrades.is_empty());
    }
}
