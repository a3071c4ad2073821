//! Reconciler for converging platform apps on their desired state.
//!
//! For every selected target and every requested category the reconciler
//! fetches desired state from the [`ConfigResolver`], observed state from the
//! [`PlatformClient`], builds a [`CategoryPlan`] and hands it to the
//! [`PlanExecutor`]. Remote failures are isolated to their target and
//! category; fatal errors stop the run after the current target's staged
//! commands have been reported.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigResolver, TargetId};
use crate::error::{FleetError, Result, SelectionError};
use crate::planner::{
    with_default_database, Category, CategoryPlan, ExecutionOutcome, PlanExecutor,
    StagedCommands, StagedReport,
};
use crate::platform::{Account, CommandRunner, PlatformClient, Release};

/// Config vars that default to the target's environment name.
const ENVIRONMENT_VARS: [&str; 2] = ["RACK_ENV", "RAILS_ENV"];

/// Progress of one category for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing fetched yet.
    Idle,
    /// Desired state resolved.
    DesiredFetched,
    /// Observed state fetched from the platform.
    ObservedFetched,
    /// Plan computed.
    Diffed,
    /// Plan executed.
    CommandsEmitted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::DesiredFetched => "desired fetched",
            Self::ObservedFetched => "observed fetched",
            Self::Diffed => "diffed",
            Self::CommandsEmitted => "commands emitted",
        };
        f.write_str(s)
    }
}

/// A category that failed for one target.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryFailure {
    /// `app:env` identifier.
    pub target: String,
    /// Failed category.
    pub category: Category,
    /// Last phase reached.
    pub phase: Phase,
    /// Error message.
    pub error: String,
}

/// Result of a reconciliation run.
#[derive(Debug, Default, Serialize)]
pub struct ReconciliationResult {
    /// Number of targets processed.
    pub targets: usize,
    /// Actions applied, in order.
    pub applied: Vec<String>,
    /// Per-target upgrade and removal reports.
    pub staged: Vec<StagedReport>,
    /// Categories that failed without aborting the run.
    pub failures: Vec<CategoryFailure>,
    /// Error that stopped the run, if any.
    pub aborted: Option<String>,
}

impl ReconciliationResult {
    /// Returns true if every category completed without failures.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failures.is_empty() && self.aborted.is_none()
    }
}

/// Reconciler for app fleets.
pub struct Reconciler<'a, P: PlatformClient, R: CommandRunner> {
    /// Desired state.
    resolver: &'a ConfigResolver,
    /// Observed state and API mutations.
    platform: &'a P,
    /// CLI mutations.
    runner: &'a R,
    /// Authenticated account, fetched on first use.
    session: OnceCell<Account>,
    /// Platform app names, fetched on first use.
    platform_apps: OnceCell<IndexSet<String>>,
}

impl<'a, P: PlatformClient, R: CommandRunner> Reconciler<'a, P, R> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(resolver: &'a ConfigResolver, platform: &'a P, runner: &'a R) -> Self {
        Self {
            resolver,
            platform,
            runner,
            session: OnceCell::new(),
            platform_apps: OnceCell::new(),
        }
    }

    /// Reconciles `categories` for every target, one at a time.
    ///
    /// # Errors
    ///
    /// Returns an error only if a target has no platform app; fatal errors
    /// during execution are reported in [`ReconciliationResult::aborted`].
    pub async fn reconcile(
        &self,
        targets: &[TargetId],
        categories: &[Category],
    ) -> Result<ReconciliationResult> {
        let mut result = ReconciliationResult::default();

        for target in targets {
            let Some(app) = self.resolver.platform_app(target) else {
                return Err(FleetError::internal(format!(
                    "target {target} has no platform app"
                )));
            };
            info!("Reconciling {target} ({app})");
            result.targets += 1;

            let mut staged = StagedCommands::new(target.clone(), app);
            let fatal = self
                .reconcile_target(target, app, categories, &mut staged, &mut result)
                .await;

            let report = staged.into_report();
            if !report.is_empty() {
                result.staged.push(report);
            }

            if let Some(e) = fatal {
                error!(target = %target, "Run aborted: {e}");
                result.aborted = Some(e.to_string());
                break;
            }
        }

        Ok(result)
    }

    /// Runs every category for one target. Returns the fatal error, if any.
    async fn reconcile_target(
        &self,
        target: &TargetId,
        app: &str,
        categories: &[Category],
        staged: &mut StagedCommands,
        result: &mut ReconciliationResult,
    ) -> Option<FleetError> {
        for &category in categories {
            let mut phase = Phase::Idle;
            match self
                .reconcile_category(target, app, category, staged, &mut phase)
                .await
            {
                Ok(outcome) => {
                    result.applied.extend(outcome.applied);
                    for failure in outcome.failures {
                        result.failures.push(CategoryFailure {
                            target: target.to_string(),
                            category,
                            phase,
                            error: format!("{}: {}", failure.action, failure.error),
                        });
                    }
                }
                Err(e) if !e.is_fatal() => {
                    warn!(target = %target, category = %category, phase = %phase, "Skipping: {e}");
                    result.failures.push(CategoryFailure {
                        target: target.to_string(),
                        category,
                        phase,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Some(e),
            }
        }
        None
    }

    async fn reconcile_category(
        &self,
        target: &TargetId,
        app: &str,
        category: Category,
        staged: &mut StagedCommands,
        phase: &mut Phase,
    ) -> Result<ExecutionOutcome> {
        debug!(target = %target, category = %category, "Reconciling category");

        let plan = self.plan(target, app, category, phase).await?;
        *phase = Phase::Diffed;

        let outcome = PlanExecutor::new(self.platform, self.runner)
            .execute(&plan, staged)
            .await?;
        *phase = Phase::CommandsEmitted;

        Ok(outcome)
    }

    /// Fetches desired and observed state and diffs them.
    async fn plan(
        &self,
        target: &TargetId,
        app: &str,
        category: Category,
        phase: &mut Phase,
    ) -> Result<CategoryPlan> {
        let resolver = self.resolver;
        let plan = match category {
            Category::Apps => {
                let stack = resolver.stack(target);
                *phase = Phase::DesiredFetched;
                let exists = self.platform_apps().await?.contains(app);
                *phase = Phase::ObservedFetched;
                CategoryPlan::create_app(app, exists, stack)
            }
            Category::Stacks => {
                let stack = resolver.stack(target);
                *phase = Phase::DesiredFetched;
                let info = self.platform.app_info(app).await?;
                *phase = Phase::ObservedFetched;
                CategoryPlan::stack(app, stack, info.stack_name())
            }
            Category::Collaborators => {
                let desired = resolver.collaborators(target);
                *phase = Phase::DesiredFetched;
                let user = self.current_user().await?;
                let info = self.platform.app_info(app).await?;
                let observed: Vec<String> = self
                    .platform
                    .list_collaborators(app)
                    .await?
                    .into_iter()
                    .map(|c| c.user.email)
                    .collect();
                *phase = Phase::ObservedFetched;

                let mut implicit = vec![user.email.clone()];
                implicit.extend(info.owner_email().map(str::to_string));
                CategoryPlan::collaborators(app, &desired, &observed, &implicit)
            }
            Category::Config => {
                let desired = Self::desired_config(resolver, target);
                *phase = Phase::DesiredFetched;
                let observed = self.platform.config_vars(app).await?;
                let deployed = self
                    .platform
                    .latest_release(app)
                    .await?
                    .as_ref()
                    .is_some_and(Release::is_deployed);
                *phase = Phase::ObservedFetched;
                CategoryPlan::config(app, &desired, &observed, deployed)
            }
            Category::Addons => {
                let desired = with_default_database(resolver.addons(target));
                *phase = Phase::DesiredFetched;
                let observed: Vec<String> = self
                    .platform
                    .installed_addons(app)
                    .await?
                    .into_iter()
                    .map(|addon| addon.plan.name)
                    .collect();
                *phase = Phase::ObservedFetched;
                CategoryPlan::addons(app, &desired, &observed)
            }
            Category::Domains => {
                let desired = resolver.domains(target);
                *phase = Phase::DesiredFetched;
                let observed: Vec<String> = self
                    .platform
                    .list_domains(app)
                    .await?
                    .into_iter()
                    .filter(|domain| !domain.is_platform_managed())
                    .map(|domain| domain.hostname)
                    .collect();
                *phase = Phase::ObservedFetched;
                CategoryPlan::domains(app, &desired, &observed)
            }
            Category::Scale => {
                let desired = resolver.scale(target);
                // Formation is applied unconditionally, nothing to observe.
                *phase = Phase::ObservedFetched;
                CategoryPlan::scale(app, &desired)
            }
        };
        Ok(plan)
    }

    /// Resolved config vars with environment-name defaults.
    fn desired_config(resolver: &ConfigResolver, target: &TargetId) -> IndexMap<String, String> {
        let mut desired = resolver.config(target);
        for var in ENVIRONMENT_VARS {
            desired
                .entry(var.to_string())
                .or_insert_with(|| target.environment.clone());
        }
        desired
    }

    async fn current_user(&self) -> Result<&Account> {
        self.session
            .get_or_try_init(|| async {
                let user = self.platform.current_user().await?;
                debug!("Authenticated as {}", user.email);
                Ok::<_, FleetError>(user)
            })
            .await
    }

    async fn platform_apps(&self) -> Result<&IndexSet<String>> {
        self.platform_apps
            .get_or_try_init(|| async {
                let apps = self.platform.list_apps().await?;
                Ok::<_, FleetError>(apps.into_iter().map(|app| app.name).collect())
            })
            .await
    }
}

/// Chooses which targets a run applies to.
#[derive(Debug, Clone, Default)]
pub struct TargetSelector {
    /// Explicit `app:env` identifiers.
    pub explicit: Vec<String>,
    /// Every app in this environment.
    pub environment: Option<String>,
    /// Every target.
    pub all: bool,
    /// Keep production targets when selecting with `all` or by default.
    pub include_production: bool,
}

impl TargetSelector {
    /// Resolves the selection against the configured apps.
    ///
    /// Explicit targets win, then the environment filter, then `all`. With
    /// nothing selected and exactly one app configured, that app's
    /// non-production targets are used.
    ///
    /// # Errors
    ///
    /// Returns an error if no apps are configured, an explicit target is
    /// invalid, or the selection is empty.
    pub fn select(&self, resolver: &ConfigResolver) -> Result<Vec<TargetId>> {
        let apps: Vec<&str> = resolver.app_names().collect();
        if apps.is_empty() {
            return Err(SelectionError::NoAppsConfigured.into());
        }

        let targets: Vec<TargetId> = if !self.explicit.is_empty() {
            let unique: IndexSet<TargetId> = self
                .explicit
                .iter()
                .map(|target| resolver.resolve_target(target))
                .collect::<Result<_>>()?;
            unique.into_iter().collect()
        } else if let Some(env) = self.environment.as_deref() {
            resolver.app_environments(Some(env))
        } else if self.all {
            self.keep(resolver.app_environments(None))
        } else if let [only] = apps.as_slice() {
            debug!("Only one app configured, defaulting to {only}");
            self.keep(
                resolver
                    .app_environments(None)
                    .into_iter()
                    .filter(|target| target.app == *only)
                    .collect(),
            )
        } else {
            Vec::new()
        };

        if targets.is_empty() {
            return Err(SelectionError::NoTargetSelected.into());
        }
        Ok(targets)
    }

    fn keep(&self, targets: Vec<TargetId>) -> Vec<TargetId> {
        if self.include_production {
            targets
        } else {
            targets
                .into_iter()
                .filter(|target| !target.is_production())
                .collect()
        }
    }
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success() { "successful" } else { "failed" };
        writeln!(f, "Reconciliation {status}:")?;
        writeln!(f, "  Targets: {}", self.targets)?;
        writeln!(f, "  Applied: {}", self.applied.len())?;
        writeln!(
            f,
            "  Staged removals: {}",
            self.staged.iter().map(|r| r.removals.len()).sum::<usize>()
        )?;

        if !self.failures.is_empty() {
            writeln!(f, "  Failures:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "    - {} {} ({}): {}",
                    failure.target, failure.category, failure.phase, failure.error
                )?;
            }
        }

        if let Some(reason) = &self.aborted {
            writeln!(f, "  Aborted: {reason}")?;
        }

        Ok(())
    }
}
