//! Plan executor for applying category plans.
//!
//! Upgrades run first, removals are staged and never run, additions run
//! last. Remote failures are recorded and the remaining actions still run;
//! fatal errors (failed commands in strict mode) stop the plan.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::platform::{CommandRunner, CreateAppOptions, PlatformClient};

use super::plan::{Action, CategoryPlan, StagedCommands};

/// Executor for category plans.
pub struct PlanExecutor<'a, P: PlatformClient, R: CommandRunner> {
    /// Platform API used for app creation and scaling.
    platform: &'a P,
    /// Runner used for every CLI-driven action.
    runner: &'a R,
}

/// An action that failed without aborting the plan.
#[derive(Debug, Clone, Serialize)]
pub struct ActionFailure {
    /// Rendered action.
    pub action: String,
    /// Error message.
    pub error: String,
}

/// Result of executing one plan.
#[derive(Debug, Default, Serialize)]
pub struct ExecutionOutcome {
    /// Actions that were applied.
    pub applied: Vec<String>,
    /// Removals handed to the staged report.
    pub staged: usize,
    /// Actions that failed.
    pub failures: Vec<ActionFailure>,
}

impl ExecutionOutcome {
    /// Returns true if no action failed.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<'a, P: PlatformClient, R: CommandRunner> PlanExecutor<'a, P, R> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(platform: &'a P, runner: &'a R) -> Self {
        Self { platform, runner }
    }

    /// Executes a plan, recording upgrades and removals in `staged`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. Remote errors are recorded in the
    /// outcome instead.
    pub async fn execute(
        &self,
        plan: &CategoryPlan,
        staged: &mut StagedCommands,
    ) -> Result<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome::default();

        if plan.is_empty() {
            debug!("Nothing to do for {}", plan.category);
            return Ok(outcome);
        }

        info!("Executing {} plan with {} actions", plan.category, plan.len());

        for action in &plan.upgrades {
            if self.apply(action, &mut outcome).await? {
                staged.record_upgrade(action.clone());
            }
        }

        for action in &plan.removals {
            debug!("Staging: {action}");
            staged.stage_removal(action.clone());
            outcome.staged += 1;
        }

        for action in &plan.additions {
            self.apply(action, &mut outcome).await?;
        }

        Ok(outcome)
    }

    /// Applies one action. Returns whether it succeeded.
    async fn apply(&self, action: &Action, outcome: &mut ExecutionOutcome) -> Result<bool> {
        match self.run(action).await {
            Ok(()) => {
                outcome.applied.push(action.to_string());
                Ok(true)
            }
            Err(e) if !e.is_fatal() => {
                warn!("Action failed: {action}: {e}");
                outcome.failures.push(ActionFailure {
                    action: action.to_string(),
                    error: e.to_string(),
                });
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&self, action: &Action) -> Result<()> {
        match action {
            Action::CreateApp { app, stack } => {
                eprintln!("{action}");
                let options = CreateAppOptions {
                    name: app.clone(),
                    stack: stack.clone(),
                };
                self.platform.create_app(&options).await?;
                Ok(())
            }
            Action::Scale { app, process, spec } => {
                eprintln!("{action}");
                self.platform
                    .scale_process(app, process, spec.quantity(), spec.size())
                    .await?;
                Ok(())
            }
            _ => match action.shell_command() {
                Some(command) => self.runner.run(&command).await,
                None => Ok(()),
            },
        }
    }
}
