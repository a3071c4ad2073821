//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ConfigResolver, DesiredState, TargetId, ValidationResult};
use crate::planner::StagedReport;
use crate::reconciler::ReconciliationResult;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Target row for table display.
#[derive(Tabled, serde::Serialize)]
struct TargetRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Git remote")]
    git_url: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the selected targets with their platform apps.
    #[must_use]
    pub fn format_targets(&self, resolver: &ConfigResolver, targets: &[TargetId]) -> String {
        let rows: Vec<TargetRow> = targets
            .iter()
            .map(|target| {
                let app = resolver.platform_app(target).unwrap_or_default().to_string();
                TargetRow {
                    target: target.to_string(),
                    git_url: git_url(&app),
                    app,
                }
            })
            .collect();

        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&rows).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats resolved desired state.
    #[must_use]
    pub fn format_desired(&self, states: &[DesiredState]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(states).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                for state in states {
                    Self::format_desired_text(&mut output, state);
                }
                output
            }
        }
    }

    fn format_desired_text(output: &mut String, state: &DesiredState) {
        let _ = writeln!(
            output,
            "\n{} ({})",
            state.target.bold(),
            state.app.as_deref().unwrap_or("-")
        );
        let _ = writeln!(output, "   Stack: {}", state.stack.as_deref().unwrap_or("-"));

        if !state.config.is_empty() {
            output.push_str("   Config:\n");
            for (key, value) in &state.config {
                let _ = writeln!(output, "     {key}={value}");
            }
        }
        if !state.scale.is_empty() {
            output.push_str("   Scale:\n");
            for (process, spec) in &state.scale {
                let _ = writeln!(output, "     {process}={spec}");
            }
        }
        for (label, items) in [
            ("Domains", &state.domains),
            ("Collaborators", &state.collaborators),
            ("Add-ons", &state.addons),
        ] {
            if !items.is_empty() {
                let _ = writeln!(output, "   {label}: {}", items.join(", "));
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid\n", "✓".green());
                if !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a reconciliation result, including staged commands.
    #[must_use]
    pub fn format_reconciliation(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                for report in &result.staged {
                    Self::format_staged_text(&mut output, report);
                }

                let status = if result.success() {
                    format!("{} Reconciliation successful", "✓".green())
                } else {
                    format!("{} Reconciliation failed", "✗".red())
                };
                let _ = writeln!(output, "\n{status}\n");
                let _ = writeln!(output, "   Targets: {}", result.targets);
                let _ = writeln!(output, "   Applied: {}", result.applied.len());

                if !result.failures.is_empty() {
                    let _ = write!(output, "\n{} Failures:\n", "⚠".yellow());
                    for failure in &result.failures {
                        let _ = writeln!(
                            output,
                            "   - {} {}: {}",
                            failure.target, failure.category, failure.error
                        );
                    }
                }

                if let Some(reason) = &result.aborted {
                    let _ = writeln!(output, "\n{} Aborted: {reason}", "✗".red());
                }

                output
            }
        }
    }

    fn format_staged_text(output: &mut String, report: &StagedReport) {
        let _ = writeln!(output, "\n{} ({})", report.target.bold(), report.app);

        if !report.upgrades.is_empty() {
            output.push_str("   Upgrades applied:\n");
            for command in &report.upgrades {
                let _ = writeln!(output, "     {}", command.yellow());
            }
        }

        if !report.removals.is_empty() {
            let _ = writeln!(
                output,
                "   {} Not run, these may cause data loss. Run them yourself if intended:",
                "⚠".red()
            );
            for command in &report.removals {
                let _ = writeln!(output, "     {}", command.red());
            }
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }
}

/// Git remote of a platform app.
#[must_use]
pub fn git_url(app: &str) -> String {
    format!("https://git.heroku.com/{app}.git")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::planner::Category;
    use crate::reconciler::{CategoryFailure, Phase};

    fn resolver() -> ConfigResolver {
        let tree = serde_yaml::from_str(
            "apps: {awesomeapp: {staging: awesomeapp-staging}}\nconfig: {all: {A: '1'}}",
        )
        .unwrap();
        ConfigResolver::from_settings(Settings::from_tree(&tree).unwrap())
    }

    #[test]
    fn test_targets_table_has_git_remote() {
        colored::control::set_override(false);
        let resolver = resolver();
        let targets = [TargetId::new("awesomeapp", "staging")];
        let output = OutputFormatter::new(OutputFormat::Text).format_targets(&resolver, &targets);

        assert!(output.contains("awesomeapp:staging"));
        assert!(output.contains("https://git.heroku.com/awesomeapp-staging.git"));
    }

    #[test]
    fn test_desired_state_json() {
        let resolver = resolver();
        let state = resolver.desired_state(&TargetId::new("awesomeapp", "staging"));
        let output = OutputFormatter::new(OutputFormat::Json).format_desired(&[state]);

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["config"]["A"], "1");
        assert_eq!(value[0]["app"], "awesomeapp-staging");
    }

    #[test]
    fn test_reconciliation_text_lists_staged_removals() {
        colored::control::set_override(false);
        let result = ReconciliationResult {
            targets: 1,
            staged: vec![StagedReport {
                target: String::from("awesomeapp:staging"),
                app: String::from("awesomeapp-staging"),
                upgrades: vec![],
                removals: vec![String::from(
                    "heroku addons:destroy papertrail --confirm awesomeapp-staging --app awesomeapp-staging",
                )],
            }],
            failures: vec![CategoryFailure {
                target: String::from("awesomeapp:staging"),
                category: Category::Domains,
                phase: Phase::DesiredFetched,
                error: String::from("Platform error: boom"),
            }],
            ..ReconciliationResult::default()
        };
        let output = OutputFormatter::new(OutputFormat::Text).format_reconciliation(&result);

        assert!(output.contains("may cause data loss"));
        assert!(output.contains("heroku addons:destroy papertrail --confirm awesomeapp-staging --app awesomeapp-staging"));
        assert!(output.contains("Reconciliation failed"));
        assert!(output.contains("awesomeapp:staging domains: Platform error: boom"));
    }
}
