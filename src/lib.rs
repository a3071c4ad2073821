// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # appfleet
//!
//! Declarative, layered configuration and reconciliation for fleets of
//! hosted app environments.
//!
//! ## Overview
//!
//! appfleet manages many apps, each deployed to several environments, from
//! a handful of YAML files:
//!
//! - Share settings across every app under `all`, override them per app
//!   and per environment
//! - Create missing apps and migrate runtime stacks
//! - Sync collaborators, config vars, add-ons, domains and process scaling
//! - Never run a destructive command: removals are printed for review
//!
//! ## Architecture
//!
//! 1. **Desired State**: resolved from `config/appfleet.yml` and
//!    `config/appfleet/<app>.yml`
//! 2. **Observed State**: queried from the platform API
//! 3. **Reconciler**: diffs both per target and category and applies the
//!    additive part of the plan
//!
//! ## Modules
//!
//! - [`config`]: Source loading, merging, resolution and validation
//! - [`platform`]: Platform API client and shell command runner
//! - [`planner`]: Diff computation, plans and plan execution
//! - [`reconciler`]: Target selection and the reconciliation loop
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! apps:
//!   awesomeapp:
//!     staging: awesomeapp-staging
//!     production: awesomeapp-production
//!
//! config:
//!   BUNDLE_WITHOUT: "test:development"
//!
//! addons:
//!   - scheduler:standard
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod platform;
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigResolver, ConfigValidator, Settings, TargetId};
pub use error::{FleetError, Result};
pub use planner::{Action, Category, CategoryPlan, PlanExecutor, StagedCommands, StagedReport};
pub use platform::{CommandRunner, HerokuClient, PlatformClient, ShellRunner};
pub use reconciler::{ReconciliationResult, Reconciler, TargetSelector};
