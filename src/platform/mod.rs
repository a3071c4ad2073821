//! Hosted platform integration module.
//!
//! This module provides the observed-state side of reconciliation: the API
//! client used for reads and scaling, and the shell runner used for the
//! CLI-driven mutations.

mod client;
mod shell;
mod types;

pub use client::{HerokuClient, PlatformClient, API_URL_VAR, DEFAULT_API_URL};
pub use shell::{CommandRunner, ShellCommand, ShellRunner, PLATFORM_CLI};
#[cfg(test)]
pub use shell::MockCommandRunner;
pub use types::{
    Account, AppInfo, Collaborator, CreateAppOptions, Domain, Formation, FormationUpdate,
    InstalledAddon, NamedRef, Release, SlugRef,
};
