//! CLI module for the appfleet tool.
//!
//! This module provides the command-line interface for inspecting and
//! reconciling app fleets.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::{git_url, OutputFormatter};
