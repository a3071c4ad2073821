//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::planner::Category;
use crate::reconciler::TargetSelector;

/// appfleet - Declarative configuration for fleets of hosted apps.
#[derive(Parser, Debug)]
#[command(name = "appfleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root holding `config/appfleet.yml`.
    #[arg(long, global = true, env = "APPFLEET_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Extra settings file, already keyed by `all` and app names.
    #[arg(long = "config-file", global = true)]
    pub config_files: Vec<PathBuf>,

    /// Target to act on, as `<app>:<environment>`. Repeatable.
    #[arg(short, long = "target", global = true)]
    pub targets: Vec<String>,

    /// Act on every configured target.
    #[arg(long, global = true)]
    pub all: bool,

    /// Act on every app in this environment.
    #[arg(long, global = true)]
    pub env: Option<String>,

    /// Keep production targets when selecting with `--all` or by default.
    #[arg(long, global = true)]
    pub include_production: bool,

    /// Abort on failed platform commands (`STRICT_DEPLOY=0` to downgrade).
    #[arg(
        long,
        global = true,
        env = "STRICT_DEPLOY",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub strict: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List selected targets with their platform apps and git remotes.
    Apps,

    /// Show the resolved desired state of the selected targets.
    Show,

    /// Validate the settings.
    Validate,

    /// Converge the selected targets on their desired state.
    Setup {
        /// Categories to reconcile (all except scale when omitted).
        #[arg(value_enum)]
        categories: Vec<Category>,
    },

    /// Apply the desired process formation.
    Scale,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Target selection described by the flags.
    #[must_use]
    pub fn selector(&self) -> TargetSelector {
        TargetSelector {
            explicit: self.targets.clone(),
            environment: self.env.clone(),
            all: self.all,
            include_production: self.include_production,
        }
    }
}

impl Commands {
    /// Categories a reconciling command runs, in order. Empty for commands
    /// that never touch the platform.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        match self {
            Self::Setup { categories } if categories.is_empty() => Category::SETUP_ORDER.to_vec(),
            Self::Setup { categories } => categories.clone(),
            Self::Scale => vec![Category::Scale],
            Self::Apps | Self::Show | Self::Validate => Vec::new(),
        }
    }
}
