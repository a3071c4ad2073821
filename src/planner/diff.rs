//! Diff algorithms for comparing desired vs observed state.
//!
//! Everything here is pure: no platform access, no side effects. The plan
//! builders in [`super::plan`] turn these results into actions.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;

/// Difference between a desired and an observed set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetDiff {
    /// Desired but not observed, in desired order.
    pub to_add: Vec<String>,
    /// Observed but not desired, in observed order.
    pub to_remove: Vec<String>,
}

impl SetDiff {
    /// Returns true if both sides already agree.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes `desired − observed` and `observed − desired`.
#[must_use]
pub fn diff_set(desired: &[String], observed: &[String]) -> SetDiff {
    let desired_set: IndexSet<&str> = desired.iter().map(String::as_str).collect();
    let observed_set: IndexSet<&str> = observed.iter().map(String::as_str).collect();

    SetDiff {
        to_add: desired_set
            .difference(&observed_set)
            .map(|s| (*s).to_string())
            .collect(),
        to_remove: observed_set
            .difference(&desired_set)
            .map(|s| (*s).to_string())
            .collect(),
    }
}

/// An add-on reference: `name` or `name:slug`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AddonSpec {
    /// Add-on service name.
    pub name: String,
    /// Plan slug, if pinned.
    pub slug: Option<String>,
}

impl AddonSpec {
    /// Parses `name[:slug]`. An empty slug counts as unpinned.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        match input.split_once(':') {
            Some((name, slug)) if !slug.is_empty() => Self {
                name: name.to_string(),
                slug: Some(slug.to_string()),
            },
            Some((name, _)) => Self {
                name: name.to_string(),
                slug: None,
            },
            None => Self {
                name: input.to_string(),
                slug: None,
            },
        }
    }

    /// `name` or `name:slug`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AddonSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slug {
            Some(slug) => write!(f, "{}:{slug}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A plan change for an add-on present on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddonUpgrade {
    /// Add-on service name.
    pub name: String,
    /// Observed plan slug.
    pub from: Option<String>,
    /// Desired plan slug.
    pub to: String,
}

/// Difference between desired and observed add-ons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddonDiff {
    /// Same name, different slug.
    pub upgrades: Vec<AddonUpgrade>,
    /// Desired names not installed.
    pub to_add: Vec<AddonSpec>,
    /// Installed names not desired.
    pub to_remove: Vec<AddonSpec>,
}

/// Diffs add-ons by name, turning slug mismatches into upgrades.
///
/// When a name is listed more than once on the desired side the later
/// entry wins. A desired entry without a slug matches any installed plan.
#[must_use]
pub fn diff_addons(desired: &[String], observed: &[String]) -> AddonDiff {
    let desired = by_name(desired);
    let observed = by_name(observed);
    let mut diff = AddonDiff::default();

    for (name, slug) in &desired {
        match observed.get(name) {
            None => diff.to_add.push(AddonSpec {
                name: name.clone(),
                slug: slug.clone(),
            }),
            Some(current) => {
                if let Some(wanted) = slug {
                    if current.as_ref() != Some(wanted) {
                        diff.upgrades.push(AddonUpgrade {
                            name: name.clone(),
                            from: current.clone(),
                            to: wanted.clone(),
                        });
                    }
                }
            }
        }
    }

    for (name, slug) in &observed {
        if !desired.contains_key(name) {
            diff.to_remove.push(AddonSpec {
                name: name.clone(),
                slug: slug.clone(),
            });
        }
    }

    diff
}

fn by_name(addons: &[String]) -> IndexMap<String, Option<String>> {
    addons
        .iter()
        .map(|addon| {
            let spec = AddonSpec::parse(addon);
            (spec.name, spec.slug)
        })
        .collect()
}

/// Config vars that must be set: desired entries whose observed value is
/// missing or different. Keys only present on the observed side are never
/// reported.
#[must_use]
pub fn diff_config(
    desired: &IndexMap<String, String>,
    observed: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    desired
        .iter()
        .filter(|(key, value)| observed.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
