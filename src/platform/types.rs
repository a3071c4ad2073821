//! Platform API types and data structures.
//!
//! Only the fields the reconciler reads are modelled; everything else in
//! the API payloads is ignored during deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// Platform app name.
    pub name: String,
    /// Runtime stack the app runs on.
    #[serde(default)]
    pub stack: Option<NamedRef>,
    /// Owning account.
    #[serde(default)]
    pub owner: Option<Account>,
    /// Git URL of the app.
    #[serde(default)]
    pub git_url: Option<String>,
}

impl AppInfo {
    /// Name of the app's stack, if reported.
    #[must_use]
    pub fn stack_name(&self) -> Option<&str> {
        self.stack.as_ref().map(|s| s.name.as_str())
    }

    /// Email of the app's owner, if reported.
    #[must_use]
    pub fn owner_email(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.email.as_str())
    }
}

/// A reference to a named resource (stack, plan, add-on service).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    /// Resource name.
    pub name: String,
}

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account email.
    pub email: String,
}

/// Options used when creating an app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateAppOptions {
    /// App name.
    pub name: String,
    /// Stack to create the app on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// An add-on installed on an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledAddon {
    /// Add-on resource name.
    pub name: String,
    /// Service the add-on belongs to.
    #[serde(default)]
    pub addon_service: Option<NamedRef>,
    /// Plan in `service:plan` form.
    pub plan: NamedRef,
}

impl InstalledAddon {
    /// Plan name in `service:plan` form.
    #[must_use]
    pub fn plan_name(&self) -> &str {
        &self.plan.name
    }
}

/// A domain attached to an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Hostname.
    pub hostname: String,
    /// `heroku` for platform-managed default domains, `custom` otherwise.
    #[serde(default)]
    pub kind: String,
}

impl Domain {
    /// Returns true for domains the platform manages itself.
    #[must_use]
    pub fn is_platform_managed(&self) -> bool {
        self.kind == "heroku"
    }
}

/// A collaborator on an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    /// The collaborating account.
    pub user: Account,
    /// Role on the app, if reported.
    #[serde(default)]
    pub role: Option<String>,
}

/// A release of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release version number.
    pub version: u64,
    /// When the release was created.
    pub created_at: DateTime<Utc>,
    /// Slug running in this release. Config-only releases of an app that
    /// was never pushed have none.
    #[serde(default)]
    pub slug: Option<SlugRef>,
}

impl Release {
    /// Returns true if code has been deployed in this release.
    #[must_use]
    pub const fn is_deployed(&self) -> bool {
        self.slug.is_some()
    }
}

/// A reference to a compiled slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugRef {
    /// Slug id.
    pub id: String,
}

/// One process type of an app's formation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
    /// Process type (web, worker, ...).
    #[serde(rename = "type")]
    pub process_type: String,
    /// Number of processes.
    pub quantity: u32,
    /// Dyno size.
    #[serde(default)]
    pub size: Option<String>,
}

/// Body of a formation update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormationUpdate<'a> {
    /// Desired number of processes.
    pub quantity: u32,
    /// Desired dyno size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_info_ignores_unknown_fields() {
        let app: AppInfo = serde_json::from_str(
            r#"{"name":"awesomeapp-staging","stack":{"id":"x","name":"heroku-24"},
                "owner":{"email":"owner@example.com","id":"y"},"region":{"name":"us"}}"#,
        )
        .unwrap();

        assert_eq!(app.stack_name(), Some("heroku-24"));
        assert_eq!(app.owner_email(), Some("owner@example.com"));
    }

    #[test]
    fn test_formation_type_rename() {
        let formation: Formation =
            serde_json::from_str(r#"{"type":"web","quantity":2,"size":"standard-1X"}"#).unwrap();
        assert_eq!(formation.process_type, "web");
        assert_eq!(formation.quantity, 2);
    }

    #[test]
    fn test_formation_update_omits_missing_size() {
        let body = serde_json::to_string(&FormationUpdate {
            quantity: 1,
            size: None,
        })
        .unwrap();
        assert_eq!(body, r#"{"quantity":1}"#);
    }

    #[test]
    fn test_release_without_slug_is_not_deployed() {
        let fresh: Release = serde_json::from_str(
            r#"{"version":1,"created_at":"2024-01-01T00:00:00Z","slug":null,"description":"Initial release"}"#,
        )
        .unwrap();
        assert!(!fresh.is_deployed());

        let pushed: Release = serde_json::from_str(
            r#"{"version":4,"created_at":"2024-01-02T00:00:00Z","slug":{"id":"01234567"}}"#,
        )
        .unwrap();
        assert!(pushed.is_deployed());
    }

    #[test]
    fn test_platform_managed_domain() {
        let domain: Domain =
            serde_json::from_str(r#"{"hostname":"a.herokuapp.com","kind":"heroku"}"#).unwrap();
        assert!(domain.is_platform_managed());
    }
}
