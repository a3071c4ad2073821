//! Hosted platform API client.
//!
//! [`PlatformClient`] is the seam the reconciler talks to; [`HerokuClient`]
//! implements it over the Platform API v3 with `reqwest`.

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{FleetError, RemoteError, Result};

use super::types::{
    Account, AppInfo, Collaborator, CreateAppOptions, Domain, Formation, FormationUpdate,
    InstalledAddon, Release,
};

/// Platform API base URL.
pub const DEFAULT_API_URL: &str = "https://api.heroku.com";

/// Environment variable overriding the API base URL.
pub const API_URL_VAR: &str = "APPFLEET_API_URL";

/// Media type selecting version 3 of the API.
const ACCEPT_V3: &str = "application/vnd.heroku+json; version=3";

/// Response header naming the range of the next page of a list.
const NEXT_RANGE: &str = "next-range";

/// Range selecting only the most recent release.
const LATEST_RELEASE_RANGE: &str = "version ..; order=desc, max=1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Read and write operations the reconciler needs from the platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// The authenticated account.
    async fn current_user(&self) -> Result<Account>;

    /// Every app visible to the authenticated account.
    async fn list_apps(&self) -> Result<Vec<AppInfo>>;

    /// Creates an app.
    async fn create_app(&self, options: &CreateAppOptions) -> Result<AppInfo>;

    /// Details of one app.
    async fn app_info(&self, app: &str) -> Result<AppInfo>;

    /// Config vars currently set on an app.
    async fn config_vars(&self, app: &str) -> Result<IndexMap<String, String>>;

    /// Add-ons installed on an app.
    async fn installed_addons(&self, app: &str) -> Result<Vec<InstalledAddon>>;

    /// Domains attached to an app.
    async fn list_domains(&self, app: &str) -> Result<Vec<Domain>>;

    /// Collaborators on an app.
    async fn list_collaborators(&self, app: &str) -> Result<Vec<Collaborator>>;

    /// Most recent release of an app, if it has any.
    async fn latest_release(&self, app: &str) -> Result<Option<Release>>;

    /// Scales one process type.
    async fn scale_process(
        &self,
        app: &str,
        process: &str,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<Formation>;
}

/// Platform API client.
#[derive(Debug, Clone)]
pub struct HerokuClient {
    /// HTTP client.
    client: Client,
    /// API token.
    api_key: String,
    /// Base URL, without trailing slash.
    base_url: String,
}

impl HerokuClient {
    /// Creates a new client against the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Creates a client against the URL in `APPFLEET_API_URL`, falling back
    /// to the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_env(api_key: &str) -> Result<Self> {
        match std::env::var(API_URL_VAR) {
            Ok(url) if !url.is_empty() => Self::with_base_url(api_key, &url),
            _ => Self::new(api_key),
        }
    }

    /// Creates a client against a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RemoteError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        trace!("{method} {path}");
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header(header::ACCEPT, ACCEPT_V3)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, app: Option<&str>) -> Result<T> {
        self.send(self.request(Method::GET, path), app).await
    }

    /// Fetches every page of a list, following `Next-Range` while the API
    /// answers `206 Partial Content`.
    async fn get_all<T: DeserializeOwned>(&self, path: &str, app: Option<&str>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut range: Option<String> = None;

        loop {
            let mut request = self.request(Method::GET, path);
            if let Some(range) = &range {
                request = request.header(header::RANGE, range.as_str());
            }

            let response = self.checked(request, app).await?;
            let next = if response.status() == StatusCode::PARTIAL_CONTENT {
                response
                    .headers()
                    .get(NEXT_RANGE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            } else {
                None
            };

            let page: Vec<T> = Self::parse(response).await?;
            items.extend(page);

            match next {
                Some(next) => {
                    trace!("{path}: next page {next}");
                    range = Some(next);
                }
                None => return Ok(items),
            }
        }
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        app: Option<&str>,
    ) -> Result<T> {
        self.send(self.request(method, path).json(body), app).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, app: Option<&str>) -> Result<T> {
        let response = self.checked(request, app).await?;
        Self::parse(response).await
    }

    /// Sends one request and maps error statuses onto [`RemoteError`].
    async fn checked(&self, request: RequestBuilder, app: Option<&str>) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            FleetError::Remote(RemoteError::network(format!("Request failed: {e}")))
        })?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FleetError::Remote(RemoteError::AuthenticationFailed {
                message: String::from("Invalid API key"),
            }));
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(app) = app {
                return Err(FleetError::Remote(RemoteError::NotFound {
                    app: app.to_string(),
                }));
            }
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::Remote(RemoteError::api_error(status.as_u16(), body)));
        }

        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json().await.map_err(|e| {
            FleetError::Remote(RemoteError::invalid_response(format!(
                "Failed to parse response: {e}"
            )))
        })
    }
}

#[async_trait]
impl PlatformClient for HerokuClient {
    async fn current_user(&self) -> Result<Account> {
        self.get("/account", None).await
    }

    async fn list_apps(&self) -> Result<Vec<AppInfo>> {
        let apps: Vec<AppInfo> = self.get_all("/apps", None).await?;
        debug!("Platform reports {} apps", apps.len());
        Ok(apps)
    }

    async fn create_app(&self, options: &CreateAppOptions) -> Result<AppInfo> {
        self.send_json(Method::POST, "/apps", options, None).await
    }

    async fn app_info(&self, app: &str) -> Result<AppInfo> {
        self.get(&format!("/apps/{app}"), Some(app)).await
    }

    async fn config_vars(&self, app: &str) -> Result<IndexMap<String, String>> {
        let vars: IndexMap<String, Option<String>> =
            self.get(&format!("/apps/{app}/config-vars"), Some(app)).await?;
        Ok(vars
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    async fn installed_addons(&self, app: &str) -> Result<Vec<InstalledAddon>> {
        self.get_all(&format!("/apps/{app}/addons"), Some(app)).await
    }

    async fn list_domains(&self, app: &str) -> Result<Vec<Domain>> {
        self.get_all(&format!("/apps/{app}/domains"), Some(app)).await
    }

    async fn list_collaborators(&self, app: &str) -> Result<Vec<Collaborator>> {
        self.get_all(&format!("/apps/{app}/collaborators"), Some(app))
            .await
    }

    async fn latest_release(&self, app: &str) -> Result<Option<Release>> {
        let request = self
            .request(Method::GET, &format!("/apps/{app}/releases"))
            .header(header::RANGE, LATEST_RELEASE_RANGE);
        let releases: Vec<Release> = self.send(request, Some(app)).await?;
        Ok(releases.into_iter().max_by_key(|release| release.version))
    }

    async fn scale_process(
        &self,
        app: &str,
        process: &str,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<Formation> {
        let body = FormationUpdate { quantity, size };
        self.send_json(
            Method::PATCH,
            &format!("/apps/{app}/formation/{process}"),
            &body,
            Some(app),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> HerokuClient {
        HerokuClient::with_base_url("test-token", &server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_sends_version_and_token_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account"))
            .and(header("accept", ACCEPT_V3))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "email": "me@example.com" })),
            )
            .mount(&server)
            .await;

        let user = client(&server).await.current_user().await.unwrap();
        assert_eq!(user.email, "me@example.com");
    }

    #[tokio::test]
    async fn test_config_vars_drop_null_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/awesomeapp-staging/config-vars"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "A": "1", "B": null })),
            )
            .mount(&server)
            .await;

        let vars = client(&server)
            .await
            .config_vars("awesomeapp-staging")
            .await
            .unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["A"], "1");
    }

    #[tokio::test]
    async fn test_unknown_app_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/ghost/addons"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server).await.installed_addons("ghost").await;
        assert!(matches!(
            result,
            Err(FleetError::Remote(RemoteError::NotFound { ref app })) if app == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = client(&server).await.list_apps().await;
        assert!(matches!(
            result,
            Err(FleetError::Remote(RemoteError::AuthenticationFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_server_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/awesomeapp-staging/releases"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let result = client(&server).await.latest_release("awesomeapp-staging").await;
        assert!(matches!(
            result,
            Err(FleetError::Remote(RemoteError::RequestFailed { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_apps_follows_next_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps"))
            .and(header("range", "name ]awesomeapp-staging..; max=1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "name": "mediocreapp-development" }])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Next-Range", "name ]awesomeapp-staging..; max=1")
                    .set_body_json(serde_json::json!([{ "name": "awesomeapp-staging" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let apps = client(&server).await.list_apps().await.unwrap();
        let names: Vec<_> = apps.iter().map(|app| app.name.as_str()).collect();
        assert_eq!(names, ["awesomeapp-staging", "mediocreapp-development"]);
    }

    #[tokio::test]
    async fn test_latest_release_requests_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/awesomeapp-staging/releases"))
            .and(header_exists("range"))
            .respond_with(ResponseTemplate::new(206).set_body_json(serde_json::json!([
                { "version": 1, "created_at": "2024-01-01T00:00:00Z", "slug": null }
            ])))
            .mount(&server)
            .await;

        let release = client(&server)
            .await
            .latest_release("awesomeapp-staging")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(release.version, 1);
        assert!(!release.is_deployed());
    }

    #[tokio::test]
    async fn test_scale_patches_formation() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/apps/awesomeapp-production/formation/worker"))
            .and(body_json(serde_json::json!({ "quantity": 2, "size": "standard-2x" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "worker", "quantity": 2, "size": "standard-2x"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let formation = client(&server)
            .await
            .scale_process("awesomeapp-production", "worker", 2, Some("standard-2x"))
            .await
            .unwrap();
        assert_eq!(formation.quantity, 2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/awesomeapp-staging"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client(&server).await.app_info("awesomeapp-staging").await;
        assert!(matches!(
            result,
            Err(FleetError::Remote(RemoteError::InvalidResponse { .. }))
        ));
    }
}
