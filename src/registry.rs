use crate::config::RegistryConfig;
use crate::error::VersionError;
use crate::image_reference::{ImageReference, ParseError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Certificate, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::{fmt, fs, time::Duration};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// Identifies a managed component towards the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Gateway,
    Agent,
    Connector,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Gateway => "gateway",
            Component::Agent => "agent",
            Component::Connector => "connector",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The newest image a registry knows for a component.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LatestImageInfo {
    pub source: String,
    pub tag: String,
}

impl LatestImageInfo {
    pub fn image_reference(&self) -> Result<ImageReference, ParseError> {
        ImageReference::tagged(&self.source, &self.tag)
    }
}

impl fmt::Display for LatestImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.tag)
    }
}

/// Source of truth for "latest" component versions.
///
/// Calls are single-shot. Any failure is reported as [`VersionError::RegistryUnavailable`] and is expected to be
/// retried by the next reconcile pass, never in here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn latest_version(&self, component: Component) -> Result<String, VersionError>;

    async fn latest_image_info(&self, component: Component) -> Result<LatestImageInfo, VersionError>;
}

/// Wrapper for the registry API token that prints a "<REDACTED, length {length of the token}>" string for Debug/Display
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(s: impl Into<String>) -> Self {
        ApiToken(s.into())
    }

    /// Access the raw token if explicitly needed
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    fn authorization_header(&self) -> String {
        format!("Api-Token {}", self.expose_secret())
    }

    fn fmt_redacted(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<REDACTED, length {}>", self.0.len())
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_redacted(f)
    }
}

impl fmt::Display for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_redacted(f)
    }
}

pub fn create_http_client(config: &RegistryConfig) -> Result<Client> {
    info!("Initializing registry HTTP client");
    // System certificates are loaded automatically with rustls-tls-native-roots
    let mut client_builder =
        Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

    for file_path in &config.ca_certificate_paths {
        let file_content = fs::read(file_path)
            .with_context(|| format!("Failed to read file {}", file_path.display()))?;
        let cert = Certificate::from_pem(&file_content).context("Failed to parse certificate")?;
        client_builder = client_builder.add_root_certificate(cert);
    }

    client_builder.build().context("Failed to build HTTP client")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestVersionResponse {
    latest_version: String,
}

/// [`RegistryClient`] speaking the deployment API of a tenant or public registry.
pub struct HttpRegistryClient {
    http: Client,
    base_url: String,
    token: ApiToken,
}

impl HttpRegistryClient {
    pub fn new(http: Client, base_url: &str, token: ApiToken) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn component_url(&self, component: Component, endpoint: &str) -> String {
        format!(
            "{}/v1/deployment/components/{}/{}",
            self.base_url, component, endpoint
        )
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        component: Component,
        url: &str,
    ) -> Result<T, VersionError> {
        debug!("Fetching {} metadata from URL {}", component, url);
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.token.authorization_header())
            .send()
            .await
            .map_err(|e| VersionError::registry_unavailable(component, e))?;

        if !response.status().is_success() {
            return Err(VersionError::registry_unavailable(
                component,
                format!("{} returned status {}", url, response.status()),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| VersionError::registry_unavailable(component, e))
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn latest_version(&self, component: Component) -> Result<String, VersionError> {
        let url = self.component_url(component, "latest-version");
        let response: LatestVersionResponse = self.fetch_json(component, &url).await?;
        if response.latest_version.is_empty() {
            return Err(VersionError::registry_unavailable(
                component,
                "registry returned an empty version",
            ));
        }
        Ok(response.latest_version)
    }

    async fn latest_image_info(&self, component: Component) -> Result<LatestImageInfo, VersionError> {
        let url = self.component_url(component, "latest-image");
        let info: LatestImageInfo = self.fetch_json(component, &url).await?;
        if info.source.is_empty() || info.tag.is_empty() {
            return Err(VersionError::registry_unavailable(
                component,
                format!("registry returned an incomplete image {}", info),
            ));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    const TOKEN: &str = "tenant-token";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Api-Token {}", TOKEN))
    }

    async fn latest_version(Path(component): Path<String>, headers: HeaderMap) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match component.as_str() {
            "agent" => Json(json!({ "latestVersion": "1.301.0.20240101-120000" })).into_response(),
            "connector" => Json(json!({ "latestVersion": "" })).into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn latest_image(Path(component): Path<String>, headers: HeaderMap) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match component.as_str() {
            "gateway" => {
                Json(json!({ "source": "some.registry.com", "tag": "1.2.3.4-5" })).into_response()
            }
            _ => (StatusCode::OK, "not json").into_response(),
        }
    }

    async fn serve() -> String {
        let app = Router::new()
            .route(
                "/v1/deployment/components/{component}/latest-version",
                get(latest_version),
            )
            .route(
                "/v1/deployment/components/{component}/latest-image",
                get(latest_image),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}/", addr)
    }

    fn client(base_url: &str, token: &str) -> HttpRegistryClient {
        HttpRegistryClient::new(Client::new(), base_url, ApiToken::new(token))
    }

    #[tokio::test]
    async fn test_latest_version() {
        let base_url = serve().await;
        let version = client(&base_url, TOKEN)
            .latest_version(Component::Agent)
            .await
            .unwrap();
        assert_eq!(version, "1.301.0.20240101-120000");
    }

    #[tokio::test]
    async fn test_latest_image_info() {
        let base_url = serve().await;
        let info = client(&base_url, TOKEN)
            .latest_image_info(Component::Gateway)
            .await
            .unwrap();
        assert_eq!(
            info,
            LatestImageInfo {
                source: "some.registry.com".to_string(),
                tag: "1.2.3.4-5".to_string(),
            }
        );
        assert_eq!(info.image_reference().unwrap().to_string(), "some.registry.com:1.2.3.4-5");
    }

    #[tokio::test]
    async fn test_failures_are_registry_unavailable() {
        let base_url = serve().await;

        let unauthorized = client(&base_url, "wrong").latest_version(Component::Agent).await;
        assert!(matches!(
            unauthorized,
            Err(VersionError::RegistryUnavailable { component: Component::Agent, .. })
        ));

        let not_found = client(&base_url, TOKEN).latest_version(Component::Gateway).await;
        assert!(matches!(not_found, Err(VersionError::RegistryUnavailable { .. })));

        let empty = client(&base_url, TOKEN).latest_version(Component::Connector).await;
        assert!(matches!(empty, Err(VersionError::RegistryUnavailable { .. })));

        let undecodable = client(&base_url, TOKEN)
            .latest_image_info(Component::Connector)
            .await;
        assert!(matches!(undecodable, Err(VersionError::RegistryUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_registry_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(&format!("http://{}", addr), TOKEN)
            .latest_image_info(Component::Gateway)
            .await;
        assert!(matches!(result, Err(VersionError::RegistryUnavailable { .. })));
    }

    #[test]
    fn test_token_is_redacted() {
        let token = ApiToken::new("secret_token");
        assert_eq!(format!("{}", token), "<REDACTED, length 12>");
        assert_eq!(format!("{:?}", token), "<REDACTED, length 12>");
        assert_eq!(token.expose_secret(), "secret_token");
    }
}
