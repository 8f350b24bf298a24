//! HTTP client for the compliance server API.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use vulcano_core::RunSummary;

use crate::config::ComplianceConfig;
use crate::error::{ComplianceError, Result};

/// A profile hosted on the compliance server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfile {
    /// Owning user or organisation.
    pub owner: String,
    /// Profile name.
    pub name: String,
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Profile version.
    #[serde(default)]
    pub version: Option<String>,
}

impl ServerProfile {
    /// The `compliance://OWNER/NAME` reference for this profile.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}://{}/{}", vulcano_core::profile::COMPLIANCE_SCHEME, self.owner, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Client for a compliance server.
#[derive(Debug)]
pub struct ComplianceClient {
    config: ComplianceConfig,
    http: reqwest::Client,
}

impl ComplianceClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the HTTP client
    /// cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vulcano_compliance::{ComplianceClient, ComplianceConfig};
    ///
    /// let config = ComplianceConfig::new("https://compliance.example.com");
    /// let client = ComplianceClient::new(config)?;
    /// # Ok::<(), vulcano_compliance::ComplianceError>(())
    /// ```
    pub fn new(config: ComplianceConfig) -> Result<Self> {
        Url::parse(&config.server).map_err(|_| ComplianceError::InvalidUrl {
            url: config.server.clone(),
        })?;
        let http = Self::build_http_client(&config)?;
        Ok(Self { config, http })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    /// Queries the server version.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or answers with
    /// anything other than a version document.
    #[instrument(skip(self), fields(server = %self.config.server))]
    pub async fn version(&self) -> Result<String> {
        let url = format!("{}/version", self.config.api_url());
        let response = self.http.get(&url).send().await?;
        let response = Self::check(response).await?;
        let body: VersionResponse = response.json().await?;
        debug!(version = %body.version, "Server version");
        Ok(body.version)
    }

    /// Lists the profiles visible to the configured user.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be retrieved.
    #[instrument(skip(self), fields(server = %self.config.server))]
    pub async fn profiles(&self) -> Result<Vec<ServerProfile>> {
        let url = format!("{}/profiles", self.config.api_url());
        let response = self
            .http
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let profiles: Vec<ServerProfile> = response.json().await?;
        debug!(count = profiles.len(), "Listed profiles");
        Ok(profiles)
    }

    /// Checks whether a profile exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be contacted.
    pub async fn exists(&self, owner: &str, name: &str) -> Result<bool> {
        let response = self
            .http
            .head(self.profile_url(owner, name))
            .headers(self.auth_headers()?)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Fetches the source of a server profile.
    ///
    /// # Errors
    ///
    /// Returns [`ComplianceError::NotFound`] for unknown profiles and an
    /// HTTP error for any other failure.
    #[instrument(skip(self), fields(server = %self.config.server))]
    pub async fn fetch_profile(&self, owner: &str, name: &str) -> Result<String> {
        let response = self
            .http
            .get(self.profile_url(owner, name))
            .headers(self.auth_headers()?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ComplianceError::NotFound {
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
        let content = Self::check(response).await?.text().await?;
        info!(owner, name, bytes = content.len(), "Fetched profile");
        Ok(content)
    }

    /// Fetches profile source from an arbitrary URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not success.
    pub async fn fetch_url(&self, url: &Url) -> Result<String> {
        let response = self.http.get(url.as_str()).send().await?;
        Ok(Self::check(response).await?.text().await?)
    }

    /// Uploads a run summary under `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the upload.
    #[instrument(skip(self, summary), fields(run_id = %summary.run_id))]
    pub async fn publish(&self, owner: &str, summary: &RunSummary) -> Result<()> {
        let url = format!("{}/owners/{owner}/results", self.config.api_url());
        let response = self
            .http
            .post(&url)
            .headers(self.auth_headers()?)
            .json(summary)
            .send()
            .await?;
        Self::check(response).await?;
        info!(owner, rules = summary.rule_results.len(), "Published run summary");
        Ok(())
    }

    fn profile_url(&self, owner: &str, name: &str) -> String {
        format!("{}/owners/{owner}/compliance/{name}", self.config.api_url())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ComplianceError::AuthenticationFailed {
                message: if message.is_empty() {
                    status.to_string()
                } else {
                    message
                },
            });
        }
        Err(ComplianceError::HttpError {
            status: status.as_u16(),
            message,
        })
    }

    fn build_http_client(config: &ComplianceConfig) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder
            .build()
            .map_err(|e| ComplianceError::InvalidResponse {
                message: format!("failed to build HTTP client: {e}"),
            })
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    ComplianceError::AuthenticationFailed {
                        message: "Invalid token".to_string(),
                    }
                })?,
            );
        }
        Ok(headers)
    }
}
