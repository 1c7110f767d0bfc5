//! HTTP client for the Sveriges Radio website
//!
//! Two endpoints are used: the Digilistan chart page (HTML) and the
//! `getaudiourl` CDN endpoint (JSON) which maps a clip id to its audio URL.
//!
//! # Example
//!
//! ```no_run
//! use pmosverigesradio::{SverigesRadioClient, TrackId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SverigesRadioClient::new().await?;
//!
//!     let id: TrackId = "7273377".parse()?;
//!     let clip = client.fetch_audio_url(id).await?;
//!     println!("Clip {}: {}", id, clip.audio_url);
//!
//!     Ok(())
//! }
//! ```

use crate::config::{
    SverigesRadioConfig, DEFAULT_CDN_URL, DEFAULT_DIGILISTAN_URL, DEFAULT_MAX_REDIRECTS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use crate::error::{Error, Result};
use crate::models::{AudioUrlResponse, TrackId};
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Sveriges Radio HTTP client
///
/// Stateless: caching happens in [`crate::CdnTrackCache`].
#[derive(Debug, Clone)]
pub struct SverigesRadioClient {
    pub(crate) client: Client,
    digilistan_url: String,
    cdn_url: String,
    timeout: Duration,
}

impl SverigesRadioClient {
    /// Create a new client with default settings
    pub async fn new() -> Result<Self> {
        Self::builder().build().await
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Chart page URL
    pub fn digilistan_url(&self) -> &str {
        &self.digilistan_url
    }

    /// CDN endpoint URL (without query)
    pub fn cdn_url(&self) -> &str {
        &self.cdn_url
    }

    // ========================================================================
    // Digilistan
    // ========================================================================

    /// Download the chart page HTML
    pub async fn fetch_digilistan_html(&self) -> Result<String> {
        debug!(url = %self.digilistan_url, "Fetching Digilistan");

        let response = self
            .client
            .get(&self.digilistan_url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::ApiError(format!(
                "Digilistan returned status: {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    // ========================================================================
    // CDN
    // ========================================================================

    /// Build the `getaudiourl` query for a clip
    pub fn audio_url_endpoint(&self, id: TrackId) -> Result<Url> {
        let mut url = Url::parse(&self.cdn_url)?;
        url.query_pairs_mut()
            .append_pair("type", "clip")
            .append_pair("quality", "high")
            .append_pair("format", "iis")
            .append_pair("id", &id.to_string());
        Ok(url)
    }

    /// Ask the CDN where a clip lives
    pub async fn fetch_audio_url(&self, id: TrackId) -> Result<AudioUrlResponse> {
        let url = self.audio_url_endpoint(id)?;
        debug!(%id, %url, "Fetching CDN audio url");

        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(Error::ApiError(format!(
                "CDN returned status: {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// Builder for configuring a SverigesRadioClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    digilistan_url: String,
    cdn_url: String,
    timeout: Duration,
    user_agent: String,
    max_redirects: usize,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            digilistan_url: DEFAULT_DIGILISTAN_URL.to_string(),
            cdn_url: DEFAULT_CDN_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Take endpoints, timeout, user agent and redirect limit from a config
    pub fn config(self, config: &SverigesRadioConfig) -> Self {
        self.digilistan_url(&config.digilistan_url)
            .cdn_url(&config.cdn_url)
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .max_redirects(config.max_redirects)
    }

    /// Set a custom HTTP client (its redirect policy is used as is)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn digilistan_url(mut self, url: impl Into<String>) -> Self {
        self.digilistan_url = url.into();
        self
    }

    pub fn cdn_url(mut self, url: impl Into<String>) -> Self {
        self.cdn_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Build the client
    pub async fn build(self) -> Result<SverigesRadioClient> {
        // Fail early on unusable endpoints
        Url::parse(&self.digilistan_url)?;
        Url::parse(&self.cdn_url)?;

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .redirect(redirect::Policy::limited(self.max_redirects))
                .build()?,
        };

        Ok(SverigesRadioClient {
            client,
            digilistan_url: self.digilistan_url,
            cdn_url: self.cdn_url,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::default();
        assert_eq!(builder.cdn_url, DEFAULT_CDN_URL);
        assert_eq!(builder.max_redirects, 2);
        assert_eq!(
            builder.timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
    }

    #[tokio::test]
    async fn test_audio_url_endpoint() {
        let client = SverigesRadioClient::new().await.unwrap();
        let url = client
            .audio_url_endpoint(TrackId::new(7273377).unwrap())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sverigesradio.se/playerajax/getaudiourl?type=clip&quality=high&format=iis&id=7273377"
        );
    }

    #[tokio::test]
    async fn test_invalid_endpoint_rejected() {
        let result = SverigesRadioClient::builder()
            .cdn_url("not a url")
            .build()
            .await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    /// Run with: cargo test -p pmosverigesradio -- --ignored
    #[tokio::test]
    #[ignore = "Integration test - calls real Sveriges Radio API"]
    async fn test_fetch_digilistan_live() {
        let client = SverigesRadioClient::new().await.unwrap();
        let html = client.fetch_digilistan_html().await.unwrap();
        assert!(!html.is_empty());
    }
}
