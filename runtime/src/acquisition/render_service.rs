//! Hosted render/unblock service provider.
//!
//! The service takes the target URL and rendering options as query
//! parameters, runs a real browser behind residential egress, and returns
//! the rendered HTML. The API key comes from `ZONEATLAS_RENDER_KEY`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::{AcquisitionProvider, FetchRequest};
use zoneatlas::{ProviderKind, RenderMode};

/// Slack added to the HTTP timeout on top of the render timeout, so the
/// service can report its own timeout instead of being cut off.
const TIMEOUT_SLACK_MS: u64 = 5_000;

pub struct RenderServiceProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl RenderServiceProvider {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid render endpoint: {endpoint}"))?;
        if api_key.trim().is_empty() {
            bail!("render service API key is empty");
        }
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build render service client")?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
        })
    }

    /// Service URL for one request.
    fn request_url(&self, request: &FetchRequest) -> Url {
        let render = matches!(request.render, RenderMode::Rendered);
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("url", &request.url)
            .append_pair("render_js", if render { "true" } else { "false" })
            .append_pair("wait", &request.wait_ms.to_string())
            .append_pair("timeout", &request.timeout_ms.to_string());
        url
    }
}

#[async_trait]
impl AcquisitionProvider for RenderServiceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::RenderService
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String> {
        let resp = self
            .client
            .get(self.request_url(request))
            .timeout(Duration::from_millis(request.timeout_ms + TIMEOUT_SLACK_MS))
            .send()
            .await
            // The key is part of the URL; never echo it.
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("render service request failed for {}", request.url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("render service returned HTTP {} for {}", status.as_u16(), request.url);
        }
        Ok(resp.text().await.map_err(reqwest::Error::without_url)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(render: RenderMode) -> FetchRequest {
        FetchRequest {
            url: "https://library.example.gov/codes/orange?nodeId=CH38".to_string(),
            render,
            wait_ms: 5000,
            timeout_ms: 60000,
        }
    }

    #[test]
    fn test_request_url_encodes_target() {
        let provider = RenderServiceProvider::new("https://render.example.com/api/v1/", "k3y").unwrap();
        let url = provider.request_url(&request(RenderMode::Rendered));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("api_key".to_string(), "k3y".to_string())));
        assert!(pairs.contains(&(
            "url".to_string(),
            "https://library.example.gov/codes/orange?nodeId=CH38".to_string()
        )));
        assert!(pairs.contains(&("render_js".to_string(), "true".to_string())));
        assert!(pairs.contains(&("wait".to_string(), "5000".to_string())));
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(RenderServiceProvider::new("not a url", "key").is_err());
        assert!(RenderServiceProvider::new("https://render.example.com", " ").is_err());
    }
}
