//! Static HTTP provider wrapping reqwest.
//!
//! Not a browser, just HTTP requests. Handles redirects, per-request
//! timeouts, retry on 5xx, and backoff on 429. Rendered requests are
//! served as plain fetches; the validator decides whether that was enough.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{AcquisitionProvider, FetchRequest};
use zoneatlas::{ProviderKind, RenderMode};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// HTTP client for static acquisition.
#[derive(Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for hosts that reject HTTP/2.
    h1_client: reqwest::Client,
    max_retries: u32,
}

impl HttpProvider {
    /// Create a client with a desktop Chrome user-agent.
    pub fn new(default_timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(default_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(default_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            max_retries: 2,
        }
    }

    /// Limit retries on 5xx/429/transport errors (default 2).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Single GET with retry on 5xx and backoff on 429.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse> {
        match self.get_inner(&self.client, url, timeout_ms).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    self.get_inner(&self.h1_client, url, timeout_ms).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_inner(
        &self,
        client: &reqwest::Client,
        url: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let mut retries = 0u32;

        loop {
            let resp = client
                .get(url)
                .timeout(Duration::from_millis(timeout_ms))
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let body = r.text().await?;
                    return Ok(HttpResponse {
                        final_url,
                        status,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries && !e.is_timeout() {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

#[async_trait]
impl AcquisitionProvider for HttpProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Http
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String> {
        if request.render == RenderMode::Rendered {
            tracing::debug!(url = %request.url, "http provider cannot render; fetching static");
        }
        let resp = self.get(&request.url, request.timeout_ms).await?;
        if !(200..300).contains(&resp.status) {
            bail!("HTTP {} from {}", resp.status, resp.final_url);
        }
        Ok(resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_provider_creation() {
        let provider = HttpProvider::new(10_000).with_max_retries(0);
        assert_eq!(provider.kind(), ProviderKind::Http);
        assert_eq!(provider.max_retries, 0);
    }
}
