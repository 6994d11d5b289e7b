//! Browser rendering for client-side code libraries.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (Chromium via chromiumoxide), and the
//! [`BrowserProvider`] that exposes a renderer as an acquisition provider.

pub mod chromium;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::acquisition::{AcquisitionProvider, FetchRequest};
use zoneatlas::ProviderKind;

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL, failing after `timeout_ms`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()>;
    /// Full page HTML as currently rendered.
    async fn get_html(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Acquisition provider backed by a local headless browser.
///
/// Chromium is launched on first use, so configuring the provider costs
/// nothing for ladders that never reach a browser rung.
pub struct BrowserProvider {
    renderer: OnceCell<Arc<dyn Renderer>>,
    chromium_path: Option<PathBuf>,
}

impl BrowserProvider {
    pub fn new(chromium_path: Option<PathBuf>) -> Self {
        Self {
            renderer: OnceCell::new(),
            chromium_path,
        }
    }

    /// Use an already-running renderer.
    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer: OnceCell::new_with(Some(renderer)),
            chromium_path: None,
        }
    }

    async fn renderer(&self) -> Result<&Arc<dyn Renderer>> {
        self.renderer
            .get_or_try_init(|| async {
                let renderer = chromium::ChromiumRenderer::launch(self.chromium_path.clone()).await?;
                tracing::info!("Chromium renderer launched");
                Ok::<Arc<dyn Renderer>, anyhow::Error>(Arc::new(renderer))
            })
            .await
    }
}

#[async_trait]
impl AcquisitionProvider for BrowserProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Browser
    }

    async fn prepare(&self) -> Result<()> {
        self.renderer().await.map(|_| ())
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String> {
        let renderer = self.renderer().await?;
        let mut tab = TabGuard(Some(renderer.new_context().await?));

        let budget = Duration::from_millis(request.timeout_ms + request.wait_ms);
        let result = match tokio::time::timeout(budget, render_page(&mut tab, request)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "browser render timed out after {}ms",
                budget.as_millis()
            )),
        };
        tab.close().await;
        result
    }
}

async fn render_page(tab: &mut TabGuard, request: &FetchRequest) -> Result<String> {
    let ctx = tab.0.as_mut().context("browser context already closed")?;
    ctx.navigate(&request.url, request.timeout_ms).await?;
    if request.wait_ms > 0 {
        tokio::time::sleep(Duration::from_millis(request.wait_ms)).await;
    }
    ctx.get_html().await
}

/// Owns an open tab. Dropping it without [`TabGuard::close`] (the fetch
/// future was cancelled) closes the tab on a background task.
struct TabGuard(Option<Box<dyn RenderContext>>);

impl TabGuard {
    async fn close(mut self) {
        if let Some(ctx) = self.0.take() {
            if let Err(e) = ctx.close().await {
                tracing::debug!("failed to close browser context: {e}");
            }
        }
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        let Some(ctx) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = ctx.close().await {
                        tracing::debug!("failed to close abandoned browser context: {e}");
                    }
                });
            }
            Err(_) => tracing::warn!("browser context dropped outside a runtime; tab left open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeRenderer {
        html: String,
        active: Arc<AtomicUsize>,
        visited: Arc<Mutex<Vec<String>>>,
    }

    struct FakeContext {
        html: String,
        active: Arc<AtomicUsize>,
        visited: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
            self.active.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeContext {
                html: self.html.clone(),
                active: Arc::clone(&self.active),
                visited: Arc::clone(&self.visited),
            }))
        }

        fn active_contexts(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RenderContext for FakeContext {
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<()> {
            if url.contains("timeout") {
                anyhow::bail!("navigation timed out");
            }
            if url.contains("hang") {
                tokio::time::sleep(Duration::from_secs(600)).await;
            }
            self.visited.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn get_html(&self) -> Result<String> {
            Ok(self.html.clone())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fake() -> (Arc<FakeRenderer>, BrowserProvider) {
        let renderer = Arc::new(FakeRenderer {
            html: "<html><body><h1>Chapter 38</h1></body></html>".to_string(),
            active: Arc::new(AtomicUsize::new(0)),
            visited: Arc::new(Mutex::new(Vec::new())),
        });
        let provider = BrowserProvider::with_renderer(renderer.clone());
        (renderer, provider)
    }

    #[tokio::test]
    async fn test_browser_provider_returns_html_and_closes() {
        let (renderer, provider) = fake();
        let html = provider
            .fetch(&FetchRequest {
                url: "https://library.example.gov/ch38".to_string(),
                render: zoneatlas::RenderMode::Rendered,
                wait_ms: 10,
                timeout_ms: 1000,
            })
            .await
            .unwrap();
        assert!(html.contains("Chapter 38"));
        assert_eq!(renderer.active_contexts(), 0);
        assert_eq!(renderer.visited.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_browser_provider_closes_on_error() {
        let (renderer, provider) = fake();
        let err = provider
            .fetch(&FetchRequest {
                url: "https://library.example.gov/timeout".to_string(),
                render: zoneatlas::RenderMode::Rendered,
                wait_ms: 0,
                timeout_ms: 1000,
            })
            .await;
        assert!(err.is_err());
        assert_eq!(renderer.active_contexts(), 0);
    }

    fn hanging_request(timeout_ms: u64) -> FetchRequest {
        FetchRequest {
            url: "https://library.example.gov/hang".to_string(),
            render: zoneatlas::RenderMode::Rendered,
            wait_ms: 0,
            timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_deadline_closes_tab() {
        let (renderer, provider) = fake();
        let err = provider.fetch(&hanging_request(50)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(renderer.active_contexts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_fetch_still_closes_tab() {
        let (renderer, provider) = fake();
        let outer = tokio::time::timeout(
            Duration::from_millis(100),
            provider.fetch(&hanging_request(60_000)),
        )
        .await;
        assert!(outer.is_err());
        // Let the background close run.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(renderer.active_contexts(), 0);
    }

    #[tokio::test]
    async fn test_prepare_with_running_renderer() {
        let (_renderer, provider) = fake();
        provider.prepare().await.unwrap();
    }
}
