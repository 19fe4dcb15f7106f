//! Headless browser capability used by the page scraper.
//!
//! The scraper only sees the [`Renderer`] and [`RenderedPage`] traits; the
//! Chromium implementation below is what the binary injects at startup.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Opens pages in a browsing context.
#[async_trait]
pub(crate) trait Renderer: Send + Sync {
    /// Opens a fresh blank page. Failure here means the engine itself is unusable.
    async fn new_page(&self) -> Result<Box<dyn RenderedPage>>;
}

/// One open browser tab.
#[async_trait]
pub(crate) trait RenderedPage: Send {
    /// Loads `url`, failing with a navigation error or timeout.
    async fn goto(&mut self, url: &Url, timeout: Duration) -> Result<()>;

    /// The live DOM as currently rendered.
    async fn rendered_content(&self) -> Result<String>;

    /// The document markup (`document.documentElement.outerHTML`).
    async fn document_source(&self) -> Result<String>;

    /// Raw `href` values of live anchors whose text or href contains any keyword,
    /// case-insensitively. Each element contributes at most one entry.
    async fn contact_hrefs(&self, keywords: &[String]) -> Result<Vec<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// Launch options for [`ChromeRenderer`].
#[derive(Debug, Clone)]
pub(crate) struct BrowserSettings {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub user_agent: Option<String>,
    /// Upper bound on a single CDP request. Must not be shorter than the
    /// navigation timeout, or slow loads fail early as CDP timeouts.
    pub request_timeout: Duration,
}

/// Slack added on top of the navigation timeout for CDP requests.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// The CDP request timeout to use for a given navigation timeout.
pub(crate) fn request_timeout_for(navigation_timeout: Duration) -> Duration {
    navigation_timeout.saturating_add(REQUEST_TIMEOUT_MARGIN)
}

/// Chromium driven over CDP. The handler task is aborted on drop.
pub(crate) struct ChromeRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromeRenderer {
    pub(crate) async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(settings.request_timeout)
            .arg("--ignore-certificate-errors")
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio");
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(agent) = &settings.user_agent {
            builder = builder.arg(format!("--user-agent={}", agent));
        }
        let config = builder
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to build browser config: {}", e)))?;

        tracing::info!("Launching headless browser (CDP request timeout {:?})", settings.request_timeout);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {:?}", e);
                }
            }
            tracing::debug!("Browser event handler task completed");
        });

        Ok(Self { browser, handler })
    }

    /// Closes the browser process and waits for it to exit.
    pub(crate) async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed waiting for browser exit: {}", e);
        }
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn new_page(&self) -> Result<Box<dyn RenderedPage>> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(Box::new(ChromePage { page }))
    }
}

struct ChromePage {
    page: Page,
}

const OUTER_HTML_JS: &str = "document.documentElement.outerHTML";

/// Collects hrefs of matching anchors; `__KEYWORDS__` is replaced with a JSON array.
const CONTACT_HREFS_JS: &str = r#"(() => {
    const keywords = __KEYWORDS__.map(k => k.toLowerCase()).filter(k => k.length > 0);
    const hrefs = [];
    for (const a of document.querySelectorAll('a[href]')) {
        const text = (a.innerText || a.textContent || '').toLowerCase();
        const href = a.getAttribute('href') || '';
        const lowered = href.toLowerCase();
        if (keywords.some(k => text.includes(k) || lowered.includes(k))) {
            hrefs.push(href);
        }
    }
    return hrefs;
})()"#;

#[async_trait]
impl RenderedPage for ChromePage {
    async fn goto(&mut self, url: &Url, timeout: Duration) -> Result<()> {
        let load = async {
            self.page.goto(url.as_str()).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AppError::navigation(url.as_str(), e)),
            Err(_) => Err(AppError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn rendered_content(&self) -> Result<String> {
        match self.page.content().await {
            Ok(content) => Ok(content),
            Err(e) => Err(page_error(&self.page, e).await),
        }
    }

    async fn document_source(&self) -> Result<String> {
        let result = match self.page.evaluate(OUTER_HTML_JS).await {
            Ok(result) => result,
            Err(e) => return Err(page_error(&self.page, e).await),
        };
        match result.into_value::<String>() {
            Ok(source) => Ok(source),
            Err(e) => Err(page_error(&self.page, e).await),
        }
    }

    async fn contact_hrefs(&self, keywords: &[String]) -> Result<Vec<String>> {
        let script = CONTACT_HREFS_JS.replace("__KEYWORDS__", &serde_json::to_string(keywords)?);
        let result = match self.page.evaluate(script).await {
            Ok(result) => result,
            Err(e) => return Err(page_error(&self.page, e).await),
        };
        match result.into_value::<Vec<String>>() {
            Ok(hrefs) => Ok(hrefs),
            Err(e) => Err(page_error(&self.page, e).await),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}

/// A navigation error tagged with the page's current URL.
async fn page_error(page: &Page, reason: impl ToString) -> AppError {
    let url = page
        .url()
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| "about:blank".to_string());
    AppError::navigation(url, reason)
}
