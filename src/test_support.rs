//! In-memory browser and fixtures shared by the async tests.

use crate::browser::{RenderedPage, Renderer};
use crate::contact_links::matches_keywords;
use crate::error::{AppError, Result};
use crate::patterns::EmailMatcher;
use crate::scraper::ScrapeOptions;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub(crate) fn test_options() -> ScrapeOptions {
    ScrapeOptions {
        matcher: EmailMatcher::default(),
        blacklist: ["jpg", "png", "gif", "pdf"].iter().map(|s| s.to_string()).collect(),
        schema_crawling: true,
        contact_keywords: vec!["contact".to_string()],
        navigation_timeout: Duration::from_secs(5),
    }
}

#[derive(Debug, Clone)]
struct FakeDocument {
    rendered: String,
    source: String,
}

#[derive(Debug, Default)]
struct FakeState {
    navigations: Vec<String>,
    open_pages: usize,
    pages_created: usize,
    remaining_failures: HashMap<String, usize>,
}

/// Serves canned HTML per URL. Unknown URLs fail to load.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRenderer {
    documents: HashMap<String, FakeDocument>,
    crash_after: Option<usize>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(self, url: &str, html: &str) -> Self {
        self.with_split_page(url, html, html)
    }

    pub(crate) fn with_split_page(mut self, url: &str, rendered: &str, source: &str) -> Self {
        self.documents.insert(
            url.to_string(),
            FakeDocument {
                rendered: rendered.to_string(),
                source: source.to_string(),
            },
        );
        self
    }

    /// The first `times` loads of `url` fail.
    pub(crate) fn failing_first(self, url: &str, times: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .remaining_failures
            .insert(url.to_string(), times);
        self
    }

    /// `new_page` fails once `pages` pages have been opened.
    pub(crate) fn with_browser_crash_after(mut self, pages: usize) -> Self {
        self.crash_after = Some(pages);
        self
    }

    /// Every URL passed to `goto`, in order, including failed loads.
    pub(crate) fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub(crate) fn open_pages(&self) -> usize {
        self.state.lock().unwrap().open_pages
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_page(&self) -> Result<Box<dyn RenderedPage>> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = self.crash_after {
            if state.pages_created >= limit {
                return Err(AppError::Browser("browser process exited".to_string()));
            }
        }
        state.pages_created += 1;
        state.open_pages += 1;
        Ok(Box::new(FakePage {
            documents: self.documents.clone(),
            state: self.state.clone(),
            current: None,
        }))
    }
}

struct FakePage {
    documents: HashMap<String, FakeDocument>,
    state: Arc<Mutex<FakeState>>,
    current: Option<FakeDocument>,
}

impl FakePage {
    fn current(&self) -> Result<&FakeDocument> {
        self.current
            .as_ref()
            .ok_or_else(|| AppError::navigation("about:blank", "no document loaded"))
    }
}

#[async_trait]
impl RenderedPage for FakePage {
    async fn goto(&mut self, url: &Url, _timeout: Duration) -> Result<()> {
        let key = url.as_str().to_string();
        {
            let mut state = self.state.lock().unwrap();
            state.navigations.push(key.clone());
            if let Some(remaining) = state.remaining_failures.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    self.current = None;
                    return Err(AppError::navigation(key, "net::ERR_CONNECTION_RESET"));
                }
            }
        }
        match self.documents.get(&key) {
            Some(doc) => {
                self.current = Some(doc.clone());
                Ok(())
            }
            None => {
                self.current = None;
                Err(AppError::navigation(key, "net::ERR_NAME_NOT_RESOLVED"))
            }
        }
    }

    async fn rendered_content(&self) -> Result<String> {
        Ok(self.current()?.rendered.clone())
    }

    async fn document_source(&self) -> Result<String> {
        Ok(self.current()?.source.clone())
    }

    async fn contact_hrefs(&self, keywords: &[String]) -> Result<Vec<String>> {
        let document = Html::parse_document(&self.current()?.rendered);
        let selector = Selector::parse("a[href]").unwrap();
        Ok(document
            .select(&selector)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let text: String = a.text().collect();
                matches_keywords(&text, href, keywords).then(|| href.to_string())
            })
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().open_pages -= 1;
        Ok(())
    }
}
