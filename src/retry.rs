//! Retry and HTTPS-to-HTTP fallback around the page scraper.

use crate::browser::Renderer;
use crate::domain::http_fallback_url;
use crate::error::Result;
use crate::models::ScrapeResult;
use crate::scraper::{ScrapeOptions, scrape_page};
use serde::Deserialize;
use url::Url;

/// What to do after a failed attempt besides trying the same URL again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FallbackStrategy {
    /// Retry the original URL only.
    #[default]
    None,
    /// After the first failed HTTPS attempt, switch to `http://<host>` for the
    /// remaining attempts. At least one HTTP attempt is always made.
    Http,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub attempts: u32,
    pub fallback: FallbackStrategy,
}

/// Scrapes `url`, retrying failed attempts according to `policy`.
///
/// Non-fatal failures never escape: once attempts are exhausted the result is
/// empty. Only fatal errors (a dead browser) are returned as `Err`.
pub(crate) async fn scrape_with_retries(
    renderer: &dyn Renderer,
    url: &Url,
    options: &ScrapeOptions,
    policy: RetryPolicy,
) -> Result<ScrapeResult> {
    let mut target = url.clone();
    let mut budget = policy.attempts.max(1);
    let mut fell_back = false;
    let mut attempt = 0;

    while attempt < budget {
        attempt += 1;
        match scrape_page(renderer, &target, options).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(target: "scrape_task", "Error scraping {} on attempt {}: {}", target, attempt, e);

                if policy.fallback == FallbackStrategy::Http && !fell_back && target.scheme() == "https" {
                    fell_back = true;
                    match http_fallback_url(&target) {
                        Ok(http_url) => {
                            tracing::warn!(target: "scrape_task", "Error with HTTPS, trying HTTP: {}", http_url);
                            target = http_url;
                            if attempt == budget {
                                budget += 1;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(target: "scrape_task", "No HTTP fallback for {}: {}", target, e);
                        }
                    }
                }
            }
        }
    }

    tracing::error!(target: "scrape_task", "Failed to scrape {} after {} attempts.", url, attempt);
    Ok(ScrapeResult::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRenderer, test_options};

    fn policy(attempts: u32, fallback: FallbackStrategy) -> RetryPolicy {
        RetryPolicy { attempts, fallback }
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_empty() {
        let renderer = FakeRenderer::new();
        let url = Url::parse("https://down.example/").unwrap();
        let result = scrape_with_retries(&renderer, &url, &test_options(), policy(3, FallbackStrategy::None))
            .await
            .unwrap();

        assert_eq!(result, ScrapeResult::empty());
        assert_eq!(renderer.navigations().len(), 3);
    }

    #[tokio::test]
    async fn test_success_on_later_attempt() {
        let renderer = FakeRenderer::new()
            .with_page("https://flaky.example/", "<p>ops@flaky.example</p>")
            .failing_first("https://flaky.example/", 2);
        let url = Url::parse("https://flaky.example/").unwrap();
        let result = scrape_with_retries(&renderer, &url, &test_options(), policy(3, FallbackStrategy::None))
            .await
            .unwrap();

        assert_eq!(result.emails.len(), 1);
        assert_eq!(renderer.navigations().len(), 3);
    }

    #[tokio::test]
    async fn test_http_fallback_after_first_failure() {
        let renderer = FakeRenderer::new().with_page("http://legacy.example/", "<p>a@legacy.example</p>");
        let url = Url::parse("https://legacy.example/about").unwrap();
        let result = scrape_with_retries(&renderer, &url, &test_options(), policy(1, FallbackStrategy::Http))
            .await
            .unwrap();

        assert_eq!(result.emails[0].value, "a@legacy.example");
        assert_eq!(
            renderer.navigations(),
            vec![
                "https://legacy.example/about".to_string(),
                "http://legacy.example/".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_fatal_error_is_returned() {
        let renderer = FakeRenderer::new().with_browser_crash_after(0);
        let url = Url::parse("https://corp.com/").unwrap();
        let err = scrape_with_retries(&renderer, &url, &test_options(), policy(3, FallbackStrategy::None))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
