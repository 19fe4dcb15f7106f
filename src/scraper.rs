//! Renders a single page and collects every email it exposes.

use crate::browser::{RenderedPage, Renderer};
use crate::contact_links::{ContactLink, find_contact_links, resolve_link};
use crate::error::Result;
use crate::models::{EmailRecord, OrganizationInfo, ScrapeResult};
use crate::patterns::{EmailMatcher, is_valid_email, strip_mailto};
use crate::schema_org::parse_organization_schema;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use url::Url;

/// Everything the page scraper needs besides the URL and the browser.
#[derive(Debug, Clone)]
pub(crate) struct ScrapeOptions {
    pub matcher: EmailMatcher,
    /// Lower-case file extensions that disqualify a candidate.
    pub blacklist: HashSet<String>,
    pub schema_crawling: bool,
    pub contact_keywords: Vec<String>,
    pub navigation_timeout: Duration,
}

/// Insertion-ordered set of candidate strings.
#[derive(Debug, Default)]
struct Candidates {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl Candidates {
    fn add(&mut self, candidate: impl Into<String>) {
        let candidate = candidate.into();
        if self.seen.insert(candidate.clone()) {
            self.ordered.push(candidate);
        }
    }

    fn extend<I: IntoIterator<Item = String>>(&mut self, items: I) {
        for item in items {
            self.add(item);
        }
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Strips leftover `mailto:` prefixes, drops blacklisted hits, dedups again.
    fn into_records(self, blacklist: &HashSet<String>) -> Vec<EmailRecord> {
        let mut seen = HashSet::new();
        self.ordered
            .iter()
            .map(|c| strip_mailto(c.trim()))
            .filter(|c| !c.is_empty() && is_valid_email(c, blacklist))
            .filter(|c| seen.insert(c.to_string()))
            .map(EmailRecord::scraped)
            .collect()
    }
}

/// Scrapes one URL: rendered DOM, document source, contact links one hop out,
/// and optionally the Organization schema.
///
/// Fails only when the page itself cannot be loaded or read, or the browser
/// cannot open a page. Contact-page failures are logged and skipped.
pub(crate) async fn scrape_page(
    renderer: &dyn Renderer,
    url: &Url,
    options: &ScrapeOptions,
) -> Result<ScrapeResult> {
    let start_time = Instant::now();
    tracing::info!(target: "scrape_task", "Starting scrape for: {}", url);

    let mut page = renderer.new_page().await?;
    let result = scrape_open_page(page.as_mut(), url, options).await;
    if let Err(e) = page.close().await {
        tracing::debug!(target: "scrape_task", "Failed to close page for {}: {}", url, e);
    }

    if let Ok(scraped) = &result {
        tracing::info!(
            target: "scrape_task",
            "Scrape for {} finished in {:.2?}. Found {} valid emails{}.",
            url,
            start_time.elapsed(),
            scraped.emails.len(),
            if scraped.organization.is_empty() { "" } else { " and an Organization record" }
        );
    }
    result
}

async fn scrape_open_page(
    page: &mut dyn RenderedPage,
    url: &Url,
    options: &ScrapeOptions,
) -> Result<ScrapeResult> {
    page.goto(url, options.navigation_timeout).await?;

    let rendered = page.rendered_content().await?;
    let source = page.document_source().await?;

    let mut candidates = Candidates::default();
    candidates.extend(options.matcher.find_emails(&rendered));
    candidates.extend(options.matcher.find_emails(&source));
    tracing::debug!(target: "scrape_task", "{} candidates from page content of {}", candidates.len(), url);

    // Live anchors and the static parse can disagree on script-altered pages.
    let live_links = match page.contact_hrefs(&options.contact_keywords).await {
        Ok(hrefs) => hrefs
            .iter()
            .filter_map(|href| ContactLink::from_href(href))
            .collect(),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            tracing::warn!(target: "scrape_task", "Live anchor query failed on {}: {}", url, e);
            Vec::new()
        }
    };
    let static_links = find_contact_links(&source, &options.contact_keywords);

    let mut visited: HashSet<Url> = HashSet::from([url.clone()]);
    let mut frontier = Vec::new();
    for link in live_links.into_iter().chain(static_links) {
        match link {
            ContactLink::Mailto(address) => {
                tracing::info!(target: "scrape_task", "Found email link: {}", address);
                candidates.add(address);
            }
            ContactLink::Page(href) => {
                if let Some(target) = resolve_link(url, &href) {
                    if visited.insert(target.clone()) {
                        frontier.push(target);
                    }
                }
            }
        }
    }

    let organization = if options.schema_crawling {
        parse_organization_schema(&source)
    } else {
        OrganizationInfo::new()
    };

    // Contact pages are one hop out: their own links are not followed.
    for target in frontier {
        tracing::debug!(target: "scrape_task", "Following contact link: {}", target);
        match visit_contact_page(page, &target, options.navigation_timeout).await {
            Ok(content) => candidates.extend(options.matcher.find_emails(&content)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(target: "scrape_task", "Skipping contact page {}: {}", target, e);
            }
        }
    }

    Ok(ScrapeResult {
        emails: candidates.into_records(&options.blacklist),
        organization,
    })
}

async fn visit_contact_page(
    page: &mut dyn RenderedPage,
    target: &Url,
    timeout: Duration,
) -> Result<String> {
    page.goto(target, timeout).await?;
    page.rendered_content().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRenderer, test_options};
    use serde_json::json;

    fn values(result: &ScrapeResult) -> Vec<&str> {
        result.emails.iter().map(|e| e.value.as_str()).collect()
    }

    #[tokio::test]
    async fn test_mailto_link_needs_no_navigation() {
        let renderer = FakeRenderer::new().with_page(
            "https://corp.com/",
            r#"<html><body><a href="mailto:jane@corp.com">Contact</a></body></html>"#,
        );
        let url = Url::parse("https://corp.com").unwrap();
        let result = scrape_page(&renderer, &url, &test_options()).await.unwrap();

        assert_eq!(values(&result), vec!["jane@corp.com"]);
        assert_eq!(renderer.navigations(), vec!["https://corp.com/".to_string()]);
        assert_eq!(renderer.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_rendered_and_source_are_unioned() {
        let renderer = FakeRenderer::new().with_split_page(
            "https://corp.com/",
            "<body><p>sales@corp.com</p><p>js-only@corp.com</p></body>",
            "<body><p>sales@corp.com</p><!-- server@corp.com --></body>",
        );
        let url = Url::parse("https://corp.com/").unwrap();
        let result = scrape_page(&renderer, &url, &test_options()).await.unwrap();
        assert_eq!(
            values(&result),
            vec!["sales@corp.com", "js-only@corp.com", "server@corp.com"]
        );
    }

    #[tokio::test]
    async fn test_contact_page_followed_once() {
        let renderer = FakeRenderer::new()
            .with_page(
                "https://corp.com/",
                r#"<a href="/contact">Contact us</a><a href="https://corp.com/contact">contact</a>"#,
            )
            .with_page(
                "https://corp.com/contact",
                r#"<p>hello@corp.com</p><a href="/contact/team">Contact the team</a>"#,
            )
            .with_page("https://corp.com/contact/team", "<p>deep@corp.com</p>");
        let url = Url::parse("https://corp.com/").unwrap();
        let result = scrape_page(&renderer, &url, &test_options()).await.unwrap();

        assert_eq!(values(&result), vec!["hello@corp.com"]);
        assert_eq!(
            renderer.navigations(),
            vec!["https://corp.com/".to_string(), "https://corp.com/contact".to_string()]
        );
    }

    #[tokio::test]
    async fn test_contact_link_only_in_rendered_dom() {
        let renderer = FakeRenderer::new()
            .with_split_page(
                "https://corp.com/",
                r#"<body><a href="/contact">Contact</a></body>"#,
                "<body><div id=\"app\"></div></body>",
            )
            .with_page("https://corp.com/contact", "<p>live@corp.com</p>");
        let url = Url::parse("https://corp.com/").unwrap();
        let result = scrape_page(&renderer, &url, &test_options()).await.unwrap();

        assert_eq!(values(&result), vec!["live@corp.com"]);
        assert!(renderer.navigations().contains(&"https://corp.com/contact".to_string()));
    }

    #[tokio::test]
    async fn test_contact_link_only_in_source() {
        let renderer = FakeRenderer::new()
            .with_split_page(
                "https://corp.com/",
                "<body><div id=\"app\"></div></body>",
                r#"<body><nav><a href="/contact-us">Get in touch</a></nav></body>"#,
            )
            .with_page("https://corp.com/contact-us", "<p>static@corp.com</p>");
        let url = Url::parse("https://corp.com/").unwrap();
        let result = scrape_page(&renderer, &url, &test_options()).await.unwrap();

        assert_eq!(values(&result), vec!["static@corp.com"]);
        assert_eq!(
            renderer.navigations(),
            vec!["https://corp.com/".to_string(), "https://corp.com/contact-us".to_string()]
        );
    }

    #[tokio::test]
    async fn test_broken_contact_link_keeps_parent_emails() {
        let renderer = FakeRenderer::new().with_page(
            "https://corp.com/",
            r#"<p>info@corp.com</p><a href="/contact-missing">Contact</a>"#,
        );
        let url = Url::parse("https://corp.com/").unwrap();
        let result = scrape_page(&renderer, &url, &test_options()).await.unwrap();
        assert_eq!(values(&result), vec!["info@corp.com"]);
        assert_eq!(renderer.navigations().len(), 2);
    }

    #[tokio::test]
    async fn test_blacklisted_candidates_dropped() {
        let renderer = FakeRenderer::new().with_page(
            "https://corp.com/",
            r#"<img src="/img/logo@2x.png"><p>team@corp.com</p>"#,
        );
        let url = Url::parse("https://corp.com/").unwrap();
        let result = scrape_page(&renderer, &url, &test_options()).await.unwrap();
        assert_eq!(values(&result), vec!["team@corp.com"]);
    }

    #[tokio::test]
    async fn test_organization_schema_toggle() {
        let html = r#"<script type="application/ld+json">{"@type":"Organization","name":"Acme"}</script>"#;
        let renderer = FakeRenderer::new().with_page("https://acme.com/", html);
        let url = Url::parse("https://acme.com/").unwrap();

        let mut options = test_options();
        let result = scrape_page(&renderer, &url, &options).await.unwrap();
        assert_eq!(result.organization.get("name"), Some(&json!("Acme")));

        options.schema_crawling = false;
        let result = scrape_page(&renderer, &url, &options).await.unwrap();
        assert!(result.organization.is_empty());
    }

    #[tokio::test]
    async fn test_navigation_failure_is_an_error() {
        let renderer = FakeRenderer::new();
        let url = Url::parse("https://down.example/").unwrap();
        let err = scrape_page(&renderer, &url, &test_options()).await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(renderer.open_pages(), 0);
    }
}
