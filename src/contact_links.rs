//! Finds "contact" style anchors in page markup.

use crate::patterns::mailto_address;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// What a matched anchor points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ContactLink {
    /// A `mailto:` target; the address is usable as-is.
    Mailto(String),
    /// Any other href, still unresolved.
    Page(String),
}

impl ContactLink {
    pub(crate) fn from_href(href: &str) -> Option<Self> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        Some(match mailto_address(href) {
            Some(address) => ContactLink::Mailto(address.to_string()),
            None => ContactLink::Page(href.to_string()),
        })
    }
}

/// True when the anchor text or href contains any keyword, ignoring case.
pub(crate) fn matches_keywords(text: &str, href: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    let href = href.to_lowercase();
    keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        !keyword.is_empty() && (text.contains(&keyword) || href.contains(&keyword))
    })
}

/// Static pass over markup: every `<a href>` whose text or href contains a keyword.
///
/// Each anchor element is reported at most once even if several keywords hit it.
/// Two distinct anchors with the same href are both reported.
pub(crate) fn find_contact_links(html: &str, keywords: &[String]) -> Vec<ContactLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text: String = anchor.text().collect::<Vec<_>>().join(" ");
        if matches_keywords(&text, href, keywords) {
            if let Some(link) = ContactLink::from_href(href) {
                tracing::debug!(target: "contact_links", "Matched anchor '{}' -> {}", text.trim(), href);
                links.push(link);
            }
        }
    }

    links
}

/// Resolves an href against the page it was found on.
///
/// Returns `None` for hrefs that do not resolve to an http(s) URL
/// (`javascript:`, `tel:`, malformed).
pub(crate) fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    match base.join(href) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(url) => {
            tracing::debug!(target: "contact_links", "Ignoring non-http contact link: {}", url);
            None
        }
        Err(e) => {
            tracing::debug!(target: "contact_links", "Cannot resolve '{}' against {}: {}", href, base, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matches_text_or_href() {
        let html = r#"
            <html><body>
              <a href="/about">About</a>
              <a href="/reach-us">Contact Us</a>
              <a href="/contact-form">Write</a>
              <a href="https://other.com/">Home</a>
            </body></html>"#;
        let links = find_contact_links(html, &keywords(&["contact"]));
        assert_eq!(
            links,
            vec![
                ContactLink::Page("/reach-us".into()),
                ContactLink::Page("/contact-form".into()),
            ]
        );
    }

    #[test]
    fn test_mailto_links() {
        let html = r#"<a href="mailto:jane@corp.com?subject=Hello">Contact</a>"#;
        let links = find_contact_links(html, &keywords(&["contact"]));
        assert_eq!(links, vec![ContactLink::Mailto("jane@corp.com".into())]);
    }

    #[test]
    fn test_one_entry_per_element_across_keywords() {
        let html = r#"
            <a href="/contact">Contact</a>
            <a href="/contact">Get in touch</a>"#;
        let links = find_contact_links(html, &keywords(&["contact", "touch"]));
        assert_eq!(
            links,
            vec![
                ContactLink::Page("/contact".into()),
                ContactLink::Page("/contact".into()),
            ]
        );
    }

    #[test]
    fn test_anchor_without_href_ignored() {
        let html = r#"<a name="contact">Contact</a><a href="">contact</a>"#;
        assert!(find_contact_links(html, &keywords(&["contact"])).is_empty());
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse("https://corp.com/en/home").unwrap();
        assert_eq!(
            resolve_link(&base, "contact").unwrap().as_str(),
            "https://corp.com/en/contact"
        );
        assert_eq!(
            resolve_link(&base, "/contact").unwrap().as_str(),
            "https://corp.com/contact"
        );
        assert_eq!(
            resolve_link(&base, "http://other.org/c").unwrap().as_str(),
            "http://other.org/c"
        );
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
        assert!(resolve_link(&base, "tel:+15551234").is_none());
    }
}
