//! Utility functions for turning input tokens into URLs and store keys.

use crate::error::{AppError, Result};
use url::Url;

/// Prefixes `https://` when the token carries no scheme of its own.
pub(crate) fn ensure_scheme(token: &str) -> String {
    let token = token.trim();
    if token.contains("://") {
        token.to_string()
    } else {
        format!("https://{}", token)
    }
}

/// Parses the input token into an absolute URL, adding a scheme if necessary.
///
/// # Returns
/// * `Err(AppError::InvalidInput)` if the token is empty or the parsed URL has no host.
pub(crate) fn normalize_url(token: &str) -> Result<Url> {
    if token.trim().is_empty() {
        return Err(AppError::InvalidInput("URL token is empty".to_string()));
    }
    let with_scheme = ensure_scheme(token);
    let url = Url::parse(&with_scheme).map_err(|e| {
        tracing::debug!("Failed to parse URL '{}' (original: {}): {}", with_scheme, token, e);
        AppError::InvalidInput(format!("{}: {}", token, e))
    })?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(AppError::InvalidInput(format!(
            "Could not extract host from parsed URL: {}",
            with_scheme
        ))),
    }
}

/// The network location of a URL (`host[:port]`), used as the store key.
///
/// No `www.` stripping or public-suffix folding happens here: two tokens map to
/// the same record only when their network locations are identical.
pub(crate) fn domain_key(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("URL has no host: {}", url)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// The plain-HTTP variant of a URL, reduced to its network location.
pub(crate) fn http_fallback_url(url: &Url) -> Result<Url> {
    let key = domain_key(url)?;
    Ok(Url::parse(&format!("http://{}", key))?)
}
