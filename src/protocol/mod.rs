//! Wire protocol: header names, query serialization, response
//! classification.
//!
//! Responses are JSON documents shaped as `{component, props, url,
//! version}`, marked by the [`headers::MARKER`] header. Anything else is a
//! foreign document and escalates to a full browser navigation instead of
//! reconciliation; a `409` carrying [`headers::LOCATION`] is a server-driven
//! hard redirect (stale asset version or an off-app destination).
//!
//! # Module Organization
//!
//! ```text
//! protocol/
//! ├── headers - header name constants, key-list formatting
//! └── query   - URL resolution, bracket-notation query serialization
//! ```

pub mod headers;
mod query;

pub use headers::{format_key_list, parse_key_list};
pub use query::{append_query, resolve_url};

use crate::error::{GlideError, Result};
use crate::types::Page;
use std::collections::BTreeMap;

/// What a server response turned out to be.
#[derive(Clone, Debug, PartialEq)]
pub enum Disposition {
    /// A well-formed protocol page payload.
    Page(Page),
    /// Server-driven hard redirect (409 + location header); the engine
    /// must hand this URL to the location driver, not reconcile it.
    ExternalRedirect(String),
    /// A response without the protocol marker; escalate to a full browser
    /// navigation toward the contained URL.
    Foreign(String),
}

/// Classify a raw adapter response.
///
/// `fallback_url` is used as the foreign-navigation target when the
/// transport did not report a final URL (e.g. no redirects followed).
///
/// Returns an error only for responses that claim to be protocol payloads
/// but fail to parse; those are protocol violations, not foreign pages.
pub fn classify_response(
    status: u16,
    headers: &BTreeMap<String, String>,
    body: &[u8],
    fallback_url: &str,
) -> Result<Disposition> {
    if status == headers::CONFLICT_STATUS {
        if let Some(location) = headers.get(headers::LOCATION) {
            return Ok(Disposition::ExternalRedirect(location.clone()));
        }
    }

    if headers.get(headers::MARKER).map(String::as_str) != Some("true") {
        let target = headers
            .get("location")
            .cloned()
            .unwrap_or_else(|| fallback_url.to_string());
        return Ok(Disposition::Foreign(target));
    }

    if !(200..300).contains(&status) {
        return Err(GlideError::Http(format!(
            "unexpected status {status} on protocol response"
        )));
    }

    let page: Page = serde_json::from_slice(body)
        .map_err(|e| GlideError::Protocol(format!("malformed page payload: {e}")))?;
    Ok(Disposition::Page(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_headers() -> BTreeMap<String, String> {
        let mut h = BTreeMap::new();
        h.insert(headers::MARKER.to_string(), "true".to_string());
        h
    }

    #[test]
    fn test_classify_page() {
        let body = br#"{"component":"Home","props":{},"url":"/","version":"1"}"#;
        let d = classify_response(200, &marker_headers(), body, "https://app.test/").unwrap();
        match d {
            Disposition::Page(page) => assert_eq!(page.component, "Home"),
            other => panic!("expected page, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_external_redirect() {
        let mut h = BTreeMap::new();
        h.insert(headers::LOCATION.to_string(), "https://other.test/".to_string());
        let d = classify_response(409, &h, b"", "https://app.test/").unwrap();
        assert_eq!(
            d,
            Disposition::ExternalRedirect("https://other.test/".to_string())
        );
    }

    #[test]
    fn test_classify_foreign() {
        let d = classify_response(200, &BTreeMap::new(), b"<html>", "https://app.test/login")
            .unwrap();
        assert_eq!(d, Disposition::Foreign("https://app.test/login".to_string()));
    }

    #[test]
    fn test_classify_foreign_redirect_location() {
        let mut h = BTreeMap::new();
        h.insert("location".to_string(), "https://sso.test/".to_string());
        let d = classify_response(302, &h, b"", "https://app.test/").unwrap();
        assert_eq!(d, Disposition::Foreign("https://sso.test/".to_string()));
    }

    #[test]
    fn test_classify_malformed_payload() {
        let err = classify_response(200, &marker_headers(), b"not json", "u").unwrap_err();
        assert!(matches!(err, GlideError::Protocol(_)));
    }

    #[test]
    fn test_classify_marked_error_status() {
        let err = classify_response(500, &marker_headers(), b"{}", "u").unwrap_err();
        assert!(matches!(err, GlideError::Http(_)));
    }
}
