//! Wire protocol header names and formatting.
//!
//! Every exchange carries the marker header identifying it as an engine
//! request; responses without it are foreign documents. Partial reloads add
//! the key-list headers.
//!
//! # Header Reference
//!
//! | Header | Direction | Value |
//! |--------|-----------|-------|
//! | `X-Glide` | both | `true` |
//! | `X-Glide-Version` | both | current asset version |
//! | `X-Glide-Location` | response | hard-redirect target (with 409) |
//! | `X-Glide-Partial-Component` | request | component the subset belongs to |
//! | `X-Glide-Partial-Data` | request | comma-separated `only` keys |
//! | `X-Glide-Partial-Except` | request | comma-separated `except` keys |
//! | `X-Glide-Reset` | request | comma-separated `reset` keys |
//! | `X-Glide-Error-Bag` | request | error bag name |
//!
//! Header name constants are lowercase; lookups against adapter responses
//! are case-normalized by the adapters themselves.

/// Marker header present on every protocol exchange.
pub const MARKER: &str = "x-glide";
/// Asset version header.
pub const VERSION: &str = "x-glide-version";
/// Hard-redirect target accompanying a 409 response.
pub const LOCATION: &str = "x-glide-location";
/// Component name a partial request is scoped to.
pub const PARTIAL_COMPONENT: &str = "x-glide-partial-component";
/// Comma-separated `only` keys of a partial request.
pub const PARTIAL_ONLY: &str = "x-glide-partial-data";
/// Comma-separated `except` keys of a partial request.
pub const PARTIAL_EXCEPT: &str = "x-glide-partial-except";
/// Comma-separated keys forced back to fresh server values.
pub const RESET: &str = "x-glide-reset";
/// Error bag name scoping validation errors.
pub const ERROR_BAG: &str = "x-glide-error-bag";

/// Status code a server answers with when the client's asset version is
/// stale or an external redirect is required.
pub const CONFLICT_STATUS: u16 = 409;

/// Format a key list header value (comma-separated).
///
/// # Examples
///
/// ```
/// use glide_rs::protocol::format_key_list;
///
/// assert_eq!(format_key_list(&["users".into(), "roles".into()]), "users,roles");
/// ```
#[must_use]
pub fn format_key_list(keys: &[String]) -> String {
    keys.join(",")
}

/// Parse a key list header value (comma-separated, whitespace-tolerant).
///
/// # Examples
///
/// ```
/// use glide_rs::protocol::parse_key_list;
///
/// assert_eq!(parse_key_list("users, roles"), vec!["users", "roles"]);
/// assert!(parse_key_list("").is_empty());
/// ```
#[must_use]
pub fn parse_key_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_key_list() {
        assert_eq!(format_key_list(&[]), "");
        assert_eq!(
            format_key_list(&["a".to_string(), "b".to_string()]),
            "a,b"
        );
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(parse_key_list("a,b"), vec!["a", "b"]);
        assert_eq!(parse_key_list(" a , b "), vec!["a", "b"]);
        assert!(parse_key_list("").is_empty());
        assert!(parse_key_list(" , ").is_empty());
    }

    #[test]
    fn test_round_trip() {
        let keys = vec!["users".to_string(), "roles".to_string()];
        assert_eq!(parse_key_list(&format_key_list(&keys)), keys);
    }
}
