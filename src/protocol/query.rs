//! URL resolution and query-string serialization.
//!
//! Request data for GET/DELETE visits is flattened into the query string
//! using bracket notation, matching what server-side form parsers expect:
//!
//! ```text
//! {"search": "ada", "filter": {"role": "admin"}, "ids": [1, 2]}
//!   → search=ada&filter[role]=admin&ids[]=1&ids[]=2
//! ```
//!
//! Null values are dropped; nested objects and arrays recurse.

use crate::error::{GlideError, Result};
use serde_json::Value;
use url::Url;

/// Resolve a visit target against an optional base URL.
///
/// Absolute inputs pass through; relative inputs require a base.
///
/// # Examples
///
/// ```
/// use glide_rs::protocol::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://app.test").unwrap();
/// let url = resolve_url(Some(&base), "/users?page=2").unwrap();
/// assert_eq!(url.as_str(), "https://app.test/users?page=2");
/// ```
pub fn resolve_url(base: Option<&Url>, input: &str) -> Result<Url> {
    match Url::parse(input) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => Ok(base.join(input)?),
            None => Err(GlideError::Config(format!(
                "relative URL {input:?} requires a configured base URL"
            ))),
        },
        Err(e) => Err(e.into()),
    }
}

/// Flatten a JSON tree into the query string of `url`, bracket-notation
/// style. Existing query parameters are kept.
pub fn append_query(url: &mut Url, data: &Value) -> Result<()> {
    let mut pairs = Vec::new();
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                flatten(key, value, &mut pairs);
            }
        }
        Value::Null => {}
        _ => {
            return Err(GlideError::Config(
                "query data must be a JSON object".to_string(),
            ))
        }
    }
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
    }
    Ok(())
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, nested) in map {
                flatten(&format!("{prefix}[{key}]"), nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten(&format!("{prefix}[]"), item, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
    }
}
