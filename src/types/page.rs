//! Page snapshot received from the server.
//!
//! A [`Page`] is the unit of state the engine reconciles: which component to
//! mount, its props, the canonical URL, and the server's asset version.
//! Pages are immutable once received; a new `Page` is produced per visit,
//! never mutated in place.
//!
//! Two prop keys are reserved:
//!
//! - `errors`: populated by error reconciliation after a validation
//!   response; scoped by error bag when one was sent.
//! - `flash`: one-shot messages surfaced through the `flash` event on
//!   commit.
//!
//! # Examples
//!
//! ```
//! use glide_rs::Page;
//! use serde_json::json;
//!
//! let page = Page::new("Users/Index", "/users")
//!     .with_prop("users", json!([{"id": 1}]))
//!     .with_version("a1b2c3");
//!
//! assert_eq!(page.component, "Users/Index");
//! assert!(!page.has_errors());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prop map of a page: string keys to arbitrary JSON values.
pub type Props = serde_json::Map<String, Value>;

/// Validation errors keyed by field name.
pub type ErrorMap = serde_json::Map<String, Value>;

/// An immutable snapshot of a server-rendered page.
///
/// Shaped exactly as the wire payload: `{component, props, url, version}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Name of the component the view layer should mount.
    pub component: String,

    /// Props to hand to the component. Carries the reserved `errors` and
    /// `flash` entries.
    #[serde(default)]
    pub props: Props,

    /// Canonical URL of this page as the server sees it.
    pub url: String,

    /// Asset version; `None` before the server has advertised one.
    #[serde(default)]
    pub version: Option<String>,
}

impl Page {
    /// Create a new page snapshot with empty props.
    #[inline]
    #[must_use]
    pub fn new(component: impl Into<String>, url: impl Into<String>) -> Self {
        Page {
            component: component.into(),
            props: Props::new(),
            url: url.into(),
            version: None,
        }
    }

    /// Set a single prop.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Replace the whole prop map.
    #[must_use]
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Set the asset version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The reserved `errors` prop, if present and an object.
    #[must_use]
    pub fn errors(&self) -> Option<&ErrorMap> {
        self.props.get("errors").and_then(Value::as_object)
    }

    /// Resolve the errors map, scoped by an error bag when one is set.
    ///
    /// With a bag name, returns `props.errors[bag]` (an empty map when the
    /// bag is absent); without one, returns `props.errors` as-is.
    #[must_use]
    pub fn resolved_errors(&self, error_bag: Option<&str>) -> ErrorMap {
        let Some(errors) = self.errors() else {
            return ErrorMap::new();
        };
        match error_bag {
            Some(bag) => errors
                .get(bag)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            None => errors.clone(),
        }
    }

    /// Whether the page carries any validation errors.
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().is_some_and(|e| !e.is_empty())
    }

    /// The reserved `flash` prop, if present and non-null.
    #[must_use]
    pub fn flash(&self) -> Option<&Value> {
        self.props.get("flash").filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_new() {
        let page = Page::new("Home", "/");
        assert_eq!(page.component, "Home");
        assert_eq!(page.url, "/");
        assert!(page.props.is_empty());
        assert_eq!(page.version, None);
    }

    #[test]
    fn test_page_builder() {
        let page = Page::new("Users/Show", "/users/1")
            .with_prop("user", json!({"id": 1}))
            .with_version("v9");
        assert_eq!(page.props["user"]["id"], 1);
        assert_eq!(page.version.as_deref(), Some("v9"));
    }

    #[test]
    fn test_page_deserialize() {
        let page: Page = serde_json::from_str(
            r#"{"component":"Home","props":{"name":"x"},"url":"/","version":"1"}"#,
        )
        .unwrap();
        assert_eq!(page.component, "Home");
        assert_eq!(page.props["name"], "x");
    }

    #[test]
    fn test_page_deserialize_missing_optional_fields() {
        let page: Page = serde_json::from_str(r#"{"component":"Home","url":"/"}"#).unwrap();
        assert!(page.props.is_empty());
        assert_eq!(page.version, None);
    }

    #[test]
    fn test_has_errors() {
        let page = Page::new("Home", "/").with_prop("errors", json!({"name": "required"}));
        assert!(page.has_errors());

        let clean = Page::new("Home", "/").with_prop("errors", json!({}));
        assert!(!clean.has_errors());
    }

    #[test]
    fn test_resolved_errors_no_bag() {
        let page = Page::new("Home", "/").with_prop("errors", json!({"name": "required"}));
        let errors = page.resolved_errors(None);
        assert_eq!(errors["name"], "required");
    }

    #[test]
    fn test_resolved_errors_with_bag() {
        let page = Page::new("Home", "/")
            .with_prop("errors", json!({"signup": {"email": "taken"}}));
        let errors = page.resolved_errors(Some("signup"));
        assert_eq!(errors["email"], "taken");

        let missing = page.resolved_errors(Some("login"));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_flash() {
        let page = Page::new("Home", "/").with_prop("flash", json!({"message": "saved"}));
        assert_eq!(page.flash().unwrap()["message"], "saved");

        let none = Page::new("Home", "/").with_prop("flash", Value::Null);
        assert!(none.flash().is_none());
    }
}
