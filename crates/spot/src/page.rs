//! Page objects.
//!
//! A [`WebPage`] says where a page lives (a url pattern) and how to tell
//! that it finished loading (an optional indicator element). Widgets of the
//! page are built on demand from the browser by the implementor.

use crate::browser::WebBrowser;
use crate::locator::By;
use crate::result::{SpotError, SpotResult};
use regex::Regex;
use std::collections::HashMap;
use std::rc::Rc;

/// Trait for page objects.
///
/// # Example
///
/// ```ignore
/// struct LoginPage;
///
/// impl WebPage for LoginPage {
///     fn url_pattern(&self) -> &str {
///         "/login"
///     }
///
///     fn load_indicator(&self) -> Option<By> {
///         Some(By::id("login-form"))
///     }
/// }
/// ```
pub trait WebPage {
    /// URL pattern that matches this page (e.g., "/login", "/users/:id")
    fn url_pattern(&self) -> &str;

    /// Element displayed once the page is usable
    fn load_indicator(&self) -> Option<By> {
        None
    }

    /// Load timeout in milliseconds (None = scenario open-page timeout)
    fn load_timeout_ms(&self) -> Option<u64> {
        None
    }

    /// Get the page name for logging/debugging
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether the load indicator is displayed
    fn is_loaded(&self, browser: &Rc<WebBrowser>) -> SpotResult<bool> {
        let Some(indicator) = self.load_indicator() else {
            return Ok(true);
        };
        for element in browser.find_elements(&indicator)? {
            if element.is_displayed()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Wait until the page is loaded
    fn wait_for_loading_end(&self, browser: &Rc<WebBrowser>) -> SpotResult<()> {
        let timeout_ms = self
            .load_timeout_ms()
            .unwrap_or(browser.config().open_page_timeout_ms);
        let description = format!("page {} to load", self.page_name());
        let result = browser
            .waiter_for(Some(timeout_ms))
            .until_true(&description, || self.is_loaded(browser))?;
        tracing::info!(
            page = self.page_name(),
            elapsed = %crate::logging::elapsed_label(result.elapsed),
            "page loaded"
        );
        Ok(())
    }

    /// Whether `url` belongs to this page
    fn matches(&self, url: &str) -> bool {
        UrlMatcher::new(self.url_pattern()).is_ok_and(|matcher| matcher.matches(url))
    }
}

/// Page object described by data instead of a dedicated type
#[derive(Debug, Clone)]
pub struct SimplePage {
    name: String,
    url_pattern: String,
    load_indicator: Option<By>,
    load_timeout_ms: Option<u64>,
}

impl SimplePage {
    /// Create a page
    #[must_use]
    pub fn new(name: impl Into<String>, url_pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_pattern: url_pattern.into(),
            load_indicator: None,
            load_timeout_ms: None,
        }
    }

    /// Set the load indicator
    #[must_use]
    pub fn with_load_indicator(mut self, indicator: By) -> Self {
        self.load_indicator = Some(indicator);
        self
    }

    /// Set the load timeout
    #[must_use]
    pub const fn with_load_timeout(mut self, timeout_ms: u64) -> Self {
        self.load_timeout_ms = Some(timeout_ms);
        self
    }
}

impl WebPage for SimplePage {
    fn url_pattern(&self) -> &str {
        &self.url_pattern
    }

    fn load_indicator(&self) -> Option<By> {
        self.load_indicator.clone()
    }

    fn load_timeout_ms(&self) -> Option<u64> {
        self.load_timeout_ms
    }

    fn page_name(&self) -> &str {
        &self.name
    }
}

/// URL pattern matcher for page objects
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: String,
    regex: Regex,
}

impl UrlMatcher {
    /// Create a new URL matcher from a pattern
    ///
    /// Patterns match the path of a url (origin, query and fragment are
    /// ignored) and support:
    /// - Literal segments: `/login`
    /// - Wildcards: `/users/*` (one segment), `/docs/**` (any rest),
    ///   `/files/report-*` (inside a segment)
    /// - Named parameters: `/users/:id`
    pub fn new(pattern: &str) -> SpotResult<Self> {
        let mut source = String::from("^");
        for segment in url_path(pattern).split('/').filter(|s| !s.is_empty()) {
            source.push('/');
            if segment == "**" {
                source.push_str(".*");
            } else if segment == "*" {
                source.push_str("[^/]+");
            } else if let Some(name) = segment.strip_prefix(':') {
                source.push_str(&format!("(?P<{name}>[^/]+)"));
            } else {
                let parts: Vec<String> = segment.split('*').map(regex::escape).collect();
                source.push_str(&parts.join("[^/]*"));
            }
        }
        source.push_str("/?$");

        let regex = Regex::new(&source).map_err(|e| {
            SpotError::config(format!("invalid url pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Pattern text
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern has wildcards or named parameters in its path
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        url_path(&self.pattern)
            .split('/')
            .any(|segment| segment.contains('*') || segment.starts_with(':'))
    }

    /// Check if a URL matches the pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(&url_path(url))
    }

    /// Extract parameters from a URL
    #[must_use]
    pub fn params(&self, url: &str) -> HashMap<String, String> {
        let path = url_path(url);
        let Some(captures) = self.regex.captures(&path) else {
            return HashMap::new();
        };
        self.regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|value| (name.to_string(), value.as_str().to_string()))
            })
            .collect()
    }
}

/// Path of a url, always starting with `/`
fn url_path(url: &str) -> String {
    let path = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map_or("", |start| &rest[start..])
        }
        None => url,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;
    use crate::driver::{MockDriver, MockNode};

    mod url_matcher_tests {
        use super::*;

        #[test]
        fn test_literal() {
            let matcher = UrlMatcher::new("/login").unwrap();
            assert!(matcher.matches("/login"));
            assert!(matcher.matches("http://app.local/login?next=/home"));
            assert!(matcher.matches("https://app.local:8443/login/#top"));
            assert!(!matcher.matches("/login/extra"));
            assert!(!matcher.matches("/logout"));
        }

        #[test]
        fn test_wildcards() {
            let one = UrlMatcher::new("/users/*").unwrap();
            assert!(one.matches("/users/42"));
            assert!(!one.matches("/users/42/edit"));
            assert!(!one.matches("/users"));

            let rest = UrlMatcher::new("/docs/**").unwrap();
            assert!(rest.matches("/docs/a/b/c"));

            let partial = UrlMatcher::new("/files/report-*.pdf").unwrap();
            assert!(partial.matches("/files/report-2024.pdf"));
            assert!(!partial.matches("/files/summary.pdf"));
        }

        #[test]
        fn test_params() {
            let matcher = UrlMatcher::new("/projects/:project/tasks/:task").unwrap();
            let params = matcher.params("http://app.local/projects/spot/tasks/7");
            assert_eq!(params.get("project").map(String::as_str), Some("spot"));
            assert_eq!(params.get("task").map(String::as_str), Some("7"));
            assert!(matcher.params("/projects/spot").is_empty());
        }

        #[test]
        fn test_placeholders_only_in_path() {
            assert!(UrlMatcher::new("/users/:id").unwrap().has_placeholders());
            assert!(UrlMatcher::new("/docs/**").unwrap().has_placeholders());
            assert!(UrlMatcher::new("/files/report-*.pdf").unwrap().has_placeholders());
            assert!(!UrlMatcher::new("/a:b").unwrap().has_placeholders());
            assert!(!UrlMatcher::new("http://app.local:8080/home").unwrap().has_placeholders());
        }

        #[test]
        fn test_absolute_pattern_matches_on_path() {
            let matcher = UrlMatcher::new("http://app.local/home").unwrap();
            assert!(matcher.matches("http://app.local/home"));
            assert!(matcher.matches("/home"));
            assert!(!matcher.matches("http://app.local/other"));
        }

        #[test]
        fn test_invalid_param_name() {
            assert!(matches!(
                UrlMatcher::new("/users/:user-id"),
                Err(SpotError::Config { .. })
            ));
        }

        #[test]
        fn test_root() {
            let matcher = UrlMatcher::new("/").unwrap();
            assert!(matcher.matches("http://app.local"));
            assert!(matcher.matches("http://app.local/"));
            assert!(!matcher.matches("http://app.local/x"));
        }
    }

    mod page_tests {
        use super::*;

        struct Dashboard;

        impl WebPage for Dashboard {
            fn url_pattern(&self) -> &str {
                "/dashboard"
            }
        }

        fn config() -> ScenarioConfig {
            ScenarioConfig::new()
                .with_open_page_timeout(100)
                .with_poll_interval(5)
        }

        #[test]
        fn test_defaults() {
            assert!(Dashboard.page_name().ends_with("Dashboard"));
            assert!(Dashboard.load_indicator().is_none());
            assert!(Dashboard.matches("http://x/dashboard"));
        }

        #[test]
        fn test_wait_for_loading_end() {
            let page = SimplePage::new("Home", "/").with_load_indicator(By::id("ready"));
            let browser = WebBrowser::new(
                MockDriver::with_nodes(vec![MockNode::new("div").id("ready")]),
                config(),
            );
            page.wait_for_loading_end(&browser).unwrap();
        }

        #[test]
        fn test_hidden_indicator_times_out() {
            let page = SimplePage::new("Home", "/")
                .with_load_indicator(By::id("ready"))
                .with_load_timeout(20);
            let browser = WebBrowser::new(
                MockDriver::with_nodes(vec![MockNode::new("div").id("ready").hidden()]),
                config(),
            );
            assert!(matches!(
                page.wait_for_loading_end(&browser),
                Err(SpotError::Timeout { ms: 20, .. })
            ));
        }
    }
}
