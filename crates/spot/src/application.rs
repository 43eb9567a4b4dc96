//! Application under test, its users, and the per-scenario session
//! bookkeeping (opened pages, logged-in user).

use crate::browser::WebBrowser;
use crate::config::ScenarioConfig;
use crate::page::{UrlMatcher, WebPage};
use crate::result::{SpotError, SpotResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Account used to log into the application
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login id
    pub id: String,
    /// Display name
    pub name: String,
    /// Password
    pub password: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("password", &"********")
            .finish()
    }
}

impl User {
    /// Create a user
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            password: password.into(),
        }
    }

    /// Read `<prefix>.id`, `<prefix>.password` and optionally `<prefix>.name`
    /// (defaults to the id) from the scenario parameters
    pub fn from_config(config: &ScenarioConfig, prefix: &str) -> SpotResult<Self> {
        let id = config.required_parameter(&format!("{prefix}.id"))?;
        let password = config.required_parameter(&format!("{prefix}.password"))?;
        let name = config.parameter_or(&format!("{prefix}.name"), &id);
        Ok(Self { id, name, password })
    }
}

/// Web application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Display name
    pub name: String,
    /// Url every page path is relative to
    pub base_url: String,
    /// Path of the login page, if the application has one
    pub login_path: Option<String>,
}

impl Application {
    /// Create an application
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            login_path: None,
        }
    }

    /// Set the login page path
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    /// Read `<prefix>.url` (falling back to the scenario base url),
    /// `<prefix>.name` and `<prefix>.login` from the scenario parameters
    pub fn from_config(config: &ScenarioConfig, prefix: &str) -> SpotResult<Self> {
        let base_url = match config.parameter(&format!("{prefix}.url")) {
            Some(url) => url,
            None => config.base_url.clone().ok_or_else(|| {
                SpotError::config(format!("missing parameter '{prefix}.url' and no base_url"))
            })?,
        };
        Ok(Self {
            name: config.parameter_or(&format!("{prefix}.name"), prefix),
            base_url,
            login_path: config.parameter(&format!("{prefix}.login")),
        })
    }

    /// Absolute url of `path`
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Application-specific login and logout steps
pub trait LoginForm {
    /// Fill and submit the login form; the login page is already open
    /// when the application declares one
    fn login(&self, browser: &Rc<WebBrowser>, user: &User) -> SpotResult<()>;

    /// Log the current user out
    fn logout(&self, browser: &Rc<WebBrowser>) -> SpotResult<()>;
}

/// One page opened during the scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageVisit {
    /// Page name
    pub name: String,
    /// Url opened
    pub url: String,
}

/// Bookkeeping for one scenario run against one application
#[derive(Debug)]
pub struct ScenarioSession {
    id: Uuid,
    browser: Rc<WebBrowser>,
    application: Application,
    history: Vec<PageVisit>,
    user: Option<User>,
}

impl ScenarioSession {
    /// Start a session
    #[must_use]
    pub fn new(browser: Rc<WebBrowser>, application: Application) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, application = %application.name, "scenario session started");
        Self {
            id,
            browser,
            application,
            history: Vec::new(),
            user: None,
        }
    }

    /// Session id, used to correlate log lines
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Browser of the session
    #[must_use]
    pub const fn browser(&self) -> &Rc<WebBrowser> {
        &self.browser
    }

    /// Application under test
    #[must_use]
    pub const fn application(&self) -> &Application {
        &self.application
    }

    /// Pages opened so far, oldest first
    #[must_use]
    pub fn history(&self) -> &[PageVisit] {
        &self.history
    }

    /// History as JSON, for scenario reports
    pub fn history_json(&self) -> SpotResult<String> {
        Ok(serde_json::to_string_pretty(&self.history)?)
    }

    /// Name of the page opened last
    #[must_use]
    pub fn current_page_name(&self) -> Option<&str> {
        self.history.last().map(|visit| visit.name.as_str())
    }

    /// Logged-in user
    #[must_use]
    pub const fn logged_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Open a page whose url pattern is a plain path
    pub fn open_page<P: WebPage + ?Sized>(&mut self, page: &P) -> SpotResult<()> {
        let pattern = page.url_pattern();
        if UrlMatcher::new(pattern)?.has_placeholders() {
            return Err(SpotError::invalid_state(format!(
                "url pattern '{pattern}' of page {} needs concrete values; use open_page_at",
                page.page_name()
            )));
        }
        self.open_page_at(page, pattern)
    }

    /// Open `path` and check it shows `page`
    pub fn open_page_at<P: WebPage + ?Sized>(&mut self, page: &P, path: &str) -> SpotResult<()> {
        let url = self.application.url(path);
        self.browser.open(&url)?;
        page.wait_for_loading_end(&self.browser)?;
        let current = self.browser.url()?;
        if !page.matches(&current) {
            return Err(SpotError::invalid_state(format!(
                "expected page {} but browser shows {current}",
                page.page_name()
            )));
        }
        tracing::debug!(session = %self.id, page = page.page_name(), %url, "page opened");
        self.history.push(PageVisit {
            name: page.page_name().to_string(),
            url,
        });
        Ok(())
    }

    /// Re-open the page visited before the current one
    pub fn back(&mut self) -> SpotResult<&PageVisit> {
        if self.history.len() < 2 {
            return Err(SpotError::invalid_state("no previous page to go back to"));
        }
        let _ = self.history.pop();
        let previous = self
            .history
            .last()
            .ok_or_else(|| SpotError::invalid_state("no previous page to go back to"))?;
        self.browser.open(&previous.url)?;
        Ok(previous)
    }

    /// Log `user` in, logging out a different user first
    pub fn login(&mut self, user: &User, form: &dyn LoginForm) -> SpotResult<()> {
        if self.user.as_ref().is_some_and(|current| current.id == user.id) {
            tracing::debug!(user = %user.id, "user already logged in");
            return Ok(());
        }
        self.logout(form)?;
        if let Some(path) = &self.application.login_path {
            self.browser.open(&self.application.url(path))?;
        }
        tracing::info!(session = %self.id, user = %user.id, "logging in");
        form.login(&self.browser, user)?;
        self.user = Some(user.clone());
        Ok(())
    }

    /// Log the current user out, if any
    pub fn logout(&mut self, form: &dyn LoginForm) -> SpotResult<()> {
        let Some(user) = self.user.take() else {
            return Ok(());
        };
        tracing::info!(session = %self.id, user = %user.id, "logging out");
        if let Err(e) = form.logout(&self.browser) {
            self.user = Some(user);
            return Err(e);
        }
        Ok(())
    }

    /// Close the browser
    pub fn close(self) -> SpotResult<()> {
        tracing::info!(session = %self.id, pages = self.history.len(), "scenario session closed");
        self.browser.quit()
    }
}
