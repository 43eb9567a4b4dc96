//! Browser session.
//!
//! [`WebBrowser`] owns the driver and remembers which frame the driver is
//! currently switched to. Every wrapper call names the frame it lives in;
//! the browser only talks to the driver about frames when that frame differs
//! from the selected one.
//!
//! ```text
//!        select_frame(F)            select_frame(G)
//!  Top ─────────────────▶ In(F) ──────────────────▶ In(G)
//!   ▲   default + chain F   │   default + chain G
//!   │                       │
//!   └── reset_frame / open / any switch failure ◀──┘
//! ```

use crate::config::ScenarioConfig;
use crate::driver::{ElementId, WebDriver};
use crate::element::WebElementWrapper;
use crate::frame::WebFrame;
use crate::locator::By;
use crate::result::{SpotError, SpotResult};
use crate::wait::{WaitOptions, Waiter};
use std::cell::RefCell;
use std::rc::Rc;

/// How an element lookup waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    /// Timeout override (None = scenario timeout)
    pub timeout_ms: Option<u64>,
    /// Only accept displayed elements
    pub displayed_only: bool,
    /// Fail with a timeout error instead of returning `None`
    pub fail_on_timeout: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            displayed_only: true,
            fail_on_timeout: true,
        }
    }
}

impl FindOptions {
    /// Displayed element, failing on timeout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Accept hidden elements too
    #[must_use]
    pub const fn any_visibility(mut self) -> Self {
        self.displayed_only = false;
        self
    }

    /// Return `None` on timeout
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.fail_on_timeout = false;
        self
    }
}

/// Driver plus scenario settings plus the selected-frame state
#[derive(Debug)]
pub struct WebBrowser {
    driver: Box<dyn WebDriver>,
    config: ScenarioConfig,
    frame: RefCell<Option<WebFrame>>,
}

impl WebBrowser {
    /// Wrap a driver
    #[must_use]
    pub fn new(driver: impl WebDriver + 'static, config: ScenarioConfig) -> Rc<Self> {
        Self::from_boxed(Box::new(driver), config)
    }

    /// Wrap an already boxed driver
    #[must_use]
    pub fn from_boxed(driver: Box<dyn WebDriver>, config: ScenarioConfig) -> Rc<Self> {
        Rc::new(Self {
            driver,
            config,
            frame: RefCell::new(None),
        })
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &dyn WebDriver {
        self.driver.as_ref()
    }

    /// Scenario settings
    #[must_use]
    pub const fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Waiter using the scenario timeout
    #[must_use]
    pub const fn waiter(&self) -> Waiter {
        Waiter::new(WaitOptions::from_config(&self.config))
    }

    /// Waiter using the short scenario timeout
    #[must_use]
    pub const fn short_waiter(&self) -> Waiter {
        Waiter::new(WaitOptions::short(&self.config))
    }

    /// Waiter with an explicit timeout (None = scenario timeout)
    #[must_use]
    pub const fn waiter_for(&self, timeout_ms: Option<u64>) -> Waiter {
        match timeout_ms {
            Some(ms) => Waiter::new(WaitOptions::from_config(&self.config).with_timeout(ms)),
            None => self.waiter(),
        }
    }

    // =========================================================================
    // FRAMES
    // =========================================================================

    /// Frame the driver is switched to (`None` = top document)
    #[must_use]
    pub fn current_frame(&self) -> Option<WebFrame> {
        self.frame.borrow().clone()
    }

    /// Make `frame` the driver's context.
    ///
    /// Nothing is sent to the driver when it is already there. Otherwise the
    /// driver goes back to the top document and walks the frame chain; when a
    /// level cannot be entered the driver is left at the top document.
    pub fn select_frame(&self, frame: Option<&WebFrame>) -> SpotResult<()> {
        if self.frame.borrow().as_ref() == frame {
            return Ok(());
        }
        self.driver.switch_to_default()?;
        *self.frame.borrow_mut() = None;

        let Some(frame) = frame else {
            tracing::debug!("switched to top document");
            return Ok(());
        };
        match frame.switch_to(self.driver()) {
            Ok(()) => {
                tracing::debug!(%frame, "switched to frame");
                *self.frame.borrow_mut() = Some(frame.clone());
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%frame, error = %e, "frame switch failed, back to top document");
                if let Err(reset) = self.driver.switch_to_default() {
                    tracing::warn!(error = %reset, "could not return to top document");
                }
                Err(e)
            }
        }
    }

    /// Go back to the top document
    pub fn reset_frame(&self) -> SpotResult<()> {
        self.select_frame(None)
    }

    /// Run a driver call with `frame` selected.
    ///
    /// When the selected frame was detached (its iframe re-rendered), the
    /// frame chain is entered again and the call repeated once.
    pub fn with_frame<T>(
        &self,
        frame: Option<&WebFrame>,
        call: impl Fn(&dyn WebDriver) -> SpotResult<T>,
    ) -> SpotResult<T> {
        self.select_frame(frame)?;
        match call(self.driver()) {
            Err(SpotError::FrameNotFound { message, .. }) if frame.is_some() => {
                tracing::debug!(frame = ?frame, %message, "frame detached, entering it again");
                *self.frame.borrow_mut() = None;
                self.select_frame(frame)?;
                call(self.driver())
            }
            result => result,
        }
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Resolve `url` against the configured base url
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") {
            return url.to_string();
        }
        match self.config.base_url.as_deref() {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }

    /// Navigate the top document; the frame selection is reset
    pub fn open(&self, url: &str) -> SpotResult<()> {
        let url = self.resolve_url(url);
        tracing::info!(%url, "opening page");
        *self.frame.borrow_mut() = None;
        self.driver.navigate(&url)
    }

    /// Current url
    pub fn url(&self) -> SpotResult<String> {
        self.driver.current_url()
    }

    /// Title of the top document
    pub fn title(&self) -> SpotResult<String> {
        self.driver.title()
    }

    /// Close the browser
    pub fn quit(&self) -> SpotResult<()> {
        *self.frame.borrow_mut() = None;
        self.driver.quit()
    }

    // =========================================================================
    // FINDING
    // =========================================================================

    /// Raw lookup in `frame`, below `scope` when given
    pub(crate) fn locate(
        &self,
        frame: Option<&WebFrame>,
        scope: Option<&ElementId>,
        by: &By,
    ) -> SpotResult<Vec<ElementId>> {
        self.with_frame(frame, |driver| driver.find_elements(scope, by))
    }

    /// First element matching `by` in the top document, without waiting
    pub fn find_element(self: &Rc<Self>, by: &By) -> SpotResult<WebElementWrapper> {
        self.find_element_in(None, by)
    }

    /// First element matching `by` in `frame`, without waiting
    pub fn find_element_in(
        self: &Rc<Self>,
        frame: Option<&WebFrame>,
        by: &By,
    ) -> SpotResult<WebElementWrapper> {
        self.find_elements_in(frame, by)?
            .into_iter()
            .next()
            .ok_or_else(|| SpotError::ElementNotFound {
                locator: by.to_string(),
            })
    }

    /// All elements matching `by` in the top document
    pub fn find_elements(self: &Rc<Self>, by: &By) -> SpotResult<Vec<WebElementWrapper>> {
        self.find_elements_in(None, by)
    }

    /// All elements matching `by` in `frame`
    pub fn find_elements_in(
        self: &Rc<Self>,
        frame: Option<&WebFrame>,
        by: &By,
    ) -> SpotResult<Vec<WebElementWrapper>> {
        let found = self.locate(frame, None, by)?;
        Ok(found
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                WebElementWrapper::new(Rc::clone(self), id, by.clone(), index, None, frame.cloned())
            })
            .collect())
    }

    /// Wait for an element in the top document
    pub fn wait_for_element(
        self: &Rc<Self>,
        by: &By,
        options: FindOptions,
    ) -> SpotResult<Option<WebElementWrapper>> {
        self.wait_for_element_in(None, by, options)
    }

    /// Wait for an element in `frame`
    pub fn wait_for_element_in(
        self: &Rc<Self>,
        frame: Option<&WebFrame>,
        by: &By,
        options: FindOptions,
    ) -> SpotResult<Option<WebElementWrapper>> {
        self.poll_element(&by.to_string(), options, || self.find_elements_in(frame, by))
    }

    /// Wait until at least one element matches `by` in `frame`
    pub fn wait_for_elements(
        self: &Rc<Self>,
        frame: Option<&WebFrame>,
        by: &By,
        timeout_ms: Option<u64>,
    ) -> SpotResult<Vec<WebElementWrapper>> {
        self.waiter_for(timeout_ms).until(&by.to_string(), || {
            let found = self.find_elements_in(frame, by)?;
            Ok((!found.is_empty()).then_some(found))
        })
    }

    /// Wait until no displayed element matches `by` in `frame`
    pub fn wait_while_displayed(
        self: &Rc<Self>,
        frame: Option<&WebFrame>,
        by: &By,
        timeout_ms: Option<u64>,
    ) -> SpotResult<()> {
        let description = format!("{by} to disappear");
        self.waiter_for(timeout_ms).wait_while(&description, || {
            for element in self.find_elements_in(frame, by)? {
                match element.is_displayed() {
                    Ok(true) => return Ok(true),
                    Ok(false) => {}
                    Err(e) if e.is_retryable() => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(false)
        })?;
        Ok(())
    }

    /// Wait for a displayed element matching `by` whose text contains `text`
    pub fn wait_for_text(
        self: &Rc<Self>,
        frame: Option<&WebFrame>,
        by: &By,
        text: &str,
        timeout_ms: Option<u64>,
    ) -> SpotResult<WebElementWrapper> {
        let description = format!("{by} with text '{text}'");
        self.waiter_for(timeout_ms).until(&description, || {
            for element in self.find_elements_in(frame, by)? {
                if element.text()?.contains(text) {
                    return Ok(Some(element));
                }
            }
            Ok(None)
        })
    }

    /// Poll `find` until it yields an acceptable element
    pub(crate) fn poll_element(
        &self,
        description: &str,
        options: FindOptions,
        mut find: impl FnMut() -> SpotResult<Vec<WebElementWrapper>>,
    ) -> SpotResult<Option<WebElementWrapper>> {
        let found = self.waiter_for(options.timeout_ms).until(description, || {
            for element in find()? {
                if !options.displayed_only || element.is_displayed()? {
                    return Ok(Some(element));
                }
            }
            Ok(None)
        });
        match found {
            Ok(element) => Ok(Some(element)),
            Err(SpotError::Timeout { .. }) if !options.fail_on_timeout => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockNode};

    fn config() -> ScenarioConfig {
        ScenarioConfig::new()
            .with_timeout(200)
            .with_short_timeout(50)
            .with_poll_interval(5)
    }

    fn framed_page() -> Vec<MockNode> {
        vec![
            MockNode::new("p").id("top").text("Top"),
            MockNode::iframe(
                "outer",
                vec![
                    MockNode::new("p").id("outer-text").text("Outer"),
                    MockNode::iframe("inner", vec![MockNode::new("p").id("inner-text").text("Inner")]),
                ],
            ),
        ]
    }

    mod frame_state_tests {
        use super::*;

        #[test]
        fn test_select_same_frame_is_noop() {
            let driver = MockDriver::with_nodes(framed_page());
            let browser = WebBrowser::new(driver.clone(), config());
            let outer = WebFrame::named("outer");
            browser.select_frame(Some(&outer)).unwrap();
            browser.select_frame(Some(&outer)).unwrap();
            assert_eq!(driver.call_count("switch_to_frame"), 1);
            assert_eq!(driver.call_count("switch_to_default"), 1);
        }

        #[test]
        fn test_switch_between_nested_frames() {
            let browser = WebBrowser::new(MockDriver::with_nodes(framed_page()), config());
            let outer = WebFrame::named("outer");
            let inner = WebFrame::named("inner").within(outer.clone());

            let text = browser.find_element_in(Some(&inner), &By::id("inner-text")).unwrap();
            assert_eq!(text.text().unwrap(), "Inner");
            assert_eq!(browser.current_frame(), Some(inner));

            let text = browser.find_element_in(Some(&outer), &By::id("outer-text")).unwrap();
            assert_eq!(text.text().unwrap(), "Outer");
            assert_eq!(browser.current_frame(), Some(outer));

            let top = browser.find_element(&By::id("top")).unwrap();
            assert_eq!(top.text().unwrap(), "Top");
            assert_eq!(browser.current_frame(), None);
        }

        #[test]
        fn test_failed_switch_resets_to_top() {
            let browser = WebBrowser::new(MockDriver::with_nodes(framed_page()), config());
            browser.select_frame(Some(&WebFrame::named("outer"))).unwrap();
            let missing = WebFrame::named("missing").within(WebFrame::named("outer"));
            let err = browser.select_frame(Some(&missing)).unwrap_err();
            assert!(matches!(err, SpotError::FrameNotFound { .. }));
            assert_eq!(browser.current_frame(), None);
            assert!(browser.find_element(&By::id("top")).is_ok());
        }

        #[test]
        fn test_element_in_other_frame_follows_its_frame() {
            let browser = WebBrowser::new(MockDriver::with_nodes(framed_page()), config());
            let outer = WebFrame::named("outer");
            let outer_text = browser.find_element_in(Some(&outer), &By::id("outer-text")).unwrap();
            let top = browser.find_element(&By::id("top")).unwrap();
            assert_eq!(outer_text.text().unwrap(), "Outer");
            assert_eq!(top.text().unwrap(), "Top");
        }

        #[test]
        fn test_rerendered_iframe_is_entered_again() {
            let driver = MockDriver::with_nodes(vec![
                MockNode::iframe("f", vec![MockNode::new("p").id("x").text("One")]).id("frm"),
            ]);
            let browser = WebBrowser::new(driver.clone(), config());
            let frame = WebFrame::embedded(By::id("frm"));
            let first = browser.find_element_in(Some(&frame), &By::id("x")).unwrap();
            assert_eq!(first.text().unwrap(), "One");

            let old = driver.find_first(&By::id("frm")).unwrap();
            driver
                .with_dom(|dom| {
                    dom.replace(
                        &old,
                        MockNode::iframe("f", vec![MockNode::new("p").id("x").text("Two")]).id("frm"),
                    )
                })
                .unwrap();

            let again = browser.find_element_in(Some(&frame), &By::id("x")).unwrap();
            assert_eq!(again.text().unwrap(), "Two");
            assert_eq!(browser.current_frame(), Some(frame));
            assert_eq!(first.text().unwrap(), "Two");
        }

        #[test]
        fn test_wait_polls_until_frame_appears() {
            let driver = MockDriver::with_nodes(vec![
                MockNode::new("div").id("host").child(MockNode::new("button").id("load")),
            ]);
            let button = driver.find_first(&By::id("load")).unwrap();
            let host = driver.find_first(&By::id("host")).unwrap();
            driver
                .on_click(&button, move |dom| {
                    let _ = dom.append(
                        &host,
                        MockNode::iframe("late", vec![MockNode::new("p").id("x").text("Late")]),
                    );
                })
                .unwrap();
            let browser = WebBrowser::new(driver, config());
            let frame = WebFrame::named("late");
            let err = browser
                .wait_for_element_in(Some(&frame), &By::id("x"), FindOptions::new().with_timeout(20))
                .unwrap_err();
            assert!(matches!(err, SpotError::Timeout { ms: 20, .. }));

            browser.find_element(&By::id("load")).unwrap().click().unwrap();
            let found = browser
                .wait_for_element_in(Some(&frame), &By::id("x"), FindOptions::new())
                .unwrap()
                .unwrap();
            assert_eq!(found.text().unwrap(), "Late");
        }
    }

    mod navigation_tests {
        use super::*;

        #[test]
        fn test_resolve_url() {
            let browser = WebBrowser::new(
                MockDriver::new(),
                config().with_base_url("http://app.local/"),
            );
            assert_eq!(browser.resolve_url("/login"), "http://app.local/login");
            assert_eq!(browser.resolve_url("https://other/x"), "https://other/x");
            let bare = WebBrowser::new(MockDriver::new(), config());
            assert_eq!(bare.resolve_url("/login"), "/login");
        }

        #[test]
        fn test_open_resets_frame() {
            let driver = MockDriver::with_nodes(framed_page());
            driver.add_page("http://app.local/next", vec![MockNode::new("title").text("Next")]);
            let browser = WebBrowser::new(driver, config().with_base_url("http://app.local"));
            browser.select_frame(Some(&WebFrame::named("outer"))).unwrap();
            browser.open("next").unwrap();
            assert_eq!(browser.current_frame(), None);
            assert_eq!(browser.url().unwrap(), "http://app.local/next");
            assert_eq!(browser.title().unwrap(), "Next");
        }
    }

    mod wait_tests {
        use super::*;

        #[test]
        fn test_wait_for_hidden_element_times_out() {
            let browser = WebBrowser::new(
                MockDriver::with_nodes(vec![MockNode::new("div").id("spinner").hidden()]),
                config(),
            );
            let err = browser
                .wait_for_element(&By::id("spinner"), FindOptions::new().with_timeout(20))
                .unwrap_err();
            assert!(matches!(err, SpotError::Timeout { ms: 20, .. }));
        }

        #[test]
        fn test_optional_wait_returns_none() {
            let browser = WebBrowser::new(MockDriver::new(), config());
            let found = browser
                .wait_for_element(&By::id("nope"), FindOptions::new().with_timeout(20).optional())
                .unwrap();
            assert!(found.is_none());
        }

        #[test]
        fn test_any_visibility_accepts_hidden() {
            let browser = WebBrowser::new(
                MockDriver::with_nodes(vec![MockNode::new("div").id("spinner").hidden()]),
                config(),
            );
            let found = browser
                .wait_for_element(&By::id("spinner"), FindOptions::new().any_visibility())
                .unwrap();
            assert!(found.is_some());
        }

        #[test]
        fn test_wait_while_displayed() {
            let browser = WebBrowser::new(
                MockDriver::with_nodes(vec![MockNode::new("div").id("spinner").hidden()]),
                config(),
            );
            browser.wait_while_displayed(None, &By::id("spinner"), None).unwrap();
        }

        #[test]
        fn test_wait_for_text() {
            let browser = WebBrowser::new(
                MockDriver::with_nodes(vec![
                    MockNode::new("li").text("Alpha"),
                    MockNode::new("li").text("Beta"),
                ]),
                config(),
            );
            let beta = browser.wait_for_text(None, &By::tag_name("li"), "Bet", None).unwrap();
            assert_eq!(beta.text().unwrap(), "Beta");
            assert!(browser.wait_for_text(None, &By::tag_name("li"), "Gamma", Some(20)).is_err());
        }

        #[test]
        fn test_wait_for_elements_returns_all_matches() {
            let browser = WebBrowser::new(
                MockDriver::with_nodes(vec![
                    MockNode::new("li").text("Alpha"),
                    MockNode::new("li").text("Beta").hidden(),
                ]),
                config(),
            );
            let items = browser.wait_for_elements(None, &By::tag_name("li"), None).unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].text().unwrap(), "Alpha");
            assert!(!items[1].is_displayed().unwrap());
            assert_eq!(items[1].index(), 1);

            let err = browser
                .wait_for_elements(None, &By::tag_name("tr"), Some(20))
                .unwrap_err();
            assert!(matches!(err, SpotError::Timeout { ms: 20, .. }));
        }
    }
}
