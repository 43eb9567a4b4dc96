//! Element wrapper.
//!
//! A [`WebElementWrapper`] remembers how its element was found (parent,
//! locator, position among the matches, frame) so that it can find it again
//! when the page re-renders and the driver reports the handle as stale.

use crate::browser::{FindOptions, WebBrowser};
use crate::driver::{ElementId, WebDriver};
use crate::frame::WebFrame;
use crate::locator::By;
use crate::result::{SpotError, SpotResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Inner {
    browser: Rc<WebBrowser>,
    element: RefCell<ElementId>,
    locator: By,
    index: usize,
    parent: Option<WebElementWrapper>,
    frame: Option<WebFrame>,
}

/// Live reference to one DOM element. Clones share the same handle.
#[derive(Clone)]
pub struct WebElementWrapper {
    inner: Rc<Inner>,
}

impl fmt::Debug for WebElementWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebElementWrapper")
            .field("element", &*self.inner.element.borrow())
            .field("locator", &self.inner.locator)
            .field("index", &self.inner.index)
            .field("frame", &self.inner.frame)
            .finish_non_exhaustive()
    }
}

impl WebElementWrapper {
    pub(crate) fn new(
        browser: Rc<WebBrowser>,
        element: ElementId,
        locator: By,
        index: usize,
        parent: Option<Self>,
        frame: Option<WebFrame>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                browser,
                element: RefCell::new(element),
                locator,
                index,
                parent,
                frame,
            }),
        }
    }

    /// Browser session
    #[must_use]
    pub fn browser(&self) -> &Rc<WebBrowser> {
        &self.inner.browser
    }

    /// Current driver handle
    #[must_use]
    pub fn element_id(&self) -> ElementId {
        self.inner.element.borrow().clone()
    }

    /// Locator this element was found with
    #[must_use]
    pub fn locator(&self) -> &By {
        &self.inner.locator
    }

    /// Position among the elements matching the locator
    #[must_use]
    pub fn index(&self) -> usize {
        self.inner.index
    }

    /// Wrapper the element was searched from (`None` = document)
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// Frame holding the element
    #[must_use]
    pub fn frame(&self) -> Option<&WebFrame> {
        self.inner.frame.as_ref()
    }

    /// Whether both wrappers hold the same driver handle
    #[must_use]
    pub fn same_element(&self, other: &Self) -> bool {
        *self.inner.element.borrow() == *other.inner.element.borrow()
    }

    /// Find the element again from its parent (or the document)
    pub fn refresh(&self) -> SpotResult<()> {
        let found = match self.parent() {
            Some(parent) => parent.with_driver(|driver, scope| {
                driver.find_elements(Some(scope), &self.inner.locator)
            })?,
            None => {
                self.inner
                    .browser
                    .locate(self.frame(), None, &self.inner.locator)?
            }
        };
        let element = found
            .into_iter()
            .nth(self.inner.index)
            .ok_or_else(|| SpotError::ElementNotFound {
                locator: self.inner.locator.to_string(),
            })?;
        tracing::debug!(locator = %self.inner.locator, %element, "re-found stale element");
        *self.inner.element.borrow_mut() = element;
        Ok(())
    }

    /// Run a driver call on this element in its frame.
    ///
    /// A stale handle is refreshed once and the call repeated.
    pub fn with_driver<T>(
        &self,
        call: impl Fn(&dyn WebDriver, &ElementId) -> SpotResult<T>,
    ) -> SpotResult<T> {
        let attempt = || {
            let element = self.element_id();
            self.inner
                .browser
                .with_frame(self.frame(), |driver| call(driver, &element))
        };
        match attempt() {
            Err(e) if e.is_stale() => {
                self.refresh()?;
                attempt()
            }
            result => result,
        }
    }

    fn child(&self, element: ElementId, locator: &By, index: usize) -> Self {
        Self::new(
            Rc::clone(&self.inner.browser),
            element,
            locator.clone(),
            index,
            Some(self.clone()),
            self.inner.frame.clone(),
        )
    }

    // =========================================================================
    // FINDING
    // =========================================================================

    /// All descendants matching `by`, without waiting
    pub fn find_elements(&self, by: &By) -> SpotResult<Vec<Self>> {
        let found = self.with_driver(|driver, scope| driver.find_elements(Some(scope), by))?;
        Ok(found
            .into_iter()
            .enumerate()
            .map(|(index, element)| self.child(element, by, index))
            .collect())
    }

    /// First descendant matching `by`, without waiting
    pub fn find_element(&self, by: &By) -> SpotResult<Self> {
        self.find_elements(by)?
            .into_iter()
            .next()
            .ok_or_else(|| SpotError::ElementNotFound {
                locator: by.to_string(),
            })
    }

    /// First descendant matching `by`, or `None`
    pub fn find_optional(&self, by: &By) -> SpotResult<Option<Self>> {
        Ok(self.find_elements(by)?.into_iter().next())
    }

    /// Wait for a descendant matching `by`
    pub fn wait_for_element(&self, by: &By, options: FindOptions) -> SpotResult<Option<Self>> {
        self.inner
            .browser
            .poll_element(&by.to_string(), options, || self.find_elements(by))
    }

    /// Wait until at least one descendant matches `by`
    pub fn wait_for_elements(&self, by: &By, timeout_ms: Option<u64>) -> SpotResult<Vec<Self>> {
        self.inner
            .browser
            .waiter_for(timeout_ms)
            .until(&by.to_string(), || {
                let found = self.find_elements(by)?;
                Ok((!found.is_empty()).then_some(found))
            })
    }

    /// Wait for a displayed descendant matching `by`; fails on timeout
    pub fn wait_for_mandatory_displayed_element(&self, by: &By) -> SpotResult<Self> {
        self.wait_for_element(by, FindOptions::new())?
            .ok_or_else(|| SpotError::ElementNotFound {
                locator: by.to_string(),
            })
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Rendered text (empty when hidden)
    pub fn text(&self) -> SpotResult<String> {
        self.with_driver(|driver, element| driver.text(element))
    }

    /// Attribute value
    pub fn attribute(&self, name: &str) -> SpotResult<Option<String>> {
        self.with_driver(|driver, element| driver.attribute(element, name))
    }

    /// Whether the class attribute holds `class`
    pub fn has_class(&self, class: &str) -> SpotResult<bool> {
        Ok(self
            .attribute("class")?
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)))
    }

    /// Lower-case tag name
    pub fn tag_name(&self) -> SpotResult<String> {
        self.with_driver(|driver, element| driver.tag_name(element))
    }

    /// Whether the element is rendered
    pub fn is_displayed(&self) -> SpotResult<bool> {
        self.with_driver(|driver, element| driver.is_displayed(element))
    }

    /// Whether the element is enabled
    pub fn is_enabled(&self) -> SpotResult<bool> {
        self.with_driver(|driver, element| driver.is_enabled(element))
    }

    /// Whether the option, checkbox or radio is selected
    pub fn is_selected(&self) -> SpotResult<bool> {
        self.with_driver(|driver, element| driver.is_selected(element))
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Click the element
    pub fn click(&self) -> SpotResult<()> {
        tracing::debug!(locator = %self.inner.locator, "click");
        self.with_driver(|driver, element| driver.click(element))
    }

    /// Type text at the end of the current value
    pub fn send_keys(&self, text: &str) -> SpotResult<()> {
        self.with_driver(|driver, element| driver.send_keys(element, text))
    }

    /// Clear the value
    pub fn clear(&self) -> SpotResult<()> {
        self.with_driver(|driver, element| driver.clear(element))
    }

    /// Replace the value with `text` and check the field took it
    pub fn set_text(&self, text: &str) -> SpotResult<()> {
        tracing::debug!(locator = %self.inner.locator, "set text");
        self.clear()?;
        self.send_keys(text)?;
        let description = format!("{} to hold the typed text", self.inner.locator);
        self.inner
            .browser
            .short_waiter()
            .until_true(&description, || {
                Ok(self.attribute("value")?.as_deref() == Some(text))
            })
            .map(|_| ())
    }

    /// Wait until the element is displayed
    pub fn wait_until_displayed(&self, timeout_ms: Option<u64>) -> SpotResult<()> {
        let description = format!("{} to be displayed", self.inner.locator);
        self.inner
            .browser
            .waiter_for(timeout_ms)
            .until_true(&description, || self.is_displayed())
            .map(|_| ())
    }

    /// Wait until the element is hidden or gone
    pub fn wait_while_displayed(&self, timeout_ms: Option<u64>) -> SpotResult<()> {
        let description = format!("{} to disappear", self.inner.locator);
        self.inner
            .browser
            .waiter_for(timeout_ms)
            .wait_while(&description, || match self.is_displayed() {
                Err(SpotError::ElementNotFound { .. } | SpotError::StaleElement { .. }) => {
                    Ok(false)
                }
                other => other,
            })
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;
    use crate::driver::{MockDriver, MockNode};

    fn config() -> ScenarioConfig {
        ScenarioConfig::new()
            .with_timeout(200)
            .with_short_timeout(50)
            .with_poll_interval(5)
    }

    fn form() -> Vec<MockNode> {
        vec![MockNode::new("form").id("login").children([
            MockNode::new("input").attr("name", "user"),
            MockNode::new("input").attr("name", "pass").hidden(),
            MockNode::new("button").class("primary submit").text("Sign in"),
            MockNode::new("ul").children([
                MockNode::new("li").text("one"),
                MockNode::new("li").text("two"),
                MockNode::new("li").text("three"),
            ]),
        ])]
    }

    mod finding_tests {
        use super::*;

        #[test]
        fn test_scoped_find() {
            let browser = WebBrowser::new(MockDriver::with_nodes(form()), config());
            let login = browser.find_element(&By::id("login")).unwrap();
            let items = login.find_elements(&By::tag_name("li")).unwrap();
            assert_eq!(items.len(), 3);
            assert_eq!(items[2].text().unwrap(), "three");
            assert_eq!(items[2].index(), 2);
            assert!(items[2].parent().is_some());
        }

        #[test]
        fn test_find_element_missing() {
            let browser = WebBrowser::new(MockDriver::with_nodes(form()), config());
            let login = browser.find_element(&By::id("login")).unwrap();
            let err = login.find_element(&By::tag_name("table")).unwrap_err();
            assert!(matches!(err, SpotError::ElementNotFound { .. }));
            assert!(login.find_optional(&By::tag_name("table")).unwrap().is_none());
        }

        #[test]
        fn test_mandatory_displayed_skips_hidden() {
            let browser = WebBrowser::new(MockDriver::with_nodes(form()), config());
            let login = browser.find_element(&By::id("login")).unwrap();
            let err = login
                .wait_for_mandatory_displayed_element(&By::name("pass"))
                .unwrap_err();
            assert!(matches!(err, SpotError::Timeout { .. }));
            let user = login.wait_for_mandatory_displayed_element(&By::name("user")).unwrap();
            assert_eq!(user.tag_name().unwrap(), "input");
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_has_class() {
            let browser = WebBrowser::new(MockDriver::with_nodes(form()), config());
            let button = browser.find_element(&By::tag_name("button")).unwrap();
            assert!(button.has_class("submit").unwrap());
            assert!(!button.has_class("sub").unwrap());
        }

        #[test]
        fn test_set_text_replaces_value() {
            let browser = WebBrowser::new(MockDriver::with_nodes(form()), config());
            let user = browser.find_element(&By::name("user")).unwrap();
            user.send_keys("old").unwrap();
            user.set_text("alice").unwrap();
            assert_eq!(user.attribute("value").unwrap().as_deref(), Some("alice"));
        }

        #[test]
        fn test_wait_while_displayed_on_removed_element() {
            let driver = MockDriver::with_nodes(form());
            let browser = WebBrowser::new(driver.clone(), config());
            let button = browser.find_element(&By::tag_name("button")).unwrap();
            driver.with_dom(|dom| dom.remove(&button.element_id())).unwrap();
            button.wait_while_displayed(Some(50)).unwrap();
        }

        #[test]
        fn test_wait_until_displayed() {
            let driver = MockDriver::with_nodes(form());
            let browser = WebBrowser::new(driver.clone(), config());
            let pass = browser.find_elements(&By::name("pass")).unwrap().remove(0);
            let err = pass.wait_until_displayed(Some(20)).unwrap_err();
            assert!(matches!(err, SpotError::Timeout { ms: 20, .. }));

            let button = browser.find_element(&By::tag_name("button")).unwrap();
            let target = pass.element_id();
            driver
                .on_click(&button.element_id(), move |dom| {
                    let _ = dom.set_hidden(&target, false);
                })
                .unwrap();
            button.click().unwrap();
            pass.wait_until_displayed(None).unwrap();
            assert!(pass.is_displayed().unwrap());
        }
    }

    mod stale_tests {
        use super::*;

        #[test]
        fn test_stale_handle_is_refreshed() {
            let driver = MockDriver::with_nodes(form());
            let browser = WebBrowser::new(driver.clone(), config());
            let button = browser.find_element(&By::tag_name("button")).unwrap();
            let old = button.element_id();
            driver
                .with_dom(|dom| {
                    dom.replace(&old, MockNode::new("button").class("primary").text("Log in"))
                })
                .unwrap();
            assert_eq!(button.text().unwrap(), "Log in");
            assert_ne!(button.element_id(), old);
        }

        #[test]
        fn test_stale_child_refreshes_through_parent() {
            let driver = MockDriver::with_nodes(form());
            let browser = WebBrowser::new(driver.clone(), config());
            let login = browser.find_element(&By::id("login")).unwrap();
            let second = login.find_elements(&By::tag_name("li")).unwrap().remove(1);
            driver
                .with_dom(|dom| dom.replace(&second.element_id(), MockNode::new("li").text("deux")))
                .unwrap();
            assert_eq!(second.text().unwrap(), "deux");
        }

        #[test]
        fn test_removed_element_reports_not_found() {
            let driver = MockDriver::with_nodes(form());
            let browser = WebBrowser::new(driver.clone(), config());
            let button = browser.find_element(&By::tag_name("button")).unwrap();
            driver.with_dom(|dom| dom.remove(&button.element_id())).unwrap();
            assert!(matches!(button.click(), Err(SpotError::ElementNotFound { .. })));
        }
    }
}
