//! Elements with an on/off selection state (checkboxes, list entries,
//! tree rows, toggle buttons).

use crate::element::WebElementWrapper;
use crate::result::SpotResult;

/// Where the selection state of an element shows up in the DOM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMarker {
    /// The driver's own notion (options, checkboxes, radios)
    Native,
    /// An attribute with a given value, e.g. `aria-selected="true"`
    Attribute {
        /// Attribute name
        name: String,
        /// Value meaning "selected"
        value: String,
    },
    /// A class on the element, e.g. `selected`
    ClassContains(String),
}

impl SelectionMarker {
    /// `aria-selected="true"`
    #[must_use]
    pub fn aria_selected() -> Self {
        Self::Attribute {
            name: "aria-selected".to_string(),
            value: "true".to_string(),
        }
    }

    /// Read the marker on `element`
    pub fn is_set(&self, element: &WebElementWrapper) -> SpotResult<bool> {
        match self {
            Self::Native => element.is_selected(),
            Self::Attribute { name, value } => {
                Ok(element.attribute(name)?.as_deref() == Some(value.as_str()))
            }
            Self::ClassContains(class) => element.has_class(class),
        }
    }
}

/// Element that is selected by clicking it
#[derive(Debug, Clone)]
pub struct SpotSelectableElement {
    wrapper: WebElementWrapper,
    marker: SelectionMarker,
}

impl SpotSelectableElement {
    /// Wrap an element
    #[must_use]
    pub const fn new(wrapper: WebElementWrapper, marker: SelectionMarker) -> Self {
        Self { wrapper, marker }
    }

    /// Wrapped element
    #[must_use]
    pub const fn wrapper(&self) -> &WebElementWrapper {
        &self.wrapper
    }

    /// Marker used to read the state
    #[must_use]
    pub const fn marker(&self) -> &SelectionMarker {
        &self.marker
    }

    /// Current selection state
    pub fn is_selected(&self) -> SpotResult<bool> {
        self.marker.is_set(&self.wrapper)
    }

    /// Select the element; no click when it already is
    pub fn select(&self) -> SpotResult<()> {
        self.set_selected(true)
    }

    /// Deselect the element; no click when it already is
    pub fn deselect(&self) -> SpotResult<()> {
        self.set_selected(false)
    }

    /// Flip the state and return the new one
    pub fn toggle(&self) -> SpotResult<bool> {
        let target = !self.is_selected()?;
        self.click_until(target)?;
        Ok(target)
    }

    fn set_selected(&self, selected: bool) -> SpotResult<()> {
        if self.is_selected()? == selected {
            return Ok(());
        }
        self.click_until(selected)
    }

    fn click_until(&self, selected: bool) -> SpotResult<()> {
        tracing::debug!(locator = %self.wrapper.locator(), selected, "changing selection");
        self.wrapper.click()?;
        let description = format!(
            "{} to become {}",
            self.wrapper.locator(),
            if selected { "selected" } else { "unselected" }
        );
        self.wrapper
            .browser()
            .short_waiter()
            .until_true(&description, || Ok(self.is_selected()? == selected))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::WebBrowser;
    use crate::config::ScenarioConfig;
    use crate::driver::{MockDriver, MockNode};
    use crate::locator::By;
    use crate::result::SpotError;

    fn config() -> ScenarioConfig {
        ScenarioConfig::new()
            .with_timeout(200)
            .with_short_timeout(40)
            .with_poll_interval(5)
    }

    #[test]
    fn test_native_checkbox() {
        let browser = WebBrowser::new(
            MockDriver::with_nodes(vec![MockNode::new("input")
                .id("agree")
                .attr("type", "checkbox")]),
            config(),
        );
        let checkbox = SpotSelectableElement::new(
            browser.find_element(&By::id("agree")).unwrap(),
            SelectionMarker::Native,
        );
        assert!(!checkbox.is_selected().unwrap());
        checkbox.select().unwrap();
        assert!(checkbox.is_selected().unwrap());
        checkbox.select().unwrap();
        assert!(checkbox.is_selected().unwrap());
        assert!(!checkbox.toggle().unwrap());
        assert!(!checkbox.is_selected().unwrap());
    }

    #[test]
    fn test_class_marker_with_scripted_page() {
        let driver = MockDriver::with_nodes(vec![MockNode::new("li").id("entry").class("item")]);
        let entry = driver.find_first(&By::id("entry")).unwrap();
        let target = entry.clone();
        driver
            .on_click(&entry, move |dom| {
                let _ = dom.set_attribute(&target, "class", Some("item selected"));
            })
            .unwrap();
        let browser = WebBrowser::new(driver, config());
        let item = SpotSelectableElement::new(
            browser.find_element(&By::id("entry")).unwrap(),
            SelectionMarker::ClassContains("selected".to_string()),
        );
        item.select().unwrap();
        assert!(item.is_selected().unwrap());
    }

    #[test]
    fn test_attribute_marker_that_never_changes_times_out() {
        let browser = WebBrowser::new(
            MockDriver::with_nodes(vec![MockNode::new("div")
                .id("tab")
                .attr("aria-selected", "false")]),
            config(),
        );
        let tab = SpotSelectableElement::new(
            browser.find_element(&By::id("tab")).unwrap(),
            SelectionMarker::aria_selected(),
        );
        assert!(matches!(tab.select(), Err(SpotError::Timeout { .. })));
    }
}
