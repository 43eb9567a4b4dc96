//! WebDriver - Abstract Browser Automation Trait
//!
//! Everything above this module talks to the browser through [`WebDriver`],
//! which keeps the wrappers independent from the automation backend.
//!
//! # Implementations
//!
//! - [`MockDriver`] - in-memory DOM, used by unit and scenario tests
//! - `ChromiumDriver` - CDP via chromiumoxide (feature `browser`)

#[cfg(feature = "browser")]
mod chromium;
mod mock;
mod selector;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumConfig, ChromiumDriver};
pub use mock::{MockDom, MockDriver, MockNode};

use crate::locator::By;
use crate::result::SpotResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle on one DOM element of the current session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    /// Wrap a driver handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw handle
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target of a single frame switch, relative to the current context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLocator {
    /// N-th frame of the current document
    Index(usize),
    /// Frame whose `name` or `id` attribute matches
    Name(String),
    /// Frame element found in the current document
    Element(ElementId),
}

impl fmt::Display for FrameLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "frame[{index}]"),
            Self::Name(name) => write!(f, "frame '{name}'"),
            Self::Element(id) => write!(f, "frame element {id}"),
        }
    }
}

/// Browser automation backend.
///
/// The session is stateful: element lookups without a scope search the
/// document of the frame last switched to. Operations on a handle whose node
/// left the page fail with [`crate::SpotError::StaleElement`].
pub trait WebDriver: fmt::Debug {
    /// Navigate to URL
    fn navigate(&self, url: &str) -> SpotResult<()>;

    /// Get current URL
    fn current_url(&self) -> SpotResult<String>;

    /// Get page title
    fn title(&self) -> SpotResult<String>;

    /// Find all matching elements, below `scope` or in the current document
    fn find_elements(&self, scope: Option<&ElementId>, by: &By) -> SpotResult<Vec<ElementId>>;

    /// Element tag name (lower case)
    fn tag_name(&self, element: &ElementId) -> SpotResult<String>;

    /// Rendered text of the element
    fn text(&self, element: &ElementId) -> SpotResult<String>;

    /// Attribute (or property) value
    fn attribute(&self, element: &ElementId, name: &str) -> SpotResult<Option<String>>;

    /// Whether the element is rendered
    fn is_displayed(&self, element: &ElementId) -> SpotResult<bool>;

    /// Whether the element is enabled
    fn is_enabled(&self, element: &ElementId) -> SpotResult<bool>;

    /// Whether an option, checkbox or radio is selected
    fn is_selected(&self, element: &ElementId) -> SpotResult<bool>;

    /// Click element
    fn click(&self, element: &ElementId) -> SpotResult<()>;

    /// Type text into element
    fn send_keys(&self, element: &ElementId, text: &str) -> SpotResult<()>;

    /// Clear an input element
    fn clear(&self, element: &ElementId) -> SpotResult<()>;

    /// Return to the top document
    fn switch_to_default(&self) -> SpotResult<()>;

    /// Enter a child frame of the current context
    fn switch_to_frame(&self, frame: &FrameLocator) -> SpotResult<()>;

    /// Return to the parent of the current frame
    fn switch_to_parent_frame(&self) -> SpotResult<()>;

    /// Close the browser
    fn quit(&self) -> SpotResult<()>;
}
