//! Frame identities.
//!
//! A [`WebFrame`] names one level of iframe nesting relative to its parent
//! frame (or the top document). Frames are plain values: the browser keeps
//! track of which one is currently selected and walks [`WebFrame::chain`]
//! from the top document whenever a different frame must be entered.

use crate::driver::{FrameLocator, WebDriver};
use crate::locator::By;
use crate::result::{SpotError, SpotResult};
use std::fmt;

/// How a frame is identified inside its parent document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// N-th frame of the parent document
    Indexed(usize),
    /// Frame with this `name` (or `id`)
    Named(String),
    /// Frame element found with a locator in the parent document
    Embedded(By),
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indexed(index) => write!(f, "frame[{index}]"),
            Self::Named(name) => write!(f, "frame '{name}'"),
            Self::Embedded(by) => write!(f, "frame <{by}>"),
        }
    }
}

/// One level of iframe nesting, with its ancestors.
///
/// Two frames are equal when their identity and their whole parent chain are.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebFrame {
    kind: FrameKind,
    parent: Option<Box<WebFrame>>,
}

impl WebFrame {
    /// Frame at `index` in the top document
    #[must_use]
    pub const fn indexed(index: usize) -> Self {
        Self {
            kind: FrameKind::Indexed(index),
            parent: None,
        }
    }

    /// Frame named `name` in the top document
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Named(name.into()),
            parent: None,
        }
    }

    /// Frame whose element matches `locator` in the top document
    #[must_use]
    pub const fn embedded(locator: By) -> Self {
        Self {
            kind: FrameKind::Embedded(locator),
            parent: None,
        }
    }

    /// Nest this frame inside `parent`
    #[must_use]
    pub fn within(mut self, parent: Self) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Identity inside the parent document
    #[must_use]
    pub const fn kind(&self) -> &FrameKind {
        &self.kind
    }

    /// Enclosing frame, `None` for frames of the top document
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.parent.as_deref()
    }

    /// Nesting level (1 for frames of the top document)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.parent().map_or(1, |parent| parent.depth() + 1)
    }

    /// Frames to enter from the top document, outermost first
    #[must_use]
    pub fn chain(&self) -> Vec<&Self> {
        let mut chain = Vec::with_capacity(self.depth());
        let mut current = Some(self);
        while let Some(frame) = current {
            chain.push(frame);
            current = frame.parent();
        }
        chain.reverse();
        chain
    }

    /// Whether `self` is `other` or nested somewhere inside it
    #[must_use]
    pub fn is_within(&self, other: &Self) -> bool {
        self == other || self.parent().is_some_and(|parent| parent.is_within(other))
    }

    /// Enter this frame, assuming the driver is at the top document
    pub fn switch_to(&self, driver: &dyn WebDriver) -> SpotResult<()> {
        for frame in self.chain() {
            frame.enter(driver)?;
        }
        Ok(())
    }

    /// Enter this single level from its parent's context
    fn enter(&self, driver: &dyn WebDriver) -> SpotResult<()> {
        tracing::trace!(frame = %self.kind, "entering frame");
        let locator = match &self.kind {
            FrameKind::Indexed(index) => FrameLocator::Index(*index),
            FrameKind::Named(name) => FrameLocator::Name(name.clone()),
            FrameKind::Embedded(by) => {
                let element = driver
                    .find_elements(None, by)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| SpotError::FrameNotFound {
                        frame: self.to_string(),
                        message: format!("no frame element for {by}"),
                    })?;
                FrameLocator::Element(element)
            }
        };
        driver.switch_to_frame(&locator)
    }
}

impl fmt::Display for WebFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent} > ")?;
        }
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockNode};

    fn nested_page() -> MockDriver {
        MockDriver::with_nodes(vec![
            MockNode::new("h1").text("Top"),
            MockNode::iframe(
                "outer",
                vec![
                    MockNode::new("p").id("outer-text").text("Outer"),
                    MockNode::iframe("inner", vec![MockNode::new("p").id("inner-text").text("Inner")])
                        .class("inner-frame"),
                ],
            ),
        ])
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn test_equality_includes_parent() {
            let a = WebFrame::named("inner").within(WebFrame::named("outer"));
            let b = WebFrame::named("inner").within(WebFrame::named("outer"));
            let c = WebFrame::named("inner");
            assert_eq!(a, b);
            assert_ne!(a, c);
            assert_ne!(WebFrame::indexed(0), WebFrame::named("0"));
        }

        #[test]
        fn test_chain_is_top_down() {
            let frame = WebFrame::indexed(1)
                .within(WebFrame::named("b").within(WebFrame::named("a")));
            let kinds: Vec<String> = frame.chain().iter().map(|f| f.kind().to_string()).collect();
            assert_eq!(kinds, vec!["frame 'a'", "frame 'b'", "frame[1]"]);
            assert_eq!(frame.depth(), 3);
        }

        #[test]
        fn test_is_within() {
            let outer = WebFrame::named("outer");
            let inner = WebFrame::named("inner").within(outer.clone());
            assert!(inner.is_within(&outer));
            assert!(inner.is_within(&inner));
            assert!(!outer.is_within(&inner));
        }

        #[test]
        fn test_display() {
            let frame = WebFrame::embedded(By::css(".inner-frame")).within(WebFrame::indexed(0));
            assert_eq!(frame.to_string(), "frame[0] > frame <By.cssSelector: .inner-frame>");
        }
    }

    mod switch_tests {
        use super::*;

        #[test]
        fn test_switch_named_chain() {
            let driver = nested_page();
            let frame = WebFrame::named("inner").within(WebFrame::named("outer"));
            frame.switch_to(&driver).unwrap();
            assert_eq!(driver.frame_depth(), 2);
            let found = driver.find_elements(None, &By::id("inner-text")).unwrap();
            assert_eq!(driver.text(&found[0]).unwrap(), "Inner");
        }

        #[test]
        fn test_switch_embedded() {
            let driver = nested_page();
            let frame = WebFrame::embedded(By::css("iframe.inner-frame")).within(WebFrame::indexed(0));
            frame.switch_to(&driver).unwrap();
            assert_eq!(driver.frame_depth(), 2);
        }

        #[test]
        fn test_missing_embedded_frame() {
            let driver = nested_page();
            let err = WebFrame::embedded(By::id("nope")).switch_to(&driver).unwrap_err();
            assert!(matches!(err, SpotError::FrameNotFound { .. }));
        }
    }
}
