//! Locator abstraction for element selection.
//!
//! # Design Philosophy
//!
//! - **Driver-neutral**: a `By` is plain data; drivers decide how to evaluate it
//! - **Templates**: page objects keep `%s` locator patterns and fill them per use
//! - **Safe literals**: text pasted into XPath is always quoted correctly

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy + expression used to find elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum By {
    /// `id` attribute
    Id(String),
    /// `name` attribute
    Name(String),
    /// Single class name
    ClassName(String),
    /// Tag name
    TagName(String),
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath expression
    XPath(String),
    /// Link with exactly this visible text
    LinkText(String),
    /// Link whose visible text contains this text
    PartialLinkText(String),
}

impl By {
    /// Create an id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a name locator
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Create a class name locator
    #[must_use]
    pub fn class_name(class: impl Into<String>) -> Self {
        Self::ClassName(class.into())
    }

    /// Create a tag name locator
    #[must_use]
    pub fn tag_name(tag: impl Into<String>) -> Self {
        Self::TagName(tag.into())
    }

    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath locator
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    /// Create a link text locator
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }

    /// Create a partial link text locator
    #[must_use]
    pub fn partial_link_text(text: impl Into<String>) -> Self {
        Self::PartialLinkText(text.into())
    }

    /// Strategy name as WebDriver spells it
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        match self {
            Self::Id(_) => "id",
            Self::Name(_) => "name",
            Self::ClassName(_) => "class name",
            Self::TagName(_) => "tag name",
            Self::Css(_) => "css selector",
            Self::XPath(_) => "xpath",
            Self::LinkText(_) => "link text",
            Self::PartialLinkText(_) => "partial link text",
        }
    }

    /// Raw expression
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Id(v)
            | Self::Name(v)
            | Self::ClassName(v)
            | Self::TagName(v)
            | Self::Css(v)
            | Self::XPath(v)
            | Self::LinkText(v)
            | Self::PartialLinkText(v) => v,
        }
    }

    /// Check if this is an XPath locator
    #[must_use]
    pub const fn is_xpath(&self) -> bool {
        matches!(self, Self::XPath(_))
    }

    /// Equivalent CSS selector, when the strategy has one
    #[must_use]
    pub fn to_css(&self) -> Option<String> {
        match self {
            Self::Id(id) => Some(format!("#{id}")),
            Self::Name(name) => Some(format!("[name=\"{name}\"]")),
            Self::ClassName(class) => Some(format!(".{class}")),
            Self::TagName(tag) => Some(tag.clone()),
            Self::Css(css) => Some(css.clone()),
            Self::XPath(_) | Self::LinkText(_) | Self::PartialLinkText(_) => None,
        }
    }

    /// Fill successive `%s` placeholders of a locator template.
    ///
    /// Extra placeholders are left untouched; extra arguments are ignored.
    #[must_use]
    pub fn format(&self, args: &[&str]) -> Self {
        let mut filled = String::with_capacity(self.value().len());
        let mut rest = self.value();
        let mut args = args.iter();
        while let Some(pos) = rest.find("%s") {
            let Some(arg) = args.next() else {
                break;
            };
            filled.push_str(&rest[..pos]);
            filled.push_str(arg);
            rest = &rest[pos + 2..];
        }
        filled.push_str(rest);
        self.with_value(filled)
    }

    fn with_value(&self, value: String) -> Self {
        match self {
            Self::Id(_) => Self::Id(value),
            Self::Name(_) => Self::Name(value),
            Self::ClassName(_) => Self::ClassName(value),
            Self::TagName(_) => Self::TagName(value),
            Self::Css(_) => Self::Css(value),
            Self::XPath(_) => Self::XPath(value),
            Self::LinkText(_) => Self::LinkText(value),
            Self::PartialLinkText(_) => Self::PartialLinkText(value),
        }
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Id(_) => "id",
            Self::Name(_) => "name",
            Self::ClassName(_) => "className",
            Self::TagName(_) => "tagName",
            Self::Css(_) => "cssSelector",
            Self::XPath(_) => "xpath",
            Self::LinkText(_) => "linkText",
            Self::PartialLinkText(_) => "partialLinkText",
        };
        write!(f, "By.{kind}: {}", self.value())
    }
}

/// Quote text as an XPath string literal.
///
/// XPath 1.0 has no escape sequences, so text holding both quote kinds is
/// expressed with `concat()`.
#[must_use]
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
