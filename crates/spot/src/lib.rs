//! Spot: typed page-object wrappers for browser-driven UI tests
//!
//! Test authors model pages and widgets (tables, trees, select boxes,
//! frames, selectable elements) as typed objects instead of raw locators.
//! Every wrapper operation is a sequence of driver calls wrapped in polling
//! loops that tolerate re-rendering pages.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  SpotTreeElement  SpotTableElement  SpotSelectElement  ...    │
//! │         │                 │                 │                 │
//! │         └────────► WebElementWrapper ◄──────┘                 │
//! │                           │  (stale → refresh → retry)        │
//! │                      WebBrowser  (selected frame, waits)      │
//! │                           │                                   │
//! │                  dyn WebDriver                                │
//! │          ┌────────────────┴────────────────┐                  │
//! │     MockDriver (in-memory DOM)    ChromiumDriver (CDP)        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use spot_web::{By, MockDriver, ScenarioConfig, SpotTreeElement, TreeLocators, WebBrowser};
//!
//! # fn main() -> spot_web::SpotResult<()> {
//! let browser = WebBrowser::new(MockDriver::new(), ScenarioConfig::default());
//! let tree = SpotTreeElement::new(browser.find_element(&By::id("tree"))?, TreeLocators::default());
//! tree.select_node("/Projects/2024")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod application;
mod browser;
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
mod config;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown,
    clippy::too_many_lines
)]
mod driver;
mod element;
mod frame;
mod locator;
mod logging;
mod page;
mod result;
mod select;
mod selectable;
mod table;
mod tree;
mod wait;

pub use application::{Application, LoginForm, PageVisit, ScenarioSession, User};
pub use browser::{FindOptions, WebBrowser};
pub use config::{
    ScenarioConfig, DEFAULT_OPEN_PAGE_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SHORT_TIMEOUT_MS, DEFAULT_TIMEOUT_MS,
};
#[cfg(feature = "browser")]
pub use driver::{ChromiumConfig, ChromiumDriver};
pub use driver::{ElementId, FrameLocator, MockDom, MockDriver, MockNode, WebDriver};
pub use element::WebElementWrapper;
pub use frame::{FrameKind, WebFrame};
pub use logging::{elapsed_label, init_logging};
pub use locator::{xpath_literal, By};
pub use page::{SimplePage, UrlMatcher, WebPage};
pub use result::{SpotError, SpotResult};
pub use select::SpotSelectElement;
pub use selectable::{SelectionMarker, SpotSelectableElement};
pub use table::{SpotAbstractTableElement, SpotTableElement};
pub use tree::{
    escape_label, ExpansionMarker, PathSegment, SpotTreeElement, SpotTreeNodeElement,
    TreeLocators, TreePath,
};
pub use wait::{WaitOptions, WaitResult, Waiter};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::application::*;
    pub use super::browser::*;
    pub use super::config::*;
    pub use super::element::*;
    pub use super::frame::*;
    pub use super::locator::*;
    pub use super::page::*;
    pub use super::result::*;
    pub use super::select::*;
    pub use super::selectable::*;
    pub use super::table::*;
    pub use super::tree::*;
    pub use super::wait::*;
    pub use super::{ElementId, MockDriver, MockNode, WebDriver};
}
