//! Trees.
//!
//! A tree is described by [`TreeLocators`]: how to find the nodes of a
//! container, and inside a node its row, label, expand toggle, child
//! container and selectable part. The tree element itself is the container
//! of the top-level nodes.
//!
//! Nodes are addressed by paths made of labels:
//!
//! ```text
//! /Projects/2024/Q1     absolute, from the top-level nodes
//! Q1/Reports            relative, from the node the search starts at
//! ../Q2                 `..` is the parent node, `.` and empty segments are skipped
//! /Shared/a\/b          `\/` is a slash inside a label, `\\` a backslash
//! ```
//!
//! Node paths are computed once from the ancestor chain and never change.
//! Children are read from the page on every traversal; only the node's own
//! sub-elements (row, toggle, container, selectable) and its label are
//! cached, and [`SpotTreeNodeElement::invalidate`] drops them.

use crate::browser::FindOptions;
use crate::element::WebElementWrapper;
use crate::locator::By;
use crate::result::{SpotError, SpotResult};
use crate::selectable::{SelectionMarker, SpotSelectableElement};
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

// =============================================================================
// PATHS
// =============================================================================

/// One step of a tree path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Child with this label
    Label(String),
    /// Parent node (`..`)
    Parent,
}

/// Parsed tree path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePath {
    /// Starts at the top-level nodes
    pub absolute: bool,
    /// Steps, with `.` and empty segments removed
    pub segments: Vec<PathSegment>,
}

impl TreePath {
    /// Parse a path
    pub fn parse(path: &str) -> SpotResult<Self> {
        let invalid = |message: &str| SpotError::InvalidPath {
            path: path.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        let mut chars = path.chars();
        loop {
            match chars.next() {
                Some('\\') => match chars.next() {
                    Some(c @ ('/' | '\\')) => {
                        current.push(c);
                        escaped = true;
                    }
                    Some(c) => return Err(invalid(&format!("invalid escape '\\{c}'"))),
                    None => return Err(invalid("dangling '\\' at end of path")),
                },
                Some('/') => {
                    Self::push_segment(&mut segments, &mut current, escaped);
                    escaped = false;
                }
                Some(c) => current.push(c),
                None => {
                    Self::push_segment(&mut segments, &mut current, escaped);
                    break;
                }
            }
        }

        Ok(Self {
            absolute: path.starts_with('/'),
            segments,
        })
    }

    fn push_segment(segments: &mut Vec<PathSegment>, current: &mut String, escaped: bool) {
        let segment = std::mem::take(current);
        match segment.as_str() {
            "" | "." if !escaped => {}
            ".." if !escaped => segments.push(PathSegment::Parent),
            _ => segments.push(PathSegment::Label(segment)),
        }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match segment {
                PathSegment::Label(label) => f.write_str(&escape_label(label))?,
                PathSegment::Parent => f.write_str("..")?,
            }
        }
        Ok(())
    }
}

/// Escape a label for use as a path segment
#[must_use]
pub fn escape_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('/', "\\/")
}

// =============================================================================
// LOCATORS
// =============================================================================

/// Where a node shows that it is expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionMarker {
    /// The child container exists and is displayed
    ContainerDisplayed,
    /// An attribute of the node, e.g. `aria-expanded="true"`
    Attribute {
        /// Attribute name
        name: String,
        /// Value meaning "expanded"
        value: String,
    },
    /// A class of the node
    ClassContains(String),
}

/// Locators describing the markup of a tree
#[derive(Debug, Clone)]
pub struct TreeLocators {
    /// Nodes, relative to a container (the tree element or a node's container)
    pub node: By,
    /// Row, relative to a node
    pub row: By,
    /// Label, relative to the row
    pub label: By,
    /// Expand/collapse toggle, relative to the row
    pub expandable: By,
    /// Child container, relative to a node
    pub container: By,
    /// Clickable part used for selection, relative to the row
    pub selectable: By,
    /// How expansion is read
    pub expansion: ExpansionMarker,
    /// How selection is read on the selectable part
    pub selection: SelectionMarker,
}

impl Default for TreeLocators {
    /// Nested lists: `li > div.row > (span.toggle, span.label)` and `li > ul`
    fn default() -> Self {
        Self {
            node: By::xpath("./li"),
            row: By::xpath("./div"),
            label: By::css(".label"),
            expandable: By::css(".toggle"),
            container: By::xpath("./ul"),
            selectable: By::css(".label"),
            expansion: ExpansionMarker::ContainerDisplayed,
            selection: SelectionMarker::ClassContains("selected".to_string()),
        }
    }
}

impl TreeLocators {
    /// Set the node locator
    #[must_use]
    pub fn with_node(mut self, node: By) -> Self {
        self.node = node;
        self
    }

    /// Set the row locator
    #[must_use]
    pub fn with_row(mut self, row: By) -> Self {
        self.row = row;
        self
    }

    /// Set the label locator
    #[must_use]
    pub fn with_label(mut self, label: By) -> Self {
        self.label = label;
        self
    }

    /// Set the toggle locator
    #[must_use]
    pub fn with_expandable(mut self, expandable: By) -> Self {
        self.expandable = expandable;
        self
    }

    /// Set the child container locator
    #[must_use]
    pub fn with_container(mut self, container: By) -> Self {
        self.container = container;
        self
    }

    /// Set the selectable locator
    #[must_use]
    pub fn with_selectable(mut self, selectable: By) -> Self {
        self.selectable = selectable;
        self
    }

    /// Set the expansion marker
    #[must_use]
    pub fn with_expansion(mut self, expansion: ExpansionMarker) -> Self {
        self.expansion = expansion;
        self
    }

    /// Set the selection marker
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionMarker) -> Self {
        self.selection = selection;
        self
    }
}

#[derive(Debug)]
struct TreeContext {
    root: WebElementWrapper,
    locators: TreeLocators,
}

fn top_level_nodes(tree: &Rc<TreeContext>) -> SpotResult<Vec<SpotTreeNodeElement>> {
    Ok(tree
        .root
        .find_elements(&tree.locators.node)?
        .into_iter()
        .map(|wrapper| SpotTreeNodeElement::new(Rc::clone(tree), wrapper, None))
        .collect())
}

fn first_labelled(
    nodes: Vec<SpotTreeNodeElement>,
    label: &str,
) -> SpotResult<Option<SpotTreeNodeElement>> {
    for node in nodes {
        if node.label()? == label {
            return Ok(Some(node));
        }
    }
    Ok(None)
}

enum Cursor {
    Root,
    Node(SpotTreeNodeElement),
}

fn resolve(
    tree: &Rc<TreeContext>,
    start: Option<&SpotTreeNodeElement>,
    path: &str,
) -> SpotResult<SpotTreeNodeElement> {
    let parsed = TreePath::parse(path)?;
    tracing::debug!(path, "searching tree node");

    let mut cursor = match start {
        Some(node) if !parsed.absolute => Cursor::Node(node.clone()),
        _ => Cursor::Root,
    };
    for segment in &parsed.segments {
        cursor = match (segment, cursor) {
            (PathSegment::Parent, Cursor::Root) => {
                return Err(SpotError::InvalidPath {
                    path: path.to_string(),
                    message: "'..' goes above the top-level nodes".to_string(),
                })
            }
            (PathSegment::Parent, Cursor::Node(node)) => {
                node.parent().cloned().map_or(Cursor::Root, Cursor::Node)
            }
            (PathSegment::Label(label), cursor) => {
                let candidates = match cursor {
                    Cursor::Root => top_level_nodes(tree)?,
                    Cursor::Node(node) => node.children()?,
                };
                let found = first_labelled(candidates, label)?.ok_or_else(|| {
                    SpotError::NodeNotFound {
                        path: path.to_string(),
                    }
                })?;
                Cursor::Node(found)
            }
        };
    }

    match cursor {
        Cursor::Node(node) => Ok(node),
        Cursor::Root => Err(SpotError::InvalidPath {
            path: path.to_string(),
            message: "path does not name a node".to_string(),
        }),
    }
}

/// Depth-first search, `max_depth` levels down from `nodes` (which count as 1)
fn search_label(
    nodes: Vec<SpotTreeNodeElement>,
    label: &str,
    max_depth: usize,
) -> SpotResult<Option<SpotTreeNodeElement>> {
    if max_depth == 0 {
        return Ok(None);
    }
    for node in nodes {
        if node.label()? == label {
            return Ok(Some(node));
        }
        if max_depth > 1 && node.has_children()? {
            if let Some(found) = search_label(node.children()?, label, max_depth - 1)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

fn expand_levels(nodes: Vec<SpotTreeNodeElement>, max_depth: usize) -> SpotResult<usize> {
    let mut expanded = 0;
    if max_depth == 0 {
        return Ok(expanded);
    }
    for node in nodes {
        if node.is_expandable()? {
            if !node.is_expanded()? {
                node.expand()?;
                expanded += 1;
            }
            expanded += expand_levels(node.children()?, max_depth - 1)?;
        }
    }
    Ok(expanded)
}

// =============================================================================
// TREE
// =============================================================================

/// Tree widget: the container of the top-level nodes
#[derive(Debug, Clone)]
pub struct SpotTreeElement {
    tree: Rc<TreeContext>,
}

impl SpotTreeElement {
    /// Wrap a tree element
    #[must_use]
    pub fn new(wrapper: WebElementWrapper, locators: TreeLocators) -> Self {
        Self {
            tree: Rc::new(TreeContext {
                root: wrapper,
                locators,
            }),
        }
    }

    /// Tree element
    #[must_use]
    pub fn wrapper(&self) -> &WebElementWrapper {
        &self.tree.root
    }

    /// Markup description
    #[must_use]
    pub fn locators(&self) -> &TreeLocators {
        &self.tree.locators
    }

    /// Top-level nodes
    pub fn roots(&self) -> SpotResult<Vec<SpotTreeNodeElement>> {
        top_level_nodes(&self.tree)
    }

    /// Top-level node labelled `label`
    pub fn root(&self, label: &str) -> SpotResult<Option<SpotTreeNodeElement>> {
        first_labelled(self.roots()?, label)
    }

    /// Node at `path`; relative paths start at the top-level nodes too
    pub fn search_node(&self, path: &str) -> SpotResult<SpotTreeNodeElement> {
        resolve(&self.tree, None, path)
    }

    /// First node labelled `label` within `max_depth` levels (1 = top level)
    pub fn find_node_by_label(
        &self,
        label: &str,
        max_depth: usize,
    ) -> SpotResult<Option<SpotTreeNodeElement>> {
        search_label(self.roots()?, label, max_depth)
    }

    /// Expand every node down to `max_depth` levels; returns how many were expanded
    pub fn expand_all(&self, max_depth: usize) -> SpotResult<usize> {
        let expanded = expand_levels(self.roots()?, max_depth)?;
        tracing::debug!(expanded, max_depth, "expanded tree");
        Ok(expanded)
    }

    /// Select the node at `path`
    pub fn select_node(&self, path: &str) -> SpotResult<SpotTreeNodeElement> {
        let node = self.search_node(path)?;
        node.select()?;
        Ok(node)
    }
}

// =============================================================================
// NODES
// =============================================================================

struct NodeInner {
    tree: Rc<TreeContext>,
    wrapper: WebElementWrapper,
    parent: Option<SpotTreeNodeElement>,
    label: RefCell<Option<String>>,
    path: OnceCell<String>,
    row: RefCell<Option<WebElementWrapper>>,
    toggle: RefCell<Option<WebElementWrapper>>,
    container: RefCell<Option<WebElementWrapper>>,
    selectable: RefCell<Option<WebElementWrapper>>,
}

/// One node of a tree. Clones share caches.
#[derive(Clone)]
pub struct SpotTreeNodeElement {
    inner: Rc<NodeInner>,
}

impl fmt::Debug for SpotTreeNodeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotTreeNodeElement")
            .field("label", &*self.inner.label.borrow())
            .field("path", &self.inner.path.get())
            .field("wrapper", &self.inner.wrapper)
            .finish_non_exhaustive()
    }
}

fn cached(
    cell: &RefCell<Option<WebElementWrapper>>,
    find: impl FnOnce() -> SpotResult<Option<WebElementWrapper>>,
) -> SpotResult<Option<WebElementWrapper>> {
    if let Some(found) = cell.borrow().as_ref() {
        return Ok(Some(found.clone()));
    }
    let found = find()?;
    cell.borrow_mut().clone_from(&found);
    Ok(found)
}

impl SpotTreeNodeElement {
    fn new(tree: Rc<TreeContext>, wrapper: WebElementWrapper, parent: Option<Self>) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                tree,
                wrapper,
                parent,
                label: RefCell::new(None),
                path: OnceCell::new(),
                row: RefCell::new(None),
                toggle: RefCell::new(None),
                container: RefCell::new(None),
                selectable: RefCell::new(None),
            }),
        }
    }

    fn locators(&self) -> &TreeLocators {
        &self.inner.tree.locators
    }

    /// Node element
    #[must_use]
    pub fn wrapper(&self) -> &WebElementWrapper {
        &self.inner.wrapper
    }

    /// Parent node, `None` for top-level nodes
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// Number of ancestors (0 for top-level nodes)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.parent().map_or(0, |parent| parent.depth() + 1)
    }

    /// Drop cached label and sub-elements; the path is kept
    pub fn invalidate(&self) {
        tracing::trace!(path = ?self.inner.path.get(), "invalidating tree node");
        *self.inner.label.borrow_mut() = None;
        *self.inner.row.borrow_mut() = None;
        *self.inner.toggle.borrow_mut() = None;
        *self.inner.container.borrow_mut() = None;
        *self.inner.selectable.borrow_mut() = None;
    }

    /// Run `op`, once more after dropping the caches if the page moved under it
    fn retrying<T>(&self, op: impl Fn(&Self) -> SpotResult<T>) -> SpotResult<T> {
        match op(self) {
            Err(SpotError::StaleElement { .. } | SpotError::ElementNotFound { .. }) => {
                self.invalidate();
                op(self)
            }
            result => result,
        }
    }

    // -------------------------------------------------------------------------
    // sub-elements
    // -------------------------------------------------------------------------

    fn row(&self) -> SpotResult<WebElementWrapper> {
        let row = cached(&self.inner.row, || {
            self.inner.wrapper.find_element(&self.locators().row).map(Some)
        })?;
        row.ok_or_else(|| SpotError::ElementNotFound {
            locator: self.locators().row.to_string(),
        })
    }

    fn toggle(&self) -> SpotResult<Option<WebElementWrapper>> {
        cached(&self.inner.toggle, || {
            self.row()?.find_optional(&self.locators().expandable)
        })
    }

    fn container(&self) -> SpotResult<Option<WebElementWrapper>> {
        cached(&self.inner.container, || {
            self.inner.wrapper.find_optional(&self.locators().container)
        })
    }

    fn selectable(&self) -> SpotResult<SpotSelectableElement> {
        let element = cached(&self.inner.selectable, || {
            self.row()?.find_element(&self.locators().selectable).map(Some)
        })?
        .ok_or_else(|| SpotError::ElementNotFound {
            locator: self.locators().selectable.to_string(),
        })?;
        Ok(SpotSelectableElement::new(
            element,
            self.locators().selection.clone(),
        ))
    }

    // -------------------------------------------------------------------------
    // identity
    // -------------------------------------------------------------------------

    /// Label text (cached once read non-empty)
    pub fn label(&self) -> SpotResult<String> {
        if let Some(label) = self.inner.label.borrow().as_ref() {
            return Ok(label.clone());
        }
        let label = self.retrying(|node| {
            let text = node.row()?.find_element(&node.locators().label)?.text()?;
            Ok(text.trim().to_string())
        })?;
        if !label.is_empty() {
            *self.inner.label.borrow_mut() = Some(label.clone());
        }
        Ok(label)
    }

    /// Absolute path from the ancestors' labels.
    ///
    /// Kept once every label on the way up has been read non-empty; a path
    /// built while some label was still blank is recomputed next time.
    pub fn path(&self) -> SpotResult<String> {
        if let Some(path) = self.inner.path.get() {
            return Ok(path.clone());
        }
        let label = self.label()?;
        let (path, ancestors_known) = match self.parent() {
            Some(parent) => (
                format!("{}/{}", parent.path()?, escape_label(&label)),
                parent.inner.path.get().is_some(),
            ),
            None => (format!("/{}", escape_label(&label)), true),
        };
        if label.is_empty() || !ancestors_known {
            return Ok(path);
        }
        Ok(self.inner.path.get_or_init(|| path).clone())
    }

    // -------------------------------------------------------------------------
    // expansion
    // -------------------------------------------------------------------------

    /// Whether the node shows an expand toggle
    pub fn is_expandable(&self) -> SpotResult<bool> {
        self.retrying(|node| match node.toggle()? {
            Some(toggle) => toggle.is_displayed(),
            None => Ok(false),
        })
    }

    /// Whether the node's children are shown
    pub fn is_expanded(&self) -> SpotResult<bool> {
        match &self.locators().expansion {
            ExpansionMarker::ContainerDisplayed => {
                let Some(container) = self.container()? else {
                    return Ok(false);
                };
                match container.is_displayed() {
                    Err(SpotError::ElementNotFound { .. }) => {
                        *self.inner.container.borrow_mut() = None;
                        Ok(false)
                    }
                    result => result,
                }
            }
            ExpansionMarker::Attribute { name, value } => {
                Ok(self.inner.wrapper.attribute(name)?.as_deref() == Some(value.as_str()))
            }
            ExpansionMarker::ClassContains(class) => self.inner.wrapper.has_class(class),
        }
    }

    fn has_children(&self) -> SpotResult<bool> {
        Ok(self.is_expandable()? || self.is_expanded()?)
    }

    /// Expand the node; leaves and expanded nodes are left alone
    pub fn expand(&self) -> SpotResult<()> {
        if self.is_expanded()? {
            return Ok(());
        }
        let Some(toggle) = self.toggle()? else {
            return Ok(());
        };
        if !toggle.is_displayed()? {
            return Ok(());
        }
        let path = self.path()?;
        tracing::debug!(%path, "expanding tree node");
        toggle.click()?;
        self.inner
            .wrapper
            .browser()
            .waiter()
            .until_true(&format!("tree node {path} to expand"), || self.is_expanded())
            .map(|_| ())
    }

    /// Collapse the node
    pub fn collapse(&self) -> SpotResult<()> {
        if !self.is_expanded()? {
            return Ok(());
        }
        let path = self.path()?;
        let toggle = self.toggle()?.ok_or_else(|| {
            SpotError::invalid_state(format!("tree node {path} has no toggle to collapse it"))
        })?;
        tracing::debug!(%path, "collapsing tree node");
        toggle.click()?;
        self.inner
            .wrapper
            .browser()
            .waiter()
            .wait_while(&format!("tree node {path} to collapse"), || self.is_expanded())
            .map(|_| ())
    }

    // -------------------------------------------------------------------------
    // navigation
    // -------------------------------------------------------------------------

    /// Child nodes, expanding this node first
    pub fn children(&self) -> SpotResult<Vec<Self>> {
        if !self.has_children()? {
            return Ok(Vec::new());
        }
        self.expand()?;

        let container = match self.container()? {
            Some(container) => Some(container),
            None => {
                let short = self.inner.wrapper.browser().config().short_timeout_ms;
                let found = self.inner.wrapper.wait_for_element(
                    &self.locators().container,
                    FindOptions::new()
                        .with_timeout(short)
                        .any_visibility()
                        .optional(),
                )?;
                self.inner.container.borrow_mut().clone_from(&found);
                found
            }
        };
        let Some(container) = container else {
            return Ok(Vec::new());
        };

        Ok(container
            .find_elements(&self.locators().node)?
            .into_iter()
            .map(|wrapper| Self::new(Rc::clone(&self.inner.tree), wrapper, Some(self.clone())))
            .collect())
    }

    /// Direct child labelled `label`
    pub fn child(&self, label: &str) -> SpotResult<Option<Self>> {
        first_labelled(self.children()?, label)
    }

    /// Node at `path`, relative to this node unless absolute
    pub fn search_node(&self, path: &str) -> SpotResult<Self> {
        resolve(&self.inner.tree, Some(self), path)
    }

    /// First descendant labelled `label` within `max_depth` levels (1 = children)
    pub fn find_node_by_label(&self, label: &str, max_depth: usize) -> SpotResult<Option<Self>> {
        search_label(self.children()?, label, max_depth)
    }

    // -------------------------------------------------------------------------
    // selection
    // -------------------------------------------------------------------------

    /// Select the node
    pub fn select(&self) -> SpotResult<()> {
        tracing::debug!(path = %self.path()?, "selecting tree node");
        self.retrying(|node| node.selectable()?.select())
    }

    /// Whether the node is selected
    pub fn is_selected(&self) -> SpotResult<bool> {
        self.retrying(|node| node.selectable()?.is_selected())
    }
}
