//! In-memory browser for unit and scenario tests.
//!
//! [`MockDriver`] keeps a small DOM built from [`MockNode`] builders and
//! answers [`WebDriver`] calls against it, including frame contexts, stale
//! handles after mutations, and scripted click behaviours.

use super::selector::{self, DomTree};
use super::{ElementId, FrameLocator, WebDriver};
use crate::locator::By;
use crate::result::{SpotError, SpotResult};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

const DOCUMENT_TAG: &str = "#document";
const DETACHED_TAG: &str = "#detached";

/// Builder for one mock element and its subtree
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    children: Vec<MockNode>,
    content: Option<Vec<MockNode>>,
}

impl MockNode {
    /// Create an element with this tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Create an iframe whose document holds `content`
    #[must_use]
    pub fn iframe(name: impl Into<String>, content: Vec<Self>) -> Self {
        let mut node = Self::new("iframe").attr("name", name);
        node.content = Some(content);
        node
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Set the `class` attribute
    #[must_use]
    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the element's own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Make the element (and its subtree) invisible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Mark the element disabled
    #[must_use]
    pub fn disabled(self) -> Self {
        self.attr("disabled", "true")
    }

    /// Mark an option selected
    #[must_use]
    pub fn selected(self) -> Self {
        self.attr("selected", "true")
    }

    /// Mark a checkbox or radio checked
    #[must_use]
    pub fn checked(self) -> Self {
        self.attr("checked", "true")
    }

    /// Append a child
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    hidden: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    content: Option<usize>,
}

/// Mutable in-memory document tree
#[derive(Debug, Clone)]
pub struct MockDom {
    nodes: HashMap<usize, NodeData>,
    next_id: usize,
    document: usize,
}

impl Default for MockDom {
    fn default() -> Self {
        Self::from_nodes(Vec::new())
    }
}

impl MockDom {
    /// Build a document whose top-level elements are `nodes`
    #[must_use]
    pub fn from_nodes(nodes: Vec<MockNode>) -> Self {
        Self::with_first_id(nodes, 1)
    }

    /// Handles are never reused, so a reloaded page starts numbering after
    /// the previous one.
    fn with_first_id(nodes: Vec<MockNode>, next_id: usize) -> Self {
        let mut dom = Self {
            nodes: HashMap::new(),
            next_id,
            document: 0,
        };
        dom.document = dom.new_document(nodes);
        dom
    }

    pub(crate) const fn document(&self) -> usize {
        self.document
    }

    fn new_document(&mut self, nodes: Vec<MockNode>) -> usize {
        let document = self.alloc(NodeData {
            tag: DOCUMENT_TAG.to_string(),
            attributes: BTreeMap::new(),
            text: String::new(),
            hidden: false,
            parent: None,
            children: Vec::new(),
            content: None,
        });
        for node in nodes {
            let _ = self.insert(node, document, None);
        }
        document
    }

    fn alloc(&mut self, data: NodeData) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let _ = self.nodes.insert(id, data);
        id
    }

    fn insert(&mut self, node: MockNode, parent: usize, index: Option<usize>) -> usize {
        let content = node.content.map(|nodes| self.new_document(nodes));
        let id = self.alloc(NodeData {
            tag: node.tag,
            attributes: node.attributes,
            text: node.text,
            hidden: node.hidden,
            parent: Some(parent),
            children: Vec::new(),
            content,
        });
        if let Some(parent_data) = self.nodes.get_mut(&parent) {
            match index {
                Some(i) if i <= parent_data.children.len() => parent_data.children.insert(i, id),
                _ => parent_data.children.push(id),
            }
        }
        for child in node.children {
            let _ = self.insert(child, id, None);
        }
        id
    }

    fn drop_subtree(&mut self, node: usize) {
        if let Some(data) = self.nodes.remove(&node) {
            for child in data.children {
                self.drop_subtree(child);
            }
            if let Some(content) = data.content {
                self.drop_subtree(content);
            }
        }
    }

    fn index_of(&self, element: &ElementId) -> SpotResult<usize> {
        element
            .as_str()
            .strip_prefix("mock-")
            .and_then(|raw| raw.parse().ok())
            .filter(|n| self.nodes.contains_key(n))
            .ok_or_else(|| SpotError::StaleElement {
                id: element.to_string(),
            })
    }

    fn handle(node: usize) -> ElementId {
        ElementId::new(format!("mock-{node}"))
    }

    fn data_mut(&mut self, element: &ElementId) -> SpotResult<&mut NodeData> {
        let index = self.index_of(element)?;
        self.nodes
            .get_mut(&index)
            .ok_or_else(|| SpotError::StaleElement {
                id: element.to_string(),
            })
    }

    /// Whether the handle still points into the page
    #[must_use]
    pub fn contains(&self, element: &ElementId) -> bool {
        self.index_of(element).is_ok()
    }

    /// Find elements in the top document and, recursively, in every frame
    #[must_use]
    pub fn find_all(&self, by: &By) -> Vec<ElementId> {
        let mut found = Vec::new();
        let mut documents = vec![self.document];
        while let Some(document) = documents.pop() {
            if let Ok(nodes) = selector::select(self, document, by) {
                found.extend(nodes.iter().map(|&n| Self::handle(n)));
            }
            let frames = selector::select(self, document, &By::tag_name("iframe")).unwrap_or_default();
            documents.extend(
                frames
                    .into_iter()
                    .filter_map(|f| self.nodes.get(&f).and_then(|d| d.content)),
            );
        }
        found
    }

    /// First element found by [`Self::find_all`]
    #[must_use]
    pub fn find_first(&self, by: &By) -> Option<ElementId> {
        self.find_all(by).into_iter().next()
    }

    /// Append a subtree below `parent`
    pub fn append(&mut self, parent: &ElementId, node: MockNode) -> SpotResult<ElementId> {
        let parent = self.index_of(parent)?;
        Ok(Self::handle(self.insert(node, parent, None)))
    }

    /// Remove an element; its handle and its descendants' handles go stale
    pub fn remove(&mut self, element: &ElementId) -> SpotResult<()> {
        let index = self.index_of(element)?;
        if let Some(parent) = self.nodes.get(&index).and_then(|d| d.parent) {
            if let Some(parent_data) = self.nodes.get_mut(&parent) {
                parent_data.children.retain(|&c| c != index);
            }
        }
        self.drop_subtree(index);
        Ok(())
    }

    /// Replace an element by a freshly rendered one at the same position
    pub fn replace(&mut self, element: &ElementId, node: MockNode) -> SpotResult<ElementId> {
        let index = self.index_of(element)?;
        let Some(parent) = self.nodes.get(&index).and_then(|d| d.parent) else {
            return Err(SpotError::invalid_state("cannot replace a document"));
        };
        let position = self
            .nodes
            .get(&parent)
            .and_then(|d| d.children.iter().position(|&c| c == index));
        self.remove(element)?;
        Ok(Self::handle(self.insert(node, parent, position)))
    }

    /// Set or remove an attribute
    pub fn set_attribute(
        &mut self,
        element: &ElementId,
        name: &str,
        value: Option<&str>,
    ) -> SpotResult<()> {
        let data = self.data_mut(element)?;
        match value {
            Some(value) => {
                let _ = data.attributes.insert(name.to_string(), value.to_string());
            }
            None => {
                let _ = data.attributes.remove(name);
            }
        }
        Ok(())
    }

    /// Show or hide an element
    pub fn set_hidden(&mut self, element: &ElementId, hidden: bool) -> SpotResult<()> {
        self.data_mut(element)?.hidden = hidden;
        Ok(())
    }

    /// Replace the element's own text
    pub fn set_text(&mut self, element: &ElementId, text: impl Into<String>) -> SpotResult<()> {
        self.data_mut(element)?.text = text.into();
        Ok(())
    }

    /// Read an attribute through a handle
    pub fn attribute_of(&self, element: &ElementId, name: &str) -> SpotResult<Option<String>> {
        let index = self.index_of(element)?;
        Ok(DomTree::attribute(self, index, name).map(str::to_string))
    }

    fn document_of(&self, mut node: usize) -> usize {
        while let Some(parent) = DomTree::parent(self, node) {
            node = parent;
        }
        node
    }

    fn displayed(&self, node: usize) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            match self.nodes.get(&n) {
                Some(data) if !data.hidden => current = data.parent,
                _ => return false,
            }
        }
        true
    }

    fn rendered_text(&self, node: usize) -> String {
        let Some(data) = self.nodes.get(&node) else {
            return String::new();
        };
        if data.hidden {
            return String::new();
        }
        let mut parts = vec![data.text.clone()];
        parts.extend(data.children.iter().map(|&c| self.rendered_text(c)));
        selector::normalize_space(&parts.join(" "))
    }

    fn title(&self) -> String {
        selector::select(self, self.document, &By::tag_name("title"))
            .ok()
            .and_then(|nodes| nodes.first().copied())
            .map(|n| selector::string_value(self, n))
            .unwrap_or_default()
    }

    fn native_click(&mut self, node: usize) {
        let tag = DomTree::tag(self, node).to_string();
        if tag == "option" {
            let select = self.ancestor_with_tag(node, "select");
            let multiple = select.is_some_and(|s| DomTree::attribute(self, s, "multiple").is_some());
            if multiple {
                self.toggle_flag(node, "selected");
            } else {
                if let Some(select) = select {
                    let options = selector::select(self, select, &By::tag_name("option"))
                        .unwrap_or_default();
                    for option in options {
                        self.set_flag(option, "selected", false);
                    }
                }
                self.set_flag(node, "selected", true);
            }
        } else if tag == "input" {
            match DomTree::attribute(self, node, "type") {
                Some("checkbox") => self.toggle_flag(node, "checked"),
                Some("radio") => {
                    let name = DomTree::attribute(self, node, "name").map(str::to_string);
                    if let Some(name) = name {
                        let document = self.document_of(node);
                        let group = selector::select(
                            self,
                            document,
                            &By::css(format!("input[type=radio][name=\"{name}\"]")),
                        )
                        .unwrap_or_default();
                        for radio in group {
                            self.set_flag(radio, "checked", false);
                        }
                    }
                    self.set_flag(node, "checked", true);
                }
                _ => {}
            }
        }
    }

    fn ancestor_with_tag(&self, node: usize, tag: &str) -> Option<usize> {
        let mut current = DomTree::parent(self, node);
        while let Some(n) = current {
            if DomTree::tag(self, n) == tag {
                return Some(n);
            }
            current = DomTree::parent(self, n);
        }
        None
    }

    fn set_flag(&mut self, node: usize, name: &str, on: bool) {
        if let Some(data) = self.nodes.get_mut(&node) {
            if on {
                let _ = data.attributes.insert(name.to_string(), "true".to_string());
            } else {
                let _ = data.attributes.remove(name);
            }
        }
    }

    fn toggle_flag(&mut self, node: usize, name: &str) {
        let on = DomTree::attribute(self, node, name).is_none();
        self.set_flag(node, name, on);
    }
}

impl DomTree for MockDom {
    fn tag(&self, node: usize) -> &str {
        self.nodes.get(&node).map_or(DETACHED_TAG, |d| d.tag.as_str())
    }

    fn attribute(&self, node: usize, name: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|d| d.attributes.get(name))
            .map(String::as_str)
    }

    fn children(&self, node: usize) -> &[usize] {
        self.nodes.get(&node).map_or(&[], |d| d.children.as_slice())
    }

    fn parent(&self, node: usize) -> Option<usize> {
        self.nodes.get(&node).and_then(|d| d.parent)
    }

    fn own_text(&self, node: usize) -> &str {
        self.nodes.get(&node).map_or("", |d| d.text.as_str())
    }
}

type ClickHandler = Box<dyn FnMut(&mut MockDom)>;

#[derive(Default)]
struct MockState {
    dom: MockDom,
    pages: HashMap<String, Vec<MockNode>>,
    url: String,
    frames: Vec<usize>,
    click_handlers: HashMap<usize, Vec<ClickHandler>>,
    call_history: Vec<String>,
    closed: bool,
}

/// Mock driver for unit testing.
///
/// Clones share one session, so a test can keep a handle for scripting the
/// page after the browser took ownership of the driver.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Rc<RefCell<MockState>>,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MockDriver")
            .field("url", &state.url)
            .field("frames", &state.frames)
            .field("calls", &state.call_history.len())
            .finish_non_exhaustive()
    }
}

impl MockDriver {
    /// Create new mock driver showing an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock driver already showing `nodes`
    #[must_use]
    pub fn with_nodes(nodes: Vec<MockNode>) -> Self {
        let driver = Self::new();
        driver.state.borrow_mut().dom = MockDom::from_nodes(nodes);
        driver
    }

    /// Register the content served for `url`
    pub fn add_page(&self, url: impl Into<String>, nodes: Vec<MockNode>) {
        let _ = self.state.borrow_mut().pages.insert(url.into(), nodes);
    }

    /// Run `handler` against the DOM every time `element` is clicked
    pub fn on_click<F>(&self, element: &ElementId, handler: F) -> SpotResult<()>
    where
        F: FnMut(&mut MockDom) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let index = state.dom.index_of(element)?;
        state
            .click_handlers
            .entry(index)
            .or_default()
            .push(Box::new(handler));
        Ok(())
    }

    /// Mutate the DOM directly, as page scripts would
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut MockDom) -> R) -> R {
        f(&mut self.state.borrow_mut().dom)
    }

    /// First element matching `by` anywhere in the page, frames included
    #[must_use]
    pub fn find_first(&self, by: &By) -> Option<ElementId> {
        self.state.borrow().dom.find_first(by)
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state.borrow().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state
            .borrow()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }

    /// Number of recorded calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .borrow()
            .call_history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    /// Forget recorded calls
    pub fn clear_history(&self) {
        self.state.borrow_mut().call_history.clear();
    }

    /// Depth of the current frame context (0 = top document)
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.state.borrow().frames.len()
    }

    fn record(&self, call: String) {
        self.state.borrow_mut().call_history.push(call);
    }
}

impl MockState {
    fn current_document(&self) -> SpotResult<usize> {
        match self.frames.last() {
            None => Ok(self.dom.document),
            Some(frame) => self
                .dom
                .nodes
                .get(frame)
                .and_then(|d| d.content)
                .ok_or_else(|| SpotError::FrameNotFound {
                    frame: format!("mock-{frame}"),
                    message: "frame was detached".to_string(),
                }),
        }
    }

    /// Resolve a handle living in the current browsing context
    fn resolve(&self, element: &ElementId) -> SpotResult<usize> {
        let index = self.dom.index_of(element)?;
        if self.dom.document_of(index) == self.current_document()? {
            Ok(index)
        } else {
            Err(SpotError::StaleElement {
                id: element.to_string(),
            })
        }
    }

    fn ensure_open(&self) -> SpotResult<()> {
        if self.closed {
            Err(SpotError::driver("browser session was closed"))
        } else {
            Ok(())
        }
    }

    fn frame_content(&self, frame: usize, description: &str) -> SpotResult<usize> {
        let is_frame = matches!(DomTree::tag(&self.dom, frame), "iframe" | "frame");
        match self.dom.nodes.get(&frame).and_then(|d| d.content) {
            Some(_) if is_frame => Ok(frame),
            _ => Err(SpotError::FrameNotFound {
                frame: description.to_string(),
                message: "element is not a frame".to_string(),
            }),
        }
    }
}

impl WebDriver for MockDriver {
    fn navigate(&self, url: &str) -> SpotResult<()> {
        self.record(format!("navigate:{url}"));
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        let nodes = state.pages.get(url).cloned().unwrap_or_default();
        let next_id = state.dom.next_id;
        state.dom = MockDom::with_first_id(nodes, next_id);
        state.frames.clear();
        state.click_handlers.clear();
        state.url = url.to_string();
        Ok(())
    }

    fn current_url(&self) -> SpotResult<String> {
        let state = self.state.borrow();
        state.ensure_open()?;
        Ok(state.url.clone())
    }

    fn title(&self) -> SpotResult<String> {
        let state = self.state.borrow();
        state.ensure_open()?;
        Ok(state.dom.title())
    }

    fn find_elements(&self, scope: Option<&ElementId>, by: &By) -> SpotResult<Vec<ElementId>> {
        self.record(format!("find_elements:{by}"));
        let state = self.state.borrow();
        state.ensure_open()?;
        let context = match scope {
            Some(element) => state.resolve(element)?,
            None => state.current_document()?,
        };
        let nodes = selector::select(&state.dom, context, by)?;
        Ok(nodes.into_iter().map(MockDom::handle).collect())
    }

    fn tag_name(&self, element: &ElementId) -> SpotResult<String> {
        let state = self.state.borrow();
        let index = state.resolve(element)?;
        Ok(DomTree::tag(&state.dom, index).to_string())
    }

    fn text(&self, element: &ElementId) -> SpotResult<String> {
        let state = self.state.borrow();
        let index = state.resolve(element)?;
        if !state.dom.displayed(index) {
            return Ok(String::new());
        }
        Ok(state.dom.rendered_text(index))
    }

    fn attribute(&self, element: &ElementId, name: &str) -> SpotResult<Option<String>> {
        let state = self.state.borrow();
        let index = state.resolve(element)?;
        let value = DomTree::attribute(&state.dom, index, name).map(str::to_string);
        Ok(match (name, value) {
            ("value", None) if DomTree::tag(&state.dom, index) == "option" => {
                Some(selector::string_value(&state.dom, index))
            }
            (_, value) => value,
        })
    }

    fn is_displayed(&self, element: &ElementId) -> SpotResult<bool> {
        let state = self.state.borrow();
        let index = state.resolve(element)?;
        Ok(state.dom.displayed(index))
    }

    fn is_enabled(&self, element: &ElementId) -> SpotResult<bool> {
        let state = self.state.borrow();
        let index = state.resolve(element)?;
        Ok(DomTree::attribute(&state.dom, index, "disabled").is_none())
    }

    fn is_selected(&self, element: &ElementId) -> SpotResult<bool> {
        let state = self.state.borrow();
        let index = state.resolve(element)?;
        Ok(DomTree::attribute(&state.dom, index, "selected").is_some()
            || DomTree::attribute(&state.dom, index, "checked").is_some())
    }

    fn click(&self, element: &ElementId) -> SpotResult<()> {
        self.record(format!("click:{element}"));
        let handlers = {
            let mut state = self.state.borrow_mut();
            let index = state.resolve(element)?;
            if !state.dom.displayed(index) {
                return Err(SpotError::driver(format!(
                    "element not interactable: {element} is not displayed"
                )));
            }
            if DomTree::attribute(&state.dom, index, "disabled").is_some() {
                return Ok(());
            }
            state.dom.native_click(index);
            state
                .click_handlers
                .remove(&index)
                .map(|handlers| (index, handlers))
        };
        if let Some((index, mut handlers)) = handlers {
            let mut state = self.state.borrow_mut();
            for handler in &mut handlers {
                handler(&mut state.dom);
            }
            if state.dom.nodes.contains_key(&index) {
                let slot = state.click_handlers.entry(index).or_default();
                handlers.append(slot);
                *slot = handlers;
            }
        }
        Ok(())
    }

    fn send_keys(&self, element: &ElementId, text: &str) -> SpotResult<()> {
        self.record(format!("send_keys:{element}"));
        let mut state = self.state.borrow_mut();
        let index = state.resolve(element)?;
        if !state.dom.displayed(index) {
            return Err(SpotError::driver(format!(
                "element not interactable: {element} is not displayed"
            )));
        }
        let current = DomTree::attribute(&state.dom, index, "value")
            .unwrap_or_default()
            .to_string();
        state
            .dom
            .set_attribute(element, "value", Some(&format!("{current}{text}")))
    }

    fn clear(&self, element: &ElementId) -> SpotResult<()> {
        self.record(format!("clear:{element}"));
        let mut state = self.state.borrow_mut();
        let _ = state.resolve(element)?;
        state.dom.set_attribute(element, "value", Some(""))
    }

    fn switch_to_default(&self) -> SpotResult<()> {
        self.record("switch_to_default".to_string());
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.frames.clear();
        Ok(())
    }

    fn switch_to_frame(&self, frame: &FrameLocator) -> SpotResult<()> {
        self.record(format!("switch_to_frame:{frame}"));
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        let document = state.current_document()?;
        let description = frame.to_string();
        let target = match frame {
            FrameLocator::Index(index) => {
                let frames = selector::select(&state.dom, document, &By::css("iframe, frame"))?;
                frames
                    .get(*index)
                    .copied()
                    .ok_or_else(|| SpotError::FrameNotFound {
                        frame: description.clone(),
                        message: format!("only {} frame(s) in document", frames.len()),
                    })?
            }
            FrameLocator::Name(name) => {
                let frames = selector::select(&state.dom, document, &By::css("iframe, frame"))?;
                frames
                    .into_iter()
                    .find(|&f| {
                        DomTree::attribute(&state.dom, f, "name") == Some(name.as_str())
                            || DomTree::attribute(&state.dom, f, "id") == Some(name.as_str())
                    })
                    .ok_or_else(|| SpotError::FrameNotFound {
                        frame: description.clone(),
                        message: "no frame with that name or id".to_string(),
                    })?
            }
            FrameLocator::Element(element) => state.resolve(element)?,
        };
        let target = state.frame_content(target, &description)?;
        state.frames.push(target);
        Ok(())
    }

    fn switch_to_parent_frame(&self) -> SpotResult<()> {
        self.record("switch_to_parent_frame".to_string());
        let mut state = self.state.borrow_mut();
        let _ = state.frames.pop();
        Ok(())
    }

    fn quit(&self) -> SpotResult<()> {
        self.record("quit".to_string());
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Vec<MockNode> {
        vec![
            MockNode::new("title").text("Mock page"),
            MockNode::new("div")
                .id("main")
                .child(MockNode::new("span").id("greeting").text("Hello"))
                .child(MockNode::new("span").id("secret").text("hidden").hidden())
                .child(MockNode::new("button").id("go").text("Go"))
                .child(MockNode::new("button").id("off").text("Off").disabled()),
            MockNode::iframe(
                "outer",
                vec![
                    MockNode::new("p").id("in-outer").text("outer frame"),
                    MockNode::iframe("inner", vec![MockNode::new("p").id("in-inner")]),
                ],
            ),
        ]
    }

    fn find_one(driver: &MockDriver, by: &By) -> ElementId {
        driver.find_elements(None, by).unwrap().remove(0)
    }

    mod element_tests {
        use super::*;

        #[test]
        fn test_text_and_visibility() {
            let driver = MockDriver::with_nodes(page());
            let main = find_one(&driver, &By::id("main"));
            assert_eq!(driver.text(&main).unwrap(), "Hello Go Off");
            let secret = find_one(&driver, &By::id("secret"));
            assert!(!driver.is_displayed(&secret).unwrap());
            assert_eq!(driver.text(&secret).unwrap(), "");
            assert_eq!(driver.title().unwrap(), "Mock page");
        }

        #[test]
        fn test_click_hidden_fails_and_disabled_is_noop() {
            let driver = MockDriver::with_nodes(page());
            let secret = find_one(&driver, &By::id("secret"));
            assert!(driver.click(&secret).is_err());

            let off = find_one(&driver, &By::id("off"));
            let clicked = std::rc::Rc::new(std::cell::Cell::new(false));
            let flag = clicked.clone();
            driver.on_click(&off, move |_| flag.set(true)).unwrap();
            driver.click(&off).unwrap();
            assert!(!clicked.get());
            assert!(!driver.is_enabled(&off).unwrap());
        }

        #[test]
        fn test_click_handler_mutates_dom() {
            let driver = MockDriver::with_nodes(page());
            let go = find_one(&driver, &By::id("go"));
            driver
                .on_click(&go, |dom| {
                    let main = dom.find_first(&By::id("main")).unwrap();
                    dom.append(&main, MockNode::new("p").id("result").text("done"))
                        .unwrap();
                })
                .unwrap();
            driver.click(&go).unwrap();
            let result = find_one(&driver, &By::id("result"));
            assert_eq!(driver.text(&result).unwrap(), "done");
            assert_eq!(driver.call_count("click"), 1);
        }

        #[test]
        fn test_removed_element_is_stale() {
            let driver = MockDriver::with_nodes(page());
            let greeting = find_one(&driver, &By::id("greeting"));
            driver.with_dom(|dom| dom.remove(&greeting)).unwrap();
            assert!(driver.text(&greeting).unwrap_err().is_stale());
        }

        #[test]
        fn test_send_keys_and_clear() {
            let driver = MockDriver::with_nodes(vec![MockNode::new("input").id("q")]);
            let input = find_one(&driver, &By::id("q"));
            driver.send_keys(&input, "spot").unwrap();
            driver.send_keys(&input, "-web").unwrap();
            assert_eq!(
                driver.attribute(&input, "value").unwrap().as_deref(),
                Some("spot-web")
            );
            driver.clear(&input).unwrap();
            assert_eq!(driver.attribute(&input, "value").unwrap().as_deref(), Some(""));
        }
    }

    mod native_behaviour_tests {
        use super::*;

        #[test]
        fn test_single_select_option_click() {
            let driver = MockDriver::with_nodes(vec![MockNode::new("select").children([
                MockNode::new("option").text("A").selected(),
                MockNode::new("option").text("B"),
            ])]);
            let options = driver.find_elements(None, &By::tag_name("option")).unwrap();
            driver.click(&options[1]).unwrap();
            assert!(!driver.is_selected(&options[0]).unwrap());
            assert!(driver.is_selected(&options[1]).unwrap());
            assert_eq!(
                driver.attribute(&options[1], "value").unwrap().as_deref(),
                Some("B")
            );
        }

        #[test]
        fn test_checkbox_and_radio() {
            let driver = MockDriver::with_nodes(vec![
                MockNode::new("input").id("c").attr("type", "checkbox"),
                MockNode::new("input").id("r1").attr("type", "radio").attr("name", "g").checked(),
                MockNode::new("input").id("r2").attr("type", "radio").attr("name", "g"),
            ]);
            let checkbox = find_one(&driver, &By::id("c"));
            driver.click(&checkbox).unwrap();
            assert!(driver.is_selected(&checkbox).unwrap());
            driver.click(&checkbox).unwrap();
            assert!(!driver.is_selected(&checkbox).unwrap());

            let r1 = find_one(&driver, &By::id("r1"));
            let r2 = find_one(&driver, &By::id("r2"));
            driver.click(&r2).unwrap();
            assert!(!driver.is_selected(&r1).unwrap());
            assert!(driver.is_selected(&r2).unwrap());
        }
    }

    mod frame_tests {
        use super::*;

        #[test]
        fn test_frame_contexts_isolate_searches() {
            let driver = MockDriver::with_nodes(page());
            assert!(driver
                .find_elements(None, &By::id("in-outer"))
                .unwrap()
                .is_empty());

            driver
                .switch_to_frame(&FrameLocator::Name("outer".into()))
                .unwrap();
            assert_eq!(driver.find_elements(None, &By::id("in-outer")).unwrap().len(), 1);
            assert!(driver.find_elements(None, &By::id("main")).unwrap().is_empty());

            driver.switch_to_frame(&FrameLocator::Index(0)).unwrap();
            assert_eq!(driver.find_elements(None, &By::id("in-inner")).unwrap().len(), 1);
            assert_eq!(driver.frame_depth(), 2);

            driver.switch_to_parent_frame().unwrap();
            assert_eq!(driver.frame_depth(), 1);
            driver.switch_to_default().unwrap();
            assert_eq!(driver.find_elements(None, &By::id("main")).unwrap().len(), 1);
        }

        #[test]
        fn test_handle_from_other_context_is_stale() {
            let driver = MockDriver::with_nodes(page());
            let main = find_one(&driver, &By::id("main"));
            driver.switch_to_frame(&FrameLocator::Index(0)).unwrap();
            assert!(driver.text(&main).unwrap_err().is_stale());
        }

        #[test]
        fn test_switch_to_frame_by_element() {
            let driver = MockDriver::with_nodes(page());
            let iframe = find_one(&driver, &By::css("iframe[name=outer]"));
            driver
                .switch_to_frame(&FrameLocator::Element(iframe))
                .unwrap();
            assert_eq!(driver.find_elements(None, &By::tag_name("p")).unwrap().len(), 1);

            let not_a_frame = find_one(&driver, &By::id("in-outer"));
            let err = driver
                .switch_to_frame(&FrameLocator::Element(not_a_frame))
                .unwrap_err();
            assert!(matches!(err, SpotError::FrameNotFound { .. }));
        }

        #[test]
        fn test_missing_frame() {
            let driver = MockDriver::with_nodes(page());
            assert!(driver.switch_to_frame(&FrameLocator::Index(3)).is_err());
            assert!(driver
                .switch_to_frame(&FrameLocator::Name("nope".into()))
                .is_err());
        }
    }

    mod navigation_tests {
        use super::*;

        #[test]
        fn test_navigate_loads_registered_page() {
            let driver = MockDriver::new();
            driver.add_page("http://app/home", page());
            driver.navigate("http://app/home").unwrap();
            assert_eq!(driver.current_url().unwrap(), "http://app/home");
            assert_eq!(driver.title().unwrap(), "Mock page");
            assert!(driver.was_called("navigate"));
        }

        #[test]
        fn test_navigation_makes_old_handles_stale() {
            let driver = MockDriver::new();
            driver.add_page("http://app/home", page());
            driver.navigate("http://app/home").unwrap();
            let main = find_one(&driver, &By::id("main"));
            driver.navigate("http://app/home").unwrap();
            assert!(driver.is_displayed(&main).unwrap_err().is_stale());
        }

        #[test]
        fn test_quit_closes_session() {
            let driver = MockDriver::new();
            driver.quit().unwrap();
            assert!(driver.current_url().is_err());
        }
    }
}
