//! Headless element tree.
//!
//! The slideshow controllers never talk to a renderer directly; they query
//! elements by class, toggle classes and write inline style values the same
//! way a page script would. A renderer (or a test) reads the resulting state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Transform origin in percent of the element box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Origin {
    pub x: f32,
    pub y: f32,
}

impl Origin {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% {}%", self.x, self.y)
    }
}

/// Inline style values touched by the choreography. Translations are in
/// percent of the element's own size.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub opacity: f32,
    pub z_index: Option<i32>,
    pub origin: Option<Origin>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            opacity: 1.0,
            z_index: None,
            origin: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    style: Style,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Element {
    fn new(tag: &str, parent: Option<ElementId>) -> Self {
        Self {
            tag: tag.to_string(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            style: Style::default(),
            parent,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Reads a `data-*` attribute.
    pub fn data(&self, key: &str) -> Option<&str> {
        self.attribute(&format!("data-{key}"))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }
}

pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct Document {
    elements: Vec<Element>,
    listeners: HashMap<ElementId, Vec<Listener>>,
    root: Option<ElementId>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("elements", &self.elements.len())
            .field("listeners", &self.listeners.len())
            .field("root", &self.root)
            .finish()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new element under `parent`. The first parentless element
    /// becomes the document root.
    pub fn create_element(&mut self, tag: &str, parent: Option<ElementId>) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(Element::new(tag, parent));
        match parent {
            Some(parent) => self.elements[parent.0].children.push(id),
            None => {
                if self.root.is_none() {
                    self.root = Some(id);
                }
            }
        }
        id
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    /// First `<body>` element in document order, else the root.
    pub fn body(&self) -> Option<ElementId> {
        let root = self.root?;
        if self.elements[root.0].tag.eq_ignore_ascii_case("body") {
            return Some(root);
        }
        self.descendants(root)
            .find(|id| self.elements[id.0].tag.eq_ignore_ascii_case("body"))
            .or(Some(root))
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) {
        let element = &mut self.elements[id.0];
        if name == "class" {
            element.classes = value.split_whitespace().map(str::to_string).collect();
        }
        element
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn has_class(&self, id: ElementId, class: &str) -> bool {
        self.elements[id.0].has_class(class)
    }

    pub fn add_class(&mut self, id: ElementId, class: &str) {
        let element = &mut self.elements[id.0];
        if !element.has_class(class) {
            element.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, id: ElementId, class: &str) {
        self.elements[id.0].classes.retain(|c| c != class);
    }

    pub fn toggle_class(&mut self, id: ElementId, class: &str, on: bool) {
        if on {
            self.add_class(id, class);
        } else {
            self.remove_class(id, class);
        }
    }

    pub fn text(&self, id: ElementId) -> &str {
        &self.elements[id.0].text
    }

    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) {
        self.elements[id.0].text = text.into();
    }

    pub fn append_text(&mut self, id: ElementId, text: &str) {
        self.elements[id.0].text.push_str(text);
    }

    pub fn style(&self, id: ElementId) -> &Style {
        &self.elements[id.0].style
    }

    pub fn style_mut(&mut self, id: ElementId) -> &mut Style {
        &mut self.elements[id.0].style
    }

    /// Pre-order traversal of the subtree below `scope`, excluding `scope`.
    pub fn descendants(&self, scope: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        let mut stack: Vec<ElementId> =
            self.elements[scope.0].children.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.elements[next.0].children.iter().rev().copied());
            Some(next)
        })
    }

    /// First descendant of `scope` carrying `class`, in document order.
    pub fn query(&self, scope: ElementId, class: &str) -> Option<ElementId> {
        self.descendants(scope).find(|id| self.has_class(*id, class))
    }

    pub fn query_all(&self, scope: ElementId, class: &str) -> Vec<ElementId> {
        self.descendants(scope)
            .filter(|id| self.has_class(*id, class))
            .collect()
    }

    /// Like [`Document::query`] but a missing element is a fatal error.
    pub fn require(&self, scope: ElementId, class: &str) -> Result<ElementId> {
        self.query(scope, class)
            .ok_or_else(|| Error::MissingElement {
                class: class.to_string(),
                scope: self.describe(scope),
            })
    }

    /// Short `<tag class="...">` description used in diagnostics.
    pub fn describe(&self, id: ElementId) -> String {
        let element = &self.elements[id.0];
        if element.classes.is_empty() {
            format!("<{}>", element.tag)
        } else {
            format!("<{} class=\"{}\">", element.tag, element.classes.join(" "))
        }
    }

    pub fn add_listener(&mut self, id: ElementId, listener: Listener) {
        self.listeners.entry(id).or_default().push(listener);
    }

    pub fn listeners(&self, id: ElementId) -> Vec<Listener> {
        self.listeners.get(&id).cloned().unwrap_or_default()
    }
}

/// Shared handle to a [`Document`].
#[derive(Clone, Default)]
pub struct Dom {
    inner: Arc<Mutex<Document>>,
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dom").field(&*self.lock()).finish()
    }
}

impl Dom {
    pub fn new(document: Document) -> Self {
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Document> {
        // A panicking listener must not take the whole tree down with it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.lock())
    }

    /// Dispatches a click to the listeners registered on `id`. Listeners run
    /// after the document lock is released so they may touch the tree.
    /// Returns how many listeners ran.
    pub fn click(&self, id: ElementId) -> usize {
        let listeners = self.read(|doc| doc.listeners(id));
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }
}
