//! Element and document seams for the navbar controller.
//!
//! The controller never looks elements up on its own; it is handed
//! [`NavElement`] handles resolved from a [`Document`].  In a browser the
//! handles wrap `web_sys::HtmlElement` (see the `web` module); everywhere
//! else [`MemoryDocument`] provides a headless stand-in.
//!
//! Methods take `&self`: like DOM nodes, handles are shared references to
//! mutable state.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// The subset of a DOM element the navbar controller reads and writes.
pub trait NavElement {
    /// The element's `id` attribute, if any.
    fn id(&self) -> Option<String>;
    fn has_class(&self, class: &str) -> bool;
    fn add_class(&self, class: &str);
    fn remove_class(&self, class: &str);
    /// Set an inline style property (`margin-left`, `height`, ...).
    fn set_style(&self, property: &str, value: &str);
    /// Rendered width in whole pixels (`offsetWidth`).
    fn offset_width(&self) -> i32;
    /// Rendered height in whole pixels (`offsetHeight`).
    fn offset_height(&self) -> i32;
}

/// Element lookup over a page.
pub trait Document {
    type Element: NavElement;

    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
    /// First element carrying `class`, in document order.
    fn query_class(&self, class: &str) -> Option<Self::Element>;
    /// Every element carrying `class`, in document order.
    fn query_class_all(&self, class: &str) -> Vec<Self::Element>;
}

// ---------------------------------------------------------------------------
// Headless implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ElementState {
    id: Option<String>,
    classes: BTreeSet<String>,
    styles: BTreeMap<String, String>,
    width: i32,
    height: i32,
}

/// A headless element: classes, inline styles and fixed dimensions.
///
/// Clones share state, like two references to the same DOM node.
#[derive(Debug, Clone, Default)]
pub struct MemoryElement {
    state: Rc<RefCell<ElementState>>,
}

impl MemoryElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: &str) -> Self {
        let el = Self::new();
        el.state.borrow_mut().id = Some(id.to_owned());
        el
    }

    pub fn with_class(self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_size(self, width: i32, height: i32) -> Self {
        self.set_size(width, height);
        self
    }

    /// Change the rendered size, e.g. to simulate a reflow.
    pub fn set_size(&self, width: i32, height: i32) {
        let mut state = self.state.borrow_mut();
        state.width = width;
        state.height = height;
    }

    /// Current value of an inline style property.
    pub fn style(&self, property: &str) -> Option<String> {
        self.state.borrow().styles.get(property).cloned()
    }

    /// Current classes, sorted.
    pub fn classes(&self) -> Vec<String> {
        self.state.borrow().classes.iter().cloned().collect()
    }

    /// Whether two handles refer to the same element.
    pub fn same_node(&self, other: &MemoryElement) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl NavElement for MemoryElement {
    fn id(&self) -> Option<String> {
        self.state.borrow().id.clone()
    }

    fn has_class(&self, class: &str) -> bool {
        self.state.borrow().classes.contains(class)
    }

    fn add_class(&self, class: &str) {
        self.state.borrow_mut().classes.insert(class.to_owned());
    }

    fn remove_class(&self, class: &str) {
        self.state.borrow_mut().classes.remove(class);
    }

    fn set_style(&self, property: &str, value: &str) {
        self.state
            .borrow_mut()
            .styles
            .insert(property.to_owned(), value.to_owned());
    }

    fn offset_width(&self) -> i32 {
        self.state.borrow().width
    }

    fn offset_height(&self) -> i32 {
        self.state.borrow().height
    }
}

/// A headless document: an ordered list of elements.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    elements: Vec<MemoryElement>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `element` and return a handle to it.
    pub fn insert(&mut self, element: MemoryElement) -> MemoryElement {
        self.elements.push(element.clone());
        element
    }

    /// A document carrying every element the navbar markup contract names,
    /// with the given widths for `#nav`, `#nav2` and the corner, and the
    /// given `#navbar` height.  One spacer element per marker class.
    pub fn navbar_fixture(nav_width: i32, nav2_width: i32, corner_width: i32, navbar_height: i32) -> Self {
        let mut doc = Self::new();
        doc.insert(MemoryElement::with_id("navbar").with_size(1280, navbar_height));
        doc.insert(MemoryElement::with_id("nav-menu").with_size(40, 40));
        doc.insert(MemoryElement::with_id("nav-menu-hamicon").with_size(24, 24));
        doc.insert(MemoryElement::with_id("nav").with_size(nav_width, 800));
        doc.insert(MemoryElement::with_id("nav2").with_size(nav2_width, 800));
        doc.insert(
            MemoryElement::new()
                .with_class("inverted-topleft-corner")
                .with_size(corner_width, corner_width),
        );
        doc.insert(MemoryElement::new().with_class("heightofnavbar"));
        doc.insert(MemoryElement::new().with_class("widthofnav"));
        doc.insert(MemoryElement::new().with_class("widthofnav2"));
        doc.insert(MemoryElement::with_id("content").with_size(1000, 2400));
        doc
    }
}

impl Document for MemoryDocument {
    type Element = MemoryElement;

    fn element_by_id(&self, id: &str) -> Option<MemoryElement> {
        self.elements
            .iter()
            .find(|el| el.state.borrow().id.as_deref() == Some(id))
            .cloned()
    }

    fn query_class(&self, class: &str) -> Option<MemoryElement> {
        self.elements.iter().find(|el| el.has_class(class)).cloned()
    }

    fn query_class_all(&self, class: &str) -> Vec<MemoryElement> {
        self.elements
            .iter()
            .filter(|el| el.has_class(class))
            .cloned()
            .collect()
    }
}
