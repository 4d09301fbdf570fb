//! Browser bindings for the navbar controller.
//!
//! Build with `--features web --target wasm32-unknown-unknown`.  The module
//! exports `Menu` for the page's `onclick="Menu(this)"` handler and an
//! `install` entry point that wires the scroll, mouse-leave and click
//! listeners.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlElement, Window};

use crate::dom::{Document, NavElement};
use crate::navbar::{NavbarController, NavbarElements};

/// A live DOM element.
#[derive(Debug, Clone)]
pub struct WebElement(HtmlElement);

impl WebElement {
    pub fn new(inner: HtmlElement) -> Self {
        Self(inner)
    }

    pub fn inner(&self) -> &HtmlElement {
        &self.0
    }
}

impl NavElement for WebElement {
    fn id(&self) -> Option<String> {
        let id = self.0.id();
        (!id.is_empty()).then_some(id)
    }

    fn has_class(&self, class: &str) -> bool {
        self.0.class_list().contains(class)
    }

    fn add_class(&self, class: &str) {
        // Only fails on tokens containing whitespace.
        let _ = self.0.class_list().add_1(class);
    }

    fn remove_class(&self, class: &str) {
        let _ = self.0.class_list().remove_1(class);
    }

    fn set_style(&self, property: &str, value: &str) {
        let _ = self.0.style().set_property(property, value);
    }

    fn offset_width(&self) -> i32 {
        self.0.offset_width()
    }

    fn offset_height(&self) -> i32 {
        self.0.offset_height()
    }
}

/// The page's `document`.
#[derive(Debug, Clone)]
pub struct WebDocument(web_sys::Document);

impl WebDocument {
    pub fn new(inner: web_sys::Document) -> Self {
        Self(inner)
    }
}

impl Document for WebDocument {
    type Element = WebElement;

    fn element_by_id(&self, id: &str) -> Option<WebElement> {
        self.0
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
            .map(WebElement)
    }

    fn query_class(&self, class: &str) -> Option<WebElement> {
        self.0
            .query_selector(&format!(".{class}"))
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
            .map(WebElement)
    }

    fn query_class_all(&self, class: &str) -> Vec<WebElement> {
        let Ok(list) = self.0.query_selector_all(&format!(".{class}")) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
            .map(WebElement)
            .collect()
    }
}

thread_local! {
    static CONTROLLER: RefCell<Option<NavbarController<WebElement>>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(debug_assertions)]
    console_error_panic_hook::set_once();
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))
}

fn viewport_width(window: &Window) -> i32 {
    window
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .map_or(0, |w| w as i32)
}

fn with_controller(f: impl FnOnce(&mut NavbarController<WebElement>)) {
    CONTROLLER.with(|cell| {
        if let Some(controller) = cell.borrow_mut().as_mut() {
            f(controller);
        }
    });
}

fn listen(
    target: &web_sys::EventTarget,
    event: &str,
    handler: impl FnMut() + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut()>::new(handler);
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    // Listeners live as long as the page.
    closure.forget();
    Ok(())
}

/// Locate the navbar elements, run the initial layout pass and attach the
/// event listeners.  Calling it again replaces the controller.
#[wasm_bindgen]
pub fn install() -> Result<(), JsValue> {
    let window = window()?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let elements = NavbarElements::locate(&WebDocument::new(document))
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let nav2 = elements.nav2.inner().clone();
    let content = elements.content.inner().clone();
    let controller = NavbarController::new(elements, window.scroll_y()?);
    controller.layout(viewport_width(&window));
    CONTROLLER.with(|cell| *cell.borrow_mut() = Some(controller));

    let scroll_window = window.clone();
    listen(&window, "scroll", move || {
        let y = scroll_window.scroll_y().unwrap_or(0.0);
        let width = viewport_width(&scroll_window);
        with_controller(|c| {
            c.on_scroll(y, width);
        });
    })?;
    listen(&nav2, "mouseleave", || {
        with_controller(|c| {
            c.on_nav2_mouse_leave();
        })
    })?;
    listen(&content, "click", || {
        with_controller(|c| {
            c.on_content_click();
        })
    })?;
    Ok(())
}

/// Toggle the responsive menus; `trigger` is the clicked control.
#[wasm_bindgen(js_name = Menu)]
pub fn menu(trigger: Option<web_sys::Element>) {
    let id = trigger.map(|el| el.id());
    with_controller(|c| {
        c.toggle_menu(id.as_deref());
    });
}
