//! Responsive navbar controller.
//!
//! Drives the CSS class contract of the page shell:
//!
//! - `responsive` on `#nav`, `#nav2`, `#navbar` and `#nav-menu-hamicon`
//!   expands the menus (hamburger mode);
//! - `hidden` on `#navbar`, `#nav` and `#nav2` slides the chrome away while
//!   the reader scrolls down.
//!
//! The controller owns the only piece of page state, the previous vertical
//! scroll offset, and is constructed once per page from element handles
//! resolved by [`NavbarElements::locate`].

use tracing::{debug, trace};

use crate::dom::{Document, NavElement};
use crate::error::{Error, Result};

pub const RESPONSIVE_CLASS: &str = "responsive";
pub const HIDDEN_CLASS: &str = "hidden";

pub const NAVBAR_ID: &str = "navbar";
pub const NAV_ID: &str = "nav";
pub const NAV2_ID: &str = "nav2";
pub const HAMICON_ID: &str = "nav-menu-hamicon";
pub const CONTENT_ID: &str = "content";

pub const CORNER_CLASS: &str = "inverted-topleft-corner";
pub const HEIGHT_OF_NAVBAR_CLASS: &str = "heightofnavbar";
pub const WIDTH_OF_NAV_CLASS: &str = "widthofnav";
pub const WIDTH_OF_NAV2_CLASS: &str = "widthofnav2";

/// Tunables for [`NavbarController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavbarConfig {
    /// Viewports strictly wider than this (in px) keep the side nav docked
    /// and offset the content by its width.
    pub width_threshold: i32,
    /// Id of the control whose toggles arm [`CollapseHook::ContentClick`].
    pub menu_trigger_id: String,
}

impl Default for NavbarConfig {
    fn default() -> Self {
        Self {
            width_threshold: 575,
            menu_trigger_id: "nav-menu".to_owned(),
        }
    }
}

/// Which event collapses an expanded `#nav2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollapseHook {
    /// The pointer leaving `#nav2`.
    #[default]
    Nav2MouseLeave,
    /// A click anywhere in `#content`; armed when the menu button opened
    /// `#nav2`.
    ContentClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    /// Downward or no movement.
    Down,
}

/// Expanded/collapsed state of the toggled elements after a menu toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuState {
    pub nav: bool,
    pub nav2: bool,
    pub navbar: bool,
    pub hamicon: bool,
    pub hook: CollapseHook,
}

/// Handles to every element the controller touches.
#[derive(Debug, Clone)]
pub struct NavbarElements<E> {
    pub navbar: E,
    pub nav: E,
    pub nav2: E,
    pub hamicon: E,
    pub content: E,
    /// Decorative corner whose width is subtracted from nav widths.
    pub corner: Option<E>,
    pub height_of_navbar: Vec<E>,
    pub width_of_nav: Vec<E>,
    pub width_of_nav2: Vec<E>,
}

impl<E: NavElement> NavbarElements<E> {
    /// Resolve all handles from `doc`.
    ///
    /// Fails with [`Error::MissingElement`] naming the first required id that
    /// is absent.  A missing corner element counts as zero width.
    pub fn locate<D>(doc: &D) -> Result<Self>
    where
        D: Document<Element = E>,
    {
        let required = |id: &str| {
            doc.element_by_id(id)
                .ok_or_else(|| Error::MissingElement(id.to_owned()))
        };
        Ok(Self {
            navbar: required(NAVBAR_ID)?,
            nav: required(NAV_ID)?,
            nav2: required(NAV2_ID)?,
            hamicon: required(HAMICON_ID)?,
            content: required(CONTENT_ID)?,
            corner: doc.query_class(CORNER_CLASS),
            height_of_navbar: doc.query_class_all(HEIGHT_OF_NAVBAR_CLASS),
            width_of_nav: doc.query_class_all(WIDTH_OF_NAV_CLASS),
            width_of_nav2: doc.query_class_all(WIDTH_OF_NAV2_CLASS),
        })
    }

    fn corner_width(&self) -> i32 {
        self.corner.as_ref().map_or(0, |c| c.offset_width())
    }
}

fn px(value: i32) -> String {
    format!("{value}px")
}

/// Flip `class` on `el`, mirroring the new state onto `follower`.
/// Returns whether the class is now present.
fn flip<E: NavElement>(el: &E, follower: &E, class: &str) -> bool {
    if el.has_class(class) {
        el.remove_class(class);
        follower.remove_class(class);
        false
    } else {
        el.add_class(class);
        follower.add_class(class);
        true
    }
}

pub struct NavbarController<E> {
    elements: NavbarElements<E>,
    config: NavbarConfig,
    prev_scroll_y: f64,
    hook: CollapseHook,
}

impl<E: NavElement> NavbarController<E> {
    pub fn new(elements: NavbarElements<E>, initial_scroll_y: f64) -> Self {
        Self::with_config(elements, initial_scroll_y, NavbarConfig::default())
    }

    pub fn with_config(elements: NavbarElements<E>, initial_scroll_y: f64, config: NavbarConfig) -> Self {
        Self {
            elements,
            config,
            prev_scroll_y: initial_scroll_y,
            hook: CollapseHook::default(),
        }
    }

    pub fn elements(&self) -> &NavbarElements<E> {
        &self.elements
    }

    pub fn config(&self) -> &NavbarConfig {
        &self.config
    }

    pub fn previous_scroll_y(&self) -> f64 {
        self.prev_scroll_y
    }

    pub fn collapse_hook(&self) -> CollapseHook {
        self.hook
    }

    /// Current menu state read back from the elements.
    pub fn state(&self) -> MenuState {
        let e = &self.elements;
        MenuState {
            nav: e.nav.has_class(RESPONSIVE_CLASS),
            nav2: e.nav2.has_class(RESPONSIVE_CLASS),
            navbar: e.navbar.has_class(RESPONSIVE_CLASS),
            hamicon: e.hamicon.has_class(RESPONSIVE_CLASS),
            hook: self.hook,
        }
    }

    /// Toggle the responsive menus.
    ///
    /// `#nav`, `#nav2` and `#navbar` each flip independently; the hamburger
    /// icon follows each flip in turn and so ends up matching `#navbar`.
    /// Opening `#nav2` from the menu trigger arms the content-click collapse;
    /// closing `#nav2` re-arms the mouse-leave collapse.
    pub fn toggle_menu(&mut self, trigger: Option<&str>) -> MenuState {
        let e = &self.elements;

        flip(&e.nav, &e.hamicon, RESPONSIVE_CLASS);

        if e.nav2.has_class(RESPONSIVE_CLASS) {
            self.hook = CollapseHook::Nav2MouseLeave;
            e.nav2.remove_class(RESPONSIVE_CLASS);
            e.hamicon.remove_class(RESPONSIVE_CLASS);
        } else {
            if trigger == Some(self.config.menu_trigger_id.as_str()) {
                self.hook = CollapseHook::ContentClick;
            }
            e.nav2.add_class(RESPONSIVE_CLASS);
            e.hamicon.add_class(RESPONSIVE_CLASS);
        }

        flip(&e.navbar, &e.hamicon, RESPONSIVE_CLASS);

        let state = self.state();
        debug!(
            trigger = trigger.unwrap_or("-"),
            nav = state.nav,
            nav2 = state.nav2,
            navbar = state.navbar,
            hook = ?state.hook,
            "menu toggled"
        );
        state
    }

    /// Pointer left `#nav2`. Collapses it when that hook is armed.
    pub fn on_nav2_mouse_leave(&mut self) -> bool {
        self.collapse_if(CollapseHook::Nav2MouseLeave)
    }

    /// Click inside `#content`. Collapses `#nav2` when that hook is armed.
    pub fn on_content_click(&mut self) -> bool {
        self.collapse_if(CollapseHook::ContentClick)
    }

    fn collapse_if(&mut self, hook: CollapseHook) -> bool {
        if self.hook != hook || !self.elements.nav2.has_class(RESPONSIVE_CLASS) {
            return false;
        }
        self.toggle_menu(None);
        true
    }

    /// Show or hide the chrome depending on scroll direction.
    ///
    /// Scrolling up reveals `#navbar`, `#nav` and `#nav2` and, on wide
    /// viewports, re-docks the content beside `#nav`.  Any other movement
    /// hides them and resets the content offset.  The observed offset always
    /// becomes the new reference.
    pub fn on_scroll(&mut self, scroll_y: f64, viewport_width: i32) -> ScrollDirection {
        let e = &self.elements;
        let direction = if self.prev_scroll_y > scroll_y {
            for el in [&e.navbar, &e.nav, &e.nav2] {
                el.remove_class(HIDDEN_CLASS);
            }
            if viewport_width > self.config.width_threshold {
                e.content.set_style("margin-left", &px(self.docked_offset()));
            }
            ScrollDirection::Up
        } else {
            for el in [&e.navbar, &e.nav, &e.nav2] {
                el.add_class(HIDDEN_CLASS);
            }
            e.content.set_style("margin-left", "0");
            ScrollDirection::Down
        };
        trace!(prev = self.prev_scroll_y, current = scroll_y, ?direction, "scroll");
        self.prev_scroll_y = scroll_y;
        direction
    }

    /// Initial layout pass: offset the content below the navbar and beside
    /// the nav, and size the spacer elements.
    pub fn layout(&self, viewport_width: i32) {
        let e = &self.elements;
        let corner = e.corner_width();
        if viewport_width > self.config.width_threshold {
            e.content.set_style("margin-left", &px(self.docked_offset()));
        }
        let navbar_height = px(e.navbar.offset_height());
        e.content.set_style("margin-top", &navbar_height);
        for el in &e.height_of_navbar {
            el.set_style("height", &navbar_height);
        }
        let nav_width = px(e.nav.offset_width() - corner);
        for el in &e.width_of_nav {
            el.set_style("width", &nav_width);
        }
        let nav2_width = px(e.nav2.offset_width() - corner);
        for el in &e.width_of_nav2 {
            el.set_style("width", &nav2_width);
        }
        debug!(
            viewport_width,
            navbar_height = e.navbar.offset_height(),
            spacers = e.height_of_navbar.len() + e.width_of_nav.len() + e.width_of_nav2.len(),
            "layout"
        );
    }

    fn docked_offset(&self) -> i32 {
        self.elements.nav.offset_width() - self.elements.corner_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, MemoryElement};

    fn controller() -> (MemoryDocument, NavbarController<MemoryElement>) {
        let doc = MemoryDocument::navbar_fixture(260, 240, 20, 64);
        let elements = NavbarElements::locate(&doc).unwrap();
        (doc, NavbarController::new(elements, 0.0))
    }

    fn el(doc: &MemoryDocument, id: &str) -> MemoryElement {
        doc.element_by_id(id).unwrap()
    }

    #[test]
    fn locate_reports_first_missing_id() {
        let mut doc = MemoryDocument::new();
        doc.insert(MemoryElement::with_id("navbar"));
        doc.insert(MemoryElement::with_id("nav"));
        match NavbarElements::locate(&doc) {
            Err(Error::MissingElement(id)) => assert_eq!(id, "nav2"),
            other => panic!("expected MissingElement, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn locate_tolerates_missing_corner() {
        let mut doc = MemoryDocument::new();
        for id in ["navbar", "nav", "nav2", "nav-menu-hamicon", "content"] {
            doc.insert(MemoryElement::with_id(id).with_size(100, 50));
        }
        let elements = NavbarElements::locate(&doc).unwrap();
        assert!(elements.corner.is_none());
        let ctl = NavbarController::new(elements, 0.0);
        ctl.layout(1024);
        assert_eq!(el(&doc, "content").style("margin-left").as_deref(), Some("100px"));
    }

    #[test]
    fn first_toggle_expands_everything() {
        let (_doc, mut ctl) = controller();
        let state = ctl.toggle_menu(None);
        assert!(state.nav && state.nav2 && state.navbar && state.hamicon);
        assert_eq!(state.hook, CollapseHook::Nav2MouseLeave);
    }

    #[test]
    fn second_toggle_collapses_everything() {
        let (_doc, mut ctl) = controller();
        ctl.toggle_menu(None);
        let state = ctl.toggle_menu(None);
        assert!(!state.nav && !state.nav2 && !state.navbar && !state.hamicon);
    }

    #[test]
    fn elements_flip_independently() {
        let (doc, mut ctl) = controller();
        el(&doc, "nav2").add_class(RESPONSIVE_CLASS);
        let state = ctl.toggle_menu(None);
        assert!(state.nav);
        assert!(!state.nav2);
        assert!(state.navbar);
        assert!(state.hamicon, "hamburger follows the last flip");
    }

    #[test]
    fn hamburger_ends_matching_navbar() {
        let (doc, mut ctl) = controller();
        el(&doc, "navbar").add_class(RESPONSIVE_CLASS);
        let state = ctl.toggle_menu(None);
        assert!(state.nav && state.nav2);
        assert!(!state.navbar);
        assert!(!state.hamicon);
    }

    #[test]
    fn menu_trigger_arms_content_click() {
        let (_doc, mut ctl) = controller();
        let state = ctl.toggle_menu(Some("nav-menu"));
        assert_eq!(state.hook, CollapseHook::ContentClick);

        assert!(!ctl.on_nav2_mouse_leave(), "mouse-leave is disarmed");
        assert!(ctl.state().nav2);

        assert!(ctl.on_content_click());
        let state = ctl.state();
        assert!(!state.nav2);
        assert_eq!(state.hook, CollapseHook::Nav2MouseLeave);
    }

    #[test]
    fn other_trigger_keeps_mouse_leave_hook() {
        let (_doc, mut ctl) = controller();
        ctl.toggle_menu(Some("some-link"));
        assert_eq!(ctl.collapse_hook(), CollapseHook::Nav2MouseLeave);
        assert!(!ctl.on_content_click());
        assert!(ctl.on_nav2_mouse_leave());
        assert!(!ctl.state().nav2);
    }

    #[test]
    fn collapse_hooks_ignore_collapsed_nav2() {
        let (_doc, mut ctl) = controller();
        assert!(!ctl.on_nav2_mouse_leave());
        assert!(!ctl.on_content_click());
        assert!(!ctl.state().nav);
    }

    #[test]
    fn custom_trigger_id() {
        let doc = MemoryDocument::navbar_fixture(260, 240, 20, 64);
        let elements = NavbarElements::locate(&doc).unwrap();
        let config = NavbarConfig {
            menu_trigger_id: "burger".to_owned(),
            ..NavbarConfig::default()
        };
        let mut ctl = NavbarController::with_config(elements, 0.0, config);
        ctl.toggle_menu(Some("nav-menu"));
        assert_eq!(ctl.collapse_hook(), CollapseHook::Nav2MouseLeave);
        ctl.toggle_menu(None);
        ctl.toggle_menu(Some("burger"));
        assert_eq!(ctl.collapse_hook(), CollapseHook::ContentClick);
    }

    #[test]
    fn scroll_down_hides_and_resets_margin() {
        let (doc, mut ctl) = controller();
        assert_eq!(ctl.on_scroll(120.0, 1280), ScrollDirection::Down);
        for id in ["navbar", "nav", "nav2"] {
            assert!(el(&doc, id).has_class(HIDDEN_CLASS), "#{id} hidden");
        }
        assert_eq!(el(&doc, "content").style("margin-left").as_deref(), Some("0"));
        assert_eq!(ctl.previous_scroll_y(), 120.0);
    }

    #[test]
    fn scroll_up_reveals_and_redocks() {
        let (doc, mut ctl) = controller();
        ctl.on_scroll(300.0, 1280);
        assert_eq!(ctl.on_scroll(250.0, 1280), ScrollDirection::Up);
        for id in ["navbar", "nav", "nav2"] {
            assert!(!el(&doc, id).has_class(HIDDEN_CLASS), "#{id} visible");
        }
        assert_eq!(el(&doc, "content").style("margin-left").as_deref(), Some("240px"));
        assert_eq!(ctl.previous_scroll_y(), 250.0);
    }

    #[test]
    fn scroll_up_on_narrow_viewport_keeps_margin() {
        let (doc, mut ctl) = controller();
        ctl.on_scroll(300.0, 480);
        ctl.on_scroll(100.0, 480);
        assert!(!el(&doc, "nav").has_class(HIDDEN_CLASS));
        assert_eq!(el(&doc, "content").style("margin-left").as_deref(), Some("0"));
    }

    #[test]
    fn threshold_is_exclusive() {
        let (doc, mut ctl) = controller();
        ctl.on_scroll(300.0, 575);
        ctl.on_scroll(100.0, 575);
        assert_eq!(el(&doc, "content").style("margin-left").as_deref(), Some("0"));
        ctl.on_scroll(50.0, 576);
        assert_eq!(el(&doc, "content").style("margin-left").as_deref(), Some("240px"));
    }

    #[test]
    fn unchanged_offset_counts_as_down() {
        let (doc, mut ctl) = controller();
        assert_eq!(ctl.on_scroll(0.0, 1280), ScrollDirection::Down);
        assert!(el(&doc, "navbar").has_class(HIDDEN_CLASS));
    }

    #[test]
    fn margin_tracks_nav_reflow() {
        let (doc, mut ctl) = controller();
        ctl.on_scroll(300.0, 1280);
        el(&doc, "nav").set_size(300, 800);
        ctl.on_scroll(200.0, 1280);
        assert_eq!(el(&doc, "content").style("margin-left").as_deref(), Some("280px"));
    }

    #[test]
    fn layout_sizes_content_and_spacers() {
        let (doc, ctl) = controller();
        ctl.layout(1280);
        let content = el(&doc, "content");
        assert_eq!(content.style("margin-left").as_deref(), Some("240px"));
        assert_eq!(content.style("margin-top").as_deref(), Some("64px"));
        assert_eq!(
            doc.query_class("heightofnavbar").unwrap().style("height").as_deref(),
            Some("64px")
        );
        assert_eq!(
            doc.query_class("widthofnav").unwrap().style("width").as_deref(),
            Some("240px")
        );
        assert_eq!(
            doc.query_class("widthofnav2").unwrap().style("width").as_deref(),
            Some("220px")
        );
    }

    #[test]
    fn layout_on_narrow_viewport_skips_left_margin() {
        let (doc, ctl) = controller();
        ctl.layout(400);
        let content = el(&doc, "content");
        assert_eq!(content.style("margin-left"), None);
        assert_eq!(content.style("margin-top").as_deref(), Some("64px"));
    }
}
