//! Static assets for serve mode, compiled into the binary with
//! `include_str!` so nothing has to be shipped alongside it.

/// Stylesheet for the page shell, including the `responsive` and `hidden`
/// state rules of the navbar.
pub const CSS: &str = include_str!("assets/mdnav.css");

/// Browser-side navbar controller for the page shell plus Mermaid start-up.
///
/// Implements the same class contract as [`crate::navbar::NavbarController`]
/// for pages served without the wasm build.
pub const JS: &str = include_str!("assets/mdnav.js");

pub const CSS_PATH: &str = "/assets/mdnav.css";
pub const JS_PATH: &str = "/assets/mdnav.js";

/// `(content type, body)` of the embedded asset served at `path`.
pub fn lookup(path: &str) -> Option<(&'static str, &'static str)> {
    match path {
        CSS_PATH => Some(("text/css; charset=utf-8", CSS)),
        JS_PATH => Some(("text/javascript; charset=utf-8", JS)),
        _ => None,
    }
}
