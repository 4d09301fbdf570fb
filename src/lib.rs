//! mdnav: markdown pages with abbreviation expansion and a responsive
//! navigation bar.
//!
//! - [`abbrev`] rewrites `TOKEN (expansion)` into `<abbr>` markup.
//! - [`navbar`] is the navbar state machine, driven through the element
//!   seams in [`dom`].
//! - [`html`] renders markdown into the page shell the navbar expects.
//! - `serve` (native only) serves a directory of markdown over HTTP.
//! - `web` (feature `web`) binds the navbar to a live browser DOM.

pub mod abbrev;
pub mod dom;
pub mod error;
pub mod html;
pub mod navbar;
pub mod web_assets;

#[cfg(not(target_arch = "wasm32"))]
pub mod logging;
#[cfg(not(target_arch = "wasm32"))]
pub mod serve;

#[cfg(feature = "web")]
pub mod web;

pub use abbrev::{expand, Expander, TokenPolicy};
pub use error::{Error, Result};
pub use navbar::{NavbarConfig, NavbarController, NavbarElements, ScrollDirection};
