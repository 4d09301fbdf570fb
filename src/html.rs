//! Markdown to HTML rendering and the navbar page shell.
//!
//! Markdown goes through comrak with GFM extensions.  Before formatting, the
//! AST is rewritten in place: Mermaid fences become placeholders, local links
//! become root-relative, and text nodes are passed through the abbreviation
//! expander.  The page shell wraps the result in the element layout the
//! navbar controller expects (`#navbar`, `#nav`, `#nav2`, `#content`, ...).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use comrak::{
    arena_tree::NodeEdge,
    format_html,
    nodes::{AstNode, NodeValue},
    parse_document, Arena, Options,
};
use tracing::{debug, info};

use crate::abbrev::{Expander, Segment};
use crate::navbar::{
    CONTENT_ID, CORNER_CLASS, HAMICON_ID, HEIGHT_OF_NAVBAR_CLASS, NAV2_ID, NAVBAR_ID, NAV_ID,
    WIDTH_OF_NAV2_CLASS, WIDTH_OF_NAV_CLASS,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading extracted from the document for TOC construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// Heading level (1–6).
    pub level: u8,
    /// Plain-text content of the heading.
    pub text: String,
    /// URL-safe anchor ID, deduplicated within the document (`intro`,
    /// `intro-1`, `intro-2`, ...).
    pub anchor_id: String,
}

/// An entry in the `#nav2` page list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Root-relative URL path, e.g. `/guide.md`.
    pub url_path: String,
    /// Link text, usually the file stem.
    pub title: String,
}

/// Per-page data for [`build_page_shell`].
pub struct PageShellContext<'a> {
    /// Pages listed in the secondary nav.
    pub pages: &'a [PageLink],
    /// Root-relative URL of the page being rendered; the matching entry in
    /// `pages` is marked current.
    pub page_url_path: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// comrak options: strikethrough, tables, autolinks, task lists.  Raw HTML in
/// the input is never passed through.
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.unsafe_ = false;
    options
}

/// Lowercase, map spaces/hyphens/underscores to single `-`, drop everything
/// else that is not alphanumeric, trim dashes.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c == ' ' || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_owned()
}

fn collect_heading_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(s) => text.push_str(s),
            NodeValue::Code(c) => text.push_str(&c.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => text.push_str(&collect_heading_text(child)),
        }
    }
    text
}

/// Minimal HTML entity escaping for text content and attribute values.
pub(crate) fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `<hN>` → `<hN id="...">`, first occurrence per heading, in order.  Raw
/// HTML is disabled, so every bare `<hN>` comes from a markdown heading.
fn inject_heading_ids(html: &str, headings: &[HeadingEntry]) -> String {
    let mut result = html.to_owned();
    for heading in headings {
        let tag = format!("<h{}>", heading.level);
        let with_id = format!("<h{} id=\"{}\">", heading.level, heading.anchor_id);
        result = result.replacen(&tag, &with_id, 1);
    }
    result
}

fn build_toc_html(headings: &[HeadingEntry]) -> String {
    if headings.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul class=\"toc\">\n");
    for heading in headings {
        html.push_str(&format!(
            "<li class=\"toc-h{}\"><a href=\"#{}\">{}</a></li>\n",
            heading.level,
            heading.anchor_id,
            html_escape(&heading.text),
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn build_pages_html(pages: &[PageLink], current: Option<&str>) -> String {
    if pages.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul class=\"pages\">\n");
    for page in pages {
        let class = if current == Some(page.url_path.as_str()) {
            " class=\"current\""
        } else {
            ""
        };
        html.push_str(&format!(
            "<li{class}><a href=\"{}\">{}</a></li>\n",
            html_escape(&page.url_path),
            html_escape(&page.title),
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn is_mermaid_info(info: &str) -> bool {
    info.split_whitespace()
        .next()
        .is_some_and(|lang| lang.eq_ignore_ascii_case("mermaid"))
}

/// Replace ```` ```mermaid ```` fences with `<pre class="mermaid">` holding
/// the escaped diagram source.
fn rewrite_mermaid_code_blocks<'a>(root: &'a AstNode<'a>) -> usize {
    let mut rewritten = 0usize;

    for node in root.descendants() {
        let replacement = match &node.data.borrow().value {
            NodeValue::CodeBlock(ncb) if ncb.fenced && is_mermaid_info(&ncb.info) => Some(format!(
                "<pre class=\"mermaid\">{}</pre>\n",
                html_escape(&ncb.literal)
            )),
            _ => None,
        };

        if let Some(raw_html) = replacement {
            node.data.borrow_mut().value = NodeValue::Raw(raw_html);
            rewritten += 1;
        }
    }

    rewritten
}

// ---------------------------------------------------------------------------
// Abbreviation expansion over the AST
// ---------------------------------------------------------------------------

/// Text under these nodes is left alone: headings feed TOC slugs and images
/// render their text into an `alt` attribute.
fn in_excluded_context<'a>(node: &'a AstNode<'a>) -> bool {
    node.ancestors().any(|a| {
        matches!(
            a.data.borrow().value,
            NodeValue::Heading(_) | NodeValue::Image(_)
        )
    })
}

/// Fold runs of sibling text nodes into the first one so a pattern is never
/// split across nodes.
fn merge_adjacent_text<'a>(root: &'a AstNode<'a>) {
    let texts: Vec<&'a AstNode<'a>> = root
        .descendants()
        .filter(|n| matches!(n.data.borrow().value, NodeValue::Text(_)))
        .collect();

    for node in texts {
        // Already folded into an earlier sibling.
        if node.parent().is_none() {
            continue;
        }
        while let Some(next) = node.next_sibling() {
            let tail = match &next.data.borrow().value {
                NodeValue::Text(t) => t.clone(),
                _ => break,
            };
            if let NodeValue::Text(t) = &mut node.data.borrow_mut().value {
                t.push_str(&tail);
            }
            next.detach();
        }
    }
}

/// Replace text nodes containing abbreviations with raw HTML: escaped text
/// around `<abbr>` markup.  Returns the number of abbreviations emitted.
fn expand_abbreviations<'a>(root: &'a AstNode<'a>, expander: &Expander) -> usize {
    merge_adjacent_text(root);

    let mut expanded = 0usize;
    for node in root.descendants() {
        let replacement = {
            let data = node.data.borrow();
            let NodeValue::Text(text) = &data.value else {
                continue;
            };
            let segments = expander.segments(text);
            if !segments.iter().any(|s| matches!(s, Segment::Abbr { .. })) {
                continue;
            }
            if in_excluded_context(node) {
                continue;
            }
            let mut html = String::with_capacity(text.len() * 2);
            for segment in segments {
                match segment {
                    Segment::Text(t) => html.push_str(&html_escape(t)),
                    Segment::Abbr { token, title } => {
                        html.push_str(&expander.render_abbr(token, title));
                        expanded += 1;
                    }
                }
            }
            html
        };
        node.data.borrow_mut().value = NodeValue::Raw(replacement);
    }
    expanded
}

// ---------------------------------------------------------------------------
// Local link rewriting
// ---------------------------------------------------------------------------

/// Split at the first `?` or `#`: `("page.md", "#frag")`.
fn split_url_suffix(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    }
}

/// Lexically resolve `rel` against `file_dir`.  `..` never climbs past the
/// filesystem root.
fn resolve_relative_path(file_dir: &Path, rel: &str) -> PathBuf {
    let mut resolved = file_dir.to_path_buf();
    for component in rel.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            part => resolved.push(part),
        }
    }
    resolved
}

/// Root-relative href for a local relative link, or `None` to leave the URL
/// untouched (external, absolute, fragment-only, or escaping `serve_root`).
fn rewrite_url(url: &str, file_dir: &Path, serve_root: &Path) -> Option<String> {
    const UNTOUCHED_PREFIXES: [&str; 4] = ["http://", "https://", "//", "mailto:"];
    if UNTOUCHED_PREFIXES.iter().any(|p| url.starts_with(p))
        || url.starts_with('#')
        || url.starts_with('/')
    {
        return None;
    }

    let (base, suffix) = split_url_suffix(url);
    if base.is_empty() {
        return None;
    }

    let resolved = resolve_relative_path(file_dir, base);
    let rel = resolved.strip_prefix(serve_root).ok()?;
    Some(format!("/{}{}", rel.to_string_lossy(), suffix))
}

/// Rewrite link and image URLs in place.  Returns `(rewritten, skipped)`.
fn rewrite_local_links<'a>(
    root: &'a AstNode<'a>,
    file_path: &Path,
    serve_root: &Path,
) -> (usize, usize) {
    let file_dir = file_path.parent().unwrap_or(Path::new(""));
    let mut rewritten = 0usize;
    let mut skipped = 0usize;

    for node in root.descendants() {
        let mut data = node.data.borrow_mut();
        let url = match &mut data.value {
            NodeValue::Link(nl) => &mut nl.url,
            NodeValue::Image(ni) => &mut ni.url,
            _ => continue,
        };

        match rewrite_url(url, file_dir, serve_root) {
            Some(new_url) => {
                *url = new_url;
                rewritten += 1;
            }
            None => skipped += 1,
        }
    }

    (rewritten, skipped)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render markdown to an HTML fragment and collect its headings.
///
/// `file_path` locates the source for link rewriting and logging;
/// `serve_root` is the directory local links are made relative to.
/// Abbreviations in body text are expanded with `expander`; headings, code
/// and image alt text are left as written.
pub fn render_markdown(
    input: &str,
    file_path: &Path,
    serve_root: &Path,
    expander: &Expander,
) -> (String, Vec<HeadingEntry>) {
    let arena = Arena::new();
    let options = make_options();
    let root = parse_document(&arena, input, &options);

    let mermaid = rewrite_mermaid_code_blocks(root);
    let (rewritten, skipped) = rewrite_local_links(root, file_path, serve_root);
    debug!(
        file = %file_path.display(),
        mermaid,
        rewritten,
        skipped,
        "rewrite"
    );

    let mut entries: Vec<HeadingEntry> = Vec::new();
    let mut slug_counter: HashMap<String, usize> = HashMap::new();

    for edge in root.traverse() {
        if let NodeEdge::Start(node) = edge {
            if let NodeValue::Heading(nh) = &node.data.borrow().value {
                let text = collect_heading_text(node);
                let base_slug = slugify(&text);

                let count = slug_counter.entry(base_slug.clone()).or_insert(0);
                let anchor_id = if *count == 0 {
                    base_slug
                } else {
                    format!("{}-{}", base_slug, count)
                };
                *count += 1;

                entries.push(HeadingEntry {
                    level: nh.level,
                    text,
                    anchor_id,
                });
            }
        }
    }

    let abbreviations = expand_abbreviations(root, expander);

    let mut html_bytes = Vec::new();
    format_html(root, &options, &mut html_bytes).expect("comrak HTML formatting should not fail");
    let html = String::from_utf8_lossy(&html_bytes).into_owned();

    info!(
        path = %file_path.display(),
        headings = entries.len(),
        abbreviations,
        policy = %expander.policy(),
        "render"
    );

    (html, entries)
}

/// Wrap a rendered fragment in a full document laid out for the navbar
/// controller.
///
/// The title is the first H1, else the file stem.  `#nav` holds the TOC,
/// `#nav2` the page list, `#content` the body.  The menu button carries the
/// `nav-menu` id so toggles it triggers arm the content-click collapse.
pub fn build_page_shell(
    body_html: &str,
    headings: &[HeadingEntry],
    file_path: &Path,
    ctx: &PageShellContext,
) -> String {
    let title_raw = headings
        .iter()
        .find(|h| h.level == 1)
        .map(|h| h.text.as_str())
        .or_else(|| file_path.file_stem().and_then(|s| s.to_str()))
        .unwrap_or("Document");

    let title = html_escape(title_raw);
    let content_html = inject_heading_ids(body_html, headings);
    let toc_html = build_toc_html(headings);
    let pages_html = build_pages_html(ctx.pages, ctx.page_url_path);

    // Pinned so CDN updates cannot change rendering.
    const MERMAID_CDN_URL: &str = "https://cdn.jsdelivr.net/npm/mermaid@10.9.3/dist/mermaid.min.js";

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title} · mdnav</title>\n\
<link rel=\"stylesheet\" href=\"/assets/mdnav.css\">\n\
</head>\n\
<body>\n\
<header id=\"{NAVBAR_ID}\" class=\"navbar\">\n\
<button id=\"nav-menu\" class=\"nav-menu\" aria-label=\"Toggle navigation\" onclick=\"Menu(this)\">\
<span id=\"{HAMICON_ID}\" class=\"hamicon\"></span></button>\n\
<div class=\"navbar-spacer {WIDTH_OF_NAV_CLASS}\"></div>\n\
<span class=\"navbar-title\">{title}</span>\n\
</header>\n\
<nav id=\"{NAV_ID}\" class=\"toc-sidebar\">\n\
<div class=\"{HEIGHT_OF_NAVBAR_CLASS}\"></div>\n\
{toc_html}</nav>\n\
<nav id=\"{NAV2_ID}\" class=\"pages-sidebar\">\n\
<div class=\"{HEIGHT_OF_NAVBAR_CLASS}\"></div>\n\
<div class=\"pages-title {WIDTH_OF_NAV2_CLASS}\">Pages</div>\n\
{pages_html}</nav>\n\
<div class=\"{CORNER_CLASS}\"></div>\n\
<main id=\"{CONTENT_ID}\" class=\"content\">\n\
{content_html}</main>\n\
<script src=\"{MERMAID_CDN_URL}\"></script>\n\
<script src=\"/assets/mdnav.js\"></script>\n\
</body>\n\
</html>\n"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
