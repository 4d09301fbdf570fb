//! HTTP serve mode.
//!
//! Serves the directory containing the entry file: markdown is rendered
//! through the abbreviation expander into the navbar page shell, everything
//! else is served as a static file.

use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Router,
};
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::{error, info, warn};

use crate::abbrev::Expander;
use crate::error::{Error, Result};
use crate::html::{self, PageLink, PageShellContext};
use crate::web_assets;

/// Consecutive ports tried before giving up.
const MAX_PORT_ATTEMPTS: u16 = 100;

/// Files larger than this (16 MiB) are refused with 413.
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Settings chosen on the command line.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub expander: Expander,
}

/// Shared by all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Directory files are served from.
    pub serve_root: PathBuf,
    /// Canonical `serve_root`, for symlink-safe containment checks.
    pub canonical_root: PathBuf,
    /// File named on the command line; answers `/` when the root has no
    /// README.md or index.md.
    pub entry_file: PathBuf,
    /// Markdown files directly under the root, listed in `#nav2`.
    pub pages: Vec<PageLink>,
    pub config: AppConfig,
}

/// Bind `bind_addr:start_port`, moving to the next port on `EADDRINUSE` up to
/// [`MAX_PORT_ATTEMPTS`] times.  Other errors fail immediately.
pub fn bind_with_retry(bind_addr: &str, start_port: u16) -> Result<(TcpListener, u16)> {
    let mut port = start_port;
    for _ in 0..MAX_PORT_ATTEMPTS {
        let addr = format!("{}:{}", bind_addr, port);
        match TcpListener::bind(&addr) {
            Ok(listener) => {
                info!(port, "bind success");
                return Ok((listener, port));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port.wrapping_add(1);
                warn!(port, next, "address in use");
                port = next;
            }
            Err(e) => {
                return Err(Error::Bind(format!("{}:{} failed: {}", bind_addr, port, e)));
            }
        }
    }
    Err(Error::Bind(format!(
        "exhausted {} port candidates starting at {}; all ports in use",
        MAX_PORT_ATTEMPTS, start_port,
    )))
}

/// Markdown files directly under `root`, sorted by file name.
pub fn collect_pages(root: &Path) -> Vec<PageLink> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "page index unavailable");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let title = Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone());
            PageLink {
                url_path: format!("/{name}"),
                title,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Path resolution helpers
// ---------------------------------------------------------------------------

/// Percent-decode a URL path (RFC 3986 §2.1).
///
/// Fails on a truncated or non-hex `%XX` sequence and on decoded bytes that
/// are not UTF-8.
pub fn percent_decode(encoded: &str) -> std::result::Result<String, ()> {
    let bytes = encoded.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(());
            }
            let hi = hex_digit(bytes[i + 1])?;
            let lo = hex_digit(bytes[i + 2])?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ())
}

fn hex_digit(b: u8) -> std::result::Result<u8, ()> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(()),
    }
}

/// Drop `.` and empty components and resolve `..`.  `None` when `..` would
/// climb above the root.
pub fn normalize_path(decoded: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for component in decoded.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }
    Some(parts.iter().collect())
}

/// `Content-Type` for a file extension, case-insensitive.  Unknown types are
/// `application/octet-stream` so browsers never sniff.
pub fn mime_for_ext(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "md" | "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Resolve a candidate path: the file itself, `README.md` then `index.md`
/// for a directory, or `<candidate>.md` when it has no extension.
///
/// Returns the resolved path and the branch that matched.
async fn resolve_candidate(candidate: &Path) -> Option<(PathBuf, &'static str)> {
    async fn is_file(path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    match tokio::fs::metadata(candidate).await {
        Ok(meta) if meta.is_file() => return Some((candidate.to_path_buf(), "exact")),
        Ok(meta) if meta.is_dir() => {
            let readme = candidate.join("README.md");
            if is_file(&readme).await {
                return Some((readme, "readme"));
            }
            let index = candidate.join("index.md");
            if is_file(&index).await {
                return Some((index, "index"));
            }
            return None;
        }
        _ => {}
    }

    if candidate.extension().is_none() {
        let with_md = candidate.with_extension("md");
        if is_file(&with_md).await {
            return Some((with_md, "extensionless"));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Conditional requests
// ---------------------------------------------------------------------------

/// Validators for a file-backed response.
struct Validators {
    etag: String,
    last_modified: Option<SystemTime>,
}

impl Validators {
    fn new(size: u64, modified: Option<SystemTime>, variant: &str) -> Self {
        let mtime = modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            etag: format!("\"{size:x}-{mtime:x}-{variant}\""),
            last_modified: modified,
        }
    }

    /// Whether the client's cached copy is current.
    ///
    /// `If-None-Match` wins when present; otherwise `If-Modified-Since` is
    /// compared at whole-second precision.
    fn not_modified(&self, headers: &HeaderMap) -> bool {
        if let Some(inm) = headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
        {
            return inm
                .split(',')
                .map(str::trim)
                .any(|tag| tag == "*" || tag == self.etag);
        }

        let since = headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| httpdate::parse_http_date(v).ok());
        match (since, self.last_modified) {
            (Some(since), Some(modified)) => unix_secs(modified) <= unix_secs(since),
            _ => false,
        }
    }

    fn apply(&self, builder: axum::http::response::Builder) -> axum::http::response::Builder {
        let builder = builder.header(header::ETAG, self.etag.as_str());
        match self.last_modified {
            Some(t) => builder.header(header::LAST_MODIFIED, httpdate::fmt_http_date(t)),
            None => builder,
        }
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn not_found_response() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from("Not Found"))
        .expect("not_found_response builder is infallible")
}

fn too_large_response(norm_path: &str, size: u64) -> Response {
    let body = format!(
        "Content Too Large: {} ({} bytes exceeds {} byte limit)",
        norm_path, size, MAX_FILE_SIZE
    );
    Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(body))
        .expect("too_large_response builder is infallible")
}

fn not_modified_response(validators: &Validators) -> Response {
    validators
        .apply(Response::builder().status(StatusCode::NOT_MODIFIED))
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::empty())
        .expect("not_modified_response builder is infallible")
}

fn ok_response(content_type: &str, validators: Option<&Validators>, body: Body) -> Response {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header("X-Content-Type-Options", "nosniff");
    let builder = match validators {
        Some(v) => v.apply(builder),
        None => builder,
    };
    builder.body(body).expect("ok_response builder is infallible")
}

/// `raw=1` present as an exact query parameter.
fn is_raw_mode(query: &str) -> bool {
    query.split('&').any(|param| param == "raw=1")
}

/// `/docs/guide.md` for `<root>/docs/guide.md`.
pub fn url_path_for(canonical: &Path, canonical_root: &Path) -> Option<String> {
    let rel = canonical.strip_prefix(canonical_root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("/{}", parts.join("/")))
}

// ---------------------------------------------------------------------------
// Axum request handler
// ---------------------------------------------------------------------------

/// Resolve and answer one request.
///
/// 1. Embedded assets are answered without touching the filesystem.
/// 2. Percent-decode, reject NUL bytes, normalise (reject traversal).
/// 3. Fallback resolution, then canonicalise and re-check containment so
///    symlinks cannot escape the root.
/// 4. Refuse files over [`MAX_FILE_SIZE`] with 413.
/// 5. Answer 304 when the client's validators match.
/// 6. `.md` renders into the page shell (or plain text with `?raw=1`);
///    other files are served with their MIME type.
///
/// Every response carries `X-Content-Type-Options: nosniff`.
async fn serve_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let raw_path = req.uri().path().to_owned();
    let query = req.uri().query().unwrap_or("").to_owned();

    if let Some((content_type, body)) = web_assets::lookup(&raw_path) {
        info!(path = %raw_path, mode = "asset", "request");
        return ok_response(content_type, None, Body::from(body));
    }

    let Ok(decoded) = percent_decode(&raw_path) else {
        info!(path = %raw_path, branch = "denied", reason = "invalid-percent-encoding", "resolve");
        return not_found_response();
    };

    if decoded.contains('\0') {
        info!(path = %raw_path, branch = "denied", reason = "null-byte", "resolve");
        return not_found_response();
    }

    let Some(normalized) = normalize_path(&decoded) else {
        info!(path = %raw_path, branch = "denied", reason = "path-traversal", "resolve");
        return not_found_response();
    };
    let norm_display = normalized.display().to_string();

    let candidate = state.serve_root.join(&normalized);
    let resolved = match resolve_candidate(&candidate).await {
        Some(found) => Some(found),
        None if normalized.as_os_str().is_empty() => Some((state.entry_file.clone(), "entry")),
        None => None,
    };
    let Some((resolved, branch)) = resolved else {
        info!(path = %norm_display, branch = "denied", reason = "not-found", "resolve");
        return not_found_response();
    };

    let Ok(canonical) = tokio::fs::canonicalize(&resolved).await else {
        info!(path = %norm_display, branch = "denied", reason = "canonicalize-failed", "resolve");
        return not_found_response();
    };

    if !canonical.starts_with(&state.canonical_root) {
        info!(
            path = %norm_display,
            branch = "denied",
            reason = "outside-root",
            canonical = %canonical.display(),
            "resolve"
        );
        return not_found_response();
    }

    let Ok(meta) = tokio::fs::metadata(&canonical).await else {
        info!(path = %norm_display, branch = "denied", reason = "metadata-failed", "resolve");
        return not_found_response();
    };
    let size = meta.len();

    if size > MAX_FILE_SIZE {
        info!(path = %norm_display, branch = "denied", reason = "too-large", size, "resolve");
        return too_large_response(&norm_display, size);
    }

    info!(path = %norm_display, branch, size, "resolve");

    let ext = canonical
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_owned();
    let is_markdown = ext.eq_ignore_ascii_case("md");
    let raw = is_markdown && is_raw_mode(&query);

    let variant = if !is_markdown {
        "file".to_owned()
    } else if raw {
        "raw".to_owned()
    } else {
        state.config.expander.policy().to_string()
    };
    let validators = Validators::new(size, meta.modified().ok(), &variant);
    if validators.not_modified(req.headers()) {
        info!(path = %norm_display, mode = "not-modified", "request");
        return not_modified_response(&validators);
    }

    if !is_markdown {
        let Ok(bytes) = tokio::fs::read(&canonical).await else {
            return not_found_response();
        };
        return ok_response(mime_for_ext(&ext), Some(&validators), Body::from(bytes));
    }

    let Ok(content) = tokio::fs::read_to_string(&canonical).await else {
        return not_found_response();
    };

    if raw {
        info!(path = %norm_display, mode = "raw", "request");
        return ok_response(
            "text/plain; charset=utf-8",
            Some(&validators),
            Body::from(content),
        );
    }

    let (body_html, headings) = html::render_markdown(
        &content,
        &canonical,
        &state.canonical_root,
        &state.config.expander,
    );
    let page_url = url_path_for(&canonical, &state.canonical_root);
    let page = html::build_page_shell(
        &body_html,
        &headings,
        &canonical,
        &PageShellContext {
            pages: &state.pages,
            page_url_path: page_url.as_deref(),
        },
    );
    info!(path = %norm_display, mode = "rendered", "request");
    ok_response("text/html; charset=utf-8", Some(&validators), Body::from(page))
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Serve the directory containing `file` until SIGINT.
///
/// Prints a startup banner on stdout once the listener is bound.
pub async fn run_serve(file: String, bind_addr: String, start_port: u16, config: AppConfig) -> Result<()> {
    let entry_file = std::fs::canonicalize(&file).unwrap_or_else(|_| PathBuf::from(&file));
    let serve_root = entry_file
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let canonical_root = std::fs::canonicalize(&serve_root).unwrap_or_else(|_| serve_root.clone());
    let pages = collect_pages(&canonical_root);

    let (std_listener, bound_port) = bind_with_retry(&bind_addr, start_port)?;
    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;

    println!("mdnav serve");
    println!("root:  {}", canonical_root.display());
    println!("entry: {}", entry_file.display());
    println!("url:   http://{}:{}/", bind_addr, bound_port);

    info!(
        bind = %bind_addr,
        port = bound_port,
        pages = pages.len(),
        policy = %config.expander.policy(),
        "listening"
    );

    let state = Arc::new(AppState {
        serve_root,
        canonical_root,
        entry_file,
        pages,
        config,
    });

    let app = Router::new()
        .fallback(serve_handler)
        .layer(CompressionLayer::new())
        .with_state(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "failed to install SIGINT handler");
                return;
            }
            info!("shutdown complete");
        })
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
