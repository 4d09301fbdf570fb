//! Shared harness: temp-dir fixtures, a spawned `mdnav serve` child and a
//! blocking HTTP client.

#![allow(dead_code)]

use std::fs;
use std::io::Read;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tempfile::TempDir;

pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(6);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

pub const README: &str = "\
# Home

## Terms

The CPU (Central Processing Unit) talks to RAM (Random Access Memory).

See the [guide](guide.md).

| A | B |
|---|---|
| 1 | 2 |

```mermaid
graph TD;
A-->B;
```

`HTTP (not expanded)` in code.

<script>alert(1)</script>
";

pub fn bin_path() -> String {
    std::env::var("CARGO_BIN_EXE_mdnav").expect("CARGO_BIN_EXE_mdnav is set by cargo test")
}

/// A docs directory: README (entry), guide, a subdir, an image and,
/// optionally, an oversized markdown file.
pub struct Fixture {
    _tmp: TempDir,
    pub root: PathBuf,
    pub entry: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn with_oversized_file() -> Self {
        Self::build(true)
    }

    /// A root holding only `name`, with no README.md or index.md.
    pub fn entry_only(name: &str, content: &str) -> Self {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let root = tmp.path().to_path_buf();
        let entry = root.join(name);
        fs::write(&entry, content).expect("write entry");
        Self {
            _tmp: tmp,
            root,
            entry,
        }
    }

    fn build(oversized: bool) -> Self {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let root = tmp.path().to_path_buf();

        let entry = root.join("README.md");
        fs::write(&entry, README).expect("write README");
        fs::write(root.join("guide.md"), "# Guide\n\nUse TLS (Transport Layer Security).\n")
            .expect("write guide");

        let subdir = root.join("subdir");
        fs::create_dir_all(&subdir).expect("create subdir");
        fs::write(subdir.join("index.md"), "# Subdir Index\n").expect("write subdir index");

        fs::write(root.join("image.png"), [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'])
            .expect("write image");

        if oversized {
            let file = fs::File::create(root.join("oversized.md")).expect("create oversized file");
            file.set_len(MAX_FILE_SIZE + 1).expect("set oversized file len");
        }

        Self {
            _tmp: tmp,
            root,
            entry,
        }
    }
}

pub struct Reply {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Status, headers and body, for assertion messages.
    pub fn dump(&self) -> String {
        let mut out = format!("status={}\n", self.status);
        for (k, v) in &self.headers {
            out.push_str(&format!("{}: {}\n", k, v.to_str().unwrap_or("<non-utf8>")));
        }
        out.push('\n');
        out.push_str(&self.text());
        out
    }
}

pub struct Server {
    child: Option<Child>,
    pub base_url: String,
    pub port: u16,
}

impl Server {
    pub fn start(fixture: &Fixture, extra_args: &[&str]) -> Self {
        let port = free_port();
        let mut child = Command::new(bin_path())
            .arg("serve")
            .args(["--bind", "127.0.0.1", "--port", &port.to_string()])
            .args(extra_args)
            .arg(&fixture.entry)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn mdnav serve");

        let base_url = format!("http://127.0.0.1:{port}");
        wait_until_ready(&mut child, &base_url);
        Self {
            child: Some(child),
            base_url,
            port,
        }
    }

    pub fn get(&self, path: &str) -> Reply {
        self.get_with(&client(), path, &[])
    }

    pub fn get_with(&self, client: &Client, path: &str, headers: &[(&str, &str)]) -> Reply {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.insert(
                HeaderName::from_bytes(k.as_bytes()).expect("valid header name"),
                HeaderValue::from_str(v).expect("valid header value"),
            );
        }
        let url = format!("{}{}", self.base_url, path);
        let resp = client
            .get(&url)
            .headers(map)
            .send()
            .unwrap_or_else(|e| panic!("GET {url} failed: {e}"));
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .unwrap_or_else(|e| panic!("read body for {url} failed: {e}"))
            .to_vec();
        Reply {
            status,
            headers,
            body,
        }
    }

    /// Send SIGINT and collect the child's output.
    #[cfg(unix)]
    pub fn interrupt(mut self) -> Output {
        let mut child = self.child.take().expect("server child exists");
        let status = Command::new("kill")
            .args(["-INT", &child.id().to_string()])
            .status()
            .expect("send SIGINT");
        assert!(status.success(), "kill -INT failed");

        let deadline = Instant::now() + Duration::from_secs(5);
        while child.try_wait().expect("try_wait child").is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(25));
        }
        child.wait_with_output().expect("collect server output")
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if child.try_wait().ok().flatten().is_none() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

pub fn client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("build reqwest client")
}

/// A client that leaves `Content-Encoding` bodies untouched.
pub fn raw_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .no_gzip()
        .no_brotli()
        .build()
        .expect("build reqwest client")
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local addr").port()
}

fn wait_until_ready(child: &mut Child, base_url: &str) {
    let probe = Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .expect("build readiness client");
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("try_wait server") {
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr);
            }
            panic!("server exited early status={status}\nstderr:\n{stderr}");
        }
        if probe.get(format!("{base_url}/")).send().is_ok() {
            return;
        }
        assert!(
            start.elapsed() < STARTUP_TIMEOUT,
            "server did not become ready within {STARTUP_TIMEOUT:?}"
        );
        thread::sleep(Duration::from_millis(50));
    }
}
