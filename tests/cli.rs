mod common;

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use common::{bin_path, Fixture};

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(bin_path())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn mdnav");
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("collect output")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn expand_reads_stdin() {
    let out = run_with_stdin(&["expand"], "The CPU (Central Processing Unit) is hot.");
    assert!(out.status.success());
    assert_eq!(
        stdout(&out),
        "The <abbr title='Central Processing Unit'>CPU</abbr> is hot."
    );
}

#[test]
fn expand_passes_plain_text_through() {
    let text = "nothing to see here\nsecond line\n";
    let out = run_with_stdin(&["expand"], text);
    assert_eq!(stdout(&out), text);
}

#[test]
fn expand_acronym_policy_skips_lowercase_tokens() {
    let input = "a cat (feline) and an API (Application Programming Interface)";
    let out = run_with_stdin(&["expand", "--policy", "acronym"], input);
    assert_eq!(
        stdout(&out),
        "a cat (feline) and an <abbr title='Application Programming Interface'>API</abbr>"
    );
}

#[test]
fn expand_escapes_unless_disabled() {
    let input = "x<y (less & more)";
    let escaped = stdout(&run_with_stdin(&["expand"], input));
    assert_eq!(escaped, "<abbr title='less &amp; more'>x&lt;y</abbr>");

    let verbatim = stdout(&run_with_stdin(&["expand", "--no-escape"], input));
    assert_eq!(verbatim, "<abbr title='less & more'>x<y</abbr>");
}

#[test]
fn expand_reads_file_argument() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("notes.txt");
    fs::write(&path, "GPU (Graphics Processing Unit)").expect("write notes");

    let out = Command::new(bin_path())
        .arg("expand")
        .arg(&path)
        .output()
        .expect("run mdnav expand");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "<abbr title='Graphics Processing Unit'>GPU</abbr>");
}

#[test]
fn invalid_policy_is_a_usage_error() {
    let out = run_with_stdin(&["expand", "--policy", "everything"], "");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("everything"), "stderr:\n{stderr}");
}

#[test]
fn render_prints_full_page() {
    let fixture = Fixture::new();
    let out = Command::new(bin_path())
        .arg("render")
        .arg(&fixture.entry)
        .output()
        .expect("run mdnav render");
    assert!(out.status.success());

    let page = stdout(&out);
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<title>Home · mdnav</title>"));
    assert!(page.contains("<abbr title='Central Processing Unit'>CPU</abbr>"));
    assert!(page.contains("<li class=\"current\"><a href=\"/README.md\">README</a></li>"));
}

#[test]
fn render_rejects_non_markdown_and_missing_files() {
    let fixture = Fixture::new();

    let out = Command::new(bin_path())
        .arg("render")
        .arg(fixture.root.join("image.png"))
        .output()
        .expect("run mdnav render");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not a recognized markdown extension"));

    let out = Command::new(bin_path())
        .arg("render")
        .arg(fixture.root.join("absent.md"))
        .output()
        .expect("run mdnav render");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("file not found"));
}
