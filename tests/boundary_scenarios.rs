//! End-to-end exercises for the six literal boundary scenarios named in the
//! design's testable-properties section, driven component-to-component
//! (reader -> parser -> resolver -> response/signing/cgi) against temp-
//! directory fixtures, without any real socket I/O — the same in-process
//! convention the teacher's own integration tests use.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;

use pgpd::request_parser;
use pgpd::request_reader::{ReadOutcome, RequestReader};
use pgpd::resolver::{self, AuthCache, ResolverConfig};
use pgpd::response;
use pgpd::sign_engine::SignEngine;
use pgpd::signing;

/// `tempfile::tempdir()` doesn't promise a world-executable mode, and
/// several scenarios below resolve paths under it as an unprivileged
/// document root, so callers that need that set it explicitly afterward.
fn world_readable_temp_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
    dir
}

/// Feeds `raw` through the reader a chunk at a time, exercising
/// `checked_idx <= read_idx` on the way, and returns the classified header
/// block once `GotRequest` fires.
fn read_headers(raw: &[u8]) -> Vec<u8> {
    let mut reader = RequestReader::new();
    for chunk in raw.chunks(7) {
        reader.push(chunk);
        assert!(reader.checked_idx <= reader.read_idx);
        match reader.check() {
            ReadOutcome::GotRequest => return reader.buf[..reader.checked_idx].to_vec(),
            ReadOutcome::BadRequest => panic!("unexpected bad request"),
            ReadOutcome::NoRequest => continue,
        }
    }
    panic!("request never completed");
}

// 1. GET / on a CWD containing index.html -> 200, body is that file,
//    Content-Length matches its size.
#[test]
fn scenario1_index_html_served_from_root() {
    let root = world_readable_temp_dir();
    fs::write(root.path().join("index.html"), b"<html>hi</html>").unwrap();

    let headers = read_headers(b"GET / HTTP/1.0\r\nHost: x\r\n\r\n");
    let req = request_parser::parse(&headers).unwrap();

    let cfg = ResolverConfig {
        cwd: root.path(),
        vhost_enabled: false,
        forbid_hidden_resource: false,
        index_names: &["index.html".to_string()],
        autoindex: false,
    };
    let mut auth_cache = AuthCache::new();
    let resolved =
        resolver::resolve(&cfg, &req.origfilename, req.hdrhost.as_deref(), req.authorization.as_deref(), &mut auth_cache)
            .unwrap();

    let body = fs::read(&resolved.realfilename).unwrap();
    let resp = response::for_static_file("index.html", "utf-8", body.len() as u64, None);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.headers.get("Content-Length").unwrap(), &body.len().to_string());
    assert_eq!(body, b"<html>hi</html>");
}

// 2. GET /../etc/passwd -> 400 (de_dotdot escape).
#[test]
fn scenario2_dotdot_escape_is_bad_request() {
    let headers = read_headers(b"GET /../etc/passwd HTTP/1.0\r\n\r\n");
    let err = request_parser::parse(&headers).unwrap_err();
    assert_eq!(err.status(), 400);
}

// 3. GET /private where `private` is mode 0700 -> 403, "not world-readable".
#[test]
fn scenario3_non_world_readable_is_forbidden() {
    let root = world_readable_temp_dir();
    let private = root.path().join("private");
    fs::write(&private, b"shh").unwrap();
    fs::set_permissions(&private, fs::Permissions::from_mode(0o700)).unwrap();

    let headers = read_headers(b"GET /private HTTP/1.0\r\n\r\n");
    let req = request_parser::parse(&headers).unwrap();

    let cfg = ResolverConfig {
        cwd: root.path(),
        vhost_enabled: false,
        forbid_hidden_resource: false,
        index_names: &[],
        autoindex: false,
    };
    let mut auth_cache = AuthCache::new();
    let err = resolver::resolve(&cfg, &req.origfilename, None, None, &mut auth_cache).unwrap_err();
    assert_eq!(err.status(), 403);
    assert!(err.message().contains("not world-readable"));
}

// 4. Range: bytes=5-9 on a 20-byte file -> 206, body = bytes 5..=9,
//    Content-Range: bytes 5-9/20.
#[test]
fn scenario4_range_request_yields_partial_content() {
    let root = world_readable_temp_dir();
    let contents: Vec<u8> = (0u8..20).collect();
    fs::write(root.path().join("a"), &contents).unwrap();

    let headers = read_headers(b"GET /a HTTP/1.1\r\nHost: h\r\nRange: bytes=5-9\r\n\r\n");
    let req = request_parser::parse(&headers).unwrap();
    let range = req.range.expect("range header should parse");
    assert!(req.flags.got_range);

    let first = range.first;
    let last = range.last.unwrap();
    assert_eq!((first, last), (5, 9));

    let body = &contents[first as usize..=last as usize];
    assert_eq!(body, &[5, 6, 7, 8, 9]);

    let resp = response::for_static_file("a", "utf-8", contents.len() as u64, Some((first, last)));
    assert_eq!(resp.status, 206);
    assert_eq!(resp.headers.get("Content-Range").unwrap(), "bytes 5-9/20");
    assert_eq!(resp.headers.get("Content-Length").unwrap(), "5");
}

/// A fixed, non-secret "signature": reverses the fed body. Good enough to
/// prove the envelope framing and the boundary-never-in-either-part
/// invariant without a real OpenPGP backend (out of scope per the design).
struct ReversingSignEngine {
    fed: Vec<u8>,
    done: bool,
}

impl SignEngine for ReversingSignEngine {
    fn feed(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            self.done = true;
        } else {
            self.fed.extend_from_slice(chunk);
        }
    }

    fn next_signature_chunk(&mut self) -> Option<Vec<u8>> {
        if !self.done {
            return None;
        }
        if self.fed.is_empty() {
            return None;
        }
        let mut sig = self.fed.clone();
        sig.reverse();
        self.fed.clear();
        Some(sig)
    }
}

// 5. Accept: multipart/msigned with sig_pattern matching -> 200 multipart
//    envelope, second part a detached signature over the first part's body,
//    and the boundary string appears in neither part's bytes.
#[test]
fn scenario5_signed_response_has_two_parts_and_boundary_never_collides() {
    let parsed = signing::parse(b"Content-Type: text/plain\r\n\r\nhello world", signing::Mode::Direct);
    assert_eq!(parsed.body, b"hello world");

    let mut engine = ReversingSignEngine { fed: Vec::new(), done: false };
    let mut seed = 0x1234_5678_9abc_def0u64;
    let mut out = Vec::new();
    signing::write_signed(&mut out, &parsed, "HTTP/1.0 200 OK\r\n", &mut engine, &mut seed).unwrap();

    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("multipart/msigned"));

    let boundary = text
        .lines()
        .find_map(|l| l.strip_prefix("Content-Type: multipart/msigned; boundary="))
        .expect("boundary header present")
        .trim()
        .to_string();

    let parts: Vec<&str> = text.split(&format!("--{}", boundary)).collect();
    // [0] = headers before first boundary, [1] = first part, [2] = second part, [3] = closing "--".
    assert!(parts.len() >= 3, "expected at least two parts, got: {:?}", parts);

    let first_part = parts[1];
    let second_part = parts[2];
    assert!(first_part.contains("hello world"));
    assert!(second_part.contains("application/pgp-signature"));

    let mut reversed_hello = b"hello world".to_vec();
    reversed_hello.reverse();
    assert!(out.windows(reversed_hello.len()).any(|w| w == reversed_hello.as_slice()));

    // The boundary string itself must never appear inside either part's
    // payload bytes (the invariant the random alphabet is chosen to make
    // vanishingly unlikely, checked directly here).
    assert!(!contains_bytes(parsed.body.as_slice(), boundary.as_bytes()));
    assert!(!contains_bytes(reversed_hello.as_slice(), boundary.as_bytes()));
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// 6. POST /cgi-bin/echo with Content-Length: 5 and body "hello", against an
//    echo script that cats stdin to stdout -> 200 with body "hello".
#[test]
fn scenario6_cgi_post_body_is_forwarded_and_echoed() {
    let root = world_readable_temp_dir();
    let script_path = root.path().join("echo");
    {
        let mut f = fs::File::create(&script_path).unwrap();
        writeln!(f, "#!/bin/sh").unwrap();
        writeln!(f, "printf 'Content-Type: text/plain\\r\\n\\r\\n'").unwrap();
        writeln!(f, "cat").unwrap();
    }
    fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();

    let headers = read_headers(b"POST /cgi-bin/echo HTTP/1.0\r\nContent-Length: 5\r\n\r\n");
    let req = request_parser::parse(&headers).unwrap();
    assert_eq!(req.content_length, Some(5));

    let body = b"hello".to_vec();

    let env = pgpd::cgi::build_env(&req, &script_path, "", "127.0.0.1", 1234, "localhost", 80);
    let opts = pgpd::cgi::SpawnOptions { nice: None, ld_library_path: None, extra_path: None };
    let mut cmd = pgpd::cgi::build_command(&script_path, &env, &opts);
    let mut child = cmd.spawn().expect("spawn echo script");

    {
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(&body).unwrap();
    }
    let output = child.wait_with_output().unwrap();
    let parsed = pgpd::cgi::parse_output(&output.stdout, false);
    assert_eq!(parsed.status, 200);
    assert_eq!(parsed.body_start, b"hello");
}
