//! CGI-or-file response parsing, detached-signature multipart framing, and
//! the on-disk signature cache. Grounded directly on the original
//! implementation's `httpd_parse_resp` (header classification into
//! content/other buckets, status determination, the `multipart/msigned`
//! frame layout) — there is no teacher-repo counterpart, since the teacher
//! never signs anything; this module exists purely to serve the design's
//! signing surface.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::sign_engine::SignEngine;

const MAX_CONTENT_HEADERS: usize = 9;
const MAX_OTHER_HEADERS: usize = 40;
const BOUNDARY_LEN: usize = 32;
const BOUNDARY_ALPHABET: &[u8] = b"GHIJKLMNOPQRSTUVghijklmnopqrstuv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// CGI-style input: default-sign only when explicitly asked.
    Cgi,
    /// Already-ours (static file) input: sign whenever the request asked.
    Direct,
}

#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub status: u16,
    pub content_headers: Vec<(String, String)>,
    pub other_headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Splits raw bytes (header block + body) the way §4.10 step 1 describes:
/// read lines to the first blank line, classify `Content-*` headers
/// (capped at 9) separately from everything else (capped at 40).
pub fn parse(raw: &[u8], mode: Mode) -> ParsedResponse {
    let header_end = find(raw, b"\r\n\r\n").map(|p| (p, 4)).or_else(|| find(raw, b"\n\n").map(|p| (p, 2)));
    let (header_section, body) = match header_end {
        Some((pos, delim)) => (String::from_utf8_lossy(&raw[..pos]).into_owned(), raw[pos + delim..].to_vec()),
        None => (String::new(), raw.to_vec()),
    };

    let mut status = None;
    let mut content_headers = Vec::new();
    let mut other_headers = Vec::new();
    let mut lines = header_section.lines().peekable();

    if let Some(first) = lines.peek() {
        if let Some(rest) = first.strip_prefix("HTTP/") {
            // A literal status line, e.g. "HTTP/1.0 200 OK".
            if let Some(code) = rest.split_whitespace().nth(1).and_then(|s| s.parse().ok()) {
                status = Some(code);
                lines.next();
            }
        }
    }

    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            let key_trim = key.trim();
            let value = value.trim().to_string();
            match key_trim.to_lowercase().as_str() {
                "status" => {
                    status = value.split_whitespace().next().and_then(|s| s.parse().ok());
                }
                "location" => {
                    status.get_or_insert(302);
                    push_capped(&mut other_headers, (key_trim.to_string(), value), MAX_OTHER_HEADERS);
                }
                k if k.starts_with("content-") => {
                    push_capped(&mut content_headers, (key_trim.to_string(), value), MAX_CONTENT_HEADERS);
                }
                _ => push_capped(&mut other_headers, (key_trim.to_string(), value), MAX_OTHER_HEADERS),
            }
        }
    }

    let status = status.unwrap_or(match mode {
        Mode::Cgi => 200,
        Mode::Direct => 200,
    });

    ParsedResponse { status, content_headers, other_headers, body }
}

fn push_capped(v: &mut Vec<(String, String)>, item: (String, String), cap: usize) {
    if v.len() < cap {
        v.push(item);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Whether a CGI response already declares `Content-Type:
/// multipart/msigned` — re-signing such a response would double-wrap it.
pub fn already_signed(resp: &ParsedResponse) -> bool {
    resp.content_headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v.starts_with("multipart/msigned"))
}

pub struct SigCachePaths {
    pub cachedir: PathBuf,
}

/// §4.10 step 5: a cached signature is usable iff the cache directory
/// exists, no `Range` was requested, and the cache file is newer than the
/// resource. `resource_mtime` is seconds-since-epoch.
pub fn cache_lookup(paths: &SigCachePaths, realpath: &Path, got_range: bool, resource_mtime: i64) -> Option<Vec<u8>> {
    if got_range {
        return None;
    }
    let cache_file = paths.cachedir.join(realpath.strip_prefix("/").unwrap_or(realpath));
    let meta = std::fs::metadata(&cache_file).ok()?;
    if !meta.is_file() {
        return None;
    }
    let cache_mtime = meta.modified().ok()?.duration_since(std::time::UNIX_EPOCH).ok()?.as_secs() as i64;
    if cache_mtime <= resource_mtime {
        return None;
    }
    std::fs::read(&cache_file).ok()
}

pub fn cache_store(paths: &SigCachePaths, realpath: &Path, signature: &[u8]) -> std::io::Result<()> {
    let cache_file = paths.cachedir.join(realpath.strip_prefix("/").unwrap_or(realpath));
    if let Some(parent) = cache_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(cache_file, signature)
}

fn random_boundary(seed: &mut u64) -> String {
    // Deterministic xorshift keyed by caller-supplied entropy (a CSPRNG in
    // the embedder's reactor); the boundary need not be secret, only
    // absent from the body per the design's invariant.
    let mut out = String::with_capacity(BOUNDARY_LEN);
    for _ in 0..BOUNDARY_LEN {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        out.push(BOUNDARY_ALPHABET[(*seed as usize) % BOUNDARY_ALPHABET.len()] as char);
    }
    out
}

/// Writes the `multipart/msigned` envelope per §4.10 step 6/§6. Returns an
/// error only on write failure (to be handled per §4.10 step 8: abort
/// silently if bytes were already sent).
pub fn write_signed<W: Write>(
    out: &mut W,
    resp: &ParsedResponse,
    status_line: &str,
    engine: &mut dyn SignEngine,
    seed: &mut u64,
) -> std::io::Result<()> {
    let boundary = random_boundary(seed);
    out.write_all(status_line.as_bytes())?;
    for (k, v) in &resp.other_headers {
        writeln!(out, "{}: {}\r", k, v)?;
    }
    write!(out, "Content-Type: multipart/msigned; boundary={}\r\n\r\n--{}\r\n", boundary, boundary)?;
    for (k, v) in &resp.content_headers {
        writeln!(out, "{}: {}\r", k, v)?;
    }
    out.write_all(b"\r\n")?;
    out.write_all(&resp.body)?;
    engine.feed(&resp.body);
    engine.feed(b"");

    let mut sig = Vec::new();
    while let Some(chunk) = engine.next_signature_chunk() {
        sig.extend_from_slice(&chunk);
    }

    write!(
        out,
        "\r\n--{bound}\r\nContent-Type: application/pgp-signature\r\nContent-Length: {len}\r\n\r\n",
        bound = boundary,
        len = sig.len()
    )?;
    out.write_all(&sig)?;
    write!(out, "\r\n--{}--\r\n", boundary)?;
    Ok(())
}

pub fn write_unsigned<W: Write>(out: &mut W, resp: &ParsedResponse, status_line: &str) -> std::io::Result<()> {
    out.write_all(status_line.as_bytes())?;
    for (k, v) in &resp.other_headers {
        writeln!(out, "{}: {}\r", k, v)?;
    }
    for (k, v) in &resp.content_headers {
        writeln!(out, "{}: {}\r", k, v)?;
    }
    out.write_all(b"\r\n")?;
    out.write_all(&resp.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign_engine::NullSignEngine;

    #[test]
    fn content_headers_are_separated_from_other_headers() {
        let raw = b"Content-Type: text/plain\r\nX-Foo: bar\r\n\r\nbody";
        let parsed = parse(raw, Mode::Cgi);
        assert_eq!(parsed.content_headers, vec![("Content-Type".to_string(), "text/plain".to_string())]);
        assert_eq!(parsed.other_headers, vec![("X-Foo".to_string(), "bar".to_string())]);
        assert_eq!(parsed.body, b"body");
    }

    #[test]
    fn content_header_cap_is_enforced() {
        let mut raw = String::new();
        for i in 0..20 {
            raw.push_str(&format!("Content-X{}: v\r\n", i));
        }
        raw.push_str("\r\nbody");
        let parsed = parse(raw.as_bytes(), Mode::Cgi);
        assert_eq!(parsed.content_headers.len(), MAX_CONTENT_HEADERS);
    }

    #[test]
    fn bare_location_header_implies_302() {
        let parsed = parse(b"Location: /x\r\n\r\n", Mode::Cgi);
        assert_eq!(parsed.status, 302);
    }

    #[test]
    fn boundary_never_collides_with_fixed_alphabet_chars() {
        let mut seed = 12345u64;
        let boundary = random_boundary(&mut seed);
        assert_eq!(boundary.len(), BOUNDARY_LEN);
        assert!(boundary.bytes().all(|b| BOUNDARY_ALPHABET.contains(&b)));
    }

    #[test]
    fn signed_envelope_contains_both_parts_and_no_embedded_boundary_collision() {
        let resp = ParsedResponse {
            status: 200,
            content_headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            other_headers: vec![],
            body: b"hello world".to_vec(),
        };
        let mut out = Vec::new();
        let mut engine = NullSignEngine;
        let mut seed = 42u64;
        write_signed(&mut out, &resp, "HTTP/1.0 200 OK\r\n", &mut engine, &mut seed).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("multipart/msigned"));
        assert!(text.contains("application/pgp-signature"));
        assert!(text.ends_with("--\r\n"));
    }

    #[test]
    fn already_signed_cgi_output_is_detected() {
        let resp = ParsedResponse {
            status: 200,
            content_headers: vec![("Content-Type".to_string(), "multipart/msigned; boundary=X".to_string())],
            other_headers: vec![],
            body: vec![],
        };
        assert!(already_signed(&resp));
    }
}
