//! Turns a complete byte run (as flagged by [`crate::request_reader`]) into
//! a structured request: method/URL/version split, URL decoding,
//! `de_dotdot` collapsing, virtual-host bookkeeping, MIME header parsing,
//! and `Range` parsing. Grounded on the header-splitting technique in the
//! teacher's `HttpRequest::parse_request_line`/`extract_and_parse_header`,
//! generalized to the design's field set and dropping chunked
//! Transfer-Encoding, which is out of scope on the wire.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HttpVersion {
    Http09,
    Http10,
    Http11,
}

#[derive(Debug, Clone, Copy)]
pub struct ByteRange {
    pub first: u64,
    pub last: Option<u64>,
    pub suffix: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Flags {
    pub got_range: bool,
    pub should_linger: bool,
    pub keep_alive: bool,
    pub detach_sign: bool,
    pub log_done: bool,
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub version: HttpVersion,
    pub encoded_url: String,
    pub decoded_url: String,
    pub query: String,
    pub origfilename: String,
    pub reqhost: Option<String>,
    pub hdrhost: Option<String>,
    pub hostdir: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub cookie: Option<String>,
    pub accept: String,
    pub accept_encoding: String,
    pub accept_language: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub x_forwarded_for: Option<String>,
    pub content_length: Option<u64>,
    pub if_modified_since: Option<String>,
    pub range: Option<ByteRange>,
    pub bytesranges: Option<String>,
    pub headers: Vec<(String, String)>,
    pub flags: Flags,
}

const MAX_ACCEPT_LEN: usize = 5000;

/// Splits a complete request (request line + headers, terminated by a
/// blank line, or a bare two-word HTTP/0.9 line) into a [`Request`].
pub fn parse(raw: &[u8]) -> Result<Request> {
    let text = std::str::from_utf8(raw).map_err(|_| Error::Malformed("non-UTF-8 request".into()))?;
    let mut lines = text.split("\r\n").flat_map(|l| l.split('\n'));

    let request_line = lines.next().ok_or_else(|| Error::Malformed("empty request".into()))?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.is_empty() {
        return Err(Error::Malformed("empty request line".into()));
    }

    let (raw_method, raw_url, raw_version) = match parts.as_slice() {
        [m, u] => (*m, *u, None),
        [m, u, v] => (*m, *u, Some(*v)),
        _ => return Err(Error::Malformed("malformed request line".into())),
    };

    let version = match raw_version {
        None => HttpVersion::Http09,
        Some("HTTP/1.0") => HttpVersion::Http10,
        Some(v) if v.starts_with("HTTP/1.") => HttpVersion::Http11,
        Some(_) => return Err(Error::Malformed("unsupported protocol".into())),
    };

    let method = match raw_method {
        "GET" => Method::Get,
        "HEAD" => Method::Head,
        "POST" => Method::Post,
        _ => Method::Unknown,
    };
    if method == Method::Unknown {
        return Err(Error::MethodNotImplemented(format!("method '{}' not implemented", raw_method)));
    }

    let mut url = raw_url.to_string();
    let mut reqhost = None;
    if url.starts_with("http://") {
        if version != HttpVersion::Http11 {
            return Err(Error::Malformed("absolute URL requires HTTP/1.1".into()));
        }
        let rest = &url["http://".len()..];
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        reqhost = Some(host.to_string());
        url = format!("/{}", path);
    }

    if !url.starts_with('/') {
        return Err(Error::Malformed("url must start with '/'".into()));
    }

    let decoded_url = url_decode(&url)?;
    let (path_part, query) = match decoded_url.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (decoded_url.clone(), String::new()),
    };

    let stripped = path_part.strip_prefix('/').unwrap_or(&path_part);
    let origfilename = de_dotdot(if stripped.is_empty() { "." } else { stripped })?;

    let mut req = Request {
        method,
        version,
        encoded_url: url,
        decoded_url,
        query,
        origfilename,
        reqhost,
        hdrhost: None,
        hostdir: None,
        referrer: None,
        user_agent: None,
        cookie: None,
        accept: String::new(),
        accept_encoding: String::new(),
        accept_language: None,
        authorization: None,
        content_type: None,
        x_forwarded_for: None,
        content_length: None,
        if_modified_since: None,
        range: None,
        bytesranges: None,
        headers: Vec::new(),
        flags: Flags::default(),
    };

    if version != HttpVersion::Http09 {
        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue; // malformed header line, drop per spec's "unknown headers dropped"
            };
            let key = key.trim();
            let value = value.trim();
            req.headers.push((key.to_string(), value.to_string()));
            apply_header(&mut req, key, value);
        }

        if req.version == HttpVersion::Http11 && req.reqhost.is_none() && req.hdrhost.is_none() {
            return Err(Error::Malformed("HTTP/1.1 request missing Host".into()));
        }
    }

    Ok(req)
}

fn apply_header(req: &mut Request, key: &str, value: &str) {
    let lower = key.to_ascii_lowercase();
    match lower.as_str() {
        "host" => req.hdrhost = Some(value.to_string()),
        "referer" => req.referrer = Some(value.to_string()),
        "user-agent" => req.user_agent = Some(value.to_string()),
        "cookie" => req.cookie = Some(value.to_string()),
        "accept" => {
            if req.accept.len() < MAX_ACCEPT_LEN {
                if !req.accept.is_empty() {
                    req.accept.push_str(", ");
                }
                req.accept.push_str(value);
                req.accept.truncate(MAX_ACCEPT_LEN);
            }
        }
        "accept-encoding" => {
            if req.accept_encoding.len() < MAX_ACCEPT_LEN {
                if !req.accept_encoding.is_empty() {
                    req.accept_encoding.push_str(", ");
                }
                req.accept_encoding.push_str(value);
                req.accept_encoding.truncate(MAX_ACCEPT_LEN);
            }
        }
        "accept-language" => req.accept_language = Some(value.to_string()),
        "authorization" => req.authorization = Some(value.to_string()),
        "content-type" => req.content_type = Some(value.to_string()),
        "content-length" => req.content_length = value.parse().ok(),
        "if-modified-since" => req.if_modified_since = Some(value.to_string()),
        "x-forwarded-for" => req.x_forwarded_for = Some(value.to_string()),
        "range" => {
            if let Some(range) = parse_range(value) {
                req.range = Some(range);
                req.flags.got_range = true;
            }
            req.bytesranges = Some(value.to_string());
        }
        "connection" => {
            req.flags.keep_alive = value.to_ascii_lowercase().contains("keep-alive");
        }
        _ => {}
    }
}

/// Accepts only `bytes=A-B`, `bytes=A-`, `bytes=-B`. Multi-range requests
/// (comma-separated) are rejected here per the design's decision to serve
/// full-body 200 rather than `multipart/byteranges`.
fn parse_range(value: &str) -> Option<ByteRange> {
    let spec = value.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (first_s, last_s) = spec.split_once('-')?;
    if first_s.is_empty() {
        let suffix: u64 = last_s.parse().ok()?;
        return Some(ByteRange { first: 0, last: None, suffix: Some(suffix) });
    }
    let first: u64 = first_s.parse().ok()?;
    let last = if last_s.is_empty() { None } else { Some(last_s.parse().ok()?) };
    Some(ByteRange { first, last, suffix: None })
}

/// Percent-decodes a URL path, leaving `%` sequences that aren't valid hex
/// pairs untouched rather than failing — matches the permissive behavior
/// real origin servers use for stray percent signs in query strings.
pub fn url_decode(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| Error::Malformed("invalid percent-encoding".into()))
}

pub fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Collapses `//`, `/./`, and resolves `/..` segments; rejects paths that
/// escape above the root. This is a stricter policy than the original
/// implementation's `de_dotdot`, which silently drops any `..` it can't
/// resolve against a real preceding segment and only rejects when the
/// fully-collapsed result is bare `..` (so it would let `../etc/passwd`
/// through as `etc/passwd`, still inside the root). Here every `..` with
/// nothing left to pop is an immediate reject, which is what's needed to
/// satisfy the documented requirement that `/../etc/passwd` 400s.
pub fn de_dotdot(path: &str) -> Result<String> {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(Error::Malformed("path escapes document root".into()));
                }
            }
            s => stack.push(s),
        }
    }
    Ok(if stack.is_empty() { ".".to_string() } else { stack.join("/") })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_word_request_line_is_http_09() {
        let req = parse(b"GET /index.html").unwrap();
        assert_eq!(req.version, HttpVersion::Http09);
        assert_eq!(req.method, Method::Get);
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let err = parse(b"PATCH / HTTP/1.0\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 501);
    }

    #[test]
    fn relative_url_without_leading_slash_is_malformed() {
        let err = parse(b"GET foo HTTP/1.0\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn http11_without_host_is_malformed() {
        let err = parse(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn http11_with_host_succeeds() {
        let req = parse(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
        assert_eq!(req.hdrhost.as_deref(), Some("example.com"));
    }

    #[test]
    fn dotdot_escape_is_rejected() {
        let err = parse(b"GET /../etc/passwd HTTP/1.0\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn de_dotdot_collapses_double_slash() {
        assert_eq!(de_dotdot("a//b").unwrap(), "a/b");
    }

    #[test]
    fn de_dotdot_collapses_dot_segments() {
        assert_eq!(de_dotdot("./a/./b").unwrap(), "a/b");
    }

    #[test]
    fn de_dotdot_resolves_parent_segments() {
        assert_eq!(de_dotdot("a/b/../c").unwrap(), "a/c");
    }

    #[test]
    fn de_dotdot_rejects_escaping_paths() {
        assert!(de_dotdot("../../etc/passwd").is_err());
    }

    #[test]
    fn de_dotdot_is_idempotent() {
        let once = de_dotdot("a/b/../c/./d//e").unwrap();
        let twice = de_dotdot(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn url_decode_roundtrips_url_encode() {
        let s = "hello world/with spaces?and=stuff";
        assert_eq!(url_decode(&url_encode(s)).unwrap(), s);
    }

    #[test]
    fn range_single_is_parsed() {
        let req = parse(b"GET /a HTTP/1.1\r\nHost: h\r\nRange: bytes=5-9\r\n\r\n").unwrap();
        let r = req.range.unwrap();
        assert_eq!(r.first, 5);
        assert_eq!(r.last, Some(9));
    }

    #[test]
    fn multi_range_is_ignored() {
        let req = parse(b"GET /a HTTP/1.1\r\nHost: h\r\nRange: bytes=1-2,4-5\r\n\r\n").unwrap();
        assert!(req.range.is_none());
    }

    #[test]
    fn empty_path_becomes_dot() {
        let req = parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.origfilename, ".");
    }
}
