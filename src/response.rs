//! Status lines, headers, error bodies, and Range framing. Adapted from the
//! teacher's `HttpResponse` (`set_header`/`set_body`/`to_bytes` survive in
//! spirit) but rebuilt around the design's fixed header set, full
//! status-title table (grounded on the original implementation's CGI
//! status-line synthesis table), and unconditional `Connection: close`.

use std::collections::BTreeMap;

use crate::mime::figure_mime;

pub const SERVER_SOFTWARE: &str = "pgpd/1.0";

pub fn status_title(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Response { status, headers: BTreeMap::new(), body: Vec::new() }
    }

    pub fn set_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_string(), value.into());
        self
    }

    pub fn set_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.headers.insert("Content-Type".to_string(), content_type.to_string());
        self.headers.insert("Content-Length".to_string(), body.len().to_string());
        self.body = body;
        self
    }

    /// Serializes the status line and headers (never the body) — used when
    /// streaming a body separately, e.g. an mmap slice via `write_fully`.
    pub fn head_to_bytes(&self, version: &str) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", version, self.status, status_title(self.status)).into_bytes();
        for (k, v) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    pub fn to_bytes(&self, version: &str) -> Vec<u8> {
        let mut out = self.head_to_bytes(version);
        out.extend_from_slice(&self.body);
        out
    }
}

fn defang(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Builds a standard response: status line headers plus an HTML error body
/// for 4xx/5xx, always `Connection: close`, `Cache-Control: no-cache,
/// no-store` for anything below 200 or at/above 400.
pub fn build(status: u16, charset: &str, detail: Option<&str>) -> Response {
    let mut resp = Response::new(status)
        .set_header("Server", SERVER_SOFTWARE)
        .set_header("Date", httpdate_now())
        .set_header("Accept-Ranges", "bytes")
        .set_header("Connection", "close");

    if status < 200 || status >= 400 {
        resp = resp.set_header("Cache-Control", "no-cache,no-store");
        let title = status_title(status);
        let body_detail = detail.map(defang).unwrap_or_default();
        let body = format!(
            "<html><head><title>{code} {title}</title></head>\
             <body><h1>{code} {title}</h1><p>{detail}</p></body></html>",
            code = status,
            title = title,
            detail = body_detail,
        );
        resp = resp.set_body(body.into_bytes(), &format!("text/html; charset={}", charset));
    }

    resp
}

/// Sets `Content-Type` (with MIME-table lookup + charset for text types)
/// and either `Content-Range`+length for a 206, or `Content-Length` for a
/// plain 200, on a static-file response.
pub fn for_static_file(
    filename: &str,
    charset: &str,
    full_len: u64,
    range: Option<(u64, u64)>,
) -> Response {
    let mime = figure_mime(filename);
    let content_type = if mime.content_type.starts_with("text/") {
        format!("{}; charset={}", mime.content_type, charset)
    } else {
        mime.content_type.to_string()
    };

    let (status, content_length) = match range {
        Some((_, _)) => (206u16, None),
        None => (200u16, Some(full_len)),
    };

    let mut resp = Response::new(status)
        .set_header("Server", SERVER_SOFTWARE)
        .set_header("Date", httpdate_now())
        .set_header("Accept-Ranges", "bytes")
        .set_header("Connection", "close")
        .set_header("Content-Type", content_type);

    if let Some(enc) = mime.content_encoding {
        resp = resp.set_header("Content-Encoding", enc);
    }

    match range {
        Some((first, last)) => {
            resp = resp
                .set_header("Content-Range", format!("bytes {}-{}/{}", first, last, full_len))
                .set_header("Content-Length", (last - first + 1).to_string());
        }
        None => {
            resp = resp.set_header("Content-Length", content_length.unwrap().to_string());
        }
    }

    resp
}

pub fn redirect(status: u16, location: &str) -> Response {
    Response::new(status)
        .set_header("Server", SERVER_SOFTWARE)
        .set_header("Date", httpdate_now())
        .set_header("Connection", "close")
        .set_header("Location", location.to_string())
        .set_body(Vec::new(), "text/html")
}

/// RFC 7231 `IMF-fixdate`, hand-rolled to avoid a dependency the teacher's
/// stack doesn't have; only used for the `Date`/`Last-Modified` headers.
pub fn httpdate_now() -> String {
    httpdate_from_unix(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs())
}

pub fn httpdate_from_unix(secs: u64) -> String {
    const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    const MONTHS: [&str; 12] =
        ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    let days_since_epoch = (secs / 86_400) as i64;
    let wday = DAYS[((days_since_epoch % 7 + 4) % 7) as usize]; // 1970-01-01 was a Thursday
    let (y, m, d) = access_log::format_time(std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs))
        .split(' ')
        .next()
        .map(|ymd| {
            let mut it = ymd.split('-');
            (
                it.next().unwrap().parse::<i64>().unwrap(),
                it.next().unwrap().parse::<u32>().unwrap(),
                it.next().unwrap().parse::<u32>().unwrap(),
            )
        })
        .unwrap();
    let rem = secs % 86_400;
    format!(
        "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
        wday,
        d,
        MONTHS[(m - 1) as usize],
        y,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_defangs_detail() {
        let resp = build(403, "utf-8", Some("<script>"));
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }

    #[test]
    fn success_responses_carry_no_cache_control() {
        let resp = build(200, "utf-8", None);
        assert!(!resp.headers.contains_key("Cache-Control"));
    }

    #[test]
    fn error_responses_are_uncacheable() {
        let resp = build(404, "utf-8", Some("missing"));
        assert_eq!(resp.headers.get("Cache-Control").unwrap(), "no-cache,no-store");
    }

    #[test]
    fn connection_close_is_always_set() {
        let resp = build(200, "utf-8", None);
        assert_eq!(resp.headers.get("Connection").unwrap(), "close");
    }

    #[test]
    fn partial_content_has_content_range_and_matching_length() {
        let resp = for_static_file("a.txt", "utf-8", 20, Some((5, 9)));
        assert_eq!(resp.status, 206);
        assert_eq!(resp.headers.get("Content-Range").unwrap(), "bytes 5-9/20");
        assert_eq!(resp.headers.get("Content-Length").unwrap(), "5");
    }

    #[test]
    fn full_file_uses_content_length() {
        let resp = for_static_file("a.html", "utf-8", 1000, None);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers.get("Content-Length").unwrap(), "1000");
    }
}
