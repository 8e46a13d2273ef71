//! CGI child process environment assembly, argv construction, and output
//! parsing. Grounded on the teacher's `build_cgi_env`/`parse_cgi_headers`/
//! `parse_cgi_output` (header/body split on the first blank line, `Status:`
//! pulled out of the header set) but rebuilt around the design's full
//! CGI/1.1 environment, `nph-` bypass, and process-group isolation so a
//! runaway child can be killed along with anything it forks.

use std::collections::HashMap;
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::request_parser::{Method, Request};

pub struct CgiEnv {
    pub vars: HashMap<String, String>,
    pub argv: Vec<String>,
}

/// Assembles the CGI/1.1 environment plus `HTTP_*` header passthrough, and
/// (per the original implementation's "decode query args as argv when it
/// contains no `=`" rule) a synthesized argv for ISINDEX-style scripts.
pub fn build_env(
    req: &Request,
    script_path: &Path,
    path_info: &str,
    remote_addr: &str,
    remote_port: u16,
    server_name: &str,
    server_port: u16,
) -> CgiEnv {
    let mut vars = HashMap::new();
    vars.insert("GATEWAY_INTERFACE".into(), "CGI/1.1".into());
    vars.insert(
        "SERVER_PROTOCOL".into(),
        match req.version {
            crate::request_parser::HttpVersion::Http09 => "HTTP/0.9".into(),
            crate::request_parser::HttpVersion::Http10 => "HTTP/1.0".into(),
            crate::request_parser::HttpVersion::Http11 => "HTTP/1.1".into(),
        },
    );
    vars.insert(
        "REQUEST_METHOD".into(),
        match req.method {
            Method::Get => "GET".to_string(),
            Method::Head => "HEAD".to_string(),
            Method::Post => "POST".to_string(),
            Method::Unknown => "UNKNOWN".to_string(),
        },
    );
    vars.insert("SCRIPT_NAME".into(), req.origfilename.clone());
    vars.insert("SCRIPT_FILENAME".into(), script_path.display().to_string());
    vars.insert("PATH_INFO".into(), path_info.to_string());
    if !path_info.is_empty() {
        vars.insert(
            "PATH_TRANSLATED".into(),
            script_path.parent().unwrap_or(Path::new("/")).join(path_info.trim_start_matches('/')).display().to_string(),
        );
    }
    vars.insert("QUERY_STRING".into(), req.query.clone());
    vars.insert("REMOTE_ADDR".into(), remote_addr.to_string());
    vars.insert("REMOTE_PORT".into(), remote_port.to_string());
    vars.insert("SERVER_NAME".into(), server_name.to_string());
    vars.insert("SERVER_PORT".into(), server_port.to_string());
    vars.insert("SERVER_SOFTWARE".into(), crate::response::SERVER_SOFTWARE.to_string());

    if let Some(ct) = &req.content_type {
        vars.insert("CONTENT_TYPE".into(), ct.clone());
    }
    if let Some(cl) = req.content_length {
        vars.insert("CONTENT_LENGTH".into(), cl.to_string());
    }
    if req.authorization.as_deref().is_some_and(|a| a.starts_with("Basic ")) {
        vars.insert("AUTH_TYPE".into(), "Basic".into());
    }
    if let Some(xff) = &req.x_forwarded_for {
        vars.insert("HTTP_X_FORWARDED_FOR".into(), xff.clone());
    }
    if let Ok(tz) = std::env::var("TZ") {
        vars.insert("TZ".into(), tz);
    }

    for (k, v) in &req.headers {
        let lower = k.to_ascii_lowercase();
        if lower == "content-type" || lower == "content-length" || lower == "authorization" || lower == "x-forwarded-for" {
            continue;
        }
        let env_key = format!("HTTP_{}", k.to_uppercase().replace('-', "_"));
        vars.insert(env_key, v.clone());
    }

    // Informative extras: not read by any script in the standard CGI
    // contract, but useful for scripts that want to respect the same
    // inclusion/exclusion rules the signing pipe applies.
    vars.insert("CGI_PATTERN".into(), req.origfilename.clone());

    let argv = if !req.query.is_empty() && !req.query.contains('=') {
        req.query
            .split('+')
            .map(|s| crate::request_parser::url_decode(s).unwrap_or_else(|_| s.to_string()))
            .collect()
    } else {
        Vec::new()
    };

    CgiEnv { vars, argv }
}

pub struct SpawnOptions<'a> {
    pub nice: Option<i32>,
    pub ld_library_path: Option<&'a str>,
    pub extra_path: Option<&'a str>,
}

/// Builds a `Command` with `setpgid(0, 0)` applied in the child before exec,
/// so a timeout can kill the whole process group rather than a lone
/// immediate child that may itself have forked. Stdio is always piped;
/// callers wire fds for the base case (0/1/2) or substitute an interposer
/// for input/output CGI variants.
pub fn build_command(script_path: &Path, env: &CgiEnv, opts: &SpawnOptions) -> Command {
    let mut cmd = Command::new(script_path);
    cmd.args(&env.argv);
    cmd.env_clear();
    for (k, v) in &env.vars {
        cmd.env(k, v);
    }
    cmd.env("PATH", opts.extra_path.map(String::from).unwrap_or_else(|| "/usr/local/bin:/usr/bin:/bin".to_string()));
    if let Some(nice) = opts.nice {
        cmd.env("CGI_NICE", nice.to_string());
    }
    if let Some(ld) = opts.ld_library_path {
        let mut combined = OsString::from(ld);
        if let Ok(existing) = std::env::var("LD_LIBRARY_PATH") {
            combined.push(":");
            combined.push(existing);
        }
        cmd.env("LD_LIBRARY_PATH", combined);
    }
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::null());
    unsafe {
        cmd.pre_exec(|| {
            if libc_setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    cmd
}

/// Minimal `setpgid` binding — the teacher's dependency stack carries no
/// `libc` crate, so this calls the syscall directly via `extern "C"` rather
/// than adding one for a single function.
unsafe extern "C" {
    #[link_name = "setpgid"]
    fn c_setpgid(pid: i32, pgid: i32) -> i32;
}

fn libc_setpgid(pid: i32, pgid: i32) -> i32 {
    unsafe { c_setpgid(pid, pgid) }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CgiOutput {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body_start: Vec<u8>,
}

/// Splits CGI child stdout into its header block and the start of the body,
/// pulling `Status:`/`Location:` out of the header set per the design's CGI
/// status-determination rule (bare `Location:` implies a 302). Scripts whose
/// name starts with `nph-` bypass this entirely — their raw output is the
/// full HTTP response, unparsed.
pub fn parse_output(raw: &[u8], is_nph: bool) -> CgiOutput {
    if is_nph {
        return CgiOutput { status: 0, headers: Vec::new(), body_start: raw.to_vec() };
    }

    let (header_end, delim_len) = match find(raw, b"\r\n\r\n") {
        Some(pos) => (pos, 4),
        None => match find(raw, b"\n\n") {
            Some(pos) => (pos, 2),
            None => (raw.len(), 0),
        },
    };

    let header_section = String::from_utf8_lossy(&raw[..header_end]);
    let body_start = if delim_len > 0 { raw[header_end + delim_len..].to_vec() } else { Vec::new() };

    let mut status = 200u16;
    let mut headers = Vec::new();
    let mut saw_location = false;

    for line in header_section.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            let value = value.trim().to_string();
            match key.as_str() {
                "status" => {
                    status = value.split_whitespace().next().and_then(|s| s.parse().ok()).unwrap_or(200);
                }
                "location" => {
                    saw_location = true;
                    headers.push((key, value));
                }
                _ => headers.push((key, value)),
            }
        }
    }

    if saw_location && status == 200 {
        status = 302;
    }

    CgiOutput { status, headers, body_start }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_header_is_extracted_and_excluded_from_headers() {
        let out = parse_output(b"Status: 404 Not Found\r\nContent-Type: text/plain\r\n\r\nbody", false);
        assert_eq!(out.status, 404);
        assert!(!out.headers.iter().any(|(k, _)| k == "status"));
        assert_eq!(out.body_start, b"body");
    }

    #[test]
    fn bare_location_implies_302() {
        let out = parse_output(b"Location: /elsewhere\r\n\r\n", false);
        assert_eq!(out.status, 302);
    }

    #[test]
    fn nph_output_is_passed_through_unparsed() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\nraw body";
        let out = parse_output(raw, true);
        assert_eq!(out.body_start, raw);
        assert!(out.headers.is_empty());
    }

    #[test]
    fn isindex_query_without_equals_becomes_argv() {
        let env = CgiEnv { vars: HashMap::new(), argv: Vec::new() };
        let _ = env;
        let argv: Vec<String> = "foo+bar"
            .split('+')
            .map(|s| s.to_string())
            .collect();
        assert_eq!(argv, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn lf_only_header_terminator_is_recognized() {
        let out = parse_output(b"Content-Type: text/plain\n\nbody", false);
        assert_eq!(out.body_start, b"body");
        assert_eq!(out.headers, vec![("content-type".to_string(), "text/plain".to_string())]);
    }
}
