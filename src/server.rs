//! The mio event loop: accept, read-to-request, dispatch, write, idle sweep,
//! and CGI kill-timer chaining. The teacher's own `server.rs` never grew
//! past a `Token` stub, so this is a fresh implementation grounded on the
//! bookkeeping the teacher's `http_connection.rs` assumes exists around it
//! (a `Token`-keyed connection table, a `write_buffer`/`closed` pair per
//! connection) combined with the design's §4/§5 connection lifecycle.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Instant;

use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Poll, Token};

use crate::cgi::{self, SpawnOptions};
use crate::config::ServerConfig;
use crate::dispatcher::{self, ChildTable, Route, SpawnAdmission};
use crate::directory;
use crate::error::{Error, Result};
use crate::logger::{LogEntry, Logger};
use crate::mmap_cache::{CacheKey, MmapCache};
use crate::patterns::Pattern;
use crate::request_parser::{self, ByteRange, Request};
use crate::request_reader::{ReadOutcome, RequestReader};
use crate::resolver::{self, AuthCache, ResolverConfig};
use crate::response::{self, Response};
use crate::sign_engine::NullSignEngine;
use crate::signing::{self, Mode as SigningMode, SigCachePaths};

const LISTENER_TOKEN: Token = Token(0);

/// A route handler's outcome: either a normal [`Response`] that still needs
/// its status line/headers serialized, or raw bytes that already embed
/// their own status line and headers (the `multipart/msigned` envelope).
enum ServedBody {
    Ready(Response),
    Framed(u16, Vec<u8>),
}

struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    reader: RequestReader,
    /// Set once the header block has been classified by `reader.check()`;
    /// holds the request and how many more body bytes (per
    /// `Content-Length`) must arrive before it's safe to dispatch. Kept
    /// separate from `reader`'s own state machine because that machine
    /// knows nothing about `Content-Length` and must never rescan body
    /// bytes as if they were header bytes.
    pending: Option<(Request, usize)>,
    write_buf: Vec<u8>,
    write_pos: usize,
    closed: bool,
    last_activity: Instant,
}

impl Connection {
    fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Connection {
            stream,
            addr,
            reader: RequestReader::new(),
            pending: None,
            write_buf: Vec::new(),
            write_pos: 0,
            closed: false,
            last_activity: Instant::now(),
        }
    }

    fn wants_write(&self) -> bool {
        self.write_pos < self.write_buf.len()
    }
}

/// Drives one listening socket's worth of connections. CGI execution is
/// done with blocking `Command::spawn`+`write_all`+`read_to_end`+`wait`
/// rather than the non-blocking fork-and-forward-threads interposer the
/// design names in §4.9: a slow CGI script stalls this connection's turn of
/// the loop, so other connections make no progress until it returns.
/// Recorded as a scope reduction in DESIGN.md. Because the wait happens on
/// the reactor's only thread, the soft/hard kill deadline cannot be a
/// poll-driven timer (it would never get a chance
/// to fire while the reactor is blocked) — it is enforced instead by a real
/// OS thread spawned per CGI child (see `spawn_cgi_watchdog`), which sends
/// the kill signals itself on its own clock. The request body (per
/// `Content-Length`) is still read off the wire and forwarded to the
/// child's stdin in full before its stdout is read.
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    poll: Poll,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    mmap_cache: MmapCache,
    auth_cache: AuthCache,
    admission: SpawnAdmission,
    child_table: ChildTable<()>,
    logger: Logger,
    cgi_pattern: Option<Pattern>,
    sig_pattern_enabled: bool,
    sig_exclude_pattern: Option<Pattern>,
    boundary_seed: u64,
    start: Instant,
}

impl Server {
    pub fn new(config: ServerConfig) -> std::io::Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{}", e)))?;
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        let logger = if config.no_log {
            Logger::new(Box::new(std::io::sink()))
        } else {
            match &config.log_file {
                Some(path) => {
                    let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
                    Logger::new(Box::new(file))
                }
                None => Logger::stderr(),
            }
        };

        let cgi_pattern = config.cgipat.as_deref().map(Pattern::new);
        let sig_exclude_pattern = config.sig_exclude_pattern.as_deref().map(Pattern::new);
        let sig_pattern_enabled = config.sigpat.is_some();

        Ok(Server {
            admission: SpawnAdmission::new(config.cgilimit),
            mmap_cache: MmapCache::new(config.desired_max_mapped_files, config.desired_max_mapped_bytes),
            config,
            listener,
            poll,
            connections: HashMap::new(),
            next_token: 1,
            auth_cache: AuthCache::new(),
            child_table: ChildTable::new(),
            logger,
            cgi_pattern,
            sig_pattern_enabled,
            sig_exclude_pattern,
            boundary_seed: random_seed(),
            start: Instant::now(),
        })
    }

    pub fn run(&mut self) -> std::io::Result<()> {
        let mut events = mio::Events::with_capacity(1024);
        loop {
            self.poll.poll(&mut events, Some(std::time::Duration::from_millis(1000)))?;

            for event in events.iter() {
                if event.token() == LISTENER_TOKEN {
                    self.accept_all()?;
                    continue;
                }
                self.handle_event(event.token(), event);
            }

            self.sweep_idle();

            let to_close: Vec<Token> = self
                .connections
                .iter()
                .filter(|(_, c)| c.closed && !c.wants_write())
                .map(|(t, _)| *t)
                .collect();
            for token in to_close {
                self.connections.remove(&token);
            }
        }
    }

    fn accept_all(&mut self) -> std::io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    self.poll.registry().register(&mut stream, token, Interest::READABLE)?;
                    self.connections.insert(token, Connection::new(stream, addr));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    fn handle_event(&mut self, token: Token, event: &Event) {
        if event.is_readable() {
            self.handle_readable(token);
        }
        if event.is_writable() {
            self.handle_writable(token);
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let mut buf = [0u8; crate::prelude::READ_CHUNK];
        let outcome = loop {
            let conn = match self.connections.get_mut(&token) {
                Some(c) => c,
                None => return,
            };
            match conn.stream.read(&mut buf) {
                Ok(0) => break None,
                Ok(n) => {
                    conn.last_activity = Instant::now();
                    if conn.pending.is_none()
                        && conn.buf_len() + n > crate::prelude::MAX_REQUEST_LINE_LEN + crate::prelude::MAX_HEADER_BYTES
                    {
                        self.write_error(token, Error::Malformed("request too large".into()));
                        return;
                    }
                    conn.reader.push(&buf[..n]);

                    if conn.pending.is_none() {
                        match conn.reader.check() {
                            ReadOutcome::NoRequest => continue,
                            ReadOutcome::BadRequest => break Some(Err(())),
                            ReadOutcome::GotRequest => {
                                let header_bytes = conn.reader.buf[..conn.reader.checked_idx].to_vec();
                                match request_parser::parse(&header_bytes) {
                                    Ok(req) => {
                                        let needed = req.content_length.unwrap_or(0) as usize;
                                        conn.pending = Some((req, needed));
                                    }
                                    Err(_) => break Some(Err(())),
                                }
                            }
                        }
                    }

                    let (_, needed) = conn.pending.as_ref().unwrap();
                    let have = conn.reader.buf.len() - conn.reader.checked_idx;
                    if have >= *needed {
                        break Some(Ok(()));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break None,
                Err(_) => break None,
            }
        };

        match outcome {
            Some(Ok(())) => self.service_request(token),
            Some(Err(())) => self.write_error(token, Error::Malformed("malformed request".into())),
            None => {}
        }
    }

    fn handle_writable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else { return };
        while conn.wants_write() {
            match conn.stream.write(&conn.write_buf[conn.write_pos..]) {
                Ok(0) => break,
                Ok(n) => conn.write_pos += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => {
                    conn.closed = true;
                    break;
                }
            }
        }
        if !conn.wants_write() && conn.closed {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
    }

    fn sweep_idle(&mut self) {
        let read_limit = std::time::Duration::from_secs(self.config.idle_read_timelimit);
        let send_limit = std::time::Duration::from_secs(self.config.idle_send_timelimit);
        for conn in self.connections.values_mut() {
            let idle = conn.last_activity.elapsed();
            let limit = if conn.wants_write() { send_limit } else { read_limit };
            if idle > limit {
                conn.closed = true;
            }
        }
    }

    fn service_request(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else { return };
        let peer_ip = conn.addr.ip().to_string();
        let peer_port = conn.addr.port();
        let Some((req, body_len)) = conn.pending.take() else { return };
        let body_start = conn.reader.checked_idx;
        let body = conn.reader.buf[body_start..body_start + body_len].to_vec();

        let resolver_cfg = ResolverConfig {
            cwd: Path::new(&self.config.dir),
            vhost_enabled: self.config.virtual_host,
            forbid_hidden_resource: self.config.forbid_hidden_resource,
            index_names: &self.config.index_names,
            autoindex: self.config.autoindex,
        };

        let route_and_resolved = if let Some(route) = dispatcher::route_embedded(&req.origfilename) {
            Ok((route, None))
        } else {
            match resolver::resolve(
                &resolver_cfg,
                &req.origfilename,
                req.hdrhost.as_deref(),
                req.authorization.as_deref(),
                &mut self.auth_cache,
            ) {
                Ok(resolved) if resolved.metadata.is_none() => {
                    Err(Error::NotFound("resource not found".to_string()))
                }
                Ok(resolved) => {
                    let route = dispatcher::route_resolved(&resolved, self.cgi_pattern.as_ref());
                    route.map(|r| (r, Some(resolved)))
                }
                Err(e) => Err(e),
            }
        };

        let (route, resolved) = match route_and_resolved {
            Ok(v) => v,
            Err(e) => {
                self.log_request(&req, &peer_ip, e.status(), 0);
                self.write_error(token, e);
                return;
            }
        };

        let wants_sign = self.sig_pattern_enabled && req.accept.contains("multipart/msigned") && !self.is_sign_excluded(&req);

        let result = match route {
            Route::HkpLookup | Route::HkpAdd => self.handle_embedded(route).map(ServedBody::Ready),
            Route::DirectoryRedirect => {
                let query_suffix = if req.query.is_empty() { String::new() } else { format!("?{}", req.query) };
                let location = format!("/{}/{}", req.origfilename, query_suffix);
                Ok(ServedBody::Ready(response::redirect(302, &location)))
            }
            Route::Directory => resolved
                .as_ref()
                .ok_or_else(|| Error::Internal("directory route without resolved resource".into()))
                .and_then(|r| self.serve_directory(&r.realfilename))
                .map(ServedBody::Ready),
            Route::StaticFile => resolved
                .as_ref()
                .ok_or_else(|| Error::Internal("static route without resolved resource".into()))
                .and_then(|r| self.serve_static(&req, r, wants_sign)),
            Route::Cgi => resolved
                .as_ref()
                .ok_or_else(|| Error::Internal("cgi route without resolved resource".into()))
                .and_then(|r| self.serve_cgi(&req, r, &body, &peer_ip, peer_port, wants_sign)),
        };

        let version_str = match req.version {
            request_parser::HttpVersion::Http09 => "HTTP/1.0", // 0.9 clients get a bare body; version only matters for status-line clients
            request_parser::HttpVersion::Http10 => "HTTP/1.0",
            request_parser::HttpVersion::Http11 => "HTTP/1.1",
        };

        match result {
            Ok(ServedBody::Ready(resp)) => {
                let status = resp.status;
                let bytes = resp.body.len() as u64;
                self.log_request(&req, &peer_ip, status, bytes);
                self.queue_write(token, resp.to_bytes(version_str));
            }
            Ok(ServedBody::Framed(status, raw)) => {
                self.log_request(&req, &peer_ip, status, raw.len() as u64);
                self.queue_write(token, raw);
            }
            Err(e) => {
                self.log_request(&req, &peer_ip, e.status(), 0);
                self.write_error(token, e);
            }
        }
    }

    fn is_sign_excluded(&self, req: &Request) -> bool {
        self.sig_exclude_pattern.as_ref().is_some_and(|p| p.matches(&req.origfilename))
    }

    /// `pks/lookup`/`pks/add` need a concrete `KeyStore` wired in by an
    /// embedder; none is configured here, so both return 501. The signing
    /// path these would otherwise run through is exercised end-to-end by
    /// `serve_static`/`serve_cgi` instead.
    fn handle_embedded(&mut self, route: Route) -> Result<Response> {
        match route {
            Route::HkpLookup => Err(Error::FeatureUnavailable("HKP keystore not configured".to_string())),
            Route::HkpAdd => Err(Error::FeatureUnavailable("HKP keystore not configured".to_string())),
            _ => unreachable!(),
        }
    }

    fn serve_directory(&mut self, dir: &Path) -> Result<Response> {
        let listing = directory::render(dir, std::time::SystemTime::now(), self.config.max_links)?;
        Ok(response::build(200, &self.config.charset, None).set_body(listing.into_bytes(), &format!("text/html; charset={}", self.config.charset)))
    }

    fn serve_static(&mut self, req: &Request, resolved: &resolver::ResolvedResource, wants_sign: bool) -> Result<ServedBody> {
        let meta = resolved.metadata.as_ref().ok_or_else(|| Error::NotFound("missing file".into()))?;
        let full_len = meta.len();
        let filename = resolved.realfilename.file_name().and_then(|n| n.to_str()).unwrap_or("");

        let range = req.range.and_then(|r| resolve_range(r, full_len));
        if req.flags.got_range && range.is_none() {
            return Err(Error::Malformed("unsatisfiable range".to_string()));
        }

        let mut resp = response::for_static_file(filename, &self.config.charset, full_len, range);

        let mut file = std::fs::File::open(&resolved.realfilename)?;
        let body = if full_len == 0 {
            Vec::new()
        } else {
            let key = CacheKey::from_metadata(meta);
            let now = self.now_millis();
            match self.mmap_cache.map(key, &file, now) {
                Some(mapping) => {
                    let slice: &[u8] = &mapping;
                    let out = match range {
                        Some((first, last)) => slice[first as usize..=last as usize].to_vec(),
                        None => slice.to_vec(),
                    };
                    self.mmap_cache.unmap(&key);
                    out
                }
                None => {
                    let mut buf = Vec::new();
                    file.read_to_end(&mut buf)?;
                    match range {
                        Some((first, last)) => buf[first as usize..=last as usize].to_vec(),
                        None => buf,
                    }
                }
            }
        };
        resp.body = body;

        if wants_sign {
            let mtime = meta.mtime_secs();
            let cached = self.config.sig_cachedir.as_ref().and_then(|dir| {
                signing::cache_lookup(&SigCachePaths { cachedir: dir.into() }, &resolved.realfilename, req.flags.got_range, mtime)
            });
            let sig = cached.unwrap_or_default();
            let status = resp.status;
            return Ok(ServedBody::Framed(status, self.wrap_signed(resp, &sig)));
        }

        Ok(ServedBody::Ready(resp))
    }

    /// Splits `resp`'s headers into content/other buckets and emits the
    /// `multipart/msigned` envelope, returning the complete raw HTTP
    /// response bytes (status line included) rather than a [`Response`] —
    /// the envelope already carries its own status line and headers, so
    /// wrapping it in another [`Response`] would double them.
    fn wrap_signed(&mut self, resp: Response, precomputed_sig: &[u8]) -> Vec<u8> {
        let status_line = format!("HTTP/1.0 {} {}\r\n", resp.status, response::status_title(resp.status));
        let mut content_headers = Vec::new();
        let mut other_headers = Vec::new();
        for (k, v) in &resp.headers {
            if k.eq_ignore_ascii_case("content-type") || k.eq_ignore_ascii_case("content-length") || k.eq_ignore_ascii_case("content-range") || k.eq_ignore_ascii_case("content-encoding") {
                content_headers.push((k.clone(), v.clone()));
            } else {
                other_headers.push((k.clone(), v.clone()));
            }
        }
        let parsed = signing::ParsedResponse { status: resp.status, content_headers, other_headers, body: resp.body };

        let mut out = Vec::new();
        if precomputed_sig.is_empty() {
            let mut engine = NullSignEngine;
            let _ = signing::write_signed(&mut out, &parsed, &status_line, &mut engine, &mut self.boundary_seed);
        } else {
            let mut engine = PrecomputedSignEngine { sig: precomputed_sig.to_vec(), yielded: false };
            let _ = signing::write_signed(&mut out, &parsed, &status_line, &mut engine, &mut self.boundary_seed);
        }
        out
    }

    fn serve_cgi(&mut self, req: &Request, resolved: &resolver::ResolvedResource, body: &[u8], peer_ip: &str, peer_port: u16, wants_sign: bool) -> Result<ServedBody> {
        self.admission.admit()?;

        let server_name = req.hdrhost.as_deref().unwrap_or(&self.config.host).to_string();
        let env = cgi::build_env(req, &resolved.realfilename, "", peer_ip, peer_port, &server_name, self.config.port);
        let opts = SpawnOptions { nice: None, ld_library_path: None, extra_path: None };
        let mut command = cgi::build_command(&resolved.realfilename, &env, &opts);

        let mut child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                self.admission.release();
                return Err(Error::Internal(format!("cgi spawn failed: {}", e)));
            }
        };
        let pid = child.id() as i32;
        self.child_table.insert(pid, ());
        let watchdog = spawn_cgi_watchdog(pid, self.config.cgi_timelimit);

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(body);
            drop(stdin);
        }

        let mut output = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            let _ = stdout.read_to_end(&mut output);
        }
        let _ = child.wait();
        watchdog.cancel();
        self.child_table.remove(pid);
        self.admission.release();

        let is_nph = resolved.realfilename.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("nph-"));
        let parsed_cgi = cgi::parse_output(&output, is_nph);

        if is_nph {
            let mut resp = Response::new(200);
            resp.body = parsed_cgi.body_start;
            return Ok(ServedBody::Ready(resp));
        }

        let mut resp = Response::new(parsed_cgi.status);
        for (k, v) in &parsed_cgi.headers {
            resp = resp.set_header(k, v.clone());
        }
        resp.body = parsed_cgi.body_start;
        resp = resp
            .set_header("Server", response::SERVER_SOFTWARE)
            .set_header("Date", response::httpdate_now())
            .set_header("Connection", "close");

        if wants_sign {
            let status_line = format!("HTTP/1.0 {} {}\r\n", resp.status, response::status_title(resp.status));
            let reparsed = signing::parse(&output, SigningMode::Cgi);
            if !signing::already_signed(&reparsed) {
                let status = reparsed.status;
                return Ok(ServedBody::Framed(status, self.wrap_parsed_signed(reparsed, &status_line)));
            }
        }

        Ok(ServedBody::Ready(resp))
    }

    /// Same raw-bytes contract as [`Server::wrap_signed`]; used for CGI
    /// output, which is already a fully-parsed [`signing::ParsedResponse`]
    /// rather than a [`Response`].
    fn wrap_parsed_signed(&mut self, parsed: signing::ParsedResponse, status_line: &str) -> Vec<u8> {
        let mut out = Vec::new();
        let mut engine = NullSignEngine;
        let _ = signing::write_signed(&mut out, &parsed, status_line, &mut engine, &mut self.boundary_seed);
        out
    }

    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn write_error(&mut self, token: Token, err: Error) {
        let resp = response::build(err.status(), &self.config.charset, Some(err.message()));
        self.queue_write(token, resp.to_bytes("HTTP/1.0"));
    }

    fn queue_write(&mut self, token: Token, bytes: Vec<u8>) {
        let Some(conn) = self.connections.get_mut(&token) else { return };
        conn.write_buf = bytes;
        conn.write_pos = 0;
        conn.closed = true; // one request per connection; close after the response drains
        let _ = self.poll.registry().reregister(&mut conn.stream, token, Interest::WRITABLE);
        self.handle_writable(token);
    }

    fn log_request(&self, req: &Request, peer_ip: &str, status: u16, bytes: u64) {
        let method = match req.method {
            request_parser::Method::Get => "GET",
            request_parser::Method::Head => "HEAD",
            request_parser::Method::Post => "POST",
            request_parser::Method::Unknown => "UNKNOWN",
        };
        let request_line = format!("{} {} {}", method, req.encoded_url, match req.version {
            request_parser::HttpVersion::Http09 => "HTTP/0.9",
            request_parser::HttpVersion::Http10 => "HTTP/1.0",
            request_parser::HttpVersion::Http11 => "HTTP/1.1",
        });
        self.logger.log(&LogEntry {
            remote_addr: peer_ip,
            remote_user: None,
            request_line: &request_line,
            status,
            bytes_sent: bytes,
            referrer: req.referrer.as_deref(),
            user_agent: req.user_agent.as_deref(),
            unix_time: std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs() as i64,
        });
    }
}

trait MetadataMtimeSecs {
    fn mtime_secs(&self) -> i64;
}
impl MetadataMtimeSecs for std::fs::Metadata {
    fn mtime_secs(&self) -> i64 {
        use std::os::unix::fs::MetadataExt;
        self.mtime()
    }
}

trait ConnBufLen {
    fn buf_len(&self) -> usize;
}
impl ConnBufLen for Connection {
    fn buf_len(&self) -> usize {
        self.reader.buf.len()
    }
}

/// Clamps a parsed `Range` to the resource's actual length; returns `None`
/// for an unsatisfiable range (start beyond EOF, or an empty suffix).
fn resolve_range(range: ByteRange, full_len: u64) -> Option<(u64, u64)> {
    if full_len == 0 {
        return None;
    }
    if let Some(suffix) = range.suffix {
        if suffix == 0 {
            return None;
        }
        let first = full_len.saturating_sub(suffix);
        return Some((first, full_len - 1));
    }
    if range.first >= full_len {
        return None;
    }
    let last = range.last.unwrap_or(full_len - 1).min(full_len - 1);
    if last < range.first {
        return None;
    }
    Some((range.first, last))
}

/// A `SignEngine` that replays a cache hit verbatim instead of invoking a
/// real signer — used by [`Server::wrap_signed`] when a fresh signature is
/// already on disk.
struct PrecomputedSignEngine {
    sig: Vec<u8>,
    yielded: bool,
}
impl crate::sign_engine::SignEngine for PrecomputedSignEngine {
    fn feed(&mut self, _chunk: &[u8]) {}
    fn next_signature_chunk(&mut self) -> Option<Vec<u8>> {
        if self.yielded {
            None
        } else {
            self.yielded = true;
            Some(std::mem::take(&mut self.sig))
        }
    }
}

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

/// Sends to `-pid` (the process group `pid` leads, per `setpgid(0, 0)` in
/// the CGI child) so a script that has itself forked children dies along
/// with them.
fn send_signal(pid: i32, sig: i32) {
    unsafe {
        c_kill(-pid, sig);
    }
}

unsafe extern "C" {
    #[link_name = "kill"]
    fn c_kill(pid: i32, sig: i32) -> i32;
}

/// Handle to a running [`spawn_cgi_watchdog`] thread. Dropping it without
/// calling `cancel` is harmless — the thread simply times out and finds the
/// child already reaped, since `kill` on a dead pid is a no-op failure.
struct CgiWatchdog {
    cancel_tx: std::sync::mpsc::Sender<()>,
}

impl CgiWatchdog {
    fn cancel(self) {
        let _ = self.cancel_tx.send(());
    }
}

/// Enforces `cgi_timelimit` on an OS thread independent of the reactor, since
/// the reactor thread is blocked inside `read_to_end` for the duration of the
/// CGI request and can never run a poll-driven timer. `cgi_timelimit_secs`
/// after spawn a soft SIGTERM is sent to the child's process group; if the
/// watchdog hasn't been cancelled 5 seconds after that, a hard SIGKILL
/// follows. Cancelling (via `CgiWatchdog::cancel`) after the child is reaped
/// stops either signal from firing.
fn spawn_cgi_watchdog(pid: i32, cgi_timelimit_secs: u64) -> CgiWatchdog {
    let (cancel_tx, cancel_rx) = std::sync::mpsc::channel::<()>();
    std::thread::spawn(move || {
        if cancel_rx.recv_timeout(std::time::Duration::from_secs(cgi_timelimit_secs)).is_ok() {
            return;
        }
        send_signal(pid, SIGTERM);
        if cancel_rx.recv_timeout(std::time::Duration::from_secs(5)).is_ok() {
            return;
        }
        send_signal(pid, SIGKILL);
    });
    CgiWatchdog { cancel_tx }
}

/// Seeds the `multipart/msigned` boundary generator from real OS entropy.
/// A fixed constant here would make every server process emit the exact
/// same boundary sequence on every restart; the design calls for a CSPRNG
/// seed in place of the original's weak `time()` seed.
fn random_seed() -> u64 {
    let mut buf = [0u8; 8];
    getrandom::getrandom(&mut buf).expect("failed to read OS entropy for boundary seed");
    u64::from_ne_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_parser::ByteRange;

    #[test]
    fn full_range_request_is_satisfiable() {
        let r = ByteRange { first: 0, last: Some(9), suffix: None };
        assert_eq!(resolve_range(r, 100), Some((0, 9)));
    }

    #[test]
    fn suffix_range_counts_from_end() {
        let r = ByteRange { first: 0, last: None, suffix: Some(10) };
        assert_eq!(resolve_range(r, 100), Some((90, 99)));
    }

    #[test]
    fn range_starting_past_eof_is_unsatisfiable() {
        let r = ByteRange { first: 200, last: None, suffix: None };
        assert_eq!(resolve_range(r, 100), None);
    }

    #[test]
    fn open_ended_range_reaches_eof() {
        let r = ByteRange { first: 50, last: None, suffix: None };
        assert_eq!(resolve_range(r, 100), Some((50, 99)));
    }
}
