//! CERN-combined log line emission — one line per request, independent of
//! `access_log`'s colorized operational macros (those are for the server's
//! own diagnostics; this is the client-facing request log). Grounded on
//! the teacher's `proxy_log` crate's sink-writing pattern, generalized to
//! the combined format and a pluggable sink rather than a fixed stderr
//! writer.

use std::io::Write;
use std::sync::Mutex;

use crate::response::httpdate_from_unix;

pub struct Logger {
    sink: Mutex<Box<dyn Write + Send>>,
}

pub struct LogEntry<'a> {
    pub remote_addr: &'a str,
    pub remote_user: Option<&'a str>,
    pub request_line: &'a str,
    pub status: u16,
    pub bytes_sent: u64,
    pub referrer: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub unix_time: i64,
}

impl Logger {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Logger { sink: Mutex::new(sink) }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Formats and writes one CERN Combined Log Format line. Best-effort:
    /// a write failure here must never mask the response already sent to
    /// the client, so errors are swallowed after a diagnostic via
    /// `access_log`.
    pub fn log(&self, entry: &LogEntry) {
        let line = format_line(entry);
        let mut sink = match self.sink.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(sink, "{}", line) {
            access_log::error!("access log write failed: {}", e);
        }
    }
}

fn format_line(entry: &LogEntry) -> String {
    format!(
        "{host} - {user} [{time}] \"{req}\" {status} {bytes} \"{referrer}\" \"{ua}\"",
        host = entry.remote_addr,
        user = entry.remote_user.unwrap_or("-"),
        time = httpdate_from_unix(entry.unix_time.max(0) as u64),
        req = entry.request_line,
        status = entry.status,
        bytes = entry.bytes_sent,
        referrer = entry.referrer.unwrap_or("-"),
        ua = entry.user_agent.unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct VecSink(Arc<StdMutex<Vec<u8>>>);

    impl Write for VecSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_line_includes_request_and_status() {
        let sink = VecSink::default();
        let logger = Logger::new(Box::new(sink.clone()));
        logger.log(&LogEntry {
            remote_addr: "10.0.0.1",
            remote_user: None,
            request_line: "GET / HTTP/1.0",
            status: 200,
            bytes_sent: 42,
            referrer: None,
            user_agent: Some("curl/8"),
            unix_time: 0,
        });
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(written.contains("GET / HTTP/1.0"));
        assert!(written.contains(" 200 42 "));
        assert!(written.contains("curl/8"));
        assert!(written.contains("10.0.0.1 - -"));
    }
}
