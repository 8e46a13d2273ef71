//! Incremental byte-level state machine that detects end-of-request without
//! knowing anything about methods, headers, or encoding. Adapted from the
//! `cursor`-over-`buffer` technique in the teacher's `HttpRequest` parser,
//! but restructured into the design's exact named states so `checked_idx`
//! never re-scans bytes it has already classified.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    FirstWord,
    FirstWs,
    SecondWord,
    SecondWs,
    ThirdWord,
    ThirdWs,
    Line,
    Lf,
    Cr,
    Crlf,
    CrlfCr,
    Bogus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    NoRequest,
    GotRequest,
    BadRequest,
}

/// Owns the growable read buffer and the scan cursor. `checked_idx` is the
/// boundary up to which bytes have already been classified; `read_idx` is
/// the boundary up to which bytes have actually arrived from the socket.
/// Invariant: `checked_idx <= read_idx <= buf.len()`.
pub struct RequestReader {
    pub buf: Vec<u8>,
    pub read_idx: usize,
    pub checked_idx: usize,
    state: ReaderState,
}

impl RequestReader {
    pub fn new() -> Self {
        RequestReader { buf: Vec::new(), read_idx: 0, checked_idx: 0, state: ReaderState::FirstWord }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.read_idx = self.buf.len();
    }

    /// Resets to scan the next request, retaining only bytes after
    /// `consumed` (pipelining is not supported, so callers drain
    /// everything up to end-of-headers/body; this exists for symmetry with
    /// the design's connection-reuse-across-requests note, even though in
    /// practice a connection serves exactly one request before closing).
    pub fn reset(&mut self, consumed: usize) {
        self.buf.drain(..consumed);
        self.read_idx = self.buf.len();
        self.checked_idx = 0;
        self.state = ReaderState::FirstWord;
    }

    /// Scans newly-arrived bytes (`checked_idx..read_idx`) and reports
    /// whether a complete request line (plus, for three-word requests, the
    /// blank line ending headers) has been seen. `checked_idx` is
    /// monotonic: bytes already classified are never re-examined.
    ///
    /// A two-word first line (HTTP/0.9) is complete as soon as its own line
    /// terminator is seen. A three-word first line additionally requires a
    /// blank line (end of headers) before it is complete.
    pub fn check(&mut self) -> ReadOutcome {
        while self.checked_idx < self.read_idx {
            let c = self.buf[self.checked_idx];
            self.checked_idx += 1;

            self.state = match self.state {
                ReaderState::FirstWord => match c {
                    b' ' | b'\t' => ReaderState::FirstWs,
                    b'\n' | b'\r' => ReaderState::Bogus,
                    _ => ReaderState::FirstWord,
                },
                ReaderState::FirstWs => match c {
                    b' ' | b'\t' => ReaderState::FirstWs,
                    b'\n' | b'\r' => ReaderState::Bogus,
                    _ => ReaderState::SecondWord,
                },
                // A line terminator straight after the second word means a
                // two-word (HTTP/0.9) request: done once the terminator
                // completes, no header section follows.
                ReaderState::SecondWord => match c {
                    b' ' | b'\t' => ReaderState::SecondWs,
                    b'\n' => return ReadOutcome::GotRequest,
                    b'\r' => ReaderState::Cr,
                    _ => ReaderState::SecondWord,
                },
                ReaderState::Cr => match c {
                    b'\n' => return ReadOutcome::GotRequest,
                    _ => ReaderState::Bogus,
                },
                ReaderState::SecondWs => match c {
                    b' ' | b'\t' => ReaderState::SecondWs,
                    b'\n' | b'\r' => ReaderState::Bogus,
                    _ => ReaderState::ThirdWord,
                },
                ReaderState::ThirdWord => match c {
                    b'\n' => ReaderState::Lf,
                    b'\r' => ReaderState::CrlfCr,
                    _ => ReaderState::ThirdWord,
                },
                ReaderState::ThirdWs => match c {
                    b'\n' => ReaderState::Lf,
                    b'\r' => ReaderState::CrlfCr,
                    _ => ReaderState::ThirdWord,
                },
                ReaderState::Line => match c {
                    b'\n' => ReaderState::Lf,
                    b'\r' => ReaderState::CrlfCr,
                    _ => ReaderState::Line,
                },
                // Lf: we've just seen a line terminator ending some header
                // line (or the request line). A second consecutive
                // terminator is the blank line ending headers.
                ReaderState::Lf => match c {
                    b'\n' => return ReadOutcome::GotRequest,
                    b'\r' => ReaderState::Crlf,
                    _ => ReaderState::Line,
                },
                ReaderState::Crlf => match c {
                    b'\n' => return ReadOutcome::GotRequest,
                    _ => ReaderState::Line,
                },
                ReaderState::CrlfCr => match c {
                    b'\n' => ReaderState::Lf,
                    _ => ReaderState::Line,
                },
                ReaderState::Bogus => ReaderState::Bogus,
            };

            if self.state == ReaderState::Bogus {
                return ReadOutcome::BadRequest;
            }
        }

        ReadOutcome::NoRequest
    }
}

impl Default for RequestReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_idx_never_exceeds_read_idx() {
        let mut r = RequestReader::new();
        r.push(b"GET / HTTP/1.0\r\n");
        r.check();
        assert!(r.checked_idx <= r.read_idx);
    }

    #[test]
    fn three_word_request_needs_blank_line() {
        let mut r = RequestReader::new();
        r.push(b"GET / HTTP/1.0\r\n");
        assert_eq!(r.check(), ReadOutcome::NoRequest);
        r.push(b"\r\n");
        assert_eq!(r.check(), ReadOutcome::GotRequest);
    }

    #[test]
    fn two_word_request_is_http_09() {
        let mut r = RequestReader::new();
        r.push(b"GET /\n");
        assert_eq!(r.check(), ReadOutcome::GotRequest);
    }

    #[test]
    fn incomplete_line_is_no_request() {
        let mut r = RequestReader::new();
        r.push(b"GET / HTTP");
        assert_eq!(r.check(), ReadOutcome::NoRequest);
    }

    #[test]
    fn leading_newline_is_bogus() {
        let mut r = RequestReader::new();
        r.push(b"\n");
        assert_eq!(r.check(), ReadOutcome::BadRequest);
    }

    #[test]
    fn incremental_feed_eventually_completes() {
        let mut r = RequestReader::new();
        r.push(b"GET / HTTP");
        assert_eq!(r.check(), ReadOutcome::NoRequest);
        let before = r.checked_idx;
        r.push(b"/1.0\r\n\r\n");
        assert_eq!(r.check(), ReadOutcome::GotRequest);
        assert!(r.checked_idx >= before);
    }
}
