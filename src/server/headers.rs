use std::io::{self, Write};
use std::time::SystemTime;

use super::http_status::HttpStatus;

pub const SERVER_NAME: &str = concat!("dev-server/", env!("CARGO_PKG_VERSION"));

/// Headers appended to every response right before the blank line.
pub const RESPONSE_HEADERS: &[(&str, &str)] = &[
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
];

#[derive(Debug, Clone)]
pub struct ResponseHeaderSet {
    headers: &'static [(&'static str, &'static str)],
}

impl Default for ResponseHeaderSet {
    fn default() -> Self {
        Self {
            headers: RESPONSE_HEADERS,
        }
    }
}

impl ResponseHeaderSet {
    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, &'static str)> {
        self.headers.iter()
    }
}

/// Buffered response head. Nothing reaches the socket until `end_headers`.
#[derive(Debug)]
pub struct ResponseHead {
    buffer: String,
}

impl ResponseHead {
    /// Status line followed by `Server` and `Date`.
    pub fn new(status: HttpStatus) -> Self {
        let mut head = Self {
            buffer: status.as_response_line(),
        };
        head.header("Server", SERVER_NAME);
        head.header("Date", &httpdate::fmt_http_date(SystemTime::now()));
        head
    }

    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        self.buffer.push_str(name);
        self.buffer.push_str(": ");
        self.buffer.push_str(value);
        self.buffer.push_str("\r\n");
        self
    }

    /// Appends the fixed header set, terminates the head and flushes it.
    pub fn end_headers<W: Write>(mut self, fixed: &ResponseHeaderSet, out: &mut W) -> io::Result<()> {
        for (name, value) in fixed.iter() {
            self.header(name, value);
        }
        self.buffer.push_str("\r\n");
        out.write_all(self.buffer.as_bytes())?;
        out.flush()
    }
}
