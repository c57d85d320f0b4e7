use log::debug;
use percent_encoding::percent_decode_str;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};

use super::http_status::HttpStatus;

pub const MAX_HEAD_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Raw request target, query string included.
    pub target: String,
    pub headers: Vec<(String, String)>,
}

/// A request that cannot be served; answered with `status` and `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub status: HttpStatus,
    pub message: String,
    /// Whether the method is known to be HEAD, so the error body is skipped.
    pub is_head: bool,
}

impl RequestError {
    fn new(status: HttpStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            is_head: false,
        }
    }
}

impl Request {
    pub fn is_head(&self) -> bool {
        self.method == Method::Head
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Target with query string and fragment removed.
    pub fn path(&self) -> &str {
        strip_query(&self.target)
    }

    pub fn query(&self) -> Option<&str> {
        let without_fragment = self.target.split('#').next().unwrap_or("");
        without_fragment.split_once('?').map(|(_, query)| query)
    }
}

/// Reads lines up to the blank line that ends the head.
///
/// `Ok(None)` means the client closed the connection without sending anything.
pub fn read_head<R: BufRead>(reader: &mut R) -> io::Result<Option<Result<Vec<String>, RequestError>>> {
    let mut lines = Vec::new();
    let mut total = 0usize;

    loop {
        let mut raw = Vec::new();
        let limit = (MAX_HEAD_SIZE + 1 - total) as u64;
        let read = reader.by_ref().take(limit).read_until(b'\n', &mut raw)?;
        if read == 0 {
            if lines.is_empty() {
                return Ok(None);
            }
            break;
        }

        total += read;
        if total > MAX_HEAD_SIZE {
            return Ok(Some(Err(RequestError::new(
                HttpStatus::RequestHeaderFieldsTooLarge,
                "Request header too large",
            ))));
        }

        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        if line.is_empty() {
            if lines.is_empty() {
                // Tolerate stray CRLF before the request line.
                continue;
            }
            break;
        }
        lines.push(line);
    }

    Ok(Some(Ok(lines)))
}

pub fn parse_request(lines: &[String]) -> Result<Request, RequestError> {
    let Some(request_line) = lines.first() else {
        return Err(RequestError::new(HttpStatus::BadRequest, "Bad request syntax"));
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(RequestError::new(
            HttpStatus::BadRequest,
            format!("Bad request syntax ({:?})", request_line),
        ));
    }

    let (method, target, version) = (parts[0], parts[1], parts[2]);
    debug!("Parsing request: {} {} {}", method, target, version);

    let is_head = method == "HEAD";

    let Some(version_number) = version.strip_prefix("HTTP/") else {
        return Err(RequestError::new(
            HttpStatus::BadRequest,
            format!("Bad request version ({:?})", version),
        ));
    };
    let parsed = version_number
        .split_once('.')
        .and_then(|(major, minor)| Some((major.parse::<u32>().ok()?, minor.parse::<u32>().ok()?)));
    let Some((major, _minor)) = parsed else {
        return Err(RequestError {
            is_head,
            ..RequestError::new(
                HttpStatus::BadRequest,
                format!("Bad request version ({:?})", version),
            )
        });
    };
    if major != 1 {
        return Err(RequestError {
            is_head,
            ..RequestError::new(
                HttpStatus::HttpVersionNotSupported,
                format!("Invalid HTTP version ({})", version_number),
            )
        });
    }

    let method = match method {
        "GET" => Method::Get,
        "HEAD" => Method::Head,
        other => {
            return Err(RequestError::new(
                HttpStatus::NotImplemented,
                format!("Unsupported method ({:?})", other),
            ));
        }
    };

    let mut headers = Vec::with_capacity(lines.len().saturating_sub(1));
    for line in &lines[1..] {
        match line.split_once(':') {
            Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
            None => {
                return Err(RequestError {
                    is_head,
                    ..RequestError::new(HttpStatus::BadRequest, "Bad header line")
                });
            }
        }
    }

    Ok(Request {
        method,
        target: target.to_string(),
        headers,
    })
}

fn strip_query(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    &target[..end]
}

/// Maps a URL path onto the filesystem below `root`.
///
/// The path is normalised first (`..` removes the previous segment, never
/// going above `root`), then empty and `.` segments are dropped. A trailing
/// slash on the URL is kept on the returned path.
pub fn translate_path(root: &Path, url_path: &str) -> PathBuf {
    let path = strip_query(url_path);
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let trailing_slash = decoded.trim_end().ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ if segment.contains(['\\', '\0']) => {}
            _ => segments.push(segment),
        }
    }

    let mut translated = root.to_path_buf();
    for segment in segments {
        translated.push(segment);
    }

    if trailing_slash {
        translated.push("");
    }
    translated
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines(raw: &str) -> Vec<String> {
        read_head(&mut Cursor::new(raw.as_bytes()))
            .unwrap()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn parses_get_with_headers() {
        let request = parse_request(&lines(
            "GET /app.js?v=2 HTTP/1.1\r\nHost: localhost\r\nIf-Modified-Since: x\r\n\r\n",
        ))
        .unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path(), "/app.js");
        assert_eq!(request.query(), Some("v=2"));
        assert_eq!(request.header("host"), Some("localhost"));
        assert_eq!(request.header("IF-MODIFIED-SINCE"), Some("x"));
    }

    #[test]
    fn bare_newlines_end_the_head() {
        let request = parse_request(&lines("HEAD / HTTP/1.0\n\n")).unwrap();
        assert!(request.is_head());
    }

    #[test]
    fn closed_connection_yields_nothing() {
        assert!(read_head(&mut Cursor::new(b"" as &[u8])).unwrap().is_none());
    }

    #[test]
    fn rejects_unsupported_method() {
        let err = parse_request(&lines("POST /upload HTTP/1.1\r\n\r\n")).unwrap_err();
        assert_eq!(err.status, HttpStatus::NotImplemented);
    }

    #[test]
    fn rejects_malformed_request_line() {
        let err = parse_request(&lines("GARBAGE\r\n\r\n")).unwrap_err();
        assert_eq!(err.status, HttpStatus::BadRequest);

        let err = parse_request(&lines("GET / FTP/1.0\r\n\r\n")).unwrap_err();
        assert_eq!(err.status, HttpStatus::BadRequest);

        let err = parse_request(&lines("GET / HTTP/2.0\r\n\r\n")).unwrap_err();
        assert_eq!(err.status, HttpStatus::HttpVersionNotSupported);
    }

    #[test]
    fn rejects_unparseable_version_number() {
        for version in ["HTTP/1.foo", "HTTP/1.", "HTTP/1", "HTTP/x.1"] {
            let err = parse_request(&lines(&format!("GET / {}\r\n\r\n", version))).unwrap_err();
            assert_eq!(err.status, HttpStatus::BadRequest, "{}", version);
        }
        assert!(parse_request(&lines("GET / HTTP/1.1\r\n\r\n")).is_ok());
    }

    #[test]
    fn oversized_head_is_rejected() {
        let raw = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(MAX_HEAD_SIZE));
        let result = read_head(&mut Cursor::new(raw.into_bytes())).unwrap().unwrap();
        assert_eq!(
            result.unwrap_err().status,
            HttpStatus::RequestHeaderFieldsTooLarge
        );
    }

    #[test]
    fn translate_stays_under_root() {
        let root = Path::new("/srv/site");
        assert_eq!(translate_path(root, "/css/main.css"), root.join("css/main.css"));
        assert_eq!(translate_path(root, "/../../etc/passwd"), root.join("etc/passwd"));
        assert_eq!(translate_path(root, "/a/./b/../c"), root.join("a/c"));
        assert_eq!(translate_path(root, "/%2e%2e/secret"), root.join("secret"));
    }

    #[test]
    fn translate_decodes_and_keeps_trailing_slash() {
        let root = Path::new("/srv/site");
        assert_eq!(translate_path(root, "/my%20file.txt?x=1"), root.join("my file.txt"));
        assert!(translate_path(root, "/docs/").to_string_lossy().ends_with("docs/"));
        assert_eq!(translate_path(root, "/"), root.join(""));
    }
}
