use log::{debug, info, warn};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::headers::{ResponseHead, ResponseHeaderSet};
use super::http_status::HttpStatus;
use super::mime::MimeOverrideTable;
use super::request::{self, Request, RequestError};
use super::stream::{STOP_POLL_INTERVAL, StopAware};

const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

/// Characters escaped in directory listing links.
const LINK_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Answers GET/HEAD requests from a directory tree.
///
/// Holds everything a response depends on, so several handlers with
/// different roots can live in one process.
#[derive(Debug, Clone)]
pub struct StaticHandler {
    root: PathBuf,
    mime_overrides: MimeOverrideTable,
    response_headers: ResponseHeaderSet,
}

impl StaticHandler {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            mime_overrides: MimeOverrideTable::default(),
            response_headers: ResponseHeaderSet::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serves one request on `stream`, giving up early only if `stop` is set
    /// while the client is stalled.
    pub fn handle_client(&self, stream: &TcpStream, stop: &AtomicBool) -> io::Result<()> {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => "unknown".to_string(),
        };

        debug!("Handling request from {}", peer_addr);

        stream.set_read_timeout(Some(STOP_POLL_INTERVAL))?;
        stream.set_write_timeout(Some(STOP_POLL_INTERVAL))?;

        let mut reader = BufReader::new(StopAware::new(stream, stop));
        let mut writer = BufWriter::new(StopAware::new(stream, stop));
        self.handle(&mut reader, &mut writer, &peer_addr)
    }

    /// Reads one request from `reader` and writes the full response to `writer`.
    pub fn handle<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        peer_addr: &str,
    ) -> io::Result<()> {
        let lines = match request::read_head(reader)? {
            None => {
                debug!("Connection closed by client {}", peer_addr);
                return Ok(());
            }
            Some(Ok(lines)) => lines,
            Some(Err(err)) => {
                warn!("Rejected request from {}: {}", peer_addr, err.message);
                return self.send_error(writer, &err);
            }
        };

        let request = match request::parse_request(&lines) {
            Ok(request) => request,
            Err(err) => {
                warn!(
                    "Rejected request from {}: {} ({})",
                    peer_addr,
                    err.message,
                    err.status.code()
                );
                return self.send_error(writer, &err);
            }
        };

        let status = self.serve(&request, writer)?;
        info!(
            "{} \"{}\" {}",
            peer_addr,
            lines[0],
            status.code()
        );
        Ok(())
    }

    fn serve<W: Write>(&self, request: &Request, writer: &mut W) -> io::Result<HttpStatus> {
        let url_path = request.path();
        let mut file_path = request::translate_path(&self.root, url_path);

        if file_path.is_dir() {
            if !url_path.ends_with('/') {
                let mut location = format!("{}/", url_path);
                if let Some(query) = request.query() {
                    location.push('?');
                    location.push_str(query);
                }
                debug!("Redirecting directory request to {}", location);
                return self.send_redirect(writer, &location);
            }

            match INDEX_FILES
                .iter()
                .map(|name| file_path.join(name))
                .find(|candidate| candidate.is_file())
            {
                Some(index) => file_path = index,
                None => return self.send_listing(request, &file_path, writer),
            }
        } else if url_path.ends_with('/') {
            return self.not_found(request, writer);
        }

        let file = match File::open(&file_path) {
            Ok(file) => file,
            Err(e) => {
                debug!("Cannot open {:?}: {}", file_path, e);
                return self.not_found(request, writer);
            }
        };

        let metadata = file.metadata()?;
        let modified = metadata.modified().ok().map(truncate_to_seconds);

        if let Some(modified) = modified {
            if self.is_not_modified(request, modified) {
                ResponseHead::new(HttpStatus::NotModified).end_headers(&self.response_headers, writer)?;
                return Ok(HttpStatus::NotModified);
            }
        }

        let content_type = self.mime_overrides.resolve(&file_path.to_string_lossy());
        debug!(
            "Serving {:?} as {} (encoding: {:?})",
            file_path, content_type.mime, content_type.encoding
        );

        let mut head = ResponseHead::new(HttpStatus::Ok);
        head.header("Content-Type", &content_type.mime)
            .header("Content-Length", &metadata.len().to_string());
        if let Some(modified) = modified {
            head.header("Last-Modified", &httpdate::fmt_http_date(modified));
        }
        head.end_headers(&self.response_headers, writer)?;

        if !request.is_head() {
            let mut file = file;
            let sent = io::copy(&mut file, writer)?;
            writer.flush()?;
            debug!("Sent {} bytes of {:?}", sent, file_path);
        }

        Ok(HttpStatus::Ok)
    }

    fn is_not_modified(&self, request: &Request, modified: SystemTime) -> bool {
        if request.header("If-None-Match").is_some() {
            return false;
        }
        let Some(since) = request.header("If-Modified-Since") else {
            return false;
        };
        match httpdate::parse_http_date(since) {
            Ok(since) => modified <= since,
            Err(_) => false,
        }
    }

    fn not_found<W: Write>(&self, request: &Request, writer: &mut W) -> io::Result<HttpStatus> {
        let err = RequestError {
            status: HttpStatus::NotFound,
            message: "File not found".to_string(),
            is_head: request.is_head(),
        };
        self.send_error(writer, &err)?;
        Ok(HttpStatus::NotFound)
    }

    fn send_redirect<W: Write>(&self, writer: &mut W, location: &str) -> io::Result<HttpStatus> {
        let mut head = ResponseHead::new(HttpStatus::MovedPermanently);
        head.header("Location", location).header("Content-Length", "0");
        head.end_headers(&self.response_headers, writer)?;
        Ok(HttpStatus::MovedPermanently)
    }

    fn send_listing<W: Write>(
        &self,
        request: &Request,
        dir: &Path,
        writer: &mut W,
    ) -> io::Result<HttpStatus> {
        let body = match render_listing(dir, request.path()) {
            Ok(body) => body,
            Err(e) => {
                warn!("Cannot list {:?}: {}", dir, e);
                let err = RequestError {
                    status: HttpStatus::NotFound,
                    message: "No permission to list directory".to_string(),
                    is_head: request.is_head(),
                };
                self.send_error(writer, &err)?;
                return Ok(HttpStatus::NotFound);
            }
        };

        let mut head = ResponseHead::new(HttpStatus::Ok);
        head.header("Content-Type", "text/html; charset=utf-8")
            .header("Content-Length", &body.len().to_string());
        head.end_headers(&self.response_headers, writer)?;

        if !request.is_head() {
            writer.write_all(body.as_bytes())?;
            writer.flush()?;
        }
        Ok(HttpStatus::Ok)
    }

    pub fn send_error<W: Write>(&self, writer: &mut W, err: &RequestError) -> io::Result<()> {
        let status = err.status;
        let body = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Error response</title>\n</head>\n<body>\n<h1>{} {}</h1>\n<p>{}</p>\n</body>\n</html>\n",
            status.code(),
            status.text(),
            escape_html(&err.message)
        );

        let mut head = ResponseHead::new(status);
        head.header("Connection", "close");
        let send_body = status.allows_body() && !err.is_head;
        if status.allows_body() {
            head.header("Content-Type", "text/html;charset=utf-8")
                .header("Content-Length", &body.len().to_string());
        }
        head.end_headers(&self.response_headers, writer)?;

        if send_body {
            writer.write_all(body.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }
}

fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => UNIX_EPOCH + Duration::from_secs(elapsed.as_secs()),
        Err(_) => time,
    }
}

fn render_listing(dir: &Path, url_path: &str) -> io::Result<String> {
    let mut entries: Vec<(String, bool, bool)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_symlink = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
            let is_dir = entry.path().is_dir();
            (name, is_dir, is_symlink)
        })
        .collect();
    entries.sort_by_key(|(name, _, _)| name.to_lowercase());

    let display_path = escape_html(
        &percent_encoding::percent_decode_str(url_path).decode_utf8_lossy(),
    );
    let title = format!("Directory listing for {}", display_path);

    let mut html = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );

    for (name, is_dir, is_symlink) in &entries {
        let (display, link) = if *is_dir {
            (format!("{}/", name), format!("{}/", name))
        } else if *is_symlink {
            (format!("{}@", name), name.clone())
        } else {
            (name.clone(), name.clone())
        };
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            utf8_percent_encode(&link, LINK_ESCAPE),
            escape_html(&display)
        ));
    }

    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    Ok(html)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
