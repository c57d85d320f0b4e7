//! Content-type resolution.
//!
//! A baseline guess from `mime_guess` with a small override table on top, so
//! module scripts and stylesheets are never served with a type the browser
//! refuses to execute.

use std::borrow::Cow;

/// Extensions forced to a fixed MIME type, checked in order.
pub const MIME_OVERRIDES: &[(&str, &str)] = &[
    (".js", "application/javascript"),
    (".mjs", "application/javascript"),
    (".json", "application/json"),
    (".css", "text/css"),
    (".html", "text/html"),
];

/// Compression suffixes reported as the encoding half of a guess.
const ENCODINGS: &[(&str, &str)] = &[
    (".gz", "gzip"),
    (".Z", "compress"),
    (".bz2", "bzip2"),
    (".xz", "xz"),
    (".br", "br"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub mime: Cow<'static, str>,
    pub encoding: Option<&'static str>,
}

/// Default extension guesser. `archive.tar.gz` is `application/x-tar` with
/// `gzip` encoding.
pub fn guess_baseline(path: &str) -> ContentType {
    let (stem, encoding) = match ENCODINGS.iter().find(|(suffix, _)| path.ends_with(suffix)) {
        Some((suffix, encoding)) => (&path[..path.len() - suffix.len()], Some(*encoding)),
        None => (path, None),
    };

    let mime = mime_guess::from_path(stem).first_or_octet_stream();

    ContentType {
        mime: Cow::Owned(mime.essence_str().to_string()),
        encoding,
    }
}

#[derive(Debug, Clone)]
pub struct MimeOverrideTable {
    entries: &'static [(&'static str, &'static str)],
}

impl Default for MimeOverrideTable {
    fn default() -> Self {
        Self {
            entries: MIME_OVERRIDES,
        }
    }
}

impl MimeOverrideTable {
    pub fn lookup(&self, path: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(extension, _)| path.ends_with(extension))
            .map(|(_, mime)| *mime)
    }

    pub fn resolve(&self, path: &str) -> ContentType {
        let mut content_type = guess_baseline(path);
        if let Some(mime) = self.lookup(path) {
            content_type.mime = Cow::Borrowed(mime);
        }
        content_type
    }
}
