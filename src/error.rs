use std::fmt;
use std::io;
use std::path::PathBuf;

/// Startup failures. Per-request problems never reach this type; they are
/// answered with an HTTP error status instead.
#[derive(Debug)]
pub enum ServerError {
    Directory { path: PathBuf, source: io::Error },
    AddrInUse { port: u16 },
    Bind { addr: String, source: io::Error },
    Io(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Directory { path, source } => {
                write!(f, "cannot serve directory '{}': {}", path.display(), source)
            }
            ServerError::AddrInUse { port } => {
                write!(f, "Port {} is already in use. Try a different port.", port)
            }
            ServerError::Bind { addr, source } => write!(f, "cannot bind {}: {}", addr, source),
            ServerError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Directory { source, .. } | ServerError::Bind { source, .. } => Some(source),
            ServerError::Io(err) => Some(err),
            ServerError::AddrInUse { .. } => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        ServerError::Io(err)
    }
}
