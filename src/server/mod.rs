pub mod config;
pub mod handler;
pub mod headers;
pub mod http_status;
pub mod mime;
pub mod request;
pub mod stream;

use log::{debug, error, info};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::ServerError;
use config::ServerConfig;
use handler::StaticHandler;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A bound listener plus the handler that answers each connection.
///
/// Connections are served one at a time on the calling thread.
pub struct HttpServer {
    listener: TcpListener,
    handler: StaticHandler,
}

impl HttpServer {
    /// Resolves the root directory, then binds. The directory is checked
    /// first so a bad path never leaves a socket open.
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let root = config
            .directory
            .canonicalize()
            .map_err(|source| ServerError::Directory {
                path: config.directory.clone(),
                source,
            })?;
        if !root.is_dir() {
            return Err(ServerError::Directory {
                path: config.directory.clone(),
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr).map_err(|source| {
            if source.kind() == io::ErrorKind::AddrInUse {
                ServerError::AddrInUse { port: config.port }
            } else {
                ServerError::Bind { addr: addr.clone(), source }
            }
        })?;
        listener.set_nonblocking(true)?;

        info!("Server bound on {}, serving {:?}", addr, root);

        Ok(Self {
            listener,
            handler: StaticHandler::new(root),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn root(&self) -> &Path {
        self.handler.root()
    }

    /// Accepts and serves connections until `stop` is set, then releases the
    /// listener. A connection stalled on its client is abandoned once `stop`
    /// is set.
    pub fn run(self, stop: &AtomicBool) {
        let mut served: u64 = 0;

        while !stop.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    if let Err(e) = stream.set_nonblocking(false) {
                        error!("Failed to set blocking mode for {}: {}", addr, e);
                        continue;
                    }

                    if let Err(e) = self.handler.handle_client(&stream, stop) {
                        error!("Error serving {}: {}", addr, e);
                    }
                    served += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("Stopping after {} connections", served);
        drop(self.listener);
    }
}
