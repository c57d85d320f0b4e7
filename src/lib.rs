pub mod error;
pub mod logger;
pub mod server;
pub mod signal;

pub use error::ServerError;
pub use server::HttpServer;
pub use server::config::{ConfigError, ServerConfig};
