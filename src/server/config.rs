use clap::Parser;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DIRECTORY: &str = ".";
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Development static file server with corrected MIME types and no-cache headers.
///
/// Also accepts the legacy positional form `dev-server [PORT] [DIRECTORY] [HOST]`.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Port to listen on (0 picks a free port)
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory to serve files from
    #[arg(short, long, default_value = DEFAULT_DIRECTORY)]
    pub directory: PathBuf,

    /// Address to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            host: DEFAULT_HOST.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort(String),
    TooManyArguments(usize),
    Usage(clap::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort(value) => {
                write!(f, "invalid port '{}': expected an integer in 0-65535", value)
            }
            ConfigError::TooManyArguments(count) => write!(
                f,
                "expected at most 3 positional arguments (port, directory, host), got {}",
                count
            ),
            ConfigError::Usage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Usage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<clap::Error> for ConfigError {
    fn from(err: clap::Error) -> Self {
        ConfigError::Usage(err)
    }
}

impl ServerConfig {
    /// Resolves the configuration from a full argv (program name first).
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

        match args.get(1) {
            Some(first) if !first.to_string_lossy().starts_with('-') => {
                Self::from_positional(&args[1..])
            }
            _ => Ok(Self::try_parse_from(args)?),
        }
    }

    fn from_positional(values: &[OsString]) -> Result<Self, ConfigError> {
        if values.len() > 3 {
            return Err(ConfigError::TooManyArguments(values.len()));
        }

        let mut config = Self::default();

        if let Some(port) = values.first() {
            config.port = parse_port(&port.to_string_lossy())?;
        }
        if let Some(directory) = values.get(1) {
            config.directory = PathBuf::from(directory);
        }
        if let Some(host) = values.get(2) {
            config.host = host.to_string_lossy().into_owned();
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(value.to_string()))
}
