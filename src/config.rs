//! Configuration file and CLI assembly.
//!
//! A `Config` is loaded either from a JSON5 file or built up from CLI flags
//! for single-server mode.

use std::fmt;
use std::fs;
use std::io;
use std::net::SocketAddr;

use serde::Deserialize;

use crate::MAX_SERVER;

/// Which binary a config file is being loaded for. The server config shape
/// (a list of listeners, each with its own PSK) and the client shape (a pool
/// of upstream servers plus one local listener) share a file format, but
/// only one half is meaningful per binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    Local,
    Server,
}

/// One upstream (client) or listener (server) endpoint and its PSK.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    pub password: String,
}

fn default_server_port() -> u16 {
    crate::DEFAULT_SERVER_PORT
}

impl ServerConfig {
    pub fn basic(address: String, port: u16, password: String) -> ServerConfig {
        ServerConfig { address, port, password }
    }

    /// The PSK, truncated to 256 bytes before it is ever hashed.
    pub fn psk(&self) -> &[u8] {
        let bytes = self.password.as_bytes();
        &bytes[..bytes.len().min(256)]
    }
}

/// Client-side local SOCKS5 listener.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_addr")]
    pub address: String,
    #[serde(default = "default_local_port")]
    pub port: u16,
}

fn default_local_addr() -> String {
    crate::DEFAULT_LOCAL_ADDR.to_owned()
}

fn default_local_port() -> u16 {
    crate::DEFAULT_LOCAL_PORT
}

impl Default for LocalConfig {
    fn default() -> LocalConfig {
        LocalConfig {
            address: default_local_addr(),
            port: default_local_port(),
        }
    }
}

/// Top level configuration, as loaded from a JSON5 file or assembled from
/// CLI flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Vec<ServerConfig>,
    #[serde(default)]
    pub local: Option<LocalConfig>,
}

/// Errors surfaced while reading or validating a configuration.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Parse(String),
    TooManyServers(usize),
    MissingServer,
    MissingLocal,
    InvalidAddr(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{}", e),
            Error::Parse(msg) => write!(f, "failed to parse configuration: {}", msg),
            Error::TooManyServers(n) => write!(f, "{} servers configured, maximum is {}", n, MAX_SERVER),
            Error::MissingServer => write!(f, "no upstream server configured"),
            Error::MissingLocal => write!(f, "no local listener configured"),
            Error::InvalidAddr(addr) => write!(f, "invalid address: {}", addr),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<json5::Error> for Error {
    fn from(e: json5::Error) -> Error {
        Error::Parse(e.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other.to_string()),
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    /// Parses a JSON5 config file. Populates up to `MAX_SERVER` upstream
    /// entries.
    pub fn load_from_file(path: &str, config_type: ConfigType) -> Result<Config, Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = json5::from_str(&content)?;

        if config.server.len() > MAX_SERVER {
            return Err(Error::TooManyServers(config.server.len()));
        }
        if config.server.is_empty() {
            return Err(Error::MissingServer);
        }

        // A server config file configures one or more listeners and has no
        // use for a client-side SOCKS5 front end; a `local` section there
        // almost always means the wrong file was handed to the wrong binary.
        if config_type == ConfigType::Server && config.local.is_some() {
            return Err(Error::Parse("a server config file must not contain a `local` section".to_owned()));
        }

        Ok(config)
    }

    pub fn local_or_default(&self) -> LocalConfig {
        self.local.clone().unwrap_or_default()
    }
}

/// Resolves a `host:port`-shaped pair into a `SocketAddr`, used both for the
/// client's pre-resolved upstream list and the server's listener addresses.
pub fn resolve_socket_addr(host: &str, port: u16) -> Result<SocketAddr, Error> {
    use std::net::ToSocketAddrs;

    (host, port)
        .to_socket_addrs()
        .map_err(|_| Error::InvalidAddr(format!("{}:{}", host, port)))?
        .next()
        .ok_or_else(|| Error::InvalidAddr(format!("{}:{}", host, port)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psk_truncated_to_256_bytes() {
        let long = "x".repeat(300);
        let sc = ServerConfig::basic("example.com".to_owned(), 1205, long);
        assert_eq!(sc.psk().len(), 256);
    }

    #[test]
    fn psk_shorter_than_256_is_untouched() {
        let sc = ServerConfig::basic("example.com".to_owned(), 1205, "short-key".to_owned());
        assert_eq!(sc.psk(), b"short-key");
    }

    #[test]
    fn local_defaults_are_loopback_1080() {
        let local = LocalConfig::default();
        assert_eq!(local.address, "127.0.0.1");
        assert_eq!(local.port, 1080);
    }
}
