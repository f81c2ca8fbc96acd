//! Shared, write-once-at-startup state: the upstream server pool (client)
//! or listener/PSK table (server), built once and then read-only for the
//! life of the process.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{resolve_socket_addr, Config};

/// One upstream server the client may dial, pre-resolved at startup.
#[derive(Debug, Clone)]
pub struct UpstreamServer {
    pub addr: SocketAddr,
    pub psk: Vec<u8>,
}

/// One server-side listener and the PSK that authenticates connections
/// accepted on it.
#[derive(Debug, Clone)]
pub struct Listener {
    pub addr: SocketAddr,
    pub psk: Vec<u8>,
}

/// Immutable, process-lifetime context. One instance is built at startup and
/// shared read-only (via `SharedContext`) by every connection task.
#[derive(Debug)]
pub enum Context {
    Client {
        servers: Vec<UpstreamServer>,
        local_addr: SocketAddr,
    },
    Server {
        listeners: Vec<Listener>,
    },
}

pub type SharedContext = Arc<Context>;

impl Context {
    pub fn new_client(config: Config) -> io::Result<Context> {
        if config.server.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "no upstream server configured"));
        }

        let mut servers = Vec::with_capacity(config.server.len());
        for sc in &config.server {
            let addr = resolve_socket_addr(&sc.address, sc.port)?;
            servers.push(UpstreamServer {
                addr,
                psk: sc.psk().to_vec(),
            });
        }

        let local = config.local_or_default();
        let local_addr = resolve_socket_addr(&local.address, local.port)?;

        Ok(Context::Client { servers, local_addr })
    }

    pub fn new_server(config: Config) -> io::Result<Context> {
        if config.server.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "no listener configured"));
        }

        let mut listeners = Vec::with_capacity(config.server.len());
        for sc in &config.server {
            let addr = resolve_socket_addr(&sc.address, sc.port)?;
            listeners.push(Listener {
                addr,
                psk: sc.psk().to_vec(),
            });
        }

        Ok(Context::Server { listeners })
    }

    pub fn servers(&self) -> &[UpstreamServer] {
        match self {
            Context::Client { servers, .. } => servers,
            Context::Server { .. } => &[],
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Context::Client { local_addr, .. } => Some(*local_addr),
            Context::Server { .. } => None,
        }
    }

    pub fn listeners(&self) -> &[Listener] {
        match self {
            Context::Server { listeners } => listeners,
            Context::Client { .. } => &[],
        }
    }
}
