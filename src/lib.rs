// The MIT License (MIT)

// Copyright (c) 2014 Y. T. CHUNG <zonyitoo@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! `iosocks` is an encrypted TCP tunneling proxy: a local client that speaks
//! SOCKS5 to applications, and a remote server that terminates the tunnel and
//! dials the requested destination. See the crate's two binaries, `isocks`
//! and `osocks`.

#[macro_use]
extern crate log;

pub mod config;
pub mod context;
pub mod crypto;
pub mod monitor;
pub mod relay;

pub use config::{Config, ConfigType, LocalConfig, ServerConfig};
pub use context::{Context, SharedContext};

/// Crate version, reported by both binaries' `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default inner-protocol port.
pub const DEFAULT_SERVER_PORT: u16 = 1205;

/// Default client-side SOCKS5 listen port.
pub const DEFAULT_LOCAL_PORT: u16 = 1080;

/// Default client-side SOCKS5 bind address.
pub const DEFAULT_LOCAL_ADDR: &str = "127.0.0.1";

/// Default server-side bind address.
pub const DEFAULT_SERVER_BIND_ADDR: &str = "0.0.0.0";

/// Maximum number of upstream servers a client config may list.
pub const MAX_SERVER: usize = 64;

/// Caps concurrent connections per listener, enforced at `accept` via a
/// semaphore.
pub const MAX_CONNECTIONS: usize = 1024;

/// Runs the client (`isocks`) until a shutdown signal is received.
pub async fn run_client(config: Config) -> std::io::Result<()> {
    relay::local::run(SharedContext::new(Context::new_client(config)?)).await
}

/// Runs the server (`osocks`) until a shutdown signal is received.
pub async fn run_server(config: Config) -> std::io::Result<()> {
    relay::server::run(SharedContext::new(Context::new_server(config)?)).await
}
