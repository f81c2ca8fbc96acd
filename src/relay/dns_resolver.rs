//! Asynchronous name resolution (server only).
//!
//! Resolution is simply another `.await` inside the connection's own task,
//! so there is no separate completion context that needs to be marshaled
//! back onto the event loop before the connection's state can be touched
//! again — that's satisfied structurally by running on the same task.

use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpStream;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

fn resolver_err(e: trust_dns_resolver::error::ResolveError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

/// Builds a resolver using the system's configured nameservers, falling back
/// to a sane default if none can be read (e.g. in a container without
/// `/etc/resolv.conf`).
pub async fn build_resolver() -> io::Result<TokioAsyncResolver> {
    match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(resolver) => Ok(resolver),
        Err(_) => TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()).map_err(resolver_err),
    }
}

/// Resolves `host` to its candidate addresses. A literal IP is returned
/// as-is without a DNS round trip.
pub async fn resolve_host(resolver: &TokioAsyncResolver, host: &str) -> io::Result<Vec<IpAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let lookup = resolver.lookup_ip(host).await.map_err(resolver_err)?;
    let addrs: Vec<IpAddr> = lookup.iter().collect();

    if addrs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, format!("no addresses found for {}", host)));
    }

    Ok(addrs)
}

/// Tries each candidate address in order, dialing the first that accepts a
/// connection.
pub async fn connect_any(candidates: &[IpAddr], port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;

    for ip in candidates {
        let addr = SocketAddr::new(*ip, port);
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("dial attempt to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no candidate addresses to dial")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_ip_skips_lookup() {
        let resolver = build_resolver().await.unwrap();
        let addrs = resolve_host(&resolver, "127.0.0.1").await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn connect_any_tries_candidates_in_order() {
        // First candidate (port 1) is unroutable/refused, second is a real
        // listener; connect_any must fall through to it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let good_port = listener.local_addr().unwrap().port();

        let accept_task = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let candidates = vec!["127.0.0.1".parse().unwrap()];
        let stream = connect_any(&candidates, good_port).await;
        assert!(stream.is_ok());
        accept_task.await.unwrap();
    }
}
