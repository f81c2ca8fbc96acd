//! Server (`osocks`) per-connection state machine and listener loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use trust_dns_resolver::TokioAsyncResolver;

use crate::context::{Listener, SharedContext};
use crate::crypto::{self, CipherState};
use crate::relay::state::ServerState;
use crate::relay::{dns_resolver, pipe, wire};

/// See `relay::local::HANDSHAKE_TIMEOUT` for the rationale.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const CLOSE_WAIT_LINGER: Duration = Duration::from_secs(1);

/// Runs every configured listener concurrently until a shutdown signal
/// arrives.
pub async fn run(ctx: SharedContext) -> io::Result<()> {
    let listeners = ctx.listeners();
    if listeners.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no listener configured"));
    }

    let resolver = dns_resolver::build_resolver().await?;

    let mut tasks = Vec::with_capacity(listeners.len());
    for listener_cfg in listeners {
        let listener_cfg = listener_cfg.clone();
        let resolver = resolver.clone();
        tasks.push(tokio::spawn(run_listener(listener_cfg, resolver)));
    }

    let mut shutdown = Box::pin(crate::monitor::wait_for_shutdown());
    tokio::select! {
        _ = &mut shutdown => {
            info!("osocks shutting down");
        }
        _ = futures::future::select_all(tasks) => {
            warn!("a listener task exited unexpectedly");
        }
    }

    Ok(())
}

async fn run_listener(listener_cfg: Listener, resolver: TokioAsyncResolver) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listener_cfg.addr).await?;
    info!("osocks listening on {}", listener_cfg.addr);

    let permits = Arc::new(Semaphore::new(crate::MAX_CONNECTIONS));

    loop {
        let (stream, peer) = listener.accept().await?;
        let psk = listener_cfg.psk.clone();
        let resolver = resolver.clone();
        let permits = permits.clone();
        permits.acquire().await.forget();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, psk, resolver).await {
                debug!("connection from {} ended: {}", peer, e);
            }
            permits.add_permits(1);
        });
    }
}

async fn handle_connection(mut local: TcpStream, psk: Vec<u8>, resolver: TokioAsyncResolver) -> io::Result<()> {
    local.set_nodelay(true).ok();

    // Accumulate the full 512-byte request; it may arrive across several
    // reads, so buffer until it's complete rather than requiring it in one.
    let mut request = [0u8; wire::REQUEST_LEN];
    if with_timeout(local.read_exact(&mut request), "inner request").await.is_err() {
        return Ok(());
    }

    let mut header: [u8; wire::HEADER_LEN] = [0u8; wire::HEADER_LEN];
    header.copy_from_slice(&request[..wire::HEADER_LEN]);
    let iv = &request[wire::HEADER_LEN..];

    let key = crypto::derive_key(iv, &psk);
    let (mut encryptor, mut decryptor) = CipherState::new(&key)?.into_halves();

    decryptor.apply(&mut header)?;

    let (host, port) = match wire::decode_header(&header) {
        Ok(parsed) => parsed,
        Err(_) => return req_err(local, &mut encryptor).await,
    };
    trace!("{:?} host={} port={}", ServerState::ReqRcvd, host, port);

    // Asynchronous resolution, then dial every candidate in order.
    let remote = match with_timeout(dns_resolver::resolve_host(&resolver, &host), "dns resolution").await {
        Ok(candidates) => match with_timeout(dns_resolver::connect_any(&candidates, port), "dial").await {
            Ok(stream) => stream,
            Err(_) => return req_err(local, &mut encryptor).await,
        },
        Err(_) => return req_err(local, &mut encryptor).await,
    };
    trace!("{:?}", ServerState::Connected);

    // Encrypted success reply, then full-duplex relay.
    let mut reply = wire::success_reply();
    encryptor.apply(&mut reply)?;
    local.write_all(&reply).await?;
    info!("proxied connection to {}:{}", host, port);
    trace!("{:?}", ServerState::Estab);

    let (local_r, local_w) = tokio::io::split(local);
    let (remote_r, remote_w) = tokio::io::split(remote);

    pipe::relay(
        local_r,
        local_w,
        remote_r,
        remote_w,
        move |buf: &mut [u8]| decryptor.apply(buf),
        move |buf: &mut [u8]| encryptor.apply(buf),
    )
    .await?;

    Ok(())
}

/// Sends the encrypted all-zero failure reply, then lingers before closing.
async fn req_err(mut local: TcpStream, encryptor: &mut crypto::stream::Encryptor) -> io::Result<()> {
    let mut reply = wire::failure_reply();
    let _ = encryptor.apply(&mut reply);
    let _ = local.write_all(&reply).await;
    trace!("{:?}", ServerState::CloseWait);
    tokio::time::sleep(CLOSE_WAIT_LINGER).await;
    let _ = local.shutdown().await;
    Ok(())
}

async fn with_timeout<T>(fut: impl std::future::Future<Output = io::Result<T>>, what: &str) -> io::Result<T> {
    match timeout(HANDSHAKE_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, format!("{} timed out", what))),
    }
}
