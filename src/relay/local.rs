//! Client (`isocks`) per-connection state machine and listener loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::context::SharedContext;
use crate::crypto::{self, CipherState};
use crate::relay::state::ClientState;
use crate::relay::{loadbalancing, pipe, socks5, wire};

/// Guards the handshake phases only: a wedged peer during negotiation or
/// dialing should not pin a task forever, but once the tunnel is
/// established, peer EOF/RST is the only teardown signal.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// The close-wait linger: give the application a final second to read an
/// error reply before the socket closes.
const CLOSE_WAIT_LINGER: Duration = Duration::from_secs(1);

/// Listens for SOCKS5 connections and spawns one task per accepted
/// connection, until a shutdown signal arrives.
pub async fn run(ctx: SharedContext) -> io::Result<()> {
    let bind_addr = ctx.local_addr().expect("client context always carries a local bind address");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("isocks listening on {}", bind_addr);

    let permits = Arc::new(Semaphore::new(crate::MAX_CONNECTIONS));
    let mut shutdown = Box::pin(crate::monitor::wait_for_shutdown());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let ctx = ctx.clone();
                let permits = permits.clone();
                permits.acquire().await.forget();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, ctx).await {
                        debug!("connection from {} ended: {}", peer, e);
                    }
                    permits.add_permits(1);
                });
            }
            _ = &mut shutdown => {
                info!("isocks shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(mut local: TcpStream, ctx: SharedContext) -> io::Result<()> {
    local.set_nodelay(true).ok();

    // Negotiate the SOCKS5 greeting.
    let accepted = with_timeout(socks5::read_greeting(&mut local), "greeting").await?;
    trace!("{:?}", ClientState::Closed);

    if !accepted {
        let _ = socks5::write_method_reply(&mut local, false).await;
        return close_wait(local).await;
    }
    socks5::write_method_reply(&mut local, true).await?;
    trace!("{:?}", ClientState::NegoSent);

    // Read the CONNECT request and pick an upstream to dial.
    let request = with_timeout(socks5::read_request(&mut local), "request").await?;
    let address = match request {
        socks5::Request::Connect(addr) => addr,
        socks5::Request::Unsupported(rep) => {
            let _ = socks5::write_reply(&mut local, rep).await;
            return close_wait(local).await;
        }
    };

    let server = loadbalancing::pick_server(ctx.servers()).clone();

    // Build the encrypted inner request: a fresh IV drawn from the
    // platform CSPRNG for every connection.
    let mut iv = [0u8; wire::IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let key = crypto::derive_key(&iv, &server.psk);
    let (mut encryptor, mut decryptor) = CipherState::new(&key)?.into_halves();

    let mut header = wire::encode_header(&address.host(), address.port());
    encryptor.apply(&mut header)?;

    let mut frame = Vec::with_capacity(wire::REQUEST_LEN);
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&iv);

    // Dial the upstream iosocks server.
    let mut remote = match timeout(HANDSHAKE_TIMEOUT, TcpStream::connect(server.addr)).await {
        Ok(Ok(stream)) => stream,
        _ => {
            let _ = socks5::write_reply(&mut local, socks5::REP_CONNECTION_REFUSED).await;
            return close_wait(local).await;
        }
    };
    remote.set_nodelay(true).ok();
    trace!("{:?}", ClientState::CmdRcvd);

    // Send the 512-byte inner request.
    if with_timeout(remote.write_all(&frame), "inner request").await.is_err() {
        let _ = socks5::write_reply(&mut local, socks5::REP_CONNECTION_REFUSED).await;
        return close_wait(local).await;
    }
    trace!("{:?}", ClientState::Connected);

    // Read the 4-byte reply, tolerating it arriving in more than one read,
    // decrypt it, and check the magic.
    trace!("{:?}", ClientState::ReqSent);
    let mut reply = [0u8; wire::REPLY_LEN];
    if with_timeout(remote.read_exact(&mut reply), "inner reply").await.is_err() {
        let _ = socks5::write_reply(&mut local, socks5::REP_GENERAL_FAILURE).await;
        return close_wait(local).await;
    }
    decryptor.apply(&mut reply)?;

    if !wire::reply_is_success(&reply) {
        let _ = socks5::write_reply(&mut local, socks5::REP_CONNECTION_REFUSED).await;
        return close_wait(local).await;
    }
    trace!("{:?}", ClientState::RepRcvd);

    // Tell the application the tunnel is up, then relay.
    socks5::write_reply(&mut local, socks5::REP_SUCCESS).await?;
    info!("CONNECT {} via {}", address, server.addr);
    trace!("{:?}", ClientState::Estab);

    let (local_r, local_w) = tokio::io::split(local);
    let (remote_r, remote_w) = tokio::io::split(remote);

    pipe::relay(
        local_r,
        local_w,
        remote_r,
        remote_w,
        move |buf: &mut [u8]| encryptor.apply(buf),
        move |buf: &mut [u8]| decryptor.apply(buf),
    )
    .await?;

    Ok(())
}

async fn with_timeout<T>(fut: impl std::future::Future<Output = io::Result<T>>, what: &str) -> io::Result<T> {
    match timeout(HANDSHAKE_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, format!("{} timed out", what))),
    }
}

/// Linger for 1 second so a just-sent reply has a chance to reach the
/// application, then drop the socket.
async fn close_wait(mut local: TcpStream) -> io::Result<()> {
    tokio::time::sleep(CLOSE_WAIT_LINGER).await;
    let _ = local.shutdown().await;
    Ok(())
}
