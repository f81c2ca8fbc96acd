//! The relay engine: one directed, encrypted byte pipe from a source half
//! to a sink half, with a half-duplex backpressure invariant — the source
//! is only ever read further once everything already read has been fully
//! drained to the sink.
//!
//! Two directions (local→remote, remote→local) are driven concurrently by
//! `relay::pipe::relay` to form one connection's full-duplex tunnel.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the buffer used for each direction of the relay.
pub const BUF_SIZE: usize = 8192;

/// Transforms a buffer of bytes exactly once as they pass through a
/// direction: every byte is encrypted once as it leaves, and decrypted once
/// as it arrives.
pub trait Transform: Send {
    fn apply(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

impl<F> Transform for F
where
    F: FnMut(&mut [u8]) -> io::Result<()> + Send,
{
    fn apply(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self(buf)
    }
}

/// Drives one direction of the tunnel until EOF or error.
///
/// A read fills the buffer, then the buffer is drained to the sink; offset
/// advances across partial writes without a further read being issued (the
/// "reader disarmed, writer armed" half of the interlock) until the buffer
/// is fully flushed, at which point the next read is issued (the interlock
/// flips back). Under `async`/`await`, a would-block write is simply the
/// suspension point at each `.await`; the explicit offset/remaining
/// bookkeeping below is kept regardless, because it is what makes
/// partial-write resumption correct independent of how the runtime happens
/// to schedule wakeups.
pub async fn relay_direction<R, W, T>(mut reader: R, mut writer: W, mut transform: T) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    T: Transform,
{
    let mut buf = BytesMut::with_capacity(BUF_SIZE);
    buf.resize(BUF_SIZE, 0);
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            let _ = writer.shutdown().await;
            return Ok(total);
        }

        transform.apply(&mut buf[..n])?;

        let mut offset = 0usize;
        let mut remaining = n;
        while remaining > 0 {
            let written = writer.write(&buf[offset..offset + remaining]).await?;
            if written == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "sink accepted zero bytes"));
            }
            offset += written;
            remaining -= written;
        }

        total += n as u64;
    }
}

/// Runs both directions of a tunnel to completion. Returns as soon as either
/// direction ends (cleanly or with an error) — a peer closing one direction
/// tears down the whole connection.
pub async fn relay<LR, LW, RR, RW, TUp, TDown>(
    local_r: LR,
    local_w: LW,
    remote_r: RR,
    remote_w: RW,
    upstream: TUp,
    downstream: TDown,
) -> io::Result<(u64, u64)>
where
    LR: AsyncRead + Unpin,
    LW: AsyncWrite + Unpin,
    RR: AsyncRead + Unpin,
    RW: AsyncWrite + Unpin,
    TUp: Transform,
    TDown: Transform,
{
    let up = relay_direction(local_r, remote_w, upstream);
    let down = relay_direction(remote_r, local_w, downstream);

    tokio::select! {
        res = up => {
            let up_bytes = res?;
            Ok((up_bytes, 0))
        }
        res = down => {
            let down_bytes = res?;
            Ok((0, down_bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// An `AsyncWrite` that only ever accepts `chunk` bytes per call, as if
    /// the kernel send buffer were nearly full and every `send` returned
    /// fewer bytes than requested.
    struct ChunkedWriter {
        chunk: usize,
        received: Vec<u8>,
    }

    impl AsyncWrite for ChunkedWriter {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            let n = buf.len().min(this.chunk);
            this.received.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Feeds `data` out a bounded chunk (the reader's capacity) at a time,
    /// then reports EOF — simulating a TCP stream whose bytes arrive over
    /// several reads rather than landing in the caller's buffer all at once.
    struct OnceReader {
        data: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for OnceReader {
        fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let remaining = this.data.len() - this.pos;
            let n = remaining.min(buf.remaining());
            buf.put_slice(&this.data[this.pos..this.pos + n]);
            this.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn partial_writes_eventually_drain_the_whole_buffer() {
        let payload = vec![0xABu8; 10 * BUF_SIZE + 37];
        let reader = OnceReader { data: payload.clone(), pos: 0 };
        // accepts only 5 bytes per poll_write call — way smaller than the buffer.
        let mut writer = ChunkedWriter { chunk: 5, received: Vec::new() };

        // relay_direction loops reading until EOF; our OnceReader only
        // yields data once then returns Ok(()) with an empty fill (EOF).
        let total = relay_direction(reader, &mut writer, |_: &mut [u8]| Ok(())).await.unwrap();

        assert_eq!(total, payload.len() as u64);
        assert_eq!(writer.received, payload);
    }

    #[tokio::test]
    async fn transform_is_applied_exactly_once_per_byte() {
        let payload = b"hello, world".to_vec();
        let reader = OnceReader { data: payload.clone(), pos: 0 };
        let mut writer = ChunkedWriter { chunk: 1024, received: Vec::new() };

        relay_direction(reader, &mut writer, |buf: &mut [u8]| {
            for b in buf.iter_mut() {
                *b ^= 0xff;
            }
            Ok(())
        })
        .await
        .unwrap();

        let expected: Vec<u8> = payload.iter().map(|b| b ^ 0xff).collect();
        assert_eq!(writer.received, expected);
    }
}
