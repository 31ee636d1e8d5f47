//! # Connection Helpers
//!
//! Thin wrappers around `tokio::net::TcpStream` that apply the 2s network
//! timeout spec.md §5 requires uniformly to connect/read/write, and drive
//! [`FrameDecoder`] over a live socket. Kept separate from
//! `meshring_protocol::wire` because it owns actual I/O, which the
//! protocol crate deliberately stays free of.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;

use meshring_protocol::config::NETWORK_TIMEOUT;
use meshring_protocol::wire::{encode, FrameDecoder, FrameError, Message};

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "network timeout exceeded")
}

/// Connects to `addr` within [`NETWORK_TIMEOUT`].
pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<TcpStream> {
    timeout(NETWORK_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| timed_out())?
}

/// Writes one framed message within [`NETWORK_TIMEOUT`].
pub async fn send(stream: &mut TcpStream, msg: &Message) -> io::Result<()> {
    let bytes = encode(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    timeout(NETWORK_TIMEOUT, stream.write_all(&bytes))
        .await
        .map_err(|_| timed_out())??;
    Ok(())
}

/// Reads and decodes the next complete message from `stream`, retaining
/// any partial trailing fragment in `decoder` across calls. Returns `Ok(None)`
/// on a clean EOF before a full message arrived.
///
/// A [`FrameError::MessageTooLarge`] ends the read loop with an `Err` rather
/// than being logged and skipped — the decoder's buffered state is no longer
/// trustworthy once a frame has blown past the size ceiling, so the caller
/// must drop the connection instead of continuing to read from it.
pub async fn recv_one(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
) -> io::Result<Option<Message>> {
    let mut buf = [0u8; 4096];
    loop {
        let n = timeout(NETWORK_TIMEOUT, stream.read(&mut buf))
            .await
            .map_err(|_| timed_out())??;
        if n == 0 {
            return Ok(None);
        }
        // One `read` can surface several decoded lines at once (e.g. a
        // valid message immediately followed by an oversized one); a
        // MessageTooLarge anywhere in the batch must win over an earlier
        // Ok in the same batch; scan the whole batch before returning.
        let mut pending = None;
        for result in decoder.push(&buf[..n]) {
            match result {
                Ok(msg) => pending.get_or_insert(msg),
                Err(err @ FrameError::MessageTooLarge { .. }) => {
                    tracing::warn!(%err, "oversized frame, closing connection");
                    return Err(io::Error::new(io::ErrorKind::InvalidData, err));
                }
                Err(err) => {
                    tracing::warn!(%err, "frame error while reading");
                    continue;
                }
            };
        }
        if let Some(msg) = pending {
            return Ok(Some(msg));
        }
    }
}

/// Connects, sends one message, and reads exactly one reply. Used for the
/// simple request/response wire exchanges (vote solicitation, PING, peer
/// list requests).
pub async fn send_and_recv(addr: impl ToSocketAddrs, msg: &Message) -> io::Result<Option<Message>> {
    let mut stream = connect(addr).await?;
    send(&mut stream, msg).await?;
    let mut decoder = FrameDecoder::default();
    recv_one(&mut stream, &mut decoder).await
}

/// Connects and sends one message without waiting for a reply (best-effort
/// fire-and-forget, used for gossip forwarding and REMOVAL_NOTIFY
/// broadcast).
pub async fn send_only(addr: impl ToSocketAddrs, msg: &Message) -> io::Result<()> {
    let mut stream = connect(addr).await?;
    send(&mut stream, msg).await
}
