use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;

const SOLO: Token = Token(0);

/// How long a single write may wait for the socket to drain.
const WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// A client socket that has been checked out of the event loop.
///
/// Once a request head is framed the listener deregisters the socket and
/// hands it over here; from then on only the request's responder and the
/// continue handshake touch it. Every wait on the socket goes through a
/// private single-socket `Poll`, so the event loop's selector never sees it
/// again.
pub struct Connection {
    stream: Mutex<Option<TcpStream>>,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
            peer,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.stream.lock().is_none()
    }

    /// Writes every byte, waiting on writable readiness when the socket
    /// pushes back.
    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut guard = self.stream.lock();
        let stream = guard.as_mut().ok_or_else(closed)?;
        write_fully(stream, buf)
    }

    /// Writes `buf` as the last bytes this connection will ever carry, then
    /// shuts it down. The socket is released under the lock before writing,
    /// so no other write can follow it onto the wire.
    pub fn write_and_close(&self, buf: &[u8]) -> io::Result<()> {
        let mut stream = self.stream.lock().take().ok_or_else(closed)?;
        let written = write_fully(&mut stream, buf);
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            tracing::debug!(peer = %self.peer, error = %e, "Shutdown failed");
        }
        written
    }

    /// Reads whatever the peer sends until it closes the stream, goes quiet
    /// for a whole `interval`, or more than `limit` bytes have arrived.
    pub fn drain(&self, interval: Duration, limit: usize) -> io::Result<Vec<u8>> {
        let mut guard = self.stream.lock();
        let stream = guard.as_mut().ok_or_else(closed)?;

        let mut poll = Poll::new()?;
        poll.registry().register(stream, SOLO, Interest::READABLE)?;

        let result = drain_registered(&mut poll, stream, interval, limit);

        // Best effort: the socket is about to be written to or closed anyway.
        let _ = poll.registry().deregister(stream);
        result
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection closed")
}

fn write_fully(stream: &mut TcpStream, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed while writing",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if !wait_ready(stream, Interest::WRITABLE, WRITE_STALL_TIMEOUT)? {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "write stalled"));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    stream.flush()
}

fn drain_registered(
    poll: &mut Poll,
    stream: &mut TcpStream,
    interval: Duration,
    limit: usize,
) -> io::Result<Vec<u8>> {
    let mut events = Events::with_capacity(4);
    let mut body = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        match poll.poll(&mut events, Some(interval)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }

        if events.is_empty() {
            // Quiet for a full interval: the client has nothing more to say.
            return Ok(body);
        }

        // Edge-triggered: keep reading until the kernel buffer is empty.
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(body),
                Ok(n) => {
                    body.extend_from_slice(&chunk[..n]);
                    if body.len() > limit {
                        return Ok(body);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Blocks until `stream` reports `interest` or `timeout` passes.
fn wait_ready(stream: &mut TcpStream, interest: Interest, timeout: Duration) -> io::Result<bool> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(1);
    poll.registry().register(stream, SOLO, interest)?;

    let outcome = loop {
        match poll.poll(&mut events, Some(timeout)) {
            Ok(()) => break Ok(!events.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };

    let _ = poll.registry().deregister(stream);
    outcome
}
