//! The readiness-driven accept/read loop.
//!
//! One thread owns the listening socket and every connection whose request
//! head has not been framed yet. As soon as a request is complete the socket
//! is deregistered and checked out into a [`Connection`]; from then on the
//! loop never reads it again, and the dispatcher's workers own it until the
//! terminal response closes it.

use std::collections::HashMap;
use std::io::{self, Read};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use bytes::BytesMut;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::http::connection::Connection;
use crate::http::parser::{MAX_HEAD_BYTES, ParseError, RequestHead, parse_head};
use crate::http::status::StatusCode;
use crate::http::writer::ResponseWriter;
use crate::server::dispatcher::Dispatcher;
use crate::server::registry::Registry;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;

/// A socket still owned by the loop, accumulating its request head.
struct PendingConnection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
}

/// What to do with a pending connection after a read.
enum Framing {
    NeedMore,
    Complete(RequestHead),
    Reject(ParseError),
    Abandon,
}

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "Failed to wake event loop for shutdown");
        }
    }
}

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    pending: HashMap<Token, PendingConnection>,
    next_token: usize,
    read_chunk: usize,
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Binds the listening socket. This is the only fatal failure.
    pub fn bind(
        cfg: &ServerConfig,
        registry: Registry,
        dispatcher: Dispatcher,
    ) -> anyhow::Result<Self> {
        let addr = cfg
            .listen_addr
            .to_socket_addrs()
            .with_context(|| format!("Invalid listen address {}", cfg.listen_addr))?
            .next()
            .with_context(|| format!("Listen address {} did not resolve", cfg.listen_addr))?;

        let mut listener =
            TcpListener::bind(addr).with_context(|| format!("Failed to bind {addr}"))?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            poll,
            listener,
            registry: Arc::new(registry),
            dispatcher,
            pending: HashMap::new(),
            next_token: FIRST_CONNECTION,
            read_chunk: cfg.read_chunk.max(1),
            waker,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Binds and runs until shut down.
    pub fn start(
        cfg: &ServerConfig,
        registry: Registry,
        dispatcher: Dispatcher,
    ) -> anyhow::Result<()> {
        Self::bind(cfg, registry, dispatcher)?.run()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: self.waker.clone(),
            requested: self.shutdown.clone(),
        }
    }

    /// Runs the loop on the calling thread.
    pub fn run(mut self) -> anyhow::Result<()> {
        let mut events = Events::with_capacity(256);

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e).context("Event loop poll failed");
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_all(),
                    WAKER => {
                        if self.shutdown.load(Ordering::Acquire) {
                            info!(pending = self.pending.len(), "Event loop shutting down");
                            return Ok(());
                        }
                    }
                    token => self.service(token),
                }
            }
        }
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = self.allocate_token();
                    if let Err(e) = self
                        .poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!(%peer, error = %e, "Failed to register connection");
                        continue;
                    }
                    debug!(%peer, token = token.0, "Accepted connection");
                    self.pending.insert(
                        token,
                        PendingConnection {
                            stream,
                            peer,
                            buffer: BytesMut::with_capacity(self.read_chunk),
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    return;
                }
            }
        }
    }

    fn allocate_token(&mut self) -> Token {
        loop {
            let token = Token(self.next_token);
            self.next_token = self.next_token.checked_add(1).unwrap_or(FIRST_CONNECTION);
            if !self.pending.contains_key(&token) {
                return token;
            }
        }
    }

    fn service(&mut self, token: Token) {
        let read_chunk = self.read_chunk;
        let max_body = self.dispatcher.policy().max_body_bytes;

        let Some(conn) = self.pending.get_mut(&token) else {
            return;
        };

        let read_limit = MAX_HEAD_BYTES.saturating_add(max_body);
        let framing = match read_available(conn, read_chunk, read_limit) {
            Ok(eof) => frame(conn, eof, max_body),
            Err(e) => {
                debug!(peer = %conn.peer, error = %e, "Read failed");
                Framing::Abandon
            }
        };

        match framing {
            Framing::NeedMore => {}
            Framing::Abandon => {
                if let Some(mut conn) = self.pending.remove(&token) {
                    let _ = self.poll.registry().deregister(&mut conn.stream);
                    debug!(peer = %conn.peer, "Connection closed before a complete request");
                }
            }
            Framing::Reject(err) => {
                if let Some((connection, _)) = self.checkout(token) {
                    let status = err.status().unwrap_or(StatusCode::BAD_REQUEST);
                    debug!(peer = %connection.peer_addr(), ?err, "Rejecting request head");
                    ResponseWriter::new(connection).send(status, err.message());
                }
            }
            Framing::Complete(head) => self.route(token, head),
        }
    }

    fn route(&mut self, token: Token, head: RequestHead) {
        let Some((connection, buffer)) = self.checkout(token) else {
            return;
        };

        let body_end = match head.content_length() {
            Some(len) => buffer.len().min(head.head_len + len),
            None => buffer.len(),
        };
        let body = &buffer[head.head_len.min(body_end)..body_end];

        let peer = connection.peer_addr();
        let writer = Arc::new(ResponseWriter::new(connection.clone()));
        let request = head.into_request(body, Some(connection));

        info!(
            %peer,
            method = %request.method,
            path = %request.path,
            "Request received"
        );

        match self.registry.lookup(request.method, request.route_path()) {
            Some(handler) => {
                // Outcome is logged by the supervisor; nobody waits on it here.
                drop(self.dispatcher.dispatch(handler, request, writer));
            }
            None => {
                writer.send(StatusCode::NOT_FOUND, "Not Found");
            }
        }
    }

    /// Moves a pending socket out of the loop's ownership.
    fn checkout(&mut self, token: Token) -> Option<(Arc<Connection>, BytesMut)> {
        let mut pending = self.pending.remove(&token)?;
        if let Err(e) = self.poll.registry().deregister(&mut pending.stream) {
            warn!(peer = %pending.peer, error = %e, "Failed to deregister connection");
        }
        Some((
            Arc::new(Connection::new(pending.stream, pending.peer)),
            pending.buffer,
        ))
    }
}

/// Reads chunks until the socket would block or the buffer holds more than
/// `limit` bytes. Returns whether the peer closed its side.
///
/// Past `limit` framing always reaches a verdict (head too large or body
/// over the cap), so stopping early never strands an edge-triggered socket.
fn read_available(
    conn: &mut PendingConnection,
    chunk_size: usize,
    limit: usize,
) -> io::Result<bool> {
    let mut chunk = vec![0u8; chunk_size];
    while conn.buffer.len() <= limit {
        match conn.stream.read(&mut chunk) {
            Ok(0) => return Ok(true),
            Ok(n) => conn.buffer.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    debug!(peer = %conn.peer, buffered = conn.buffer.len(), "Read limit reached");
    Ok(false)
}

fn frame(conn: &PendingConnection, eof: bool, max_body: usize) -> Framing {
    let head = match parse_head(&conn.buffer) {
        Ok(head) => head,
        Err(ParseError::Incomplete) if eof => return Framing::Abandon,
        Err(ParseError::Incomplete) => return Framing::NeedMore,
        Err(e) => return Framing::Reject(e),
    };

    // The body of an Expect request only arrives after the interim status.
    if head.expects_continue() || eof {
        return Framing::Complete(head);
    }

    let received = conn.buffer.len() - head.head_len;
    match head.content_length() {
        Some(declared) if received < declared && received <= max_body => Framing::NeedMore,
        _ => Framing::Complete(head),
    }
}
