//! mio event loop.
//!
//! Readiness-based model: poll tells us when sockets are ready, then we
//! perform non-blocking read/write syscalls. Uses epoll on Linux, kqueue
//! on macOS. Each worker owns a SO_REUSEPORT listener, a connection slab,
//! and a session table, so a connection is serviced by exactly one thread
//! for its whole life.

use crate::config::Config;
use crate::runtime::{process_frame, Connection, SessionTable};
use bytes::Buf;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);
const EVENTS_CAPACITY: usize = 1024;
const READ_CHUNK: usize = 4096;

/// One worker's dispatcher loop: poll, accept, read, dispatch, write.
pub(crate) fn worker_loop(worker_id: usize, addr: SocketAddr, config: &Config) -> io::Result<()> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(EVENTS_CAPACITY);

    // Create listener with SO_REUSEPORT for kernel load balancing
    let listener = create_listener_with_reuseport(addr)?;
    let mut listener = TcpListener::from_std(listener);
    poll.registry()
        .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

    let max_connections = config.max_connections;
    let mut connections: Slab<Connection> = Slab::with_capacity(max_connections);
    let mut sessions = SessionTable::new();

    info!(worker = worker_id, "Worker started");

    loop {
        poll.poll(&mut events, None)?;

        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => {
                    accept_connections(
                        &listener,
                        &mut poll,
                        &mut connections,
                        max_connections,
                        worker_id,
                    )?;
                }
                Token(conn_id) => {
                    if let Err(e) = handle_connection_event(
                        conn_id,
                        event,
                        &mut poll,
                        &mut connections,
                        &mut sessions,
                    ) {
                        debug!(conn_id, error = %e, "Connection error");
                        close_connection(&mut poll, &mut connections, &mut sessions, conn_id);
                    }
                }
            }
        }
    }
}

fn accept_connections(
    listener: &TcpListener,
    poll: &mut Poll,
    connections: &mut Slab<Connection>,
    max_connections: usize,
    worker_id: usize,
) -> io::Result<()> {
    loop {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                if connections.len() >= max_connections {
                    warn!("Connection limit reached");
                    continue;
                }

                let conn_id = connections.insert(Connection::new(stream));

                // Re-borrow after insert
                let conn = &mut connections[conn_id];
                poll.registry()
                    .register(&mut conn.stream, Token(conn_id), Interest::READABLE)?;

                debug!(
                    worker = worker_id,
                    conn_id,
                    peer = %peer_addr,
                    "Accepted connection"
                );
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                error!("Accept error: {}", e);
                break;
            }
        }
    }
    Ok(())
}

fn handle_connection_event(
    conn_id: usize,
    event: &mio::event::Event,
    poll: &mut Poll,
    connections: &mut Slab<Connection>,
    sessions: &mut SessionTable,
) -> io::Result<()> {
    if !connections.contains(conn_id) {
        return Ok(());
    }

    if event.is_readable() {
        handle_readable(conn_id, poll, connections, sessions)?;
    }

    // Re-check connection exists (may have been removed)
    if !connections.contains(conn_id) {
        return Ok(());
    }

    if event.is_writable() {
        handle_writable(conn_id, poll, connections)?;
    }

    Ok(())
}

fn handle_readable(
    conn_id: usize,
    poll: &mut Poll,
    connections: &mut Slab<Connection>,
    sessions: &mut SessionTable,
) -> io::Result<()> {
    let conn = connections
        .get_mut(conn_id)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;

    // Drain the socket: readiness may be reported once per arrival burst.
    // An immediate WouldBlock is "try later", never a close.
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match conn.stream.read(&mut chunk) {
            Ok(0) => {
                // EOF
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "EOF"));
            }
            Ok(n) => conn.reader.push(&chunk[..n]),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }

    // Dispatch every complete frame; a partial frame stays buffered until
    // more bytes arrive. Any protocol violation closes the connection.
    loop {
        match conn.reader.next_frame() {
            Ok(Some(frame)) => {
                let response = process_frame(conn_id, &frame, sessions)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                conn.queue_response(&response);
            }
            Ok(None) => break,
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }

    if !write_pending(conn)? {
        // Socket full; finish the flush when it becomes writable.
        poll.registry()
            .reregister(&mut conn.stream, Token(conn_id), Interest::WRITABLE)?;
    }

    Ok(())
}

fn handle_writable(
    conn_id: usize,
    poll: &mut Poll,
    connections: &mut Slab<Connection>,
) -> io::Result<()> {
    let conn = connections
        .get_mut(conn_id)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;

    if write_pending(conn)? {
        // Response fully flushed, go back to reading
        poll.registry()
            .reregister(&mut conn.stream, Token(conn_id), Interest::READABLE)?;
    }

    Ok(())
}

/// Write pending bytes until drained or the socket stops accepting.
/// Returns true when nothing is left to write.
fn write_pending(conn: &mut Connection) -> io::Result<bool> {
    while conn.has_pending_write() {
        match conn.stream.write(&conn.pending_write) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => conn.pending_write.advance(n),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

fn close_connection(
    poll: &mut Poll,
    connections: &mut Slab<Connection>,
    sessions: &mut SessionTable,
    conn_id: usize,
) {
    if let Some(mut conn) = connections.try_remove(conn_id) {
        let _ = poll.registry().deregister(&mut conn.stream);
        sessions.remove(conn_id);
        debug!(conn_id, active_sessions = sessions.len(), "Connection closed");
    }
}

/// Create a TCP listener with SO_REUSEPORT for kernel load balancing.
fn create_listener_with_reuseport(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}
