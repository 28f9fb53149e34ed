//! Per-connection receive and write state.
//!
//! Frames arrive over the stream in arbitrary pieces; `FrameReader`
//! accumulates bytes in a growable buffer and slices out complete frames,
//! so the rest of the engine only ever sees whole frames regardless of how
//! the transport chunked them.

use crate::protocol::wire::{self, Header, WireError};
use bytes::BytesMut;
use mio::net::TcpStream;

/// Initial receive buffer capacity; the buffer grows on demand.
const INITIAL_RECV_CAPACITY: usize = 1024;

/// Parse progress for the frame currently being received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    /// Fewer than 4 bytes buffered; frame length still unknown.
    AwaitingHeader,
    /// Header decoded; waiting until `total` bytes of frame are buffered.
    AwaitingBody { total: usize },
}

/// Accumulates stream bytes and yields complete frames.
///
/// Progress depends only on how many bytes have arrived, never on how
/// they were chunked: feeding one byte at a time produces the same frames
/// as feeding everything at once.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    state: FrameState,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_RECV_CAPACITY),
            state: FrameState::AwaitingHeader,
        }
    }

    /// Append bytes received from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Slice out the next complete frame, if one is fully buffered.
    ///
    /// `Ok(None)` means more bytes are needed; that is suspension, not
    /// failure. The header is decoded once per frame, as soon as 4 bytes
    /// are present; a frame claiming to be smaller than its own header is
    /// rejected. Consumed bytes are discarded, pipelined leftovers stay
    /// buffered for the next call.
    pub fn next_frame(&mut self) -> Result<Option<BytesMut>, WireError> {
        let total = match self.state {
            FrameState::AwaitingHeader => {
                if self.buf.len() < wire::HEADER_LEN {
                    return Ok(None);
                }
                let header = Header::decode(&self.buf[..wire::HEADER_LEN])?;
                let total = header.size as usize;
                if total < wire::HEADER_LEN {
                    return Err(WireError::MalformedHeader);
                }
                self.state = FrameState::AwaitingBody { total };
                total
            }
            FrameState::AwaitingBody { total } => total,
        };

        if self.buf.len() < total {
            return Ok(None);
        }

        let frame = self.buf.split_to(total);
        self.state = FrameState::AwaitingHeader;
        Ok(Some(frame))
    }

    /// Bytes buffered but not yet sliced into a frame.
    #[allow(dead_code)]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// One accepted client connection.
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub reader: FrameReader,
    /// Encoded responses not yet fully written to the socket.
    pub pending_write: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            reader: FrameReader::new(),
            pending_write: BytesMut::new(),
        }
    }

    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.pending_write.extend_from_slice(bytes);
    }

    pub fn has_pending_write(&self) -> bool {
        !self.pending_write.is_empty()
    }
}
