//! Frame codecs for the echo protocol.
//!
//! Pure byte transformations with no I/O: every message is a fixed 4-byte
//! header followed by a message-specific body, and every multi-byte integer
//! is big-endian on the wire. Length fields are validated, never clamped.

#![allow(dead_code)] // The client-side codec half (request encode, response decode) has no caller in the server binary.

use std::fmt;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 4;

/// Fixed width of each credential field.
pub const CREDENTIAL_LEN: usize = 32;

/// Total LoginRequest frame length: header plus two credential fields.
pub const LOGIN_REQUEST_LEN: usize = HEADER_LEN + 2 * CREDENTIAL_LEN;

/// Total LoginResponse frame length: header plus status.
pub const LOGIN_RESPONSE_LEN: usize = HEADER_LEN + 2;

/// Echo frame overhead: header plus the payload size field.
pub const ECHO_OVERHEAD: usize = HEADER_LEN + 2;

/// Largest echo payload the u16 frame size can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - ECHO_OVERHEAD;

/// Login was rejected.
pub const STATUS_REJECTED: u16 = 0;
/// Login was accepted.
pub const STATUS_ACCEPTED: u16 = 1;

/// Message type codes carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    LoginRequest = 0,
    LoginResponse = 1,
    EchoRequest = 2,
    EchoResponse = 3,
}

impl MessageKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageKind::LoginRequest),
            1 => Some(MessageKind::LoginResponse),
            2 => Some(MessageKind::EchoRequest),
            3 => Some(MessageKind::EchoResponse),
            _ => None,
        }
    }
}

/// Codec failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Header bytes are structurally invalid: too few of them, or a size
    /// field inconsistent with the message layout.
    MalformedHeader,
    /// A declared length reaches past the bytes actually supplied.
    TruncatedBody { needed: usize, available: usize },
    /// Type byte is unknown, or a server-only type arrived from a client.
    InvalidMessageType(u8),
    /// Payload does not fit the u16 size fields.
    PayloadTooLarge(usize),
    /// Credential longer than the fixed field, or containing an interior NUL.
    InvalidCredential,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::MalformedHeader => write!(f, "malformed header"),
            WireError::TruncatedBody { needed, available } => {
                write!(f, "truncated body: need {needed} bytes, have {available}")
            }
            WireError::InvalidMessageType(kind) => {
                write!(f, "invalid message type {kind}")
            }
            WireError::PayloadTooLarge(len) => {
                write!(f, "payload of {len} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit")
            }
            WireError::InvalidCredential => {
                write!(
                    f,
                    "credential longer than {CREDENTIAL_LEN} bytes or containing NUL"
                )
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Fixed frame header.
///
/// `kind` stays a raw byte here so that a frame with an unknown type still
/// frames correctly; it is interpreted against [`MessageKind`] at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total frame length including the header itself.
    pub size: u16,
    /// Raw message type byte.
    pub kind: u8,
    /// Caller-assigned sequence, echoed back in responses.
    pub sequence: u8,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let size = self.size.to_be_bytes();
        [size[0], size[1], self.kind, self.sequence]
    }

    /// Decode a header from the front of `buf`.
    ///
    /// Fails only when fewer than 4 bytes are supplied.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::MalformedHeader);
        }
        Ok(Header {
            size: u16::from_be_bytes([buf[0], buf[1]]),
            kind: buf[2],
            sequence: buf[3],
        })
    }
}

/// Fixed-width username/password pair.
///
/// Both fields are NUL-padded on the wire; the logical value ends at the
/// first NUL. Raw bytes are preserved verbatim through a decode/encode
/// round trip, and the trimming rule is applied identically in both
/// directions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    username: [u8; CREDENTIAL_LEN],
    password: [u8; CREDENTIAL_LEN],
}

impl Credentials {
    /// Build credentials from logical values, NUL-padding to field width.
    pub fn new(username: &[u8], password: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            username: pad_credential(username)?,
            password: pad_credential(password)?,
        })
    }

    /// Logical username, trimmed at the first NUL.
    pub fn username(&self) -> &[u8] {
        trim_nul(&self.username)
    }

    /// Logical password, trimmed at the first NUL.
    pub fn password(&self) -> &[u8] {
        trim_nul(&self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never reveal the password, even in debug output.
        f.debug_struct("Credentials")
            .field("username", &String::from_utf8_lossy(self.username()))
            .field("password", &"<redacted>")
            .finish()
    }
}

fn pad_credential(value: &[u8]) -> Result<[u8; CREDENTIAL_LEN], WireError> {
    if value.len() > CREDENTIAL_LEN || value.contains(&0) {
        return Err(WireError::InvalidCredential);
    }
    let mut padded = [0u8; CREDENTIAL_LEN];
    padded[..value.len()].copy_from_slice(value);
    Ok(padded)
}

fn trim_nul(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|&b| b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    }
}

/// Client login: fixed 68-byte frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub sequence: u8,
    pub credentials: Credentials,
}

impl LoginRequest {
    pub fn encode(&self) -> Vec<u8> {
        let header = Header {
            size: LOGIN_REQUEST_LEN as u16,
            kind: MessageKind::LoginRequest as u8,
            sequence: self.sequence,
        };
        let mut out = Vec::with_capacity(LOGIN_REQUEST_LEN);
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.credentials.username);
        out.extend_from_slice(&self.credentials.password);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let header = Header::decode(buf)?;
        if header.kind != MessageKind::LoginRequest as u8 {
            return Err(WireError::InvalidMessageType(header.kind));
        }
        if header.size as usize != LOGIN_REQUEST_LEN {
            return Err(WireError::MalformedHeader);
        }
        if buf.len() < LOGIN_REQUEST_LEN {
            return Err(WireError::TruncatedBody {
                needed: LOGIN_REQUEST_LEN,
                available: buf.len(),
            });
        }

        let mut username = [0u8; CREDENTIAL_LEN];
        username.copy_from_slice(&buf[HEADER_LEN..HEADER_LEN + CREDENTIAL_LEN]);
        let mut password = [0u8; CREDENTIAL_LEN];
        password.copy_from_slice(&buf[HEADER_LEN + CREDENTIAL_LEN..LOGIN_REQUEST_LEN]);

        Ok(Self {
            sequence: header.sequence,
            credentials: Credentials { username, password },
        })
    }
}

/// Server verdict on a login: fixed 6-byte frame.
///
/// `status` stays a raw u16 with named constants so a decoder keeps working
/// if new status values are ever assigned; existing values never shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub sequence: u8,
    pub status: u16,
}

impl LoginResponse {
    pub fn encode(&self) -> Vec<u8> {
        let header = Header {
            size: LOGIN_RESPONSE_LEN as u16,
            kind: MessageKind::LoginResponse as u8,
            sequence: self.sequence,
        };
        let mut out = Vec::with_capacity(LOGIN_RESPONSE_LEN);
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.status.to_be_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let header = Header::decode(buf)?;
        if header.kind != MessageKind::LoginResponse as u8 {
            return Err(WireError::InvalidMessageType(header.kind));
        }
        if header.size as usize != LOGIN_RESPONSE_LEN {
            return Err(WireError::MalformedHeader);
        }
        if buf.len() < LOGIN_RESPONSE_LEN {
            return Err(WireError::TruncatedBody {
                needed: LOGIN_RESPONSE_LEN,
                available: buf.len(),
            });
        }
        Ok(Self {
            sequence: header.sequence,
            status: u16::from_be_bytes([buf[4], buf[5]]),
        })
    }
}

/// Client echo carrying an obfuscated payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest {
    pub sequence: u8,
    pub payload: Vec<u8>,
}

impl EchoRequest {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode_echo(MessageKind::EchoRequest, self.sequence, &self.payload)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let (sequence, payload) = decode_echo(MessageKind::EchoRequest, buf)?;
        Ok(Self { sequence, payload })
    }
}

/// Server echo carrying the de-obfuscated payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoResponse {
    pub sequence: u8,
    pub payload: Vec<u8>,
}

impl EchoResponse {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode_echo(MessageKind::EchoResponse, self.sequence, &self.payload)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let (sequence, payload) = decode_echo(MessageKind::EchoResponse, buf)?;
        Ok(Self { sequence, payload })
    }
}

fn encode_echo(kind: MessageKind, sequence: u8, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(WireError::PayloadTooLarge(payload.len()));
    }
    let total = ECHO_OVERHEAD + payload.len();
    let header = Header {
        size: total as u16,
        kind: kind as u8,
        sequence,
    };
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

fn decode_echo(kind: MessageKind, buf: &[u8]) -> Result<(u8, Vec<u8>), WireError> {
    let header = Header::decode(buf)?;
    if header.kind != kind as u8 {
        return Err(WireError::InvalidMessageType(header.kind));
    }
    if buf.len() < ECHO_OVERHEAD {
        return Err(WireError::TruncatedBody {
            needed: ECHO_OVERHEAD,
            available: buf.len(),
        });
    }

    let payload_len = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    let total = ECHO_OVERHEAD + payload_len;
    if buf.len() < total {
        return Err(WireError::TruncatedBody {
            needed: total,
            available: buf.len(),
        });
    }
    // The payload size field and header.size describe the same frame.
    if header.size as usize != total {
        return Err(WireError::MalformedHeader);
    }

    Ok((header.sequence, buf[ECHO_OVERHEAD..total].to_vec()))
}

/// A client-originated message, decoded from one complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Login(LoginRequest),
    Echo(EchoRequest),
}

impl Request {
    /// Decode the frame a client is allowed to send. Server-only and
    /// unknown type bytes are protocol violations.
    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        let header = Header::decode(frame)?;
        match MessageKind::from_u8(header.kind) {
            Some(MessageKind::LoginRequest) => Ok(Request::Login(LoginRequest::decode(frame)?)),
            Some(MessageKind::EchoRequest) => Ok(Request::Echo(EchoRequest::decode(frame)?)),
            _ => Err(WireError::InvalidMessageType(header.kind)),
        }
    }
}
