//! Frame dispatch.
//!
//! Turns one complete client frame into encoded response bytes, consulting
//! and mutating the session table. Fully synchronous and transport-free;
//! the event loop owns all I/O.

use crate::protocol::cipher;
use crate::protocol::wire::{
    EchoResponse, LoginResponse, Request, WireError, STATUS_ACCEPTED,
};
use crate::runtime::session::SessionTable;
use std::fmt;
use tracing::{debug, trace};

/// Connection-fatal dispatch failure.
///
/// The protocol defines no error frame, so none is sent: the connection
/// just closes. A client that wants to continue reconnects and logs in
/// again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The frame failed to decode.
    Wire(WireError),
    /// An echo arrived before any successful login on this connection.
    NotAuthenticated,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Wire(e) => write!(f, "{e}"),
            DispatchError::NotAuthenticated => write!(f, "echo request before login"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<WireError> for DispatchError {
    fn from(e: WireError) -> Self {
        DispatchError::Wire(e)
    }
}

/// Process one complete frame for `conn_id`, returning the encoded
/// response to queue for writing.
///
/// Login binds (or rebinds) the connection's session and always succeeds;
/// there is no credential store, and every well-formed login is accepted.
/// Echo requires a session and reflects the payload de-obfuscated under
/// the session credentials and the frame's own sequence.
pub fn process_frame(
    conn_id: usize,
    frame: &[u8],
    sessions: &mut SessionTable,
) -> Result<Vec<u8>, DispatchError> {
    match Request::decode(frame)? {
        Request::Login(login) => {
            sessions.upsert(conn_id, login.credentials);
            debug!(
                conn_id,
                username = %String::from_utf8_lossy(login.credentials.username()),
                active_sessions = sessions.len(),
                "Login accepted"
            );
            Ok(LoginResponse {
                sequence: login.sequence,
                status: STATUS_ACCEPTED,
            }
            .encode())
        }
        Request::Echo(echo) => {
            let session = sessions
                .lookup(conn_id)
                .ok_or(DispatchError::NotAuthenticated)?;
            let payload = cipher::transform(session.credentials(), echo.sequence, &echo.payload);
            trace!(
                conn_id,
                sequence = echo.sequence,
                len = payload.len(),
                "Echo dispatched"
            );
            let response = EchoResponse {
                sequence: echo.sequence,
                payload,
            };
            Ok(response.encode()?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::{
        Credentials, EchoRequest, LoginRequest, MessageKind,
    };
    use crate::runtime::connection::FrameReader;

    const CONN: usize = 7;

    fn admin_credentials() -> Credentials {
        Credentials::new(b"admin", b"12345").unwrap()
    }

    fn login_frame(sequence: u8, credentials: Credentials) -> Vec<u8> {
        LoginRequest {
            sequence,
            credentials,
        }
        .encode()
    }

    fn echo_frame(sequence: u8, payload: Vec<u8>) -> Vec<u8> {
        EchoRequest { sequence, payload }.encode().unwrap()
    }

    /// Feed `bytes` through the frame reader in `chunk`-sized pieces,
    /// dispatching every complete frame.
    fn pump(bytes: &[u8], chunk: usize, sessions: &mut SessionTable) -> Vec<Vec<u8>> {
        let mut reader = FrameReader::new();
        let mut responses = Vec::new();
        for piece in bytes.chunks(chunk) {
            reader.push(piece);
            while let Some(frame) = reader.next_frame().unwrap() {
                responses.push(process_frame(CONN, &frame, sessions).unwrap());
            }
        }
        responses
    }

    #[test]
    fn test_login_always_accepted() {
        let mut sessions = SessionTable::new();
        let response = process_frame(CONN, &login_frame(10, admin_credentials()), &mut sessions)
            .unwrap();

        let decoded = LoginResponse::decode(&response).unwrap();
        assert_eq!(decoded.status, STATUS_ACCEPTED);
        assert_eq!(decoded.sequence, 10);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_echo_before_login_is_rejected() {
        let mut sessions = SessionTable::new();
        let result = process_frame(CONN, &echo_frame(1, b"anything".to_vec()), &mut sessions);
        assert_eq!(result, Err(DispatchError::NotAuthenticated));
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_login_then_echo_round_trip() {
        let mut sessions = SessionTable::new();
        let credentials = admin_credentials();

        let response =
            process_frame(CONN, &login_frame(10, credentials), &mut sessions).unwrap();
        let accepted = LoginResponse::decode(&response).unwrap();
        assert_eq!(accepted.status, STATUS_ACCEPTED);
        assert_eq!(accepted.sequence, 10);

        let ciphertext = cipher::transform(&credentials, 10, b"Hello, server!");
        let response =
            process_frame(CONN, &echo_frame(10, ciphertext), &mut sessions).unwrap();
        let reply = EchoResponse::decode(&response).unwrap();
        assert_eq!(reply.sequence, 10);
        assert_eq!(reply.payload, b"Hello, server!".to_vec());
    }

    #[test]
    fn test_second_login_governs_later_echoes() {
        let mut sessions = SessionTable::new();
        let first = Credentials::new(b"alice", b"first").unwrap();
        let second = Credentials::new(b"bob", b"second").unwrap();

        process_frame(CONN, &login_frame(1, first), &mut sessions).unwrap();
        process_frame(CONN, &login_frame(2, second), &mut sessions).unwrap();
        assert_eq!(sessions.len(), 1);

        let ciphertext = cipher::transform(&second, 3, b"Bye, server!");
        let response =
            process_frame(CONN, &echo_frame(3, ciphertext), &mut sessions).unwrap();
        let reply = EchoResponse::decode(&response).unwrap();
        assert_eq!(reply.payload, b"Bye, server!".to_vec());
    }

    #[test]
    fn test_server_only_kind_is_rejected() {
        let mut sessions = SessionTable::new();
        let frame = LoginResponse {
            sequence: 0,
            status: STATUS_ACCEPTED,
        }
        .encode();
        assert_eq!(
            process_frame(CONN, &frame, &mut sessions),
            Err(DispatchError::Wire(WireError::InvalidMessageType(
                MessageKind::LoginResponse as u8
            )))
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut sessions = SessionTable::new();
        let frame = [0x00, 0x04, 9, 0];
        assert_eq!(
            process_frame(CONN, &frame, &mut sessions),
            Err(DispatchError::Wire(WireError::InvalidMessageType(9)))
        );
    }

    #[test]
    fn test_oversized_payload_claim_is_rejected() {
        let mut sessions = SessionTable::new();
        sessions.upsert(CONN, admin_credentials());

        // payload_size claims more bytes than the frame carries
        let mut frame = echo_frame(1, b"hi".to_vec());
        frame[4..6].copy_from_slice(&100u16.to_be_bytes());
        let result = process_frame(CONN, &frame, &mut sessions);
        assert!(matches!(
            result,
            Err(DispatchError::Wire(WireError::TruncatedBody { .. }))
        ));
    }

    #[test]
    fn test_session_removal_revokes_echo() {
        let mut sessions = SessionTable::new();
        let credentials = admin_credentials();
        process_frame(CONN, &login_frame(1, credentials), &mut sessions).unwrap();

        sessions.remove(CONN);
        let ciphertext = cipher::transform(&credentials, 2, b"late");
        assert_eq!(
            process_frame(CONN, &echo_frame(2, ciphertext), &mut sessions),
            Err(DispatchError::NotAuthenticated)
        );
    }

    #[test]
    fn test_partial_delivery_matches_single_chunk() {
        let credentials = admin_credentials();
        let mut bytes = login_frame(10, credentials);
        bytes.extend_from_slice(&echo_frame(
            10,
            cipher::transform(&credentials, 10, b"Hello, server!"),
        ));

        let mut whole_sessions = SessionTable::new();
        let whole = pump(&bytes, bytes.len(), &mut whole_sessions);

        let mut trickle_sessions = SessionTable::new();
        let trickled = pump(&bytes, 1, &mut trickle_sessions);

        assert_eq!(whole.len(), 2);
        assert_eq!(whole, trickled);
    }
}
