//! Wire protocol for the authenticated echo service.
//!
//! Every message is a fixed 4-byte header followed by a message-specific
//! body; multi-byte integers are big-endian on the wire:
//!
//! ```text
//! Header:        size:u16 (total frame length), type:u8, sequence:u8
//! LoginRequest:  Header + username[32] + password[32]       (68 bytes)
//! LoginResponse: Header + status:u16                        (6 bytes)
//! EchoRequest:   Header + payload_size:u16 + payload        (6+N bytes)
//! EchoResponse:  Header + payload_size:u16 + payload        (6+N bytes)
//! ```
//!
//! Type codes: 0=LoginRequest, 1=LoginResponse, 2=EchoRequest,
//! 3=EchoResponse. Clients send only requests; servers send only
//! responses. Echo payloads travel obfuscated under the keystream in
//! [`cipher`], keyed by the session credentials and the frame sequence;
//! the response carries the de-obfuscated bytes.

pub mod cipher;
pub mod wire;
