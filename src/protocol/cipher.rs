//! Keystream obfuscation for echo payloads.
//!
//! Payload bytes are XORed with a byte stream drawn from a linear
//! congruential generator seeded by the credential checksums and the
//! frame sequence. This is obfuscation, NOT cryptography: the keystream
//! is trivially predictable, and changing it would break interoperability
//! with existing peers. Because XOR is involutive and the key sequence
//! depends only on `(credentials, sequence)`, [`transform`] is its own
//! inverse; the same call obfuscates on one side and de-obfuscates on the
//! other, so there are no separate encrypt/decrypt entry points.

use crate::protocol::wire::Credentials;

const LCG_MULTIPLIER: u32 = 1_103_515_245;
const LCG_INCREMENT: u32 = 12_345;
const LCG_MODULUS: u32 = 0x7FFF_FFFF;

/// One's-complement of the truncating byte sum.
///
/// Order-independent: any permutation of `data` checksums identically.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    !sum
}

/// Initial key for a frame: `(sequence << 16) | (user << 8) | pass`,
/// with the checksums taken over the NUL-trimmed credential values.
pub fn seed(credentials: &Credentials, sequence: u8) -> u32 {
    let user = checksum(credentials.username()) as u32;
    let pass = checksum(credentials.password()) as u32;
    ((sequence as u32) << 16) | (user << 8) | pass
}

/// Advance the keystream by one step.
///
/// The multiply and add wrap in 32 bits before the modulus, matching the
/// unsigned overflow the wire format was defined with.
pub fn next_key(key: u32) -> u32 {
    key.wrapping_mul(LCG_MULTIPLIER)
        .wrapping_add(LCG_INCREMENT)
        % LCG_MODULUS
}

/// Obfuscate or de-obfuscate `data` under `(credentials, sequence)`.
///
/// For each byte in order the key advances once, then the byte is XORed
/// with `key mod 256`.
pub fn transform(credentials: &Credentials, sequence: u8, data: &[u8]) -> Vec<u8> {
    let mut key = seed(credentials, sequence);
    data.iter()
        .map(|&b| {
            key = next_key(key);
            b ^ (key % 256) as u8
        })
        .collect()
}
