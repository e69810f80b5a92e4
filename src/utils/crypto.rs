//! Checksum, digest and token primitives of the legacy login protocol.
//!
//! Every function here must stay byte-compatible with deployed game clients.

use crc::{Crc, CRC_16_ARC};
use md5::{Digest, Md5};
use rand::Rng;

/// CRC-16 with polynomial 0x8005, reflected in/out, zero init and xorout
const CHECKSUM16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Number of spaces prefixed to the proof input
const PROOF_PADDING: usize = 48;

/// 16-bit session checksum of `text`
pub fn checksum16(text: &str) -> u16 {
    CHECKSUM16.checksum(text.as_bytes())
}

/// Lower-case hex MD5 of `text`
pub fn digest(text: &str) -> String {
    format!("{:x}", Md5::digest(text.as_bytes()))
}

/// Login proof: `md5(" " * 48 + nick + challenge_a + challenge_b + secret)`.
///
/// `secret` is the client's response digest, never a plain password.
pub fn derive_proof(nick: &str, secret: &str, challenge_a: &str, challenge_b: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(" ".repeat(PROOF_PADDING).as_bytes());
    hasher.update(nick.as_bytes());
    hasher.update(challenge_a.as_bytes());
    hasher.update(challenge_b.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Random alphanumeric token of exactly `len` characters.
///
/// A class (upper, lower, digit) is drawn first, then a character from that
/// class. The legacy pool is `A-Y`, `a-y` and `0-8`.
pub fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let c = match rng.random_range(0..3u8) {
                1 => b'a' + rng.random_range(0..25u8),
                2 => b'0' + rng.random_range(0..9u8),
                _ => b'A' + rng.random_range(0..25u8),
            };
            char::from(c)
        })
        .collect()
}

/// Whether `value` has the shape of a lower-case hex MD5 digest
pub fn is_md5_hex(value: &str) -> bool {
    value.len() == 32
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
