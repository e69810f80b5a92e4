//! GameSpy password obfuscation (`passenc`).
//!
//! Clients store and send passwords XOR-ed with a fixed pseudo-random keystream
//! and base64-encoded with a GameSpy-specific alphabet: `[` replaces `+`, `]`
//! replaces `/` and `_` is the padding character. This is obfuscation, not
//! encryption; the same keystream encodes and decodes.

use base64::alphabet::Alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::{ProtocolError, Result};

const GAMESPY_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789[]";
const GAMESPY_PADDING: char = '_';
const STANDARD_PADDING: char = '=';

/// Keystream seed, "gspy" in ASCII
const KEYSTREAM_SEED: i32 = 0x7970_7367;

fn engine() -> Result<GeneralPurpose> {
    let alphabet = Alphabet::new(GAMESPY_ALPHABET)
        .map_err(|e| ProtocolError::PasswordDecode(format!("invalid alphabet: {e}")))?;
    let config = GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical);
    Ok(GeneralPurpose::new(&alphabet, config))
}

/// Encode a plain-text password into its `passenc` form
pub fn encode_password(plain: &str) -> Result<String> {
    let mut bytes = plain.as_bytes().to_vec();
    apply_keystream(&mut bytes);
    let encoded = engine()?.encode(&bytes);
    Ok(encoded.replace(STANDARD_PADDING, &GAMESPY_PADDING.to_string()))
}

/// Decode a `passenc` value back into the plain-text password.
///
/// # Errors
/// `PasswordDecode` if the input is not GameSpy base64 (standard `=` padding
/// included) or does not decode to UTF-8.
pub fn decode_password(encoded: &str) -> Result<String> {
    if encoded.contains(STANDARD_PADDING) {
        return Err(ProtocolError::PasswordDecode(
            "standard base64 padding is not accepted".into(),
        ));
    }

    let canonical = encoded.replace(GAMESPY_PADDING, &STANDARD_PADDING.to_string());
    let mut bytes = engine()?
        .decode(canonical)
        .map_err(|e| ProtocolError::PasswordDecode(e.to_string()))?;
    apply_keystream(&mut bytes);

    String::from_utf8(bytes).map_err(|e| ProtocolError::PasswordDecode(e.to_string()))
}

/// XOR `data` in place with the legacy keystream
fn apply_keystream(data: &mut [u8]) {
    let mut num = KEYSTREAM_SEED;
    for byte in data.iter_mut() {
        num = gslame(num);
        // gslame never yields a negative value
        *byte ^= (num % 0xff) as u8;
    }
}

/// One step of the legacy keystream generator; relies on 32-bit wrap-around.
fn gslame(num: i32) -> i32 {
    let c = ((num >> 16) & 0xffff).wrapping_mul(0x41a7);
    let mut a = (num & 0xffff).wrapping_mul(0x41a7);

    a = a.wrapping_add((c & 0x7fff) << 16);
    if a < 0 {
        a &= 0x7fff_ffff;
        a += 1;
    }

    a = a.wrapping_add(c >> 15);
    if a < 0 {
        a &= 0x7fff_ffff;
        a += 1;
    }

    a
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_password() {
        assert_eq!(encode_password("didykilikaj2").unwrap(), "cpuQi0CygMUSbhTY");
        assert_eq!(encode_password("p@ssw0rd").unwrap(), "ZrKHgVzrnsg_");
        assert_eq!(encode_password("").unwrap(), "");
    }

    #[test]
    fn test_decode_password() {
        assert_eq!(decode_password("cpuQi0CygMUSbhTY").unwrap(), "didykilikaj2");
        assert_eq!(decode_password("ZrKHgVzrnsg_").unwrap(), "p@ssw0rd");
        assert_eq!(decode_password("").unwrap(), "");
    }

    #[test]
    fn test_decode_rejects_foreign_input() {
        assert!(decode_password("123456789").is_err());
        assert!(decode_password("ZrKHgVzrnsg=").is_err());
    }
}
