//! Base62 byte-string codec.
//!
//! Byte strings are treated as big-endian integers over the 62-character
//! alphabet `0-9A-Za-z`, with one leading `'0'` emitted per leading zero
//! byte so that the encoding stays a bijection. The big-integer conversion
//! itself is delegated to [`base_x`]; leading zeroes are handled here so the
//! conversion only ever sees a non-zero leading byte.

use crate::Error;

/// The Branca base62 alphabet, in value order.
pub const ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode a byte string. Uses only characters from [`ALPHABET`].
pub fn encode(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|&&b| b == 0).count();
    let mut out = String::with_capacity(bytes.len() + bytes.len() / 2);
    for _ in 0..zeros {
        out.push('0');
    }
    out.push_str(&base_x::encode(ALPHABET, &bytes[zeros..]));
    out
}

/// Decode a base62 string back into bytes.
///
/// Any character outside [`ALPHABET`] fails with [`Error::MalformedToken`].
pub fn decode(input: &str) -> Result<Vec<u8>, Error> {
    let zeros = input.chars().take_while(|&c| c == '0').count();
    let mut out = vec![0u8; zeros];
    out.extend(base_x::decode(ALPHABET, &input[zeros..]).map_err(|_| Error::MalformedToken)?);
    Ok(out)
}

/// Whether `c` is a valid base62 character.
pub fn in_alphabet(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let cases: &[&[u8]] = &[
            b"",
            b"\x00",
            b"\x00\x00\x01",
            b"\x00\xff\x00",
            b"hello world",
            b"\xba\xad\xf0\x0d",
            &[0xff; 64],
        ];
        for &bytes in cases {
            let encoded = encode(bytes);
            assert!(encoded.chars().all(in_alphabet), "{encoded:?}");
            assert_eq!(decode(&encoded).unwrap(), bytes);
        }
    }

    #[test]
    fn leading_zero_bytes_become_leading_zero_chars() {
        assert_eq!(encode(b"\x00\x00"), "00");
        assert_eq!(decode("00").unwrap(), b"\x00\x00");
        assert_eq!(decode(&encode(b"\x00\x05")).unwrap(), b"\x00\x05");
    }

    #[test]
    fn rejects_characters_outside_the_alphabet() {
        for token in ["a.b", "abc!", "käse", " abc", "abc "] {
            assert_eq!(decode(token).unwrap_err(), Error::MalformedToken);
        }
    }
}
