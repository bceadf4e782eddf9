//! The Branca token codec.
//!
//! A Branca token is a base62 rendering of the binary frame
//!
//! ```text
//! version (0xBA) || timestamp (u32, big-endian) || nonce (24) || ciphertext || tag (16)
//! ```
//!
//! where the ciphertext and tag come from IETF XChaCha20-Poly1305 with the
//! 29 header bytes as associated data. The payload is opaque to this
//! module; the handler layer treats it as a JSON claims set.

use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};
use rand::{CryptoRng, RngCore};
use time::OffsetDateTime;

use crate::key::SymmetricKey;
use crate::{base62, Error};

pub(crate) const VERSION: u8 = 0xBA;
const TIMESTAMP_BYTES: usize = 4;
const NONCE_BYTES: usize = 24;
const HEADER_BYTES: usize = 1 + TIMESTAMP_BYTES + NONCE_BYTES;
const TAG_BYTES: usize = 16;

/// A decrypted Branca token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrancaToken {
    /// The decrypted payload bytes.
    pub payload: Vec<u8>,
    /// Creation time as unsigned seconds since the Unix epoch.
    pub timestamp: u32,
}

impl BrancaToken {
    /// The creation time as a UTC instant.
    pub fn timestamp_utc(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(i64::from(self.timestamp))
            .expect("u32 seconds are always within the representable range")
    }
}

/// Encrypt `payload` into a Branca token stamped with the current time.
pub fn encrypt(payload: &[u8], key: &SymmetricKey) -> Result<String, Error> {
    encrypt_with(payload, key, None, rand::thread_rng())
}

/// Encrypt `payload` with an explicit creation time in seconds since the
/// Unix epoch.
pub fn encrypt_at(payload: &[u8], key: &SymmetricKey, timestamp: i64) -> Result<String, Error> {
    encrypt_with(payload, key, Some(timestamp), rand::thread_rng())
}

/// Encrypt with full control over timestamp and nonce entropy.
///
/// A `timestamp` of `None` uses the current time. Timestamps outside
/// `[0, 2^32)` fail with [`Error::TimestampOutOfRange`].
pub fn encrypt_with(
    payload: &[u8],
    key: &SymmetricKey,
    timestamp: Option<i64>,
    mut rng: impl CryptoRng + RngCore,
) -> Result<String, Error> {
    let timestamp = timestamp.unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp());
    let timestamp = u32::try_from(timestamp).map_err(|_| Error::TimestampOutOfRange)?;

    let mut nonce = [0u8; NONCE_BYTES];
    rng.fill_bytes(&mut nonce);
    seal(payload, key, timestamp, &nonce)
}

fn seal(
    payload: &[u8],
    key: &SymmetricKey,
    timestamp: u32,
    nonce: &[u8; NONCE_BYTES],
) -> Result<String, Error> {
    let mut frame = Vec::with_capacity(HEADER_BYTES + payload.len() + TAG_BYTES);
    frame.push(VERSION);
    frame.extend_from_slice(&timestamp.to_be_bytes());
    frame.extend_from_slice(nonce);

    let mut ciphertext = payload.to_vec();
    let tag = XChaCha20Poly1305::new(key.as_bytes().into())
        .encrypt_in_place_detached(nonce.into(), &frame[..HEADER_BYTES], &mut ciphertext)
        .map_err(|_| Error::Internal)?;

    frame.append(&mut ciphertext);
    frame.extend_from_slice(&tag);

    Ok(base62::encode(&frame))
}

/// Decrypt a Branca token.
pub fn decrypt(token: &str, key: &SymmetricKey) -> Result<BrancaToken, Error> {
    let bytes = base62::decode(token)?;
    if bytes.len() < HEADER_BYTES + TAG_BYTES {
        return Err(Error::MalformedToken);
    }
    if bytes[0] != VERSION {
        return Err(Error::UnsupportedVersion);
    }

    let (header, body) = bytes.split_at(HEADER_BYTES);
    let timestamp = u32::from_be_bytes(
        header[1..1 + TIMESTAMP_BYTES]
            .try_into()
            .expect("header slice is exactly four bytes"),
    );
    let nonce: &[u8; NONCE_BYTES] = header[1 + TIMESTAMP_BYTES..]
        .try_into()
        .expect("header slice is exactly the nonce length");
    let (ciphertext, tag) = body.split_at(body.len() - TAG_BYTES);
    let tag: &[u8; TAG_BYTES] = tag.try_into().expect("split at the tag length");

    let mut payload = ciphertext.to_vec();
    XChaCha20Poly1305::new(key.as_bytes().into())
        .decrypt_in_place_detached(nonce.into(), header, &mut payload, tag.into())
        .map_err(|_| Error::DecryptionFailed)?;

    Ok(BrancaToken { payload, timestamp })
}

/// Cheap shape check, run before any decoding.
///
/// Rejects empty or whitespace input, anything longer than `max_length`,
/// JWT-shaped input (Branca tokens never contain `.`) and characters
/// outside the base62 alphabet.
pub fn can_read(token: &str, max_length: usize) -> bool {
    if token.trim().is_empty() || token.len() > max_length {
        return false;
    }
    !token.contains('.') && token.chars().all(base62::in_alphabet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SymmetricKey {
        SymmetricKey::from_bytes(*b"supersecretkeyyoushouldnotcommit")
    }

    #[test]
    fn can_read_shapes() {
        assert!(can_read("5K6fDIqRhrSuqGE3FbuxAPd19P2toAsbBxOn4bgSame9", 1024));
        assert!(!can_read("", 1024));
        assert!(!can_read("   ", 1024));
        assert!(!can_read("eyJhbGciOi.eyJzdWIiOi.c2ln", 1024));
        assert!(!can_read("not-base62!", 1024));
        assert!(!can_read("aaaa", 3));
    }

    #[test]
    fn deterministic_frame_layout() {
        let token = seal(b"hi", &key(), 7, &[0x42; NONCE_BYTES]).unwrap();
        let bytes = base62::decode(&token).unwrap();
        assert_eq!(bytes.len(), HEADER_BYTES + 2 + TAG_BYTES);
        assert_eq!(bytes[0], VERSION);
        assert_eq!(&bytes[1..5], &[0, 0, 0, 7]);
        assert_eq!(&bytes[5..29], &[0x42; NONCE_BYTES]);
    }

    #[test]
    fn rejects_out_of_range_timestamps() {
        for ts in [-1i64, 1 << 32] {
            assert_eq!(
                encrypt_with(b"p", &key(), Some(ts), rand::thread_rng()).unwrap_err(),
                Error::TimestampOutOfRange
            );
        }
    }
}
