//! Key material for token creation and validation.
//!
//! Keys are supplied per call; the codec never persists them. Callers hand
//! the validation pipeline a heterogeneous list of [`Key`]s and each
//! operation filters it down to the material it can actually use: 32-byte
//! symmetric keys for AEAD, Ed25519 public keys for `v2.public`, RSA public
//! keys for `v1.public`.

use core::fmt;

use rand::{CryptoRng, RngCore};
use rsa::traits::PublicKeyParts;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::Error;

/// Symmetric key length shared by Branca and every PASETO `local` version.
pub const SYMMETRIC_KEY_BYTES: usize = 32;

/// RSA modulus size required by `v1.public`, fixed by the 256-byte
/// signature slot in the wire format.
pub(crate) const RSA_MODULUS_BITS: usize = 2048;

/// A 32-byte symmetric key.
///
/// The raw bytes are zeroized on drop, redacted from `Debug` output and
/// compared in constant time.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_BYTES]);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub const fn from_bytes(bytes: [u8; SYMMETRIC_KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key.
    pub fn generate(mut rng: impl CryptoRng + RngCore) -> Self {
        let mut bytes = [0u8; SYMMETRIC_KEY_BYTES];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_BYTES] {
        &self.0
    }
}

impl TryFrom<&[u8]> for SymmetricKey {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Error> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| Error::InvalidKey)
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SymmetricKey").field(&"[REDACTED]").finish()
    }
}

/// A single piece of key material in a caller-supplied key list.
///
/// The variants form the closed set of algorithms the two token families
/// use. Operations select candidates with the `as_*` accessors and ignore
/// everything else in the list.
#[derive(Clone)]
pub enum Key {
    /// 32 bytes of symmetric material (Branca, `v1.local`, `v2.local`).
    Symmetric(SymmetricKey),
    /// Ed25519 verifying key (`v2.public` validation).
    Ed25519Public(ed25519_dalek::VerifyingKey),
    /// Ed25519 signing key (`v2.public` creation).
    Ed25519Secret(ed25519_dalek::SigningKey),
    /// RSA public key (`v1.public` validation).
    RsaPublic(rsa::RsaPublicKey),
    /// RSA private key (`v1.public` creation).
    RsaPrivate(rsa::RsaPrivateKey),
}

impl Key {
    /// This key as symmetric material, if it is any.
    pub fn as_symmetric(&self) -> Option<&SymmetricKey> {
        match self {
            Key::Symmetric(key) => Some(key),
            _ => None,
        }
    }

    /// This key as an Ed25519 verifying key, if it is one.
    pub fn as_ed25519_public(&self) -> Option<&ed25519_dalek::VerifyingKey> {
        match self {
            Key::Ed25519Public(key) => Some(key),
            _ => None,
        }
    }

    /// This key as an RSA public key with the required modulus size.
    pub fn as_rsa_public(&self) -> Option<&rsa::RsaPublicKey> {
        match self {
            Key::RsaPublic(key) if key.n().bits() == RSA_MODULUS_BITS => Some(key),
            _ => None,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // public halves are printable, everything secret is not
        match self {
            Key::Symmetric(_) => f.write_str("Key::Symmetric([REDACTED])"),
            Key::Ed25519Public(key) => f.debug_tuple("Key::Ed25519Public").field(key).finish(),
            Key::Ed25519Secret(_) => f.write_str("Key::Ed25519Secret([REDACTED])"),
            Key::RsaPublic(_) => f.write_str("Key::RsaPublic(..)"),
            Key::RsaPrivate(_) => f.write_str("Key::RsaPrivate([REDACTED])"),
        }
    }
}
