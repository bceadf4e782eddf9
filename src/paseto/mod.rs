//! The PASETO token frame and version strategies.
//!
//! A PASETO token is ASCII `version.purpose.payload[.footer]` with payload
//! and footer in unpadded base64url. The four supported
//! `(version, purpose)` combinations form a closed set, dispatched by
//! matching on the [`Version`] and [`Purpose`] tags; anything outside it is
//! rejected while splitting the frame.

mod v1;
mod v2;

use core::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{CryptoRng, RngCore};

use crate::key::{Key, SymmetricKey};
use crate::Error;

/// PASETO protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// NIST-based compatibility version (RSA-PSS, AES-CTR + HMAC-SHA-384).
    V1,
    /// Sodium-based version (Ed25519, XChaCha20-Poly1305).
    V2,
}

impl Version {
    /// The version tag as it appears on the wire.
    pub const fn header(self) -> &'static str {
        match self {
            Version::V1 => "v1",
            Version::V2 => "v2",
        }
    }
}

/// PASETO token purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Shared-key authenticated encryption.
    Local,
    /// Asymmetric detached signature; payload stays readable.
    Public,
}

impl Purpose {
    /// The purpose tag as it appears on the wire.
    pub const fn header(self) -> &'static str {
        match self {
            Purpose::Local => "local",
            Purpose::Public => "public",
        }
    }
}

/// A split but not yet verified PASETO token.
///
/// `payload` is the decoded binary body; its layout depends on the version
/// and purpose. Nothing in here has been authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntrustedToken {
    /// Declared protocol version.
    pub version: Version,
    /// Declared purpose.
    pub purpose: Purpose,
    /// Decoded binary body.
    pub payload: Vec<u8>,
    /// Decoded footer, if the token carries one.
    pub footer: Option<Vec<u8>>,
}

impl UntrustedToken {
    /// Split a token into its frame parts.
    pub fn parse(token: &str) -> Result<Self, Error> {
        let mut parts = token.split('.');
        let (version, purpose, payload) = match (parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(p), Some(body)) => (v, p, body),
            _ => return Err(Error::MalformedToken),
        };
        let footer = parts.next();
        if parts.next().is_some() {
            return Err(Error::MalformedToken);
        }
        if version.is_empty()
            || purpose.is_empty()
            || payload.is_empty()
            || footer.is_some_and(str::is_empty)
        {
            return Err(Error::MalformedToken);
        }

        let version = match version {
            "v1" => Version::V1,
            "v2" => Version::V2,
            _ => return Err(Error::UnsupportedVersion),
        };
        let purpose = match purpose {
            "local" => Purpose::Local,
            "public" => Purpose::Public,
            _ => return Err(Error::UnsupportedPurpose),
        };

        let payload = Base64UrlUnpadded::decode_vec(payload).map_err(|_| Error::MalformedToken)?;
        let footer = footer
            .map(Base64UrlUnpadded::decode_vec)
            .transpose()
            .map_err(|_| Error::MalformedToken)?;

        Ok(Self {
            version,
            purpose,
            payload,
            footer,
        })
    }

    fn footer_bytes(&self) -> &[u8] {
        self.footer.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for UntrustedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&assemble(
            self.version,
            self.purpose,
            &self.payload,
            self.footer.as_deref(),
        ))
    }
}

fn assemble(version: Version, purpose: Purpose, body: &[u8], footer: Option<&[u8]>) -> String {
    let mut token = format!(
        "{}.{}.{}",
        version.header(),
        purpose.header(),
        Base64UrlUnpadded::encode_string(body)
    );
    if let Some(footer) = footer.filter(|f| !f.is_empty()) {
        token.push('.');
        token.push_str(&Base64UrlUnpadded::encode_string(footer));
    }
    token
}

/// Cheap shape check, run before any decoding: three or four non-empty
/// dot-separated parts and a bounded length.
pub fn can_read(token: &str, max_length: usize) -> bool {
    if token.is_empty() || token.len() > max_length {
        return false;
    }
    let parts: Vec<&str> = token.split('.').collect();
    (3..=4).contains(&parts.len()) && parts.iter().all(|part| !part.trim().is_empty())
}

/// Encrypt a claims payload into a `local` token.
pub fn encrypt(
    version: Version,
    key: &SymmetricKey,
    claims: &[u8],
    footer: Option<&[u8]>,
    rng: impl CryptoRng + RngCore,
) -> Result<String, Error> {
    let footer_bytes = footer.unwrap_or_default();
    let body = match version {
        Version::V1 => v1::encrypt(key, claims, footer_bytes, rng)?,
        Version::V2 => v2::encrypt(key, claims, footer_bytes, rng)?,
    };
    Ok(assemble(version, Purpose::Local, &body, footer))
}

/// Open a `local` token, returning the claims payload.
pub fn decrypt(token: &UntrustedToken, key: &SymmetricKey) -> Result<Vec<u8>, Error> {
    if token.purpose != Purpose::Local {
        return Err(Error::UnsupportedPurpose);
    }
    match token.version {
        Version::V1 => v1::decrypt(key, &token.payload, token.footer_bytes()),
        Version::V2 => v2::decrypt(key, &token.payload, token.footer_bytes()),
    }
}

/// Sign a claims payload into a `public` token.
///
/// The key must be the secret half matching the version: Ed25519 for v2,
/// a 2048-bit RSA private key for v1. Anything else is [`Error::InvalidKey`].
pub fn sign(
    version: Version,
    key: &Key,
    claims: &[u8],
    footer: Option<&[u8]>,
    rng: impl CryptoRng + RngCore,
) -> Result<String, Error> {
    let footer_bytes = footer.unwrap_or_default();
    let body = match (version, key) {
        (Version::V1, Key::RsaPrivate(key)) => v1::sign(key, claims, footer_bytes, rng)?,
        (Version::V2, Key::Ed25519Secret(key)) => v2::sign(key, claims, footer_bytes),
        _ => return Err(Error::InvalidKey),
    };
    Ok(assemble(version, Purpose::Public, &body, footer))
}

/// Verify a `public` token against a single candidate key, returning the
/// signed claims payload.
pub fn verify(token: &UntrustedToken, key: &Key) -> Result<Vec<u8>, Error> {
    if token.purpose != Purpose::Public {
        return Err(Error::UnsupportedPurpose);
    }
    match (token.version, key) {
        (Version::V1, Key::RsaPublic(key)) => v1::verify(key, &token.payload, token.footer_bytes()),
        (Version::V2, Key::Ed25519Public(key)) => {
            v2::verify(key, &token.payload, token.footer_bytes())
        }
        _ => Err(Error::InvalidKey),
    }
}
