#![forbid(unsafe_code)]
#![warn(missing_docs)]
//! Compact bearer tokens: [Branca](https://branca.io) and
//! [PASETO](https://paseto.io) v1/v2.
//!
//! Both formats wrap a JSON claims set in an authenticated envelope:
//!
//! * **Branca**: an opaque token sealed with IETF XChaCha20-Poly1305,
//!   carrying a 32-bit creation timestamp, serialized in base62.
//! * **PASETO**: a structured `version.purpose.payload[.footer]` token.
//!   Purpose `local` is authenticated encryption; `public` is a detached
//!   signature. v1 builds on RSA-PSS and AES-CTR+HMAC, v2 on Ed25519 and
//!   XChaCha20-Poly1305.
//!
//! The crate exposes two layers. The codec modules ([`branca`] and
//! [`paseto`]) operate on raw byte payloads and single keys. The handler
//! layer ([`BrancaTokenHandler`], [`PasetoTokenHandler`]) adds the claims
//! model, key resolution against a heterogeneous key list, and the
//! post-decode validation pipeline (lifetime, audience, issuer, replay).
//!
//! ```
//! use opaque_tokens::{
//!     BrancaTokenHandler, Credentials, Key, SymmetricKey, TokenDescriptor,
//!     ValidationParameters,
//! };
//!
//! let key = SymmetricKey::from_bytes(*b"supersecretkeyyoushouldnotcommit");
//!
//! let descriptor = TokenDescriptor {
//!     issuer: Some("https://issuer.example.com".to_owned()),
//!     audience: Some("api".to_owned()),
//!     expires: Some(time::OffsetDateTime::now_utc() + time::Duration::hours(1)),
//!     credentials: Some(Credentials::Encrypting(key.clone())),
//!     ..TokenDescriptor::default()
//! };
//!
//! let handler = BrancaTokenHandler::default();
//! let token = handler.create(&descriptor).unwrap();
//!
//! let params = ValidationParameters {
//!     validate_audience: true,
//!     valid_audiences: vec!["api".to_owned()],
//!     validate_issuer: true,
//!     valid_issuers: vec!["https://issuer.example.com".to_owned()],
//!     token_decryption_keys: vec![Key::Symmetric(key)],
//!     ..ValidationParameters::default()
//! };
//!
//! let result = handler.validate(&token, &params);
//! assert!(result.is_valid);
//! ```
//!
//! Validation never panics and never short-circuits with `Err`: every
//! outcome, including cryptographic failure on adversarial input, is
//! reported through the returned [`ValidationResult`]. Token creation, by
//! contrast, fails loudly on programmer error (missing credentials, wrong
//! key type, out-of-range timestamps).

pub mod base62;
pub mod branca;
pub mod claims;
pub mod handler;
pub mod key;
mod pae;
pub mod paseto;
pub mod validation;

pub use claims::{Claims, DateTimeFormat};
pub use handler::{BrancaTokenHandler, Credentials, PasetoTokenHandler, TokenDescriptor};
pub use key::{Key, SymmetricKey};
pub use paseto::{Purpose, Version};
pub use validation::{
    InMemoryReplayCache, ReplayCache, SecurityToken, ValidationParameters, ValidationResult,
};

/// Error returned by every token operation that can fail.
///
/// Messages are intentionally terse for the security-sensitive variants and
/// never contain key or payload material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required argument was empty or absent.
    #[error("a required argument was empty or absent")]
    ArgumentMissing,
    /// Key material has the wrong length, type or algorithm parameters.
    #[error("invalid key material")]
    InvalidKey,
    /// The token could not be decoded into its frame.
    #[error("malformed token")]
    MalformedToken,
    /// The token version is outside the supported set.
    #[error("unsupported token version")]
    UnsupportedVersion,
    /// The token purpose is outside the supported set.
    #[error("unsupported token purpose")]
    UnsupportedPurpose,
    /// Authenticated decryption failed.
    #[error("decryption failed")]
    DecryptionFailed,
    /// Signature verification failed against every candidate key.
    #[error("signature verification failed")]
    BadSignature,
    /// The token payload is not a JSON object.
    #[error("token payload is not a JSON object")]
    MalformedClaims,
    /// The token expiry is in the past.
    #[error("token has expired")]
    TokenExpired,
    /// The token is not valid yet.
    #[error("token is not yet valid")]
    TokenNotYetValid,
    /// The token carries no expiry but one is required.
    #[error("token has no expiration claim")]
    NoExpiration,
    /// No audience claim matched the expected audiences.
    #[error("token audience is not valid")]
    InvalidAudience,
    /// The issuer claim did not match the expected issuers.
    #[error("token issuer is not valid")]
    InvalidIssuer,
    /// The token was already presented once.
    #[error("token has already been used")]
    TokenReplayed,
    /// No candidate key was usable for decryption.
    #[error("no valid decryption key")]
    NoValidDecryptionKey,
    /// No candidate key was usable for signature verification.
    #[error("no valid signing key")]
    NoValidSigningKey,
    /// A creation timestamp does not fit the unsigned 32-bit range.
    #[error("timestamp is outside the unsigned 32-bit range")]
    TimestampOutOfRange,
    /// A cryptographic primitive failed on the creation path.
    #[error("internal cryptographic failure")]
    Internal,
}
