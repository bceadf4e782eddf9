//! Token handlers: the public create/read/validate surface.
//!
//! A handler ties a codec to the claims model and the validation pipeline.
//! Handlers hold no key material and no mutable state, so a single
//! instance can be shared freely across threads; anything stateful lives
//! in caller-supplied collaborators on [`ValidationParameters`].

use rand::{CryptoRng, RngCore};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::branca;
use crate::claims::{Claims, DateTimeFormat};
use crate::key::{Key, SymmetricKey};
use crate::paseto::{self, Purpose, UntrustedToken, Version};
use crate::validation::{self, SecurityToken, ValidationParameters, ValidationResult};
use crate::Error;

/// Default ceiling on accepted token length, in characters.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 32 * 1024;

/// Key material a descriptor creates tokens with.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Symmetric encryption: Branca or PASETO `local`.
    Encrypting(SymmetricKey),
    /// Asymmetric signing: PASETO `public`. The key must be the secret
    /// half matching the chosen version.
    Signing(Key),
}

/// What to put in a new token.
///
/// The registered claim fields and `claims` are merged into one JSON
/// object; `date_format` picks how the date claims are written.
#[derive(Debug, Clone, Default)]
pub struct TokenDescriptor {
    /// `iss` claim.
    pub issuer: Option<String>,
    /// `aud` claim.
    pub audience: Option<String>,
    /// `sub` claim.
    pub subject: Option<String>,
    /// `exp` claim.
    pub expires: Option<OffsetDateTime>,
    /// `nbf` claim.
    pub not_before: Option<OffsetDateTime>,
    /// `iat` claim. For Branca this also stamps the frame timestamp.
    pub issued_at: Option<OffsetDateTime>,
    /// Additional claims, merged after the registered ones.
    pub claims: Map<String, Value>,
    /// Encoding for the date claims.
    pub date_format: DateTimeFormat,
    /// Key material. `create` fails with [`Error::ArgumentMissing`] when
    /// absent.
    pub credentials: Option<Credentials>,
}

impl TokenDescriptor {
    fn to_claims(&self) -> Claims {
        Claims {
            issuer: self.issuer.clone(),
            subject: self.subject.clone(),
            audiences: self.audience.clone().into_iter().collect(),
            expires: self.expires,
            not_before: self.not_before,
            issued_at: self.issued_at,
            token_identifier: None,
            additional: self.claims.clone(),
        }
    }

    fn payload(&self) -> Result<Vec<u8>, Error> {
        self.to_claims().to_json(self.date_format)
    }
}

/// Creates and validates Branca tokens.
#[derive(Debug, Clone)]
pub struct BrancaTokenHandler {
    /// Tokens longer than this fail `can_read`.
    pub max_token_length: usize,
}

impl Default for BrancaTokenHandler {
    fn default() -> Self {
        Self {
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }
}

impl BrancaTokenHandler {
    /// Whether `token` is plausibly a Branca token.
    pub fn can_read(&self, token: &str) -> bool {
        branca::can_read(token, self.max_token_length)
    }

    /// Create a token from a descriptor with encrypting credentials.
    pub fn create(&self, descriptor: &TokenDescriptor) -> Result<String, Error> {
        self.create_with(descriptor, rand::thread_rng())
    }

    /// `create` with caller-controlled nonce entropy.
    pub fn create_with(
        &self,
        descriptor: &TokenDescriptor,
        rng: impl CryptoRng + RngCore,
    ) -> Result<String, Error> {
        let key = match &descriptor.credentials {
            None => return Err(Error::ArgumentMissing),
            Some(Credentials::Encrypting(key)) => key,
            Some(Credentials::Signing(_)) => return Err(Error::InvalidKey),
        };
        let timestamp = descriptor.issued_at.map(OffsetDateTime::unix_timestamp);
        branca::encrypt_with(&descriptor.payload()?, key, timestamp, rng)
    }

    /// Decrypt and validate a token, reporting every outcome through the
    /// result object.
    pub fn validate(&self, token: &str, params: &ValidationParameters) -> ValidationResult {
        match self.try_validate(token, params) {
            Ok(result) => result,
            Err(error) => ValidationResult::failure(error),
        }
    }

    fn try_validate(
        &self,
        token: &str,
        params: &ValidationParameters,
    ) -> Result<ValidationResult, Error> {
        if token.trim().is_empty() {
            return Err(Error::ArgumentMissing);
        }
        if !self.can_read(token) {
            return Err(Error::MalformedToken);
        }

        let candidates = params.decryption_keys(token);
        let keys: Vec<&SymmetricKey> = candidates.iter().filter_map(Key::as_symmetric).collect();
        if keys.is_empty() {
            return Err(Error::NoValidDecryptionKey);
        }

        let parsed = try_each(keys, Error::DecryptionFailed, |key| {
            branca::decrypt(token, key)
        })?;

        let claims = Claims::parse(&parsed.payload)?;
        validation::validate_claims(token, &claims, params)?;

        Ok(ValidationResult::success(
            claims,
            SecurityToken::Branca(parsed),
            params.save_sign_in_token.then(|| token.to_owned()),
        ))
    }
}

/// Creates and validates PASETO v1/v2 tokens.
#[derive(Debug, Clone)]
pub struct PasetoTokenHandler {
    /// Tokens longer than this fail `can_read`.
    pub max_token_length: usize,
}

impl Default for PasetoTokenHandler {
    fn default() -> Self {
        Self {
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }
}

impl PasetoTokenHandler {
    /// Whether `token` is plausibly a PASETO token.
    pub fn can_read(&self, token: &str) -> bool {
        paseto::can_read(token, self.max_token_length)
    }

    /// Create a token from a descriptor. Encrypting credentials produce a
    /// `local` token, signing credentials a `public` one.
    pub fn create(&self, descriptor: &TokenDescriptor, version: Version) -> Result<String, Error> {
        self.create_with(descriptor, version, rand::thread_rng())
    }

    /// `create` with caller-controlled entropy.
    pub fn create_with(
        &self,
        descriptor: &TokenDescriptor,
        version: Version,
        rng: impl CryptoRng + RngCore,
    ) -> Result<String, Error> {
        let payload = descriptor.payload()?;
        match &descriptor.credentials {
            None => Err(Error::ArgumentMissing),
            Some(Credentials::Encrypting(key)) => {
                paseto::encrypt(version, key, &payload, None, rng)
            }
            Some(Credentials::Signing(key)) => paseto::sign(version, key, &payload, None, rng),
        }
    }

    /// Open or verify a token and validate its claims, reporting every
    /// outcome through the result object.
    pub fn validate(&self, token: &str, params: &ValidationParameters) -> ValidationResult {
        match self.try_validate(token, params) {
            Ok(result) => result,
            Err(error) => ValidationResult::failure(error),
        }
    }

    fn try_validate(
        &self,
        token: &str,
        params: &ValidationParameters,
    ) -> Result<ValidationResult, Error> {
        if token.trim().is_empty() {
            return Err(Error::ArgumentMissing);
        }
        if !self.can_read(token) {
            return Err(Error::MalformedToken);
        }

        let parsed = UntrustedToken::parse(token)?;
        let payload = match parsed.purpose {
            Purpose::Local => {
                let candidates = params.decryption_keys(token);
                let keys: Vec<&SymmetricKey> =
                    candidates.iter().filter_map(Key::as_symmetric).collect();
                if keys.is_empty() {
                    return Err(Error::NoValidDecryptionKey);
                }
                try_each(keys, Error::DecryptionFailed, |key| {
                    paseto::decrypt(&parsed, key)
                })?
            }
            Purpose::Public => {
                let candidates = params.signing_keys(token);
                let keys: Vec<&Key> = candidates
                    .iter()
                    .filter(|key| match parsed.version {
                        Version::V1 => key.as_rsa_public().is_some(),
                        Version::V2 => key.as_ed25519_public().is_some(),
                    })
                    .collect();
                if keys.is_empty() {
                    return Err(Error::NoValidSigningKey);
                }
                try_each(keys, Error::BadSignature, |key| {
                    paseto::verify(&parsed, key)
                })?
            }
        };

        let claims = Claims::parse(&payload)?;
        validation::validate_claims(token, &claims, params)?;

        Ok(ValidationResult::success(
            claims,
            SecurityToken::Paseto(parsed),
            params.save_sign_in_token.then(|| token.to_owned()),
        ))
    }
}

/// Try `op` against each candidate key. Structural failures abort at once
/// since no other key can fare better; cryptographic failures fall through
/// to the next key and surface as `exhausted` when none accepts.
fn try_each<K, T>(
    keys: Vec<K>,
    exhausted: Error,
    op: impl Fn(&K) -> Result<T, Error>,
) -> Result<T, Error> {
    for key in &keys {
        match op(key) {
            Ok(value) => return Ok(value),
            Err(
                error @ (Error::MalformedToken
                | Error::UnsupportedVersion
                | Error::UnsupportedPurpose),
            ) => return Err(error),
            Err(_) => {}
        }
    }
    Err(exhausted)
}
