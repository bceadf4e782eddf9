//! The post-decode validation pipeline.
//!
//! After a token is opened or its signature checked, the claims run
//! through lifetime, audience, issuer and replay checks driven by
//! [`ValidationParameters`]. The outcome is always a [`ValidationResult`];
//! this path never panics and never returns early through `Err` to the
//! caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::branca::BrancaToken;
use crate::claims::Claims;
use crate::key::Key;
use crate::paseto::UntrustedToken;
use crate::Error;

/// SHA-256 of a raw token string, the unit the replay cache works in.
pub type TokenHash = [u8; 32];

/// Out-of-band store of recently seen token hashes.
///
/// Thread safety is part of the implementor's contract; the pipeline calls
/// it through a shared reference from any number of threads.
pub trait ReplayCache: Send + Sync {
    /// Whether this hash has been seen before.
    fn contains(&self, hash: &TokenHash) -> bool;
    /// Record a hash, with the token expiry when one is known so entries
    /// can be evicted once they stop mattering.
    fn add(&self, hash: TokenHash, expiry: Option<OffsetDateTime>);
}

/// A `Mutex<HashMap>` replay cache. Entries are never evicted; callers
/// with long-lived processes will want a store that honours the expiry.
#[derive(Default)]
pub struct InMemoryReplayCache {
    seen: Mutex<HashMap<TokenHash, Option<OffsetDateTime>>>,
}

impl InMemoryReplayCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayCache for InMemoryReplayCache {
    fn contains(&self, hash: &TokenHash) -> bool {
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.contains_key(hash)
    }

    fn add(&self, hash: TokenHash, expiry: Option<OffsetDateTime>) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.insert(hash, expiry);
    }
}

/// Resolves candidate keys for a token. Receives the raw token string and
/// may return an empty list.
pub type KeyResolver = dyn Fn(&str) -> Vec<Key> + Send + Sync;

/// Everything `validate` needs to know: which checks to run, what to
/// compare against, and where key material comes from.
pub struct ValidationParameters {
    /// Run the lifetime step (`nbf`/`exp`). On by default.
    pub validate_lifetime: bool,
    /// Allowance added on either side of the lifetime comparison.
    pub clock_skew: Duration,
    /// Reject tokens that carry no `exp` claim.
    pub require_expiration_time: bool,
    /// Run the audience step.
    pub validate_audience: bool,
    /// Accepted audiences, compared by case-sensitive equality.
    pub valid_audiences: Vec<String>,
    /// Run the issuer step.
    pub validate_issuer: bool,
    /// Accepted issuers, compared by case-sensitive equality.
    pub valid_issuers: Vec<String>,
    /// Key list for Branca and PASETO `local` tokens.
    pub token_decryption_keys: Vec<Key>,
    /// Overrides `token_decryption_keys` when set.
    pub token_decryption_key_resolver: Option<Box<KeyResolver>>,
    /// Key list for PASETO `public` tokens.
    pub issuer_signing_keys: Vec<Key>,
    /// Overrides `issuer_signing_keys` when set.
    pub issuer_signing_key_resolver: Option<Box<KeyResolver>>,
    /// Attach the raw token string to the result on success.
    pub save_sign_in_token: bool,
    /// Enables the replay step when set.
    pub replay_cache: Option<Arc<dyn ReplayCache>>,
    /// Clock override, mainly for tests. Defaults to system UTC.
    pub clock: Option<Box<dyn Fn() -> OffsetDateTime + Send + Sync>>,
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            validate_lifetime: true,
            clock_skew: Duration::ZERO,
            require_expiration_time: false,
            validate_audience: false,
            valid_audiences: Vec::new(),
            validate_issuer: false,
            valid_issuers: Vec::new(),
            token_decryption_keys: Vec::new(),
            token_decryption_key_resolver: None,
            issuer_signing_keys: Vec::new(),
            issuer_signing_key_resolver: None,
            save_sign_in_token: false,
            replay_cache: None,
            clock: None,
        }
    }
}

impl ValidationParameters {
    pub(crate) fn now(&self) -> OffsetDateTime {
        match &self.clock {
            Some(clock) => clock(),
            None => OffsetDateTime::now_utc(),
        }
    }

    /// Candidate decryption keys for `token`: the resolver when present,
    /// the configured list otherwise.
    pub(crate) fn decryption_keys(&self, token: &str) -> Vec<Key> {
        match &self.token_decryption_key_resolver {
            Some(resolver) => resolver(token),
            None => self.token_decryption_keys.clone(),
        }
    }

    /// Candidate signing keys for `token`.
    pub(crate) fn signing_keys(&self, token: &str) -> Vec<Key> {
        match &self.issuer_signing_key_resolver {
            Some(resolver) => resolver(token),
            None => self.issuer_signing_keys.clone(),
        }
    }
}

/// The cryptographically verified token a successful validation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityToken {
    /// A decrypted Branca token.
    Branca(BrancaToken),
    /// A PASETO token whose frame passed decryption or verification.
    Paseto(UntrustedToken),
}

/// Outcome of a `validate` call.
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether every step passed.
    pub is_valid: bool,
    /// The validated claims set, on success.
    pub claims: Option<Claims>,
    /// The verified token, on success.
    pub security_token: Option<SecurityToken>,
    /// The raw token string, on success with `save_sign_in_token` set.
    pub sign_in_token: Option<String>,
    /// The failure, when `is_valid` is false.
    pub error: Option<Error>,
}

impl ValidationResult {
    pub(crate) fn success(
        claims: Claims,
        security_token: SecurityToken,
        sign_in_token: Option<String>,
    ) -> Self {
        Self {
            is_valid: true,
            claims: Some(claims),
            security_token: Some(security_token),
            sign_in_token,
            error: None,
        }
    }

    pub(crate) fn failure(error: Error) -> Self {
        Self {
            is_valid: false,
            claims: None,
            security_token: None,
            sign_in_token: None,
            error: Some(error),
        }
    }
}

pub(crate) fn token_hash(token: &str) -> TokenHash {
    Sha256::digest(token.as_bytes()).into()
}

/// Run the claim checks of the pipeline in order: lifetime, audience,
/// issuer, replay.
pub(crate) fn validate_claims(
    raw_token: &str,
    claims: &Claims,
    params: &ValidationParameters,
) -> Result<(), Error> {
    if params.validate_lifetime {
        let now = params.now();
        if let Some(not_before) = claims.not_before {
            if now + params.clock_skew < not_before {
                return Err(Error::TokenNotYetValid);
            }
        }
        if let Some(expires) = claims.expires {
            if now - params.clock_skew >= expires {
                return Err(Error::TokenExpired);
            }
        }
        if params.require_expiration_time && claims.expires.is_none() {
            return Err(Error::NoExpiration);
        }
    }

    if params.validate_audience {
        let matched = claims
            .audiences
            .iter()
            .any(|audience| params.valid_audiences.iter().any(|v| v == audience));
        if !matched {
            return Err(Error::InvalidAudience);
        }
    }

    if params.validate_issuer {
        let matched = claims
            .issuer
            .as_ref()
            .is_some_and(|issuer| params.valid_issuers.iter().any(|v| v == issuer));
        if !matched {
            return Err(Error::InvalidIssuer);
        }
    }

    if let Some(cache) = &params.replay_cache {
        let hash = token_hash(raw_token);
        if cache.contains(&hash) {
            return Err(Error::TokenReplayed);
        }
        cache.add(hash, claims.expires);
    }

    Ok(())
}
