//! The JSON claims set carried inside a token payload.
//!
//! Payloads are always JSON objects. The registered claim names get typed
//! fields; everything else is retained verbatim so callers can run their
//! own checks. Date claims are accepted both as numeric epoch seconds and
//! as RFC 3339 strings; the issuer side picks one via [`DateTimeFormat`].

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::Error;

/// `iss` claim name.
pub const ISSUER: &str = "iss";
/// `sub` claim name.
pub const SUBJECT: &str = "sub";
/// `aud` claim name.
pub const AUDIENCE: &str = "aud";
/// `exp` claim name.
pub const EXPIRATION: &str = "exp";
/// `nbf` claim name.
pub const NOT_BEFORE: &str = "nbf";
/// `iat` claim name.
pub const ISSUED_AT: &str = "iat";
/// `jti` claim name.
pub const TOKEN_IDENTIFIER: &str = "jti";

/// How date claims are written when a token is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateTimeFormat {
    /// Numeric seconds since the Unix epoch.
    #[default]
    Unix,
    /// RFC 3339 strings.
    Iso,
}

/// A parsed claims set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Claims {
    /// `iss`.
    pub issuer: Option<String>,
    /// `sub`.
    pub subject: Option<String>,
    /// `aud`: a single string on the wire becomes a one-element list.
    pub audiences: Vec<String>,
    /// `exp`.
    pub expires: Option<OffsetDateTime>,
    /// `nbf`.
    pub not_before: Option<OffsetDateTime>,
    /// `iat`.
    pub issued_at: Option<OffsetDateTime>,
    /// `jti`.
    pub token_identifier: Option<String>,
    /// Every claim outside the registered set.
    pub additional: Map<String, Value>,
}

impl Claims {
    /// Parse a claims set from raw payload bytes.
    ///
    /// Anything that is not a JSON object, or carries a registered claim
    /// with the wrong type, fails with [`Error::MalformedClaims`].
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        let value: Value = serde_json::from_slice(payload).map_err(|_| Error::MalformedClaims)?;
        let Value::Object(object) = value else {
            return Err(Error::MalformedClaims);
        };

        let mut claims = Claims::default();
        for (name, value) in object {
            match name.as_str() {
                ISSUER => claims.issuer = Some(string_claim(value)?),
                SUBJECT => claims.subject = Some(string_claim(value)?),
                AUDIENCE => claims.audiences = audience_claim(value)?,
                EXPIRATION => claims.expires = Some(date_claim(value)?),
                NOT_BEFORE => claims.not_before = Some(date_claim(value)?),
                ISSUED_AT => claims.issued_at = Some(date_claim(value)?),
                TOKEN_IDENTIFIER => claims.token_identifier = Some(string_claim(value)?),
                _ => {
                    claims.additional.insert(name, value);
                }
            }
        }
        Ok(claims)
    }

    /// Serialize the claims set to JSON payload bytes.
    pub fn to_json(&self, format: DateTimeFormat) -> Result<Vec<u8>, Error> {
        let mut object = Map::new();
        if let Some(issuer) = &self.issuer {
            object.insert(ISSUER.to_owned(), Value::String(issuer.clone()));
        }
        if let Some(subject) = &self.subject {
            object.insert(SUBJECT.to_owned(), Value::String(subject.clone()));
        }
        match self.audiences.as_slice() {
            [] => {}
            [audience] => {
                object.insert(AUDIENCE.to_owned(), Value::String(audience.clone()));
            }
            audiences => {
                object.insert(
                    AUDIENCE.to_owned(),
                    Value::Array(audiences.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        for (name, instant) in [
            (EXPIRATION, self.expires),
            (NOT_BEFORE, self.not_before),
            (ISSUED_AT, self.issued_at),
        ] {
            if let Some(instant) = instant {
                object.insert(name.to_owned(), encode_date(instant, format)?);
            }
        }
        if let Some(id) = &self.token_identifier {
            object.insert(TOKEN_IDENTIFIER.to_owned(), Value::String(id.clone()));
        }
        for (name, value) in &self.additional {
            object.insert(name.clone(), value.clone());
        }

        serde_json::to_vec(&Value::Object(object)).map_err(|_| Error::Internal)
    }
}

fn string_claim(value: Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(Error::MalformedClaims),
    }
}

fn audience_claim(value: Value) -> Result<Vec<String>, Error> {
    match value {
        Value::String(s) => Ok(vec![s]),
        Value::Array(entries) => entries.into_iter().map(string_claim).collect(),
        _ => Err(Error::MalformedClaims),
    }
}

fn date_claim(value: Value) -> Result<OffsetDateTime, Error> {
    match value {
        Value::Number(n) => {
            let seconds = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or(Error::MalformedClaims)?;
            OffsetDateTime::from_unix_timestamp(seconds).map_err(|_| Error::MalformedClaims)
        }
        Value::String(s) => {
            OffsetDateTime::parse(&s, &Rfc3339).map_err(|_| Error::MalformedClaims)
        }
        _ => Err(Error::MalformedClaims),
    }
}

fn encode_date(instant: OffsetDateTime, format: DateTimeFormat) -> Result<Value, Error> {
    match format {
        DateTimeFormat::Unix => Ok(Value::from(instant.unix_timestamp())),
        DateTimeFormat::Iso => instant
            .format(&Rfc3339)
            .map(Value::String)
            .map_err(|_| Error::Internal),
    }
}
