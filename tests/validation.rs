use std::sync::Arc;

use opaque_tokens::{
    branca, BrancaTokenHandler, Credentials, InMemoryReplayCache, Key, PasetoTokenHandler,
    SymmetricKey, TokenDescriptor, ValidationParameters, Version,
};
use time::{Duration, OffsetDateTime};

fn key() -> SymmetricKey {
    SymmetricKey::from_bytes(*b"supersecretkeyyoushouldnotcommit")
}

fn params_with(key: SymmetricKey) -> ValidationParameters {
    ValidationParameters {
        token_decryption_keys: vec![Key::Symmetric(key)],
        ..ValidationParameters::default()
    }
}

fn branca_token(descriptor: &TokenDescriptor) -> String {
    BrancaTokenHandler::default().create(descriptor).unwrap()
}

fn encrypting_descriptor() -> TokenDescriptor {
    TokenDescriptor {
        credentials: Some(Credentials::Encrypting(key())),
        ..TokenDescriptor::default()
    }
}

#[test]
fn expired_token_is_rejected_with_default_skew() {
    let token = branca_token(&TokenDescriptor {
        expires: Some(OffsetDateTime::now_utc() - Duration::seconds(1)),
        ..encrypting_descriptor()
    });
    let result = BrancaTokenHandler::default().validate(&token, &params_with(key()));
    assert_eq!(result.error, Some(opaque_tokens::Error::TokenExpired));
}

#[test]
fn clock_skew_saves_a_barely_expired_token() {
    let token = branca_token(&TokenDescriptor {
        expires: Some(OffsetDateTime::now_utc() - Duration::seconds(1)),
        ..encrypting_descriptor()
    });
    let mut params = params_with(key());
    params.clock_skew = Duration::minutes(5);
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.is_valid, "{:?}", result.error);
}

#[test]
fn not_yet_valid_token_is_rejected() {
    let token = branca_token(&TokenDescriptor {
        not_before: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
        ..encrypting_descriptor()
    });
    let result = BrancaTokenHandler::default().validate(&token, &params_with(key()));
    assert_eq!(result.error, Some(opaque_tokens::Error::TokenNotYetValid));
}

#[test]
fn missing_expiry_can_be_required() {
    let token = branca_token(&encrypting_descriptor());
    let mut params = params_with(key());
    params.require_expiration_time = true;
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert_eq!(result.error, Some(opaque_tokens::Error::NoExpiration));
}

#[test]
fn lifetime_checks_can_be_disabled() {
    let token = branca_token(&TokenDescriptor {
        expires: Some(OffsetDateTime::now_utc() - Duration::hours(1)),
        ..encrypting_descriptor()
    });
    let mut params = params_with(key());
    params.validate_lifetime = false;
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.is_valid, "{:?}", result.error);
}

#[test]
fn audience_matching_is_case_sensitive() {
    let token = branca_token(&TokenDescriptor {
        audience: Some("Api".to_owned()),
        ..encrypting_descriptor()
    });
    let mut params = params_with(key());
    params.validate_audience = true;
    params.valid_audiences = vec!["api".to_owned()];
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert_eq!(result.error, Some(opaque_tokens::Error::InvalidAudience));

    params.valid_audiences = vec!["Api".to_owned()];
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.is_valid, "{:?}", result.error);
}

#[test]
fn any_audience_in_an_array_may_match() {
    let token = branca::encrypt(br#"{"aud":["first","second"]}"#, &key()).unwrap();
    let mut params = params_with(key());
    params.validate_audience = true;
    params.valid_audiences = vec!["second".to_owned()];
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.is_valid, "{:?}", result.error);

    params.valid_audiences = vec!["third".to_owned()];
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert_eq!(result.error, Some(opaque_tokens::Error::InvalidAudience));
}

#[test]
fn issuer_must_match_when_validated() {
    let token = branca_token(&TokenDescriptor {
        issuer: Some("trusted".to_owned()),
        ..encrypting_descriptor()
    });
    let mut params = params_with(key());
    params.validate_issuer = true;
    params.valid_issuers = vec!["untrusted".to_owned()];
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert_eq!(result.error, Some(opaque_tokens::Error::InvalidIssuer));

    params.valid_issuers = vec!["untrusted".to_owned(), "trusted".to_owned()];
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.is_valid, "{:?}", result.error);
}

#[test]
fn replayed_tokens_are_rejected() {
    let token = branca_token(&encrypting_descriptor());
    let mut params = params_with(key());
    params.replay_cache = Some(Arc::new(InMemoryReplayCache::new()));

    let handler = BrancaTokenHandler::default();
    assert!(handler.validate(&token, &params).is_valid);
    let result = handler.validate(&token, &params);
    assert_eq!(result.error, Some(opaque_tokens::Error::TokenReplayed));
}

#[test]
fn sign_in_token_is_attached_on_request() {
    let token = branca_token(&encrypting_descriptor());
    let mut params = params_with(key());
    params.save_sign_in_token = true;
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.is_valid);
    assert_eq!(result.sign_in_token.as_deref(), Some(token.as_str()));

    params.save_sign_in_token = false;
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.sign_in_token.is_none());
}

#[test]
fn resolver_overrides_the_configured_key_list() {
    let token = branca_token(&encrypting_descriptor());
    let handler = BrancaTokenHandler::default();

    let params = ValidationParameters {
        token_decryption_key_resolver: Some(Box::new(|_token| vec![Key::Symmetric(key())])),
        ..ValidationParameters::default()
    };
    assert!(handler.validate(&token, &params).is_valid);

    // a resolver that yields nothing wins over the configured list
    let params = ValidationParameters {
        token_decryption_keys: vec![Key::Symmetric(key())],
        token_decryption_key_resolver: Some(Box::new(|_token| Vec::new())),
        ..ValidationParameters::default()
    };
    let result = handler.validate(&token, &params);
    assert_eq!(
        result.error,
        Some(opaque_tokens::Error::NoValidDecryptionKey)
    );
}

#[test]
fn no_configured_keys_is_an_explicit_error() {
    let token = branca_token(&encrypting_descriptor());
    let result = BrancaTokenHandler::default().validate(&token, &ValidationParameters::default());
    assert_eq!(
        result.error,
        Some(opaque_tokens::Error::NoValidDecryptionKey)
    );
}

#[test]
fn later_keys_in_the_list_are_tried() {
    let wrong = SymmetricKey::from_bytes([0x55; 32]);
    let token = branca_token(&encrypting_descriptor());
    let params = ValidationParameters {
        token_decryption_keys: vec![Key::Symmetric(wrong), Key::Symmetric(key())],
        ..ValidationParameters::default()
    };
    let result = BrancaTokenHandler::default().validate(&token, &params);
    assert!(result.is_valid, "{:?}", result.error);
}

#[test]
fn empty_input_is_an_argument_error() {
    let params = params_with(key());
    for input in ["", "   "] {
        let result = BrancaTokenHandler::default().validate(input, &params);
        assert_eq!(result.error, Some(opaque_tokens::Error::ArgumentMissing));
        let result = PasetoTokenHandler::default().validate(input, &params);
        assert_eq!(result.error, Some(opaque_tokens::Error::ArgumentMissing));
    }
}

#[test]
fn non_object_payloads_fail_claims_parsing() {
    let token = branca::encrypt(b"[1,2,3]", &key()).unwrap();
    let result = BrancaTokenHandler::default().validate(&token, &params_with(key()));
    assert_eq!(result.error, Some(opaque_tokens::Error::MalformedClaims));
}

#[test]
fn additional_claims_survive_the_round_trip() {
    let mut extra = serde_json::Map::new();
    extra.insert("scope".to_owned(), serde_json::json!(["read", "write"]));
    let token = branca_token(&TokenDescriptor {
        claims: extra.clone(),
        ..encrypting_descriptor()
    });
    let result = BrancaTokenHandler::default().validate(&token, &params_with(key()));
    let claims = result.claims.unwrap();
    assert_eq!(claims.additional, extra);
}

#[test]
fn concurrent_validations_agree() {
    let token = branca_token(&TokenDescriptor {
        expires: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
        ..encrypting_descriptor()
    });
    let handler = BrancaTokenHandler::default();
    let params = params_with(key());

    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| handler.validate(&token, &params).is_valid))
            .collect();
        for worker in workers {
            assert!(worker.join().unwrap());
        }
    });
}

#[test]
fn paseto_validation_applies_the_same_pipeline() {
    let symmetric = SymmetricKey::generate(rand::thread_rng());
    let handler = PasetoTokenHandler::default();
    let token = handler
        .create(
            &TokenDescriptor {
                expires: Some(OffsetDateTime::now_utc() - Duration::seconds(1)),
                credentials: Some(Credentials::Encrypting(symmetric.clone())),
                ..TokenDescriptor::default()
            },
            Version::V2,
        )
        .unwrap();

    let params = ValidationParameters {
        token_decryption_keys: vec![Key::Symmetric(symmetric)],
        ..ValidationParameters::default()
    };
    let result = handler.validate(&token, &params);
    assert_eq!(result.error, Some(opaque_tokens::Error::TokenExpired));
}
