//! v1 strategies: AES-256-CTR + HMAC-SHA-384 for `local`, RSA-PSS for
//! `public`.

use cipher::{KeyIvInit, StreamCipher};
use digest::{Digest, Mac};
use rand::{CryptoRng, RngCore};
use rsa::pss;
use rsa::signature::{DigestVerifier, RandomizedDigestSigner};
use rsa::traits::PublicKeyParts;
use zeroize::Zeroize;

use crate::key::{SymmetricKey, RSA_MODULUS_BITS};
use crate::pae::{pre_auth_encode, DigestSink, MacSink};
use crate::Error;

const HEADER_LOCAL: &str = "v1.local.";
const HEADER_PUBLIC: &str = "v1.public.";

const SALT_BYTES: usize = 16;
const IV_BYTES: usize = 16;
const NONCE_BYTES: usize = SALT_BYTES + IV_BYTES;
const MAC_BYTES: usize = 48;
const SIGNATURE_BYTES: usize = 256;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
type HmacSha384 = hmac::Hmac<sha2::Sha384>;

/// Split the 32-byte master key into an encryption key and an auth key,
/// domain-separated through HKDF-SHA-384 with the salt half of the nonce.
fn derive_keys(key: &SymmetricKey, salt: &[u8]) -> ([u8; 32], [u8; 32]) {
    let kdf = hkdf::Hkdf::<sha2::Sha384>::new(Some(salt), key.as_bytes());
    let mut ek = [0u8; 32];
    let mut ak = [0u8; 32];
    kdf.expand(b"paseto-encryption-key", &mut ek)
        .expect("32 bytes is a valid hkdf-sha384 output length");
    kdf.expand(b"paseto-auth-key-for-aead", &mut ak)
        .expect("32 bytes is a valid hkdf-sha384 output length");
    (ek, ak)
}

fn auth_mac(ak: &[u8], nonce: &[u8], ciphertext: &[u8], footer: &[u8]) -> HmacSha384 {
    let mut mac =
        HmacSha384::new_from_slice(ak).expect("any key length is valid for hmac");
    pre_auth_encode(
        &[HEADER_LOCAL.as_bytes(), nonce, ciphertext, footer],
        &mut MacSink(&mut mac),
    );
    mac
}

/// Body layout: `nonce(32) || ciphertext || mac(48)` where the nonce is
/// `salt(16) || iv(16)`.
pub(super) fn encrypt(
    key: &SymmetricKey,
    message: &[u8],
    footer: &[u8],
    mut rng: impl CryptoRng + RngCore,
) -> Result<Vec<u8>, Error> {
    let mut nonce = [0u8; NONCE_BYTES];
    rng.fill_bytes(&mut nonce);
    seal_with_nonce(key, message, footer, &nonce)
}

pub(super) fn seal_with_nonce(
    key: &SymmetricKey,
    message: &[u8],
    footer: &[u8],
    nonce: &[u8; NONCE_BYTES],
) -> Result<Vec<u8>, Error> {
    let (salt, iv) = nonce.split_at(SALT_BYTES);
    let iv: &[u8; IV_BYTES] = iv.try_into().expect("split at the salt length");
    let (mut ek, mut ak) = derive_keys(key, salt);

    let mut ciphertext = message.to_vec();
    Aes256Ctr::new((&ek).into(), iv.into()).apply_keystream(&mut ciphertext);

    let mac = auth_mac(&ak, nonce, &ciphertext, footer).finalize().into_bytes();
    ek.zeroize();
    ak.zeroize();

    let mut body = Vec::with_capacity(NONCE_BYTES + ciphertext.len() + MAC_BYTES);
    body.extend_from_slice(nonce);
    body.append(&mut ciphertext);
    body.extend_from_slice(&mac);
    Ok(body)
}

pub(super) fn decrypt(key: &SymmetricKey, body: &[u8], footer: &[u8]) -> Result<Vec<u8>, Error> {
    if body.len() < NONCE_BYTES + MAC_BYTES {
        return Err(Error::MalformedToken);
    }
    let (nonce, rest) = body.split_at(NONCE_BYTES);
    let (ciphertext, mac) = rest.split_at(rest.len() - MAC_BYTES);
    let (salt, iv) = nonce.split_at(SALT_BYTES);
    let iv: &[u8; IV_BYTES] = iv.try_into().expect("split at the salt length");

    let (mut ek, mut ak) = derive_keys(key, salt);

    // verify_slice compares in constant time; the ciphertext must never be
    // touched on a MAC mismatch
    let verified = auth_mac(&ak, nonce, ciphertext, footer)
        .verify_slice(mac)
        .is_ok();
    ak.zeroize();
    if !verified {
        ek.zeroize();
        return Err(Error::DecryptionFailed);
    }

    let mut message = ciphertext.to_vec();
    Aes256Ctr::new((&ek).into(), iv.into()).apply_keystream(&mut message);
    ek.zeroize();
    Ok(message)
}

fn preauth_digest(message: &[u8], footer: &[u8]) -> sha2::Sha384 {
    let mut digest = sha2::Sha384::new();
    pre_auth_encode(
        &[HEADER_PUBLIC.as_bytes(), message, footer],
        &mut DigestSink(&mut digest),
    );
    digest
}

/// Body layout: `message || signature(256)`. RSA-PSS over SHA-384 with
/// MGF1-SHA-384 and a 48-byte salt; the modulus is pinned to 2048 bits.
pub(super) fn sign(
    key: &rsa::RsaPrivateKey,
    message: &[u8],
    footer: &[u8],
    mut rng: impl CryptoRng + RngCore,
) -> Result<Vec<u8>, Error> {
    if key.n().bits() != RSA_MODULUS_BITS {
        return Err(Error::InvalidKey);
    }

    let signer = pss::SigningKey::<sha2::Sha384>::new(key.clone());
    let signature = signer
        .try_sign_digest_with_rng(&mut rng, preauth_digest(message, footer))
        .map_err(|_| Error::Internal)?;
    let signature: Box<[u8]> = signature.into();

    let mut body = Vec::with_capacity(message.len() + SIGNATURE_BYTES);
    body.extend_from_slice(message);
    body.extend_from_slice(&signature);
    Ok(body)
}

pub(super) fn verify(
    key: &rsa::RsaPublicKey,
    body: &[u8],
    footer: &[u8],
) -> Result<Vec<u8>, Error> {
    if key.n().bits() != RSA_MODULUS_BITS {
        return Err(Error::InvalidKey);
    }
    if body.len() < SIGNATURE_BYTES {
        return Err(Error::BadSignature);
    }
    let (message, signature) = body.split_at(body.len() - SIGNATURE_BYTES);
    let signature = pss::Signature::try_from(signature).map_err(|_| Error::BadSignature)?;

    pss::VerifyingKey::<sha2::Sha384>::new(key.clone())
        .verify_digest(preauth_digest(message, footer), &signature)
        .map_err(|_| Error::BadSignature)?;

    Ok(message.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_round_trip_with_fixed_nonce() {
        let key = SymmetricKey::from_bytes([5u8; 32]);
        let nonce = [0x24u8; NONCE_BYTES];
        let body = seal_with_nonce(&key, b"v1 message", b"f", &nonce).unwrap();
        assert_eq!(&body[..NONCE_BYTES], &nonce);
        assert_eq!(decrypt(&key, &body, b"f").unwrap(), b"v1 message");
    }

    #[test]
    fn mac_is_checked_before_decryption() {
        let key = SymmetricKey::from_bytes([5u8; 32]);
        let body = seal_with_nonce(&key, b"v1 message", b"", &[1u8; NONCE_BYTES]).unwrap();
        // one byte from each region: nonce, ciphertext, mac
        for index in [5, NONCE_BYTES, body.len() - 1] {
            let mut corrupted = body.clone();
            corrupted[index] ^= 0x01;
            assert_eq!(
                decrypt(&key, &corrupted, b"").unwrap_err(),
                Error::DecryptionFailed,
                "byte {index}"
            );
        }
    }

    #[test]
    fn short_bodies_are_malformed() {
        let key = SymmetricKey::from_bytes([5u8; 32]);
        assert_eq!(
            decrypt(&key, &[0u8; NONCE_BYTES + MAC_BYTES - 1], b"").unwrap_err(),
            Error::MalformedToken
        );
    }
}
