//! v2 strategies: XChaCha20-Poly1305 for `local`, Ed25519 for `public`.

use blake2::Blake2bMac;
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};
use digest::Mac;
use ed25519_dalek::{Signer, Verifier};
use generic_array::typenum::U24;
use rand::{CryptoRng, RngCore};

use crate::key::SymmetricKey;
use crate::pae::pae_vec;
use crate::Error;

const HEADER_LOCAL: &str = "v2.local.";
const HEADER_PUBLIC: &str = "v2.public.";

const NONCE_BYTES: usize = 24;
const TAG_BYTES: usize = 16;
const SIGNATURE_BYTES: usize = 64;

/// Body layout: `nonce(24) || ciphertext || tag(16)`.
pub(super) fn encrypt(
    key: &SymmetricKey,
    message: &[u8],
    footer: &[u8],
    mut rng: impl CryptoRng + RngCore,
) -> Result<Vec<u8>, Error> {
    let mut nonce_key = [0u8; NONCE_BYTES];
    rng.fill_bytes(&mut nonce_key);
    seal_with_nonce_key(key, message, footer, &nonce_key)
}

/// The wire nonce is `Blake2bMac(key = nonce_key, msg = message)`, not the
/// raw RNG output.
pub(super) fn seal_with_nonce_key(
    key: &SymmetricKey,
    message: &[u8],
    footer: &[u8],
    nonce_key: &[u8; NONCE_BYTES],
) -> Result<Vec<u8>, Error> {
    let mut derive = <Blake2bMac<U24> as Mac>::new_from_slice(nonce_key)
        .expect("24 bytes is within the blake2b key limit");
    derive.update(message);
    let nonce: [u8; NONCE_BYTES] = derive.finalize().into_bytes().into();

    let aad = pae_vec(&[HEADER_LOCAL.as_bytes(), &nonce, footer]);
    let mut ciphertext = message.to_vec();
    let tag = XChaCha20Poly1305::new(key.as_bytes().into())
        .encrypt_in_place_detached((&nonce).into(), &aad, &mut ciphertext)
        .map_err(|_| Error::Internal)?;

    let mut body = Vec::with_capacity(NONCE_BYTES + ciphertext.len() + TAG_BYTES);
    body.extend_from_slice(&nonce);
    body.append(&mut ciphertext);
    body.extend_from_slice(&tag);
    Ok(body)
}

pub(super) fn decrypt(key: &SymmetricKey, body: &[u8], footer: &[u8]) -> Result<Vec<u8>, Error> {
    if body.len() < NONCE_BYTES + TAG_BYTES {
        return Err(Error::MalformedToken);
    }
    let (nonce, rest) = body.split_at(NONCE_BYTES);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_BYTES);
    let nonce: &[u8; NONCE_BYTES] = nonce.try_into().expect("split at the nonce length");
    let tag: &[u8; TAG_BYTES] = tag.try_into().expect("split at the tag length");

    let aad = pae_vec(&[HEADER_LOCAL.as_bytes(), nonce, footer]);
    let mut message = ciphertext.to_vec();
    XChaCha20Poly1305::new(key.as_bytes().into())
        .decrypt_in_place_detached(nonce.into(), &aad, &mut message, tag.into())
        .map_err(|_| Error::DecryptionFailed)?;

    Ok(message)
}

/// Body layout: `message || signature(64)`.
pub(super) fn sign(key: &ed25519_dalek::SigningKey, message: &[u8], footer: &[u8]) -> Vec<u8> {
    let signed = pae_vec(&[HEADER_PUBLIC.as_bytes(), message, footer]);
    let signature = key.sign(&signed);

    let mut body = Vec::with_capacity(message.len() + SIGNATURE_BYTES);
    body.extend_from_slice(message);
    body.extend_from_slice(&signature.to_bytes());
    body
}

pub(super) fn verify(
    key: &ed25519_dalek::VerifyingKey,
    body: &[u8],
    footer: &[u8],
) -> Result<Vec<u8>, Error> {
    if body.len() < SIGNATURE_BYTES {
        return Err(Error::BadSignature);
    }
    let (message, signature) = body.split_at(body.len() - SIGNATURE_BYTES);
    let signature = ed25519_dalek::Signature::from_bytes(
        signature.try_into().expect("split at the signature length"),
    );

    let signed = pae_vec(&[HEADER_PUBLIC.as_bytes(), message, footer]);
    key.verify(&signed, &signature)
        .map_err(|_| Error::BadSignature)?;

    Ok(message.to_vec())
}
