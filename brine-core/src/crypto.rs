//! Cryptographic primitives for the token construction.
//!
//! This is a low level detail used to build the store; the operations here
//! perform no policy. The per-token key is derived from the secret and the
//! wire salt, and is used both to encrypt the payload and to authenticate the
//! wire fields.

use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::BrineError;
use crate::key::Secret;
use crate::version::{Protocol, WriteBytes};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Length of the initialization vector prepended to the ciphertext.
pub const IV_LEN: usize = 16;
/// Length of the authentication tag before base64 encoding.
pub const TAG_LEN: usize = 32;

const BLOCK_LEN: usize = 16;

/// Derive the per-token key: HMAC-SHA-256 of the decimal-ASCII salt exactly
/// as it appears on the wire, keyed by the secret.
pub fn derive_key(secret: &Secret, salt: &str) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(secret.expose()).expect("hmac accepts keys of any length");
    mac.update(salt.as_bytes());
    mac.finalize().into_bytes().into()
}

/// Encrypt a payload under a fresh random IV. Returns `IV || ciphertext`.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, BrineError> {
    let mut iv = [0u8; IV_LEN];
    getrandom::fill(&mut iv).map_err(|_| BrineError::EntropyError)?;
    Ok(encrypt_with_iv(key, &iv, plaintext))
}

/// Encrypt with a caller-chosen IV.
///
/// This is provided for deterministic tests only; use [`encrypt`] everywhere
/// else.
pub fn encrypt_with_iv(key: &[u8; 32], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    let ciphertext =
        Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut envelope = Vec::with_capacity(IV_LEN + ciphertext.len());
    envelope.extend_from_slice(iv);
    envelope.extend_from_slice(&ciphertext);
    envelope
}

/// Decrypt an `IV || ciphertext` envelope.
///
/// Callers verify the MAC first, so a failure here means the envelope was
/// produced by a party holding the secret and is nevertheless corrupt; it is
/// reported as an error, not as a rejection.
pub fn decrypt(key: &[u8; 32], envelope: &[u8]) -> Result<Vec<u8>, BrineError> {
    if envelope.len() < IV_LEN + BLOCK_LEN || (envelope.len() - IV_LEN) % BLOCK_LEN != 0 {
        return Err(BrineError::CryptoError);
    }

    let (iv, ciphertext) = envelope
        .split_first_chunk::<IV_LEN>()
        .ok_or(BrineError::CryptoError)?;

    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| BrineError::CryptoError)
}

/// Compute the authentication tag over a token's wire fields.
pub fn tag(
    key: &[u8; 32],
    protocol: Protocol,
    salt: &str,
    expires: &str,
    ciphertext: &str,
) -> [u8; TAG_LEN] {
    struct Context<'a>(&'a mut HmacSha256);
    impl WriteBytes for Context<'_> {
        fn write(&mut self, slice: &[u8]) {
            self.0.update(slice);
        }
    }

    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    protocol.mac_message(salt, expires, ciphertext, Context(&mut mac));
    mac.finalize().into_bytes().into()
}

/// Compare the expected and presented MAC fields without short-circuiting on
/// the first differing byte.
pub fn verify_tag(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
