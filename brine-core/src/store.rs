//! The token store.

use std::time::{SystemTime, UNIX_EPOCH};

use ciborium::Value;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::key::Secret;
use crate::rng::SaltRng;
use crate::token::Token;
use crate::version::Protocol;
use crate::{BrineError, base64, crypto, payload};

/// A stateless codec turning data values into authenticated, encrypted,
/// expiring token strings and back.
///
/// A store owns one encryption secret, an optional ordered list of old
/// decrypt-only secrets, and an optional default validity window. It carries
/// no per-token state: everything a token needs travels inside the token.
///
/// Decoding distinguishes two failure modes. Anything an attacker could have
/// produced (wrong shape, failed authentication, expiry) is reported as
/// `Ok(None)`, with no indication of which check failed. Failures *after* the
/// MAC has verified are errors, because a valid MAC proves the token was
/// produced by a holder of the secret.
///
/// Concurrent use from multiple threads is safe; the only interior mutability
/// is the salt generator, which locks only for the draw.
///
/// ```
/// use brine_core::{SecureStore, Value};
///
/// # fn main() -> Result<(), brine_core::BrineError> {
/// let store = SecureStore::builder("serenade viscount secretary frail").build()?;
///
/// let session = Value::Map(vec![(Value::Text("user".into()), Value::Text("ada".into()))]);
/// let token = store.encode(Some(session.clone()), None)?;
/// assert_eq!(store.decode(&token)?, Some(session));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SecureStore {
    secret: Secret,
    old_secrets: Vec<Secret>,
    default_duration: Option<u64>,
    protocol: Protocol,
    decode_legacy: bool,
    salts: SaltRng,
}

impl SecureStore {
    /// Start building a store around its encryption secret.
    pub fn builder(secret_key: impl Into<Vec<u8>>) -> SecureStoreBuilder {
        SecureStoreBuilder {
            secret_key: secret_key.into(),
            old_secrets: Vec::new(),
            default_duration: None,
            protocol: Protocol::default(),
            decode_legacy: false,
        }
    }

    /// Encode a value into a token.
    ///
    /// An absent value encodes as an empty map. When `expires` is absent the
    /// configured default duration (if any) applies; when it lies in the
    /// past, the token is emitted pre-expired and carries an empty map
    /// instead of the caller's data, so it reveals nothing even to a decoder
    /// with a skewed clock.
    pub fn encode(&self, data: Option<Value>, expires: Option<u64>) -> Result<String, BrineError> {
        self.encode_at(data, expires, unix_now())
    }

    /// [`encode`](Self::encode) against a caller-supplied clock.
    ///
    /// This is provided for testing purposes; everything else should read the
    /// system clock through [`encode`](Self::encode).
    pub fn encode_at(
        &self,
        data: Option<Value>,
        expires: Option<u64>,
        now: u64,
    ) -> Result<String, BrineError> {
        let mut data = data.unwrap_or_else(payload::empty_map);
        let expires = match expires {
            Some(at) if at < now => {
                data = payload::empty_map();
                Some(at)
            }
            Some(at) => Some(at),
            None => self.default_duration.map(|d| now.saturating_add(d)),
        };

        let salt = self.salts.next_salt()?.to_string();
        let key = crypto::derive_key(&self.secret, &salt);

        let plaintext = payload::freeze(&data)?;
        let envelope = crypto::encrypt(&key, &plaintext)?;

        let alphabet = self.protocol.alphabet();
        let ciphertext = base64::encode_string(&envelope, alphabet);
        let expires = expires.map_or_else(String::new, |at| at.to_string());
        let mac = base64::encode_string(
            &crypto::tag(&key, self.protocol, &salt, &expires, &ciphertext),
            alphabet,
        );

        Ok(Token {
            salt,
            expires,
            ciphertext,
            mac,
        }
        .to_string())
    }

    /// Decode a token back into its value.
    ///
    /// Returns `Ok(None)` for anything that fails before authentication
    /// succeeds, and for authentic-but-expired tokens. `Ok(None)` is distinct
    /// from a successfully decoded empty map.
    pub fn decode(&self, token: &str) -> Result<Option<Value>, BrineError> {
        self.decode_at(token, unix_now())
    }

    /// [`decode`](Self::decode) against a caller-supplied clock.
    ///
    /// This is provided for testing purposes; everything else should read the
    /// system clock through [`decode`](Self::decode).
    pub fn decode_at(&self, token: &str, now: u64) -> Result<Option<Value>, BrineError> {
        if token.is_empty() {
            return Ok(None);
        }
        let Ok(token) = token.parse::<Token>() else {
            return Ok(None);
        };

        // Authenticate before touching the ciphertext.
        let Some((key, protocol)) = self.verify(&token) else {
            return Ok(None);
        };

        if let Some(expires) = token.expires_at() {
            if expires < now {
                return Ok(None);
            }
        }

        let Some(envelope) = base64::decode_vec(&token.ciphertext, protocol.alphabet()) else {
            return Ok(None);
        };

        let plaintext = crypto::decrypt(&key, &envelope)?;
        payload::thaw(&plaintext).map(Some)
    }

    /// Serialize any `Serialize` value and encode it.
    ///
    /// Serde serialization never produces tagged nodes, so anything that
    /// serializes will also freeze.
    pub fn encode_data<T: Serialize>(
        &self,
        data: &T,
        expires: Option<u64>,
    ) -> Result<String, BrineError> {
        let value = Value::serialized(data)
            .map_err(|e| BrineError::PayloadError(std::io::Error::other(e)))?;
        self.encode(Some(value), expires)
    }

    /// Decode a token and deserialize its value.
    pub fn decode_data<T: DeserializeOwned>(&self, token: &str) -> Result<Option<T>, BrineError> {
        match self.decode(token)? {
            Some(value) => value
                .deserialized()
                .map(Some)
                .map_err(|e| BrineError::PayloadError(std::io::Error::other(e))),
            None => Ok(None),
        }
    }

    /// Try every enabled protocol in order and, within each, every secret in
    /// order (current first, then old secrets oldest-configured last). The
    /// MAC comparison is constant-time; the early exit on a match is fine,
    /// since which *deployment secret* matched is not per-user information.
    fn verify(&self, token: &Token) -> Option<([u8; 32], Protocol)> {
        for protocol in self.decode_protocols() {
            for secret in std::iter::once(&self.secret).chain(self.old_secrets.iter()) {
                let key = crypto::derive_key(secret, &token.salt);
                let expected = base64::encode_string(
                    &crypto::tag(
                        &key,
                        protocol,
                        &token.salt,
                        &token.expires,
                        &token.ciphertext,
                    ),
                    protocol.alphabet(),
                );
                if crypto::verify_tag(&expected, &token.mac) {
                    return Some((key, protocol));
                }
            }
        }
        None
    }

    fn decode_protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        let legacy = self.decode_legacy.then(|| self.protocol.other());
        std::iter::once(self.protocol).chain(legacy)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Configuration for a [`SecureStore`].
///
/// Secrets are validated when [`build`](Self::build) runs; everything else
/// has a default.
#[derive(Debug)]
pub struct SecureStoreBuilder {
    secret_key: Vec<u8>,
    old_secrets: Vec<Vec<u8>>,
    default_duration: Option<u64>,
    protocol: Protocol,
    decode_legacy: bool,
}

impl SecureStoreBuilder {
    /// Old secrets the store may still decode under, ordered most recent
    /// first. They are never used for encoding.
    pub fn old_secrets<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        self.old_secrets = secrets.into_iter().map(Into::into).collect();
        self
    }

    /// Validity window, in seconds, applied when `encode` is called without
    /// an explicit expiration.
    pub fn default_duration(mut self, seconds: u64) -> Self {
        self.default_duration = Some(seconds);
        self
    }

    /// The wire-format version to encode under. Defaults to the current one.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Also attempt decoding under the other wire-format version, after the
    /// configured one. Defaults to off.
    pub fn decode_legacy(mut self, enabled: bool) -> Self {
        self.decode_legacy = enabled;
        self
    }

    /// Validate the secrets and build the store.
    pub fn build(self) -> Result<SecureStore, BrineError> {
        Ok(SecureStore {
            secret: Secret::new(&self.secret_key)?,
            old_secrets: self
                .old_secrets
                .iter()
                .map(Secret::new)
                .collect::<Result<_, _>>()?,
            default_duration: self.default_duration,
            protocol: self.protocol,
            decode_legacy: self.decode_legacy,
            salts: SaltRng::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SecureStore {
        SecureStore::builder("serenade viscount secretary frail")
            .build()
            .unwrap()
    }

    fn session() -> Value {
        Value::Map(vec![
            (Value::Text("foo".into()), Value::Text("bar".into())),
            (Value::Text("baz".into()), Value::Text("bam".into())),
        ])
    }

    #[test]
    fn round_trips_a_session_map() {
        let store = store();
        let token = store.encode(Some(session()), None).unwrap();
        assert_eq!(store.decode(&token).unwrap(), Some(session()));
    }

    #[test]
    fn absent_data_becomes_an_empty_map() {
        let store = store();
        let token = store.encode(None, None).unwrap();
        // distinguishable from the silent-rejection result
        assert_eq!(store.decode(&token).unwrap(), Some(payload::empty_map()));
    }

    #[test]
    fn builder_rejects_empty_secrets() {
        assert!(matches!(
            SecureStore::builder("").build(),
            Err(BrineError::InvalidKey)
        ));
        assert!(matches!(
            SecureStore::builder("k").old_secrets([""]).build(),
            Err(BrineError::InvalidKey)
        ));
    }

    #[test]
    fn garbage_is_silently_rejected() {
        let store = store();
        for junk in [
            "",
            "~~~",
            "not a token",
            "1~2~3",
            "1~~YQ~YQ",
            "99999999999~~YQ~YQ",
            "1~later~YQ~YQ",
        ] {
            assert_eq!(store.decode(junk).unwrap(), None, "token {junk:?}");
        }
    }

    #[test]
    fn tokens_differ_across_encodes_of_the_same_value() {
        let store = store();
        let a = store.encode(Some(session()), None).unwrap();
        let b = store.encode(Some(session()), None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn serde_helpers_round_trip() {
        let store = store();
        let token = store
            .encode_data(&vec!["one".to_string(), "two".to_string()], None)
            .unwrap();
        let decoded: Option<Vec<String>> = store.decode_data(&token).unwrap();
        assert_eq!(decoded.unwrap(), ["one", "two"]);
    }
}
