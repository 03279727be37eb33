//! Self-contained, authenticated, encrypted, expiring data tokens.
//!
//! A [`SecureStore`] turns a plain data value into a single opaque string
//! (salt, expiration, AES-CBC ciphertext and HMAC, framed with `~`) and turns
//! such strings back into data while enforcing integrity and freshness. The
//! canonical use is browser-cookie session storage where the server keeps no
//! per-session state.

pub mod base64;
pub mod crypto;
pub mod key;
pub mod payload;
pub mod token;
pub mod version;

mod rng;
mod store;

pub use ciborium;
pub use ciborium::Value;

pub use crate::key::Secret;
pub use crate::store::{SecureStore, SecureStoreBuilder};
pub use crate::token::Token;
pub use crate::version::Protocol;

#[derive(Debug)]
#[non_exhaustive]
/// Error returned for all fatal token operations.
///
/// Decoding a malformed or inauthentic token is *not* an error: the store
/// reports it as an absent value. These variants cover construction mistakes
/// and failures that can only happen on a trusted path.
pub enum BrineError {
    /// A secret key was empty.
    InvalidKey,
    /// The token string did not match the four-field wire grammar.
    InvalidToken,
    /// The operating system entropy source was unreadable.
    EntropyError,
    /// Could not decrypt an authenticated payload.
    CryptoError,
    /// The payload contained a tagged object, which this codec refuses to
    /// carry in either direction.
    TaggedValue,
    /// There was an error with payload processing.
    PayloadError(std::io::Error),
}

impl std::error::Error for BrineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrineError::PayloadError(x) => Some(x),
            _ => None,
        }
    }
}

impl std::fmt::Display for BrineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrineError::InvalidKey => f.write_str("The secret key must not be empty"),
            BrineError::InvalidToken => f.write_str("Could not parse the token"),
            BrineError::EntropyError => f.write_str("The OS entropy source was unreadable"),
            BrineError::CryptoError => f.write_str("Could not decrypt the authenticated payload"),
            BrineError::TaggedValue => f.write_str("Refusing to carry a tagged object"),
            BrineError::PayloadError(x) => {
                write!(f, "there was an error with the payload encoding: {x}")
            }
        }
    }
}
