//! Secret key material.

use core::fmt;

use zeroize::Zeroize;

use crate::BrineError;

/// A master secret held by a store.
///
/// The secret is an opaque byte string of any non-zero length. It is never
/// compared against user input and never derived from; its only use is as the
/// HMAC key of the per-token key derivation. `Debug` is redacted so the
/// material cannot reach a log sink by accident, and the bytes are wiped on
/// drop.
#[derive(Clone)]
pub struct Secret(Box<[u8]>);

impl Secret {
    /// Wrap secret bytes, rejecting an empty secret.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, BrineError> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(BrineError::InvalidKey);
        }
        Ok(Secret(bytes.into()))
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}
