//! Per-store salt generation.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::BrineError;

/// Source of per-token salts.
///
/// A cryptographic stream generator seeded from the operating system's
/// entropy source on first use. The salt only needs to be unique across
/// tokens with overwhelming probability; it is not a key, so a seeded stream
/// generator is sufficient and avoids a system call per token.
///
/// The generator is owned by a single store and never shared across stores.
/// The mutex is held only for the draw, keeping concurrent encodes safe.
pub(crate) struct SaltRng(Mutex<Option<StdRng>>);

impl SaltRng {
    pub(crate) const fn new() -> Self {
        SaltRng(Mutex::new(None))
    }

    /// Draw a fresh 32-bit salt, seeding the generator if this is the first
    /// draw. Fails only if the OS entropy source is unreadable.
    pub(crate) fn next_salt(&self) -> Result<u32, BrineError> {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let rng = match &mut *guard {
            Some(rng) => rng,
            unseeded => {
                let mut seed = [0u8; 32];
                getrandom::fill(&mut seed).map_err(|_| BrineError::EntropyError)?;
                unseeded.insert(StdRng::from_seed(seed))
            }
        };
        Ok(rng.next_u32())
    }
}

impl std::fmt::Debug for SaltRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SaltRng")
    }
}

#[cfg(test)]
mod tests {
    use super::SaltRng;

    #[test]
    fn salts_are_distinct() {
        let rng = SaltRng::new();
        let salts: Vec<u32> = (0..32).map(|_| rng.next_salt().unwrap()).collect();

        let mut deduped = salts.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), salts.len());
    }

    #[test]
    fn generators_are_independent_per_store() {
        let a = SaltRng::new();
        let b = SaltRng::new();
        assert_ne!(
            (0..4).map(|_| a.next_salt().unwrap()).collect::<Vec<_>>(),
            (0..4).map(|_| b.next_salt().unwrap()).collect::<Vec<_>>(),
        );
    }
}
