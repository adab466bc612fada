//! Process-lifetime seed and identity derivation.

use std::fmt;

use cardlobby_protocol::PlayerId;
use sha2::{Digest, Sha384};

/// Random value generated once per lobby process and mixed into every
/// [`PlayerId`].
///
/// The seed is not a credential. It only makes IDs unguessable from the
/// name alone and different across lobby restarts.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; 32]);

impl Seed {
    /// Draws a fresh seed from the thread-local RNG.
    pub fn generate() -> Self {
        let seed = Self(rand::random());
        tracing::debug!("generated identity seed");
        seed
    }

    /// Builds a seed from fixed bytes (tests and reproducible setups).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derives the opaque identity for `name`.
    ///
    /// The ID is the uppercase hex SHA-384 digest of the seed followed by
    /// the UTF-8 name, so it is deterministic for this seed and reveals
    /// nothing about the seed itself. It is recomputed on every call.
    pub fn derive_id(&self, name: &str) -> PlayerId {
        let mut hasher = Sha384::new();
        hasher.update(self.0);
        hasher.update(name.as_bytes());
        let digest = hasher.finalize();
        PlayerId(digest.iter().map(|b| format!("{b:02X}")).collect())
    }
}

// Never print the seed bytes.
impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}
