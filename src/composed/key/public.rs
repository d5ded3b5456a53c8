use std::io::Read;

use log::debug;

use crate::composed::key::KeyRing;
use crate::errors::{Error, Result};
use crate::packet::PublicKey;

/// A key ring of public keys, primaries and subkeys.
pub type PublicKeyRing = KeyRing<PublicKey>;

impl PublicKeyRing {
    /// The first key, in ring order, that may be used for encryption and
    /// whose algorithm is supported for wrapping session keys.
    pub fn encryption_key(&self) -> Result<&PublicKey> {
        for entry in self.entries() {
            let alg = entry.key.algorithm();
            if !entry.flags.can_encrypt() {
                debug!("{} is not an encryption key", entry.key.key_id());
                continue;
            }
            if !alg.is_supported_for_encryption() {
                debug!("{}: {:?} is not supported", entry.key.key_id(), alg);
                continue;
            }

            debug!("using {} ({:?}) for encryption", entry.key.key_id(), alg);
            return Ok(entry.key);
        }

        Err(Error::NoEncryptionKey)
    }
}

/// Reads a binary or armored public key ring and selects its encryption key.
pub fn load_public_key<R: Read>(key_ring: R) -> Result<PublicKey> {
    let ring = PublicKeyRing::from_reader(key_ring)?;
    ring.encryption_key().cloned()
}
