use std::io::Read;

use log::debug;

use crate::composed::key::{KeyRing, PublicKeyRing, SignedSubkey, TransferableKey};
use crate::crypto::DecryptionKey;
use crate::errors::{Error, Result};
use crate::packet::{self, PublicKey};
use crate::types::{KeyId, Password, SecretParams};

/// A key ring of secret keys, primaries and subkeys.
pub type SecretKeyRing = KeyRing<packet::SecretKey>;

/// An unlocked secret key, ready to unwrap session keys.
///
/// The secret material is scrubbed when this is dropped.
#[derive(Debug)]
pub struct PrivateKey {
    public: PublicKey,
    key: DecryptionKey,
}

impl PrivateKey {
    pub fn new(public: PublicKey, key: DecryptionKey) -> Self {
        PrivateKey { public, key }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn key_id(&self) -> KeyId {
        self.public.key_id()
    }

    pub fn decryption_key(&self) -> &DecryptionKey {
        &self.key
    }
}

fn has_secret_material(key: &packet::SecretKey) -> bool {
    match key.secret_params() {
        SecretParams::Plain(_) => true,
        SecretParams::Encrypted(enc) => !enc.is_dummy(),
    }
}

impl SecretKeyRing {
    /// Selects the first key, in ring order, that may decrypt and uses a
    /// supported algorithm, and unlocks it with `password`.
    ///
    /// Signing capabilities play no role in the selection.
    pub fn decryption_key(&self, password: &Password) -> Result<PrivateKey> {
        for entry in self.entries() {
            let key = entry.key;
            if !entry.flags.can_encrypt() {
                debug!("{} is not a decryption key", key.key_id());
                continue;
            }
            if !key.public_key().algorithm().is_supported_for_encryption() {
                debug!(
                    "{}: {:?} is not supported",
                    key.key_id(),
                    key.public_key().algorithm()
                );
                continue;
            }
            if !has_secret_material(key) {
                debug!("{} has no secret material", key.key_id());
                continue;
            }

            debug!("using {} for decryption", key.key_id());
            let unlocked = key.decryption_key(password)?;
            return Ok(PrivateKey::new(key.public_key().clone(), unlocked));
        }

        Err(Error::NoSecretKey)
    }

    /// The public part of every key, with the same user ids and signatures.
    pub fn to_public(&self) -> PublicKeyRing {
        let keys = self
            .keys()
            .iter()
            .map(|key| TransferableKey {
                primary: key.primary.public_key().clone(),
                direct_signatures: key.direct_signatures.clone(),
                users: key.users.clone(),
                subkeys: key
                    .subkeys
                    .iter()
                    .map(|sub| SignedSubkey {
                        key: sub.key.public_key().clone(),
                        signatures: sub.signatures.clone(),
                    })
                    .collect(),
            })
            .collect();

        KeyRing::new(keys)
    }
}

/// Reads a binary or armored secret key ring, selects its decryption key and
/// unlocks it.
pub fn load_private_key<R: Read>(key_ring: R, password: &Password) -> Result<PrivateKey> {
    let ring = SecretKeyRing::from_reader(key_ring)?;
    ring.decryption_key(password)
}
