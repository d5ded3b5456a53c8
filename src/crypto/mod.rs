//! Cryptographic primitives, wrapped for the OpenPGP formats.

pub mod checksum;
pub mod elgamal;
pub mod hash;
pub mod public_key;
pub mod rsa;
pub mod sym;

use ::rsa::RsaPrivateKey;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::errors::{unsupported_err, Error, Result};
use crate::types::{Mpi, PublicParams};

/// Unlocked secret key material able to unwrap session keys.
#[derive(derive_more::Debug)]
pub enum DecryptionKey {
    Rsa(#[debug("..")] RsaPrivateKey),
    Elgamal(elgamal::SecretKey),
}

impl DecryptionKey {
    /// Recovers the encoded session key from the algorithm specific values of
    /// a PKESK packet.
    pub fn decrypt(&self, values: &[Mpi]) -> Result<Zeroizing<Vec<u8>>> {
        match (self, values) {
            (DecryptionKey::Rsa(key), [c]) => rsa::decrypt(key, c),
            (DecryptionKey::Elgamal(key), [first, second]) => key.decrypt(first, second),
            _ => Err(Error::DecryptionFailed {
                message: format!(
                    "session key packet carries {} values, not matching the key",
                    values.len()
                ),
            }),
        }
    }
}

/// Wraps `plaintext` to the given public parameters.
pub fn encrypt_session_key<R: CryptoRng + Rng>(
    rng: &mut R,
    params: &PublicParams,
    plaintext: &[u8],
) -> Result<Vec<Mpi>> {
    match params {
        PublicParams::RSA { n, e } => Ok(vec![rsa::encrypt(rng, n, e, plaintext)?]),
        PublicParams::Elgamal { p, g, y } => {
            let (first, second) = elgamal::encrypt(rng, p, g, y, plaintext)?;
            Ok(vec![first, second])
        }
        _ => unsupported_err!("encryption to {:?}", params),
    }
}
