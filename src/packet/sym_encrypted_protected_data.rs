use std::io::{self, BufRead};

use bytes::Bytes;
use rand::{CryptoRng, Rng};

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Error, Result};
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// Symmetrically Encrypted Integrity Protected Data Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-symmetrically-encrypted-and>
///
/// Version 1 is the CFB based variant terminated by a modification
/// detection code.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SymEncryptedProtectedData {
    version: u8,
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl SymEncryptedProtectedData {
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let version = r
            .read_u8()
            .map_err(|err| Error::from(err).into_malformed("protected data"))?;
        Ok(SymEncryptedProtectedData {
            version,
            data: r.rest()?.freeze(),
        })
    }

    pub fn encrypt<R: CryptoRng + Rng>(
        rng: R,
        alg: SymmetricKeyAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Self> {
        Ok(SymEncryptedProtectedData {
            version: 1,
            data: alg.encrypt_protected(rng, key, plaintext)?.into(),
        })
    }

    /// Decrypts and verifies the MDC, nothing is returned on failure.
    pub fn decrypt(&self, alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Vec<u8>> {
        if self.version != 1 {
            unsupported_err!("SEIPD version {}", self.version);
        }
        alg.decrypt_protected(key, self.data.to_vec())
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for SymEncryptedProtectedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.version])?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.data.len()
    }
}

impl PacketTrait for SymEncryptedProtectedData {
    fn tag(&self) -> Tag {
        Tag::SymEncryptedProtectedData
    }
}
