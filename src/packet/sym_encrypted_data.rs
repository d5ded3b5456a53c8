use std::io::{self, BufRead};

use bytes::Bytes;
use rand::{CryptoRng, Rng};

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// Symmetrically Encrypted Data Packet, no integrity protection.
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-symmetrically-encrypted-dat>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SymEncryptedData {
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl SymEncryptedData {
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        Ok(SymEncryptedData {
            data: r.rest()?.freeze(),
        })
    }

    pub fn encrypt<R: CryptoRng + Rng>(
        rng: R,
        alg: SymmetricKeyAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Self> {
        Ok(SymEncryptedData {
            data: alg.encrypt(rng, key, plaintext)?.into(),
        })
    }

    pub fn decrypt(&self, alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Vec<u8>> {
        alg.decrypt(key, self.data.to_vec())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for SymEncryptedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for SymEncryptedData {
    fn tag(&self) -> Tag {
        Tag::SymEncryptedData
    }
}
