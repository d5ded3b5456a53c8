use std::io::{self, BufRead};

use bytes::Bytes;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{PacketTrait, SignatureType};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Tag};

/// One-Pass Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-one-pass-signature-packet-t>
///
/// Parsed only so signed content can be recognized and rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnePassSignature {
    V3 {
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
        last: u8,
    },
    Other {
        version: u8,
        raw: Bytes,
    },
}

impl OnePassSignature {
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        Self::parse(&mut r).map_err(|err| err.into_malformed("one pass signature"))
    }

    fn parse<R: BufRead>(r: &mut R) -> Result<Self> {
        let version = r.read_u8()?;
        if version != 3 {
            return Ok(OnePassSignature::Other {
                version,
                raw: r.rest()?.freeze(),
            });
        }

        let typ = SignatureType::from(r.read_u8()?);
        let hash_algorithm = HashAlgorithm::from(r.read_u8()?);
        let pub_algorithm = PublicKeyAlgorithm::from(r.read_u8()?);
        let key_id = KeyId::new(r.read_array::<8>()?);
        let last = r.read_u8()?;

        Ok(OnePassSignature::V3 {
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last,
        })
    }

    pub fn key_id(&self) -> Option<&KeyId> {
        match self {
            OnePassSignature::V3 { key_id, .. } => Some(key_id),
            OnePassSignature::Other { .. } => None,
        }
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            OnePassSignature::V3 {
                typ,
                hash_algorithm,
                pub_algorithm,
                key_id,
                last,
            } => {
                writer.write_all(&[
                    3,
                    (*typ).into(),
                    (*hash_algorithm).into(),
                    (*pub_algorithm).into(),
                ])?;
                writer.write_all(key_id.as_ref())?;
                writer.write_all(&[*last])?;
            }
            OnePassSignature::Other { version, raw } => {
                writer.write_all(&[*version])?;
                writer.write_all(raw)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            OnePassSignature::V3 { .. } => 13,
            OnePassSignature::Other { raw, .. } => 1 + raw.len(),
        }
    }
}

impl PacketTrait for OnePassSignature {
    fn tag(&self) -> Tag {
        Tag::OnePassSignature
    }
}
