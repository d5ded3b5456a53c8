use std::io::{self, BufRead};

use bytes::Bytes;
use log::debug;

use crate::errors::Result;
use crate::packet::{
    CompressedData, LiteralData, Marker, OnePassSignature, PacketHeader, PacketTrait, PublicKey,
    PublicKeyEncryptedSessionKey, PublicSubkey, SecretKey, SecretSubkey, Signature,
    SymEncryptedData, SymEncryptedProtectedData, UserId,
};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;
use crate::util::impl_try_from_into;

/// Represents a Packet. A packet is the record structure used to encode a chunk of data in OpenPGP.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-packet-syntax>
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    CompressedData(CompressedData),
    PublicKey(PublicKey),
    PublicSubkey(PublicSubkey),
    SecretKey(SecretKey),
    SecretSubkey(SecretSubkey),
    LiteralData(LiteralData),
    Marker(Marker),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    UserId(UserId),
    /// Any packet type without typed support, body kept as is.
    Unknown { tag: Tag, body: Bytes },
}

impl_try_from_into!(
    Packet,
    CompressedData => CompressedData,
    PublicKey => PublicKey,
    PublicSubkey => PublicSubkey,
    SecretKey => SecretKey,
    SecretSubkey => SecretSubkey,
    LiteralData => LiteralData,
    Marker => Marker,
    OnePassSignature => OnePassSignature,
    PublicKeyEncryptedSessionKey => PublicKeyEncryptedSessionKey,
    Signature => Signature,
    SymEncryptedData => SymEncryptedData,
    SymEncryptedProtectedData => SymEncryptedProtectedData,
    UserId => UserId
);

impl Packet {
    /// Parses the body of a packet described by `header`.
    pub fn from_reader<R: BufRead>(header: PacketHeader, mut body: R) -> Result<Self> {
        debug!("parsing packet {:?}", header);

        let packet = match header.tag() {
            Tag::PublicKeyEncryptedSessionKey => {
                PublicKeyEncryptedSessionKey::try_from_reader(body)?.into()
            }
            Tag::Signature => Signature::try_from_reader(body)?.into(),
            Tag::OnePassSignature => OnePassSignature::try_from_reader(body)?.into(),
            Tag::SecretKey => SecretKey::try_from_reader(body)?.into(),
            Tag::PublicKey => PublicKey::try_from_reader(body)?.into(),
            Tag::SecretSubkey => SecretSubkey::try_from_reader(body)?.into(),
            Tag::PublicSubkey => PublicSubkey::try_from_reader(body)?.into(),
            Tag::CompressedData => CompressedData::try_from_reader(body)?.into(),
            Tag::SymEncryptedData => SymEncryptedData::try_from_reader(body)?.into(),
            Tag::Marker => Marker::try_from_reader(body)?.into(),
            Tag::LiteralData => LiteralData::try_from_reader(body)?.into(),
            Tag::UserId => UserId::try_from_reader(body)?.into(),
            Tag::SymEncryptedProtectedData => {
                SymEncryptedProtectedData::try_from_reader(body)?.into()
            }
            tag => Packet::Unknown {
                tag,
                body: body.rest()?.freeze(),
            },
        };

        Ok(packet)
    }
}

impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::CompressedData(p) => p.to_writer(writer),
            Self::PublicKey(p) => p.to_writer(writer),
            Self::PublicSubkey(p) => p.to_writer(writer),
            Self::SecretKey(p) => p.to_writer(writer),
            Self::SecretSubkey(p) => p.to_writer(writer),
            Self::LiteralData(p) => p.to_writer(writer),
            Self::Marker(p) => p.to_writer(writer),
            Self::OnePassSignature(p) => p.to_writer(writer),
            Self::PublicKeyEncryptedSessionKey(p) => p.to_writer(writer),
            Self::Signature(p) => p.to_writer(writer),
            Self::SymEncryptedData(p) => p.to_writer(writer),
            Self::SymEncryptedProtectedData(p) => p.to_writer(writer),
            Self::UserId(p) => p.to_writer(writer),
            Self::Unknown { body, .. } => {
                writer.write_all(body)?;
                Ok(())
            }
        }
    }

    fn write_len(&self) -> usize {
        match self {
            Self::CompressedData(p) => p.write_len(),
            Self::PublicKey(p) => p.write_len(),
            Self::PublicSubkey(p) => p.write_len(),
            Self::SecretKey(p) => p.write_len(),
            Self::SecretSubkey(p) => p.write_len(),
            Self::LiteralData(p) => p.write_len(),
            Self::Marker(p) => p.write_len(),
            Self::OnePassSignature(p) => p.write_len(),
            Self::PublicKeyEncryptedSessionKey(p) => p.write_len(),
            Self::Signature(p) => p.write_len(),
            Self::SymEncryptedData(p) => p.write_len(),
            Self::SymEncryptedProtectedData(p) => p.write_len(),
            Self::UserId(p) => p.write_len(),
            Self::Unknown { body, .. } => body.len(),
        }
    }
}

impl PacketTrait for Packet {
    fn tag(&self) -> Tag {
        match self {
            Self::CompressedData(p) => p.tag(),
            Self::PublicKey(p) => p.tag(),
            Self::PublicSubkey(p) => p.tag(),
            Self::SecretKey(p) => p.tag(),
            Self::SecretSubkey(p) => p.tag(),
            Self::LiteralData(p) => p.tag(),
            Self::Marker(p) => p.tag(),
            Self::OnePassSignature(p) => p.tag(),
            Self::PublicKeyEncryptedSessionKey(p) => p.tag(),
            Self::Signature(p) => p.tag(),
            Self::SymEncryptedData(p) => p.tag(),
            Self::SymEncryptedProtectedData(p) => p.tag(),
            Self::UserId(p) => p.tag(),
            Self::Unknown { tag, .. } => *tag,
        }
    }
}
