use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use digest::DynDigest;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use ::rsa::RsaPrivateKey;

use crate::crypto::hash::{HashAlgorithm, WriteHasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::errors::{ensure, malformed, Result};
use crate::packet::{PacketTrait, PublicKey, UserId};
use crate::parsing_reader::BufReadParsing;
use crate::ser::{timestamp_to_u32, u32_to_timestamp, Serialize};
use crate::types::{Fingerprint, KeyFlags, KeyId, Tag};

/// Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-signature-packet-type-id-2>
///
/// Only version 4 signatures are parsed into their parts, everything else is
/// carried as raw bytes. Signatures are never verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    V4 {
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: Bytes,
    },
    Other {
        version: u8,
        raw: Bytes,
    },
}

/// Signature type ID
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-signature-types>
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum SignatureType {
    Binary = 0x00,
    Text = 0x01,
    Standalone = 0x02,
    CertGeneric = 0x10,
    CertPersona = 0x11,
    CertCasual = 0x12,
    CertPositive = 0x13,
    SubkeyBinding = 0x18,
    KeyBinding = 0x19,
    Key = 0x1F,
    KeyRevocation = 0x20,
    SubkeyRevocation = 0x28,
    CertRevocation = 0x30,
    Timestamp = 0x40,
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

impl SignatureType {
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
        )
    }
}

/// Signature subpacket types this crate looks at.
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum SubpacketType {
    SignatureCreationTime = 2,
    SignatureExpirationTime = 3,
    KeyExpirationTime = 9,
    PreferredSymmetricAlgorithms = 11,
    Issuer = 16,
    PreferredHashAlgorithms = 21,
    PreferredCompressionAlgorithms = 22,
    PrimaryUserId = 25,
    KeyFlags = 27,
    Features = 30,
    IssuerFingerprint = 33,

    #[num_enum(catch_all)]
    Other(u8),
}

/// A single signature subpacket, the body kept as is.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Subpacket {
    pub is_critical: bool,
    pub typ: SubpacketType,
    #[debug("{}", hex::encode(data))]
    pub data: Bytes,
}

impl Subpacket {
    pub fn regular(typ: SubpacketType, data: impl Into<Bytes>) -> Self {
        Subpacket {
            is_critical: false,
            typ,
            data: data.into(),
        }
    }

    pub fn creation_time(created: &DateTime<Utc>) -> Self {
        Self::regular(
            SubpacketType::SignatureCreationTime,
            timestamp_to_u32(created).to_be_bytes().to_vec(),
        )
    }

    pub fn issuer(key_id: &KeyId) -> Self {
        Self::regular(SubpacketType::Issuer, key_id.as_ref().to_vec())
    }

    pub fn issuer_fingerprint(fp: &Fingerprint) -> Self {
        let mut data = vec![4];
        data.extend_from_slice(fp.as_bytes());
        Self::regular(SubpacketType::IssuerFingerprint, data)
    }

    pub fn key_flags(flags: KeyFlags) -> Self {
        Self::regular(SubpacketType::KeyFlags, vec![flags.bits()])
    }

    fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let len = read_subpacket_len(&mut r)?;
        ensure!(len > 0, "empty subpacket");

        let raw_typ = r.read_u8()?;
        let data = r.take_bytes(len - 1)?.freeze();

        Ok(Subpacket {
            is_critical: raw_typ & 0x80 != 0,
            typ: SubpacketType::from(raw_typ & 0x7F),
            data,
        })
    }
}

fn read_subpacket_len<R: BufRead>(r: &mut R) -> Result<usize> {
    let olen = r.read_u8()?;
    let len = match olen {
        0..=191 => usize::from(olen),
        192..=254 => ((usize::from(olen) - 192) << 8) + 192 + usize::from(r.read_u8()?),
        255 => r.read_be_u32()?.try_into()?,
    };
    Ok(len)
}

fn write_subpacket_len<W: io::Write>(len: usize, writer: &mut W) -> Result<()> {
    if len < 192 {
        writer.write_u8(len as u8)?;
    } else if len < 8384 {
        writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
        writer.write_u8(((len - 192) & 0xFF) as u8)?;
    } else {
        writer.write_u8(255)?;
        writer.write_u32::<BigEndian>(len.try_into()?)?;
    }
    Ok(())
}

fn subpacket_len_len(len: usize) -> usize {
    if len < 192 {
        1
    } else if len < 8384 {
        2
    } else {
        5
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_subpacket_len(1 + self.data.len(), writer)?;
        let typ = u8::from(self.typ) | if self.is_critical { 0x80 } else { 0 };
        writer.write_u8(typ)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let len = 1 + self.data.len();
        subpacket_len_len(len) + len
    }
}

fn read_subpackets(mut raw: &[u8]) -> Result<Vec<Subpacket>> {
    let mut out = Vec::new();
    while !raw.is_empty() {
        out.push(Subpacket::try_from_reader(&mut raw)?);
    }
    Ok(out)
}

/// The signed fields of a version 4 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,
    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,
}

impl SignatureConfig {
    pub fn new_v4(
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        hashed_subpackets: Vec<Subpacket>,
        unhashed_subpackets: Vec<Subpacket>,
    ) -> Self {
        SignatureConfig {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets,
            unhashed_subpackets,
        }
    }

    /// Certifies `id` as belonging to `signer`.
    pub fn sign_certificate(
        self,
        key: &RsaPrivateKey,
        signer: &PublicKey,
        id: &UserId,
    ) -> Result<Signature> {
        ensure!(
            self.typ.is_certification(),
            "can not sign {:?} as certificate",
            self.typ
        );
        debug!("signing certificate {:?}", self.typ);

        let mut hasher = self.hash_alg.new_hasher()?;
        signer.to_writer_old(&mut WriteHasher(&mut *hasher))?;

        let mut prefix = [0xB4, 0, 0, 0, 0];
        prefix[1..].copy_from_slice(&u32::try_from(id.id().len())?.to_be_bytes());
        hasher.update(&prefix);
        hasher.update(id.id());

        self.finish(hasher, key)
    }

    /// Binds `subkey` to `signer`.
    pub fn sign_key_binding(
        self,
        key: &RsaPrivateKey,
        signer: &PublicKey,
        subkey: &PublicKey,
    ) -> Result<Signature> {
        ensure!(
            self.typ == SignatureType::SubkeyBinding,
            "can not sign {:?} as key binding",
            self.typ
        );
        debug!("signing key binding for {}", subkey.key_id());

        let mut hasher = self.hash_alg.new_hasher()?;
        signer.to_writer_old(&mut WriteHasher(&mut *hasher))?;
        subkey.to_writer_old(&mut WriteHasher(&mut *hasher))?;

        self.finish(hasher, key)
    }

    fn finish(self, mut hasher: Box<dyn DynDigest>, key: &RsaPrivateKey) -> Result<Signature> {
        let len = self.hash_signature_data(&mut WriteHasher(&mut *hasher))?;
        hasher.update(&self.trailer(len)?);

        let hash = hasher.finalize();
        let signed_hash_value = [hash[0], hash[1]];
        let signature = rsa::sign(key, self.hash_alg, &hash)?.to_bytes()?;

        Ok(Signature::V4 {
            config: self,
            signed_hash_value,
            signature: signature.into(),
        })
    }

    /// Writes the hashed part of the signature, returning its length.
    fn hash_signature_data<W: io::Write>(&self, writer: &mut W) -> Result<usize> {
        let mut buf = vec![
            4,
            self.typ.into(),
            self.pub_alg.into(),
            self.hash_alg.into(),
        ];
        let subpackets = self.hashed_subpackets.to_bytes()?;
        buf.write_u16::<BigEndian>(subpackets.len().try_into()?)?;
        buf.extend_from_slice(&subpackets);

        writer.write_all(&buf)?;
        Ok(buf.len())
    }

    fn trailer(&self, len: usize) -> Result<[u8; 6]> {
        let mut trailer = [0x04, 0xFF, 0, 0, 0, 0];
        trailer[2..].copy_from_slice(&u32::try_from(len)?.to_be_bytes());
        Ok(trailer)
    }

    fn subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets
            .iter()
            .chain(self.unhashed_subpackets.iter())
    }
}

impl Signature {
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        Self::parse(&mut r).map_err(|err| err.into_malformed("signature"))
    }

    fn parse<R: BufRead>(r: &mut R) -> Result<Self> {
        let version = r.read_u8()?;
        if version != 4 {
            debug!("keeping v{version} signature as raw bytes");
            return Ok(Signature::Other {
                version,
                raw: r.rest()?.freeze(),
            });
        }

        let typ = SignatureType::from(r.read_u8()?);
        let pub_alg = PublicKeyAlgorithm::from(r.read_u8()?);
        let hash_alg = HashAlgorithm::from(r.read_u8()?);

        let hashed_len = r.read_be_u16()?;
        let hashed = r.take_bytes(hashed_len.into())?;
        let hashed_subpackets = read_subpackets(&hashed)?;

        let unhashed_len = r.read_be_u16()?;
        let unhashed = r.take_bytes(unhashed_len.into())?;
        let unhashed_subpackets = read_subpackets(&unhashed)?;

        let signed_hash_value = r.read_array::<2>()?;
        let signature = r.rest()?.freeze();
        if signature.is_empty() {
            malformed!("signature without signature values");
        }

        Ok(Signature::V4 {
            config: SignatureConfig::new_v4(
                typ,
                pub_alg,
                hash_alg,
                hashed_subpackets,
                unhashed_subpackets,
            ),
            signed_hash_value,
            signature,
        })
    }

    pub fn config(&self) -> Option<&SignatureConfig> {
        match self {
            Signature::V4 { config, .. } => Some(config),
            Signature::Other { .. } => None,
        }
    }

    pub fn typ(&self) -> Option<SignatureType> {
        self.config().map(|c| c.typ)
    }

    /// Key flags, only trusted from the hashed area.
    pub fn key_flags(&self) -> Option<KeyFlags> {
        self.config()?
            .hashed_subpackets
            .iter()
            .find(|p| p.typ == SubpacketType::KeyFlags)
            .map(|p| KeyFlags::from(&p.data[..]))
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        let packet = self
            .config()?
            .hashed_subpackets
            .iter()
            .find(|p| p.typ == SubpacketType::SignatureCreationTime)?;
        let raw: [u8; 4] = packet.data.as_ref().try_into().ok()?;
        Some(u32_to_timestamp(u32::from_be_bytes(raw)))
    }

    pub fn issuer(&self) -> Option<KeyId> {
        self.config()?.subpackets().find_map(|p| match p.typ {
            SubpacketType::Issuer => KeyId::from_slice(&p.data).ok(),
            SubpacketType::IssuerFingerprint if p.data.len() == 21 => {
                KeyId::from_slice(&p.data[13..]).ok()
            }
            _ => None,
        })
    }
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Signature::V4 {
                config,
                signed_hash_value,
                signature,
            } => {
                config.hash_signature_data(writer)?;
                let unhashed = config.unhashed_subpackets.to_bytes()?;
                writer.write_u16::<BigEndian>(unhashed.len().try_into()?)?;
                writer.write_all(&unhashed)?;
                writer.write_all(signed_hash_value)?;
                writer.write_all(signature)?;
            }
            Signature::Other { version, raw } => {
                writer.write_u8(*version)?;
                writer.write_all(raw)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Signature::V4 {
                config, signature, ..
            } => {
                6 + config.hashed_subpackets.write_len()
                    + 2
                    + config.unhashed_subpackets.write_len()
                    + 2
                    + signature.len()
            }
            Signature::Other { raw, .. } => 1 + raw.len(),
        }
    }
}

impl PacketTrait for Signature {
    fn tag(&self) -> Tag {
        Tag::Signature
    }
}
