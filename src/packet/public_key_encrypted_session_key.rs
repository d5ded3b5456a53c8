use std::io::{self, BufRead};

use bytes::Bytes;
use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{checksum, encrypt_session_key, DecryptionKey};
use crate::errors::{Error, Result};
use crate::packet::{PacketTrait, PublicKey};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi, Tag};

/// Public Key Encrypted Session Key Packet (PKESK)
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-public-key-encrypted-sessio>
///
/// Only version 3 is produced and consumed, other versions are carried
/// verbatim so they can be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyEncryptedSessionKey {
    V3 {
        id: KeyId,
        pk_algo: PublicKeyAlgorithm,
        values: PkeskValues,
    },
    Other {
        version: u8,
        raw: Bytes,
    },
}

/// Algorithm specific fields of a v3 PKESK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkeskValues {
    Mpis(Vec<Mpi>),
    Raw(Bytes),
}

impl PublicKeyEncryptedSessionKey {
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        Self::parse(&mut r).map_err(|err| err.into_malformed("session key packet"))
    }

    fn parse<R: BufRead>(r: &mut R) -> Result<Self> {
        let version = r.read_u8()?;
        if version != 3 {
            debug!("skipping PKESK version {version}");
            return Ok(PublicKeyEncryptedSessionKey::Other {
                version,
                raw: r.rest()?.freeze(),
            });
        }

        let id = KeyId::new(r.read_array::<8>()?);
        let pk_algo = PublicKeyAlgorithm::from(r.read_u8()?);
        let values = match pk_algo {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt => {
                PkeskValues::Mpis(vec![Mpi::from_reader(&mut *r)?])
            }
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncryptSign => {
                PkeskValues::Mpis(vec![Mpi::from_reader(&mut *r)?, Mpi::from_reader(&mut *r)?])
            }
            _ => PkeskValues::Raw(r.rest()?.freeze()),
        };

        Ok(PublicKeyEncryptedSessionKey::V3 {
            id,
            pk_algo,
            values,
        })
    }

    /// Encrypts `session_key` to `pkey`, payload `alg || key || checksum`.
    pub fn from_session_key<R: CryptoRng + Rng>(
        mut rng: R,
        session_key: &[u8],
        alg: SymmetricKeyAlgorithm,
        pkey: &PublicKey,
    ) -> Result<Self> {
        let mut data = Zeroizing::new(Vec::with_capacity(1 + session_key.len() + 2));
        data.push(u8::from(alg));
        data.extend_from_slice(session_key);
        data.extend_from_slice(&checksum::calculate_simple(session_key).to_be_bytes());

        let values = encrypt_session_key(&mut rng, pkey.public_params(), &data)?;

        Ok(PublicKeyEncryptedSessionKey::V3 {
            id: pkey.key_id(),
            pk_algo: pkey.algorithm(),
            values: PkeskValues::Mpis(values),
        })
    }

    /// Whether this packet is addressed to `key_id`, or to anyone.
    pub fn matches(&self, key_id: &KeyId) -> bool {
        match self {
            Self::V3 { id, .. } => id.is_wildcard() || id == key_id,
            Self::Other { .. } => false,
        }
    }

    pub fn id(&self) -> Option<&KeyId> {
        match self {
            Self::V3 { id, .. } => Some(id),
            Self::Other { .. } => None,
        }
    }

    /// Unwraps the session key, checking its checksum and length.
    pub fn decrypt(
        &self,
        key: &DecryptionKey,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        let values = match self {
            Self::V3 {
                values: PkeskValues::Mpis(values),
                ..
            } => values,
            _ => {
                return Err(Error::DecryptionFailed {
                    message: "unsupported session key packet".to_string(),
                })
            }
        };

        let decrypted = key.decrypt(values)?;
        let failed = |message: &str| Error::DecryptionFailed {
            message: message.to_string(),
        };

        if decrypted.len() < 3 {
            return Err(failed("session key payload too short"));
        }
        let alg = SymmetricKeyAlgorithm::from(decrypted[0]);
        let (session_key, sum) = decrypted[1..].split_at(decrypted.len() - 3);
        if checksum::simple([sum[0], sum[1]], session_key).is_err() {
            return Err(failed("session key checksum mismatch"));
        }
        if alg.key_size() == 0 || session_key.len() != alg.key_size() {
            return Err(failed("session key length does not fit the cipher"));
        }

        debug!("unwrapped session key for {:?}", alg);
        Ok((alg, Zeroizing::new(session_key.to_vec())))
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::V3 {
                id,
                pk_algo,
                values,
            } => {
                writer.write_all(&[3])?;
                writer.write_all(id.as_ref())?;
                writer.write_all(&[u8::from(*pk_algo)])?;
                match values {
                    PkeskValues::Mpis(mpis) => {
                        for mpi in mpis {
                            mpi.to_writer(writer)?;
                        }
                    }
                    PkeskValues::Raw(raw) => writer.write_all(raw)?,
                }
            }
            Self::Other { version, raw } => {
                writer.write_all(&[*version])?;
                writer.write_all(raw)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::V3 { values, .. } => {
                let values = match values {
                    PkeskValues::Mpis(mpis) => mpis.iter().map(Serialize::write_len).sum(),
                    PkeskValues::Raw(raw) => raw.len(),
                };
                1 + 8 + 1 + values
            }
            Self::Other { raw, .. } => 1 + raw.len(),
        }
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn tag(&self) -> Tag {
        Tag::PublicKeyEncryptedSessionKey
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let pkesk = PublicKeyEncryptedSessionKey::V3 {
            id: KeyId::new([1, 2, 3, 4, 5, 6, 7, 8]),
            pk_algo: PublicKeyAlgorithm::Elgamal,
            values: PkeskValues::Mpis(vec![Mpi::from_slice(&[5; 20]), Mpi::from_slice(&[6; 20])]),
        };
        let bytes = pkesk.to_bytes().unwrap();
        assert_eq!(bytes.len(), pkesk.write_len());
        assert_eq!(
            PublicKeyEncryptedSessionKey::try_from_reader(&bytes[..]).unwrap(),
            pkesk
        );
        assert!(pkesk.matches(&KeyId::new([1, 2, 3, 4, 5, 6, 7, 8])));
        assert!(!pkesk.matches(&KeyId::new([0; 8])));
    }

    #[test]
    fn wildcard_matches_everyone() {
        let pkesk = PublicKeyEncryptedSessionKey::V3 {
            id: KeyId::WILDCARD,
            pk_algo: PublicKeyAlgorithm::RSA,
            values: PkeskValues::Mpis(vec![Mpi::from_slice(&[1])]),
        };
        assert!(pkesk.matches(&KeyId::new([9; 8])));
    }

    #[test]
    fn other_versions_are_kept() {
        let pkesk = PublicKeyEncryptedSessionKey::try_from_reader(&[6u8, 1, 2, 3][..]).unwrap();
        assert!(matches!(pkesk, PublicKeyEncryptedSessionKey::Other { version: 6, .. }));
        assert!(pkesk.id().is_none());
    }

    #[test]
    fn truncated_is_malformed() {
        let err = PublicKeyEncryptedSessionKey::try_from_reader(&[3u8, 1, 2][..]).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { .. }));
    }
}
