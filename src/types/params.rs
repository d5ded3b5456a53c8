use std::io::{self, BufRead};

use bytes::Bytes;
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{checksum, elgamal, rsa, DecryptionKey};
use crate::errors::{malformed, unsupported_err, Error, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi, Password, StringToKey};

/// Algorithm specific public key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicParams {
    RSA {
        n: Mpi,
        e: Mpi,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    DSA {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    /// Parameters of algorithms this crate only carries along.
    Other { raw: Bytes },
}

impl PublicParams {
    pub fn try_from_reader<R: BufRead>(alg: PublicKeyAlgorithm, mut r: R) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                PublicParams::RSA {
                    n: Mpi::from_reader(&mut r)?,
                    e: Mpi::from_reader(&mut r)?,
                }
            }
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncryptSign => {
                PublicParams::Elgamal {
                    p: Mpi::from_reader(&mut r)?,
                    g: Mpi::from_reader(&mut r)?,
                    y: Mpi::from_reader(&mut r)?,
                }
            }
            PublicKeyAlgorithm::DSA => PublicParams::DSA {
                p: Mpi::from_reader(&mut r)?,
                q: Mpi::from_reader(&mut r)?,
                g: Mpi::from_reader(&mut r)?,
                y: Mpi::from_reader(&mut r)?,
            },
            _ => PublicParams::Other {
                raw: read_opaque_params(alg, &mut r)?,
            },
        };

        Ok(params)
    }
}

/// Delimits the public parameters of algorithms without typed support.
fn read_opaque_params<R: BufRead>(alg: PublicKeyAlgorithm, r: &mut R) -> Result<Bytes> {
    let mut raw = Vec::new();

    match alg {
        PublicKeyAlgorithm::ECDSA | PublicKeyAlgorithm::EdDSALegacy => {
            copy_oid(r, &mut raw)?;
            Mpi::from_reader(&mut *r)?.to_writer(&mut raw)?;
        }
        PublicKeyAlgorithm::ECDH => {
            copy_oid(r, &mut raw)?;
            Mpi::from_reader(&mut *r)?.to_writer(&mut raw)?;
            // kdf parameters share the length prefixed layout
            copy_oid(r, &mut raw)?;
        }
        PublicKeyAlgorithm::X25519 | PublicKeyAlgorithm::Ed25519 => {
            raw.extend_from_slice(&r.take_bytes(32)?);
        }
        PublicKeyAlgorithm::X448 => raw.extend_from_slice(&r.take_bytes(56)?),
        PublicKeyAlgorithm::Ed448 => raw.extend_from_slice(&r.take_bytes(57)?),
        _ => {
            debug!("unknown public key algorithm {:?}, keeping the rest", alg);
            raw.extend_from_slice(&r.rest()?);
        }
    }

    Ok(raw.into())
}

/// Copies a one octet length prefixed field.
fn copy_oid<R: BufRead>(r: &mut R, raw: &mut Vec<u8>) -> Result<()> {
    let len = r.read_u8()?;
    raw.push(len);
    raw.extend_from_slice(&r.take_bytes(usize::from(len))?);
    Ok(())
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::Elgamal { p, g, y } => {
                p.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::DSA { p, q, g, y } => {
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Other { raw } => writer.write_all(raw)?,
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::RSA { n, e } => n.write_len() + e.write_len(),
            PublicParams::Elgamal { p, g, y } => p.write_len() + g.write_len() + y.write_len(),
            PublicParams::DSA { p, q, g, y } => {
                p.write_len() + q.write_len() + g.write_len() + y.write_len()
            }
            PublicParams::Other { raw } => raw.len(),
        }
    }
}

/// Unencrypted secret MPIs, in their serialized form without checksum.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
#[debug("PlainSecretParams(..)")]
pub struct PlainSecretParams(Zeroizing<Vec<u8>>);

impl PlainSecretParams {
    pub fn from_mpis(mpis: &[Mpi]) -> Result<Self> {
        let mut out = Zeroizing::new(Vec::new());
        for mpi in mpis {
            mpi.to_writer(&mut *out)?;
        }
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Turns the MPIs into a key able to unwrap session keys.
    pub fn to_decryption_key(&self, public: &PublicParams) -> Result<DecryptionKey> {
        let mut r = &self.0[..];
        let key = match public {
            PublicParams::RSA { n, e } => {
                let d = Mpi::from_reader(&mut r)?;
                let p = Mpi::from_reader(&mut r)?;
                let q = Mpi::from_reader(&mut r)?;
                let _u = Mpi::from_reader(&mut r)?;
                DecryptionKey::Rsa(rsa::private_key_from_mpis(n, e, &d, &p, &q)?)
            }
            PublicParams::Elgamal { p, .. } => {
                let x = Mpi::from_reader(&mut r)?;
                DecryptionKey::Elgamal(elgamal::SecretKey::new(p.clone(), &x))
            }
            _ => unsupported_err!("decryption with {:?}", public),
        };

        Ok(key)
    }
}

/// Passphrase protected secret MPIs.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    /// 254 (SHA-1 check), 255 (checksum) or a legacy cipher id.
    usage: u8,
    sym_alg: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    #[debug("{}", hex::encode(iv))]
    iv: Vec<u8>,
    #[debug("{} bytes", data.len())]
    data: Vec<u8>,
}

impl EncryptedSecretParams {
    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }

    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        self.sym_alg
    }

    /// Whether the secret material is stored at all.
    pub fn is_dummy(&self) -> bool {
        matches!(self.s2k, StringToKey::GnuDummy { .. })
    }

    /// Protects `plain` with a key derived from `password`, using SHA-1 as
    /// integrity check.
    pub fn encrypt(
        plain: &PlainSecretParams,
        password: &Password,
        sym_alg: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        iv: Vec<u8>,
    ) -> Result<Self> {
        let key = s2k.derive_key(password.as_bytes(), sym_alg.key_size())?;

        let mut data = plain.as_bytes().to_vec();
        data.extend_from_slice(&checksum::calculate_sha1(plain.as_bytes()));
        sym_alg.encrypt_with_iv_regular(&key, &iv, &mut data)?;

        Ok(Self {
            usage: 254,
            sym_alg,
            s2k,
            iv,
            data,
        })
    }

    /// Decrypts the secret MPIs. A failing integrity check is reported as
    /// [`Error::WrongPassphrase`].
    pub fn unlock(&self, password: &Password, key_id: KeyId) -> Result<PlainSecretParams> {
        if self.is_dummy() {
            unsupported_err!("secret key {} is a stub without secret material", key_id);
        }

        let key = self
            .s2k
            .derive_key(password.as_bytes(), self.sym_alg.key_size())?;

        let mut plaintext = Zeroizing::new(self.data.clone());
        self.sym_alg
            .decrypt_with_iv_regular(&key, &self.iv, &mut plaintext)?;

        let wrong_passphrase = || Error::WrongPassphrase { key_id };

        let mpi_len = if self.usage == 254 {
            let len = plaintext.len().checked_sub(20).ok_or_else(wrong_passphrase)?;
            let (data, hash) = plaintext.split_at(len);
            if checksum::calculate_sha1(data)[..] != *hash {
                debug!("secret key {key_id}: SHA-1 check failed");
                return Err(wrong_passphrase());
            }
            len
        } else {
            let len = plaintext.len().checked_sub(2).ok_or_else(wrong_passphrase)?;
            let (data, sum) = plaintext.split_at(len);
            if checksum::simple([sum[0], sum[1]], data).is_err() {
                debug!("secret key {key_id}: checksum failed");
                return Err(wrong_passphrase());
            }
            len
        };

        plaintext.truncate(mpi_len);
        Ok(PlainSecretParams(plaintext))
    }
}

/// Secret part of a secret key packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    /// Reads the remainder of a secret key packet body.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let usage = r.read_u8()?;

        let params = match usage {
            0 => {
                let mut data = Zeroizing::new(r.rest()?.to_vec());
                let Some(len) = data.len().checked_sub(2) else {
                    malformed!("secret key material is missing its checksum");
                };
                let sum = [data[len], data[len + 1]];
                if checksum::simple(sum, &data[..len]).is_err() {
                    malformed!("invalid checksum of unencrypted secret key");
                }
                data.truncate(len);
                SecretParams::Plain(PlainSecretParams(data))
            }
            254 | 255 => {
                let sym_alg = SymmetricKeyAlgorithm::from(r.read_u8()?);
                let s2k = StringToKey::from_reader(&mut r)?;
                let iv = match s2k {
                    StringToKey::GnuDummy { .. } => Vec::new(),
                    _ => r.take_bytes(sym_alg.block_size())?.to_vec(),
                };
                SecretParams::Encrypted(EncryptedSecretParams {
                    usage,
                    sym_alg,
                    s2k,
                    iv,
                    data: r.rest()?.to_vec(),
                })
            }
            _ => {
                // legacy: the usage octet is the cipher, the key is the MD5 of the passphrase
                let sym_alg = SymmetricKeyAlgorithm::from(usage);
                SecretParams::Encrypted(EncryptedSecretParams {
                    usage,
                    sym_alg,
                    s2k: StringToKey::Simple {
                        hash_alg: crate::crypto::hash::HashAlgorithm::Md5,
                    },
                    iv: r.take_bytes(sym_alg.block_size())?.to_vec(),
                    data: r.rest()?.to_vec(),
                })
            }
        };

        Ok(params)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    /// Returns the plain MPIs, decrypting them if needed.
    pub fn unlock(&self, password: &Password, key_id: KeyId) -> Result<PlainSecretParams> {
        match self {
            SecretParams::Plain(plain) => Ok(plain.clone()),
            SecretParams::Encrypted(enc) => enc.unlock(password, key_id),
        }
    }
}

impl Serialize for SecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SecretParams::Plain(plain) => {
                writer.write_all(&[0])?;
                writer.write_all(plain.as_bytes())?;
                writer.write_all(&checksum::calculate_simple(plain.as_bytes()).to_be_bytes())?;
            }
            SecretParams::Encrypted(enc) => {
                writer.write_all(&[enc.usage])?;
                if enc.usage >= 254 {
                    writer.write_all(&[u8::from(enc.sym_alg)])?;
                    enc.s2k.to_writer(writer)?;
                }
                writer.write_all(&enc.iv)?;
                writer.write_all(&enc.data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SecretParams::Plain(plain) => 1 + plain.as_bytes().len() + 2,
            SecretParams::Encrypted(enc) => {
                let s2k = if enc.usage >= 254 {
                    1 + enc.s2k.write_len()
                } else {
                    0
                };
                1 + s2k + enc.iv.len() + enc.data.len()
            }
        }
    }
}
