use std::io::{self, BufRead};
use std::ops::Deref;

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, SubsecRound, Utc};
use log::debug;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::DecryptionKey;
use crate::errors::{unsupported_err, Result};
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::{timestamp_to_u32, u32_to_timestamp, Serialize};
use crate::types::{Fingerprint, KeyId, Password, PublicParams, SecretParams, Tag};

/// The public part of a version 4 key, shared by primary keys and subkeys.
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-public-key-packet-formats>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    public_params: PublicParams,
    fingerprint: Fingerprint,
}

impl PublicKey {
    pub fn new(
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        public_params: PublicParams,
    ) -> Result<Self> {
        let created_at = created_at.trunc_subsecs(0);
        let fingerprint = fingerprint(algorithm, &created_at, &public_params)?;

        Ok(PublicKey {
            algorithm,
            created_at,
            public_params,
            fingerprint,
        })
    }

    /// Reads the key fields, leaving any trailing secret material in `r`.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        Self::parse(&mut r).map_err(|err| err.into_malformed("public key"))
    }

    fn parse<R: BufRead>(r: &mut R) -> Result<Self> {
        let version = r.read_u8()?;
        if version != 4 {
            unsupported_err!("key version {}", version);
        }

        let created_at = u32_to_timestamp(r.read_be_u32()?);
        let algorithm = PublicKeyAlgorithm::from(r.read_u8()?);
        let public_params = PublicParams::try_from_reader(algorithm, &mut *r)?;

        Self::new(algorithm, created_at, public_params)
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn key_id(&self) -> KeyId {
        self.fingerprint.key_id()
    }

    /// Writes the key in the framing used for fingerprints and signature
    /// hashes: `0x99`, a two octet length and the packet body.
    pub fn to_writer_old<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_old_framing(self.algorithm, &self.created_at, &self.public_params, writer)
    }
}

fn write_body<W: io::Write>(
    algorithm: PublicKeyAlgorithm,
    created_at: &DateTime<Utc>,
    params: &PublicParams,
    writer: &mut W,
) -> Result<()> {
    writer.write_u8(4)?;
    writer.write_u32::<BigEndian>(timestamp_to_u32(created_at))?;
    writer.write_u8(algorithm.into())?;
    params.to_writer(writer)?;
    Ok(())
}

fn write_old_framing<W: io::Write>(
    algorithm: PublicKeyAlgorithm,
    created_at: &DateTime<Utc>,
    params: &PublicParams,
    writer: &mut W,
) -> Result<()> {
    writer.write_u8(0x99)?;
    writer.write_u16::<BigEndian>((6 + params.write_len()).try_into()?)?;
    write_body(algorithm, created_at, params, writer)
}

fn fingerprint(
    algorithm: PublicKeyAlgorithm,
    created_at: &DateTime<Utc>,
    params: &PublicParams,
) -> Result<Fingerprint> {
    let mut buf = Vec::with_capacity(9 + params.write_len());
    write_old_framing(algorithm, created_at, params, &mut buf)?;
    Ok(Fingerprint::new(checksum::calculate_sha1(&buf)))
}

impl Serialize for PublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_body(self.algorithm, &self.created_at, &self.public_params, writer)
    }

    fn write_len(&self) -> usize {
        6 + self.public_params.write_len()
    }
}

impl PacketTrait for PublicKey {
    fn tag(&self) -> Tag {
        Tag::PublicKey
    }
}

/// Public-Subkey Packet, same layout as [`PublicKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSubkey(PublicKey);

impl PublicSubkey {
    pub fn new(key: PublicKey) -> Self {
        PublicSubkey(key)
    }

    pub fn try_from_reader<R: BufRead>(r: R) -> Result<Self> {
        PublicKey::try_from_reader(r).map(PublicSubkey)
    }

    pub fn into_inner(self) -> PublicKey {
        self.0
    }
}

impl Deref for PublicSubkey {
    type Target = PublicKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for PublicSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.0.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.0.write_len()
    }
}

impl PacketTrait for PublicSubkey {
    fn tag(&self) -> Tag {
        Tag::PublicSubkey
    }
}

/// Secret-Key Packet: a public key followed by its, possibly passphrase
/// protected, secret parameters.
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-secret-key-packet-formats>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    details: PublicKey,
    secret_params: SecretParams,
}

impl SecretKey {
    pub fn new(details: PublicKey, secret_params: SecretParams) -> Self {
        SecretKey {
            details,
            secret_params,
        }
    }

    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let details = PublicKey::try_from_reader(&mut r)?;
        let secret_params = SecretParams::try_from_reader(&mut r)
            .map_err(|err| err.into_malformed("secret key"))?;

        Ok(SecretKey {
            details,
            secret_params,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.details
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.secret_params
    }

    pub fn key_id(&self) -> KeyId {
        self.details.key_id()
    }

    /// Unlocks the secret parameters into a key able to unwrap session keys.
    pub fn decryption_key(&self, password: &Password) -> Result<DecryptionKey> {
        debug!("unlocking secret key {}", self.key_id());
        let plain = self.secret_params.unlock(password, self.key_id())?;
        plain.to_decryption_key(&self.details.public_params)
    }

    /// Runs `work` with the unlocked key, which is dropped and zeroized
    /// right after.
    pub fn unlock<F, T>(&self, password: &Password, work: F) -> Result<T>
    where
        F: FnOnce(&PublicKey, &DecryptionKey) -> Result<T>,
    {
        let key = self.decryption_key(password)?;
        work(&self.details, &key)
    }
}

impl Serialize for SecretKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.details.to_writer(writer)?;
        self.secret_params.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.details.write_len() + self.secret_params.write_len()
    }
}

impl PacketTrait for SecretKey {
    fn tag(&self) -> Tag {
        Tag::SecretKey
    }
}

/// Secret-Subkey Packet, same layout as [`SecretKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSubkey(SecretKey);

impl SecretSubkey {
    pub fn new(key: SecretKey) -> Self {
        SecretSubkey(key)
    }

    pub fn try_from_reader<R: BufRead>(r: R) -> Result<Self> {
        SecretKey::try_from_reader(r).map(SecretSubkey)
    }

    pub fn into_inner(self) -> SecretKey {
        self.0
    }
}

impl Deref for SecretSubkey {
    type Target = SecretKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for SecretSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.0.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.0.write_len()
    }
}

impl PacketTrait for SecretSubkey {
    fn tag(&self) -> Tag {
        Tag::SecretSubkey
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sha1::{Digest, Sha1};

    use super::*;
    use crate::crypto::{elgamal, rsa};
    use crate::errors::Error;
    use crate::types::PlainSecretParams;

    fn rsa_key(seed: u64) -> (PublicKey, ::rsa::RsaPrivateKey) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let key = rsa::generate_key(&mut rng, 1024).unwrap();
        let (n, e) = rsa::public_mpis(&key);
        let public = PublicKey::new(
            PublicKeyAlgorithm::RSA,
            u32_to_timestamp(1_600_000_000),
            PublicParams::RSA { n, e },
        )
        .unwrap();
        (public, key)
    }

    #[test]
    fn fingerprint_over_old_framing() {
        let (public, _) = rsa_key(1);
        let body = public.to_bytes().unwrap();

        let mut hasher = Sha1::new();
        hasher.update([0x99, (body.len() >> 8) as u8, body.len() as u8]);
        hasher.update(&body);
        let expected: [u8; 20] = hasher.finalize().into();

        assert_eq!(public.fingerprint().as_bytes(), &expected[..]);
        assert_eq!(public.key_id().as_ref(), &expected[12..]);
    }

    #[test]
    fn public_roundtrip() {
        let (public, _) = rsa_key(2);
        let bytes = public.to_bytes().unwrap();
        let parsed = PublicKey::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed, public);
    }

    #[test]
    fn v3_keys_are_unsupported() {
        let err = PublicKey::try_from_reader(&[3u8, 0, 0, 0, 0][..]).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn truncated_key_is_malformed() {
        let err = PublicKey::try_from_reader(&[4u8, 0, 0, 0, 0, 1, 0x04][..]).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { .. }), "{err:?}");
    }

    #[test]
    fn secret_roundtrip_and_unlock() {
        let (public, key) = rsa_key(3);
        let plain = PlainSecretParams::from_mpis(&rsa::secret_mpis(&key).unwrap()).unwrap();
        let secret = SecretKey::new(public.clone(), SecretParams::Plain(plain));

        let bytes = secret.to_bytes().unwrap();
        let parsed = SecretKey::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed, secret);

        let id = parsed
            .unlock(&Password::empty(), |public, key| {
                assert!(matches!(key, DecryptionKey::Rsa(_)));
                Ok(public.key_id())
            })
            .unwrap();
        assert_eq!(id, public.key_id());
    }

    #[test]
    fn elgamal_subkey() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let ((p, g, y), secret) = elgamal::generate_key(&mut rng).unwrap();
        let public = PublicKey::new(
            PublicKeyAlgorithm::Elgamal,
            u32_to_timestamp(1_600_000_000),
            PublicParams::Elgamal { p, g, y },
        )
        .unwrap();
        let plain = PlainSecretParams::from_mpis(&[secret.as_mpi()]).unwrap();
        let subkey = SecretSubkey::new(SecretKey::new(public, SecretParams::Plain(plain)));

        let bytes = subkey.to_bytes().unwrap();
        let parsed = SecretSubkey::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(parsed.key_id(), subkey.key_id());
        assert!(matches!(
            parsed.decryption_key(&Password::empty()).unwrap(),
            DecryptionKey::Elgamal(_)
        ));
    }
}
