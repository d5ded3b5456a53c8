use chrono::SubsecRound;
use derive_builder::Builder;
use log::debug;
use rand::{CryptoRng, Rng};

use crate::composed::key::{SecretKeyRing, SignedSubkey, SignedUser, TransferableKey};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{elgamal, rsa};
use crate::errors::{bail, Result};
use crate::packet::{self, SignatureConfig, SignatureType, Subpacket, SubpacketType, UserId};
use crate::types::{
    CompressionAlgorithm, EncryptedSecretParams, KeyFlags, Password, PlainSecretParams,
    PublicParams, SecretParams, StringToKey, DEFAULT_ITER_COUNT,
};

/// Parameters for a new RSA primary key, with an optional encryption subkey.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "crate::errors::Error"))]
pub struct SecretKeyParams {
    #[builder(default = "KeyType::Rsa(2048)")]
    key_type: KeyType,

    /// If `false` the primary key is flagged for certification and signing
    /// only, and an encryption subkey is needed to receive messages.
    #[builder(default = "true")]
    can_encrypt: bool,

    #[builder(setter(into))]
    primary_user_id: String,

    #[builder(default, setter(strip_option))]
    subkey: Option<KeyType>,

    /// Protects all secret keys with this passphrase.
    #[builder(default, setter(into, strip_option))]
    passphrase: Option<Password>,
    /// Coded S2K iteration count used with the passphrase.
    #[builder(default = "DEFAULT_ITER_COUNT")]
    s2k_count: u8,

    #[builder(default = "vec![SymmetricKeyAlgorithm::AES256, SymmetricKeyAlgorithm::AES192, SymmetricKeyAlgorithm::AES128]")]
    preferred_symmetric_algorithms: Vec<SymmetricKeyAlgorithm>,
    #[builder(default = "vec![HashAlgorithm::Sha256, HashAlgorithm::Sha512, HashAlgorithm::Sha1]")]
    preferred_hash_algorithms: Vec<HashAlgorithm>,
    #[builder(default = "vec![CompressionAlgorithm::ZLIB, CompressionAlgorithm::ZIP]")]
    preferred_compression_algorithms: Vec<CompressionAlgorithm>,

    #[builder(default = "chrono::Utc::now().trunc_subsecs(0)")]
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Kinds of keys that can be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// RSA with the given bit size.
    Rsa(u32),
    /// Elgamal in the 2048-bit MODP group of RFC 3526, encryption only.
    Elgamal,
}

impl KeyType {
    pub fn to_alg(self) -> PublicKeyAlgorithm {
        match self {
            KeyType::Rsa(_) => PublicKeyAlgorithm::RSA,
            KeyType::Elgamal => PublicKeyAlgorithm::Elgamal,
        }
    }

    fn check(self) -> std::result::Result<(), String> {
        match self {
            KeyType::Rsa(size) if size < 1024 => {
                Err(format!("RSA keys need at least 1024 bits, got {size}"))
            }
            _ => Ok(()),
        }
    }
}

impl SecretKeyParamsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        match self.key_type {
            Some(KeyType::Elgamal) => {
                return Err("Elgamal can only be used for encryption subkeys".into());
            }
            Some(key_type) => key_type.check()?,
            None => {}
        }
        if let Some(Some(subkey)) = self.subkey {
            subkey.check()?;
        }
        Ok(())
    }
}

/// A freshly generated key with its unprotected secret MPIs.
struct Generated {
    public: packet::PublicKey,
    plain: PlainSecretParams,
    rsa: Option<::rsa::RsaPrivateKey>,
}

fn generate_key<R: Rng + CryptoRng>(
    rng: &mut R,
    key_type: KeyType,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<Generated> {
    match key_type {
        KeyType::Rsa(bits) => {
            let key = rsa::generate_key(rng, bits as usize)?;
            let (n, e) = rsa::public_mpis(&key);
            let public =
                packet::PublicKey::new(key_type.to_alg(), created_at, PublicParams::RSA { n, e })?;
            let plain = PlainSecretParams::from_mpis(&rsa::secret_mpis(&key)?)?;
            Ok(Generated {
                public,
                plain,
                rsa: Some(key),
            })
        }
        KeyType::Elgamal => {
            let ((p, g, y), secret) = elgamal::generate_key(rng)?;
            let public = packet::PublicKey::new(
                key_type.to_alg(),
                created_at,
                PublicParams::Elgamal { p, g, y },
            )?;
            let plain = PlainSecretParams::from_mpis(&[secret.as_mpi()])?;
            Ok(Generated {
                public,
                plain,
                rsa: None,
            })
        }
    }
}

impl SecretKeyParams {
    /// Generates the keys and their self-signatures.
    pub fn generate<R: Rng + CryptoRng>(self, mut rng: R) -> Result<SecretKeyRing> {
        let primary = generate_key(&mut rng, self.key_type, self.created_at)?;
        let Some(signer) = primary.rsa.as_ref() else {
            bail!("primary keys must be able to sign");
        };
        let primary_pub = &primary.public;
        debug!("generated primary key {}", primary_pub.key_id());

        let mut flags = KeyFlags::default();
        flags.set_certify(true);
        flags.set_sign(true);
        flags.set_encrypt_comms(self.can_encrypt);
        flags.set_encrypt_storage(self.can_encrypt);

        let user_id = UserId::from_str(&self.primary_user_id);
        let mut hashed = self.hashed_subpackets(primary_pub, flags);
        hashed.push(Subpacket::regular(
            SubpacketType::PreferredSymmetricAlgorithms,
            to_ids(&self.preferred_symmetric_algorithms),
        ));
        hashed.push(Subpacket::regular(
            SubpacketType::PreferredHashAlgorithms,
            to_ids(&self.preferred_hash_algorithms),
        ));
        hashed.push(Subpacket::regular(
            SubpacketType::PreferredCompressionAlgorithms,
            to_ids(&self.preferred_compression_algorithms),
        ));
        hashed.push(Subpacket::regular(SubpacketType::PrimaryUserId, vec![1]));

        let certification = SignatureConfig::new_v4(
            SignatureType::CertPositive,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Sha256,
            hashed,
            vec![Subpacket::issuer(&primary_pub.key_id())],
        )
        .sign_certificate(signer, primary_pub, &user_id)?;

        let mut subkeys = Vec::new();
        if let Some(key_type) = self.subkey {
            let sub = generate_key(&mut rng, key_type, self.created_at)?;
            debug!("generated subkey {}", sub.public.key_id());

            let mut flags = KeyFlags::default();
            flags.set_encrypt_comms(true);
            flags.set_encrypt_storage(true);

            let binding = SignatureConfig::new_v4(
                SignatureType::SubkeyBinding,
                PublicKeyAlgorithm::RSA,
                HashAlgorithm::Sha256,
                self.hashed_subpackets(primary_pub, flags),
                vec![Subpacket::issuer(&primary_pub.key_id())],
            )
            .sign_key_binding(signer, primary_pub, &sub.public)?;

            subkeys.push(SignedSubkey {
                key: packet::SecretKey::new(sub.public, self.protect(&mut rng, &sub.plain)?),
                signatures: vec![binding],
            });
        }

        let primary_secret = self.protect(&mut rng, &primary.plain)?;
        let key = TransferableKey {
            primary: packet::SecretKey::new(primary.public.clone(), primary_secret),
            direct_signatures: Vec::new(),
            users: vec![SignedUser {
                id: user_id,
                signatures: vec![certification],
            }],
            subkeys,
        };

        Ok(SecretKeyRing::new(vec![key]))
    }

    fn hashed_subpackets(&self, signer: &packet::PublicKey, flags: KeyFlags) -> Vec<Subpacket> {
        vec![
            Subpacket::creation_time(&self.created_at),
            Subpacket::key_flags(flags),
            Subpacket::issuer_fingerprint(&signer.fingerprint()),
        ]
    }

    fn protect<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        plain: &PlainSecretParams,
    ) -> Result<SecretParams> {
        let Some(passphrase) = &self.passphrase else {
            return Ok(SecretParams::Plain(plain.clone()));
        };

        let sym_alg = SymmetricKeyAlgorithm::AES256;
        let s2k = StringToKey::new_iterated(&mut *rng, HashAlgorithm::Sha256, self.s2k_count);
        let mut iv = vec![0u8; sym_alg.block_size()];
        rng.fill_bytes(&mut iv);

        let encrypted = EncryptedSecretParams::encrypt(plain, passphrase, sym_alg, s2k, iv)?;
        Ok(SecretParams::Encrypted(encrypted))
    }
}

fn to_ids<T: Copy + Into<u8>>(algs: &[T]) -> Vec<u8> {
    algs.iter().map(|alg| (*alg).into()).collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::errors::Error;
    use crate::ser::Serialize;

    fn params(subkey: Option<KeyType>, can_encrypt: bool) -> SecretKeyParamsBuilder {
        let mut builder = SecretKeyParamsBuilder::default();
        builder
            .key_type(KeyType::Rsa(1024))
            .can_encrypt(can_encrypt)
            .primary_user_id("Me <me@example.com>")
            .s2k_count(0);
        if let Some(subkey) = subkey {
            builder.subkey(subkey);
        }
        builder
    }

    #[test]
    fn generates_and_roundtrips() {
        let _ = pretty_env_logger::try_init();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let ring = params(Some(KeyType::Rsa(1024)), false)
            .passphrase("hello")
            .build()
            .unwrap()
            .generate(&mut rng)
            .unwrap();

        let bytes = ring.to_bytes().unwrap();
        assert_eq!(bytes.len(), ring.write_len());
        let parsed = SecretKeyRing::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, ring);

        let entries = parsed.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].flags.sign());
        assert!(!entries[0].flags.can_encrypt());
        assert!(entries[1].flags.can_encrypt());
        assert_eq!(entries[0].users[0].id.as_str(), "Me <me@example.com>");

        let key = parsed.decryption_key(&Password::from("hello")).unwrap();
        assert_eq!(key.key_id(), entries[1].key.key_id());

        let err = parsed.decryption_key(&Password::from("nope")).unwrap_err();
        assert!(matches!(err, Error::WrongPassphrase { .. }), "{err:?}");
    }

    #[test]
    fn public_ring_from_secret() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ring = params(Some(KeyType::Elgamal), true)
            .build()
            .unwrap()
            .generate(&mut rng)
            .unwrap();

        let public = ring.to_public();
        let bytes = public.to_armored_string(None).unwrap();
        assert!(bytes.starts_with("-----BEGIN PGP PUBLIC KEY BLOCK-----"));

        let parsed = crate::composed::PublicKeyRing::from_bytes(bytes.as_bytes()).unwrap();
        assert_eq!(parsed, public);
        // the general purpose primary comes first
        assert_eq!(
            parsed.encryption_key().unwrap().key_id(),
            ring.keys()[0].primary.key_id()
        );
    }

    #[test]
    fn rejects_elgamal_primary_and_small_rsa() {
        let err = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Elgamal)
            .primary_user_id("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Message { .. }));

        let err = SecretKeyParamsBuilder::default()
            .key_type(KeyType::Rsa(512))
            .primary_user_id("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Message { .. }));

        let err = SecretKeyParamsBuilder::default().build().unwrap_err();
        assert!(matches!(err, Error::Message { .. }));
    }
}
