use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::{BufDecryptor, BufEncryptor};
use cipher::{BlockCipher, BlockEncryptMut, KeyIvInit};
use des::TdesEde3;
use idea::Idea;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};
use twofish::Twofish;
use zeroize::Zeroizing;

use crate::errors::{bail, unsupported_err, Error, Result};

/// MDC packet: 1 byte tag, 1 byte length and the SHA-1 digest.
const MDC_LEN: usize = 22;
const MDC_HEADER: [u8; 2] = [0xD3, 0x14];

/// Calls `$f::<Cipher>($args)` for the block cipher behind `$alg`.
macro_rules! with_cipher {
    ($alg:expr, $f:ident($($arg:expr),*)) => {
        match $alg {
            SymmetricKeyAlgorithm::IDEA => $f::<Idea>($($arg),*),
            SymmetricKeyAlgorithm::TripleDES => $f::<TdesEde3>($($arg),*),
            SymmetricKeyAlgorithm::CAST5 => $f::<Cast5>($($arg),*),
            SymmetricKeyAlgorithm::Blowfish => $f::<Blowfish>($($arg),*),
            SymmetricKeyAlgorithm::AES128 => $f::<Aes128>($($arg),*),
            SymmetricKeyAlgorithm::AES192 => $f::<Aes192>($($arg),*),
            SymmetricKeyAlgorithm::AES256 => $f::<Aes256>($($arg),*),
            SymmetricKeyAlgorithm::Twofish => $f::<Twofish>($($arg),*),
            SymmetricKeyAlgorithm::Camellia128 => $f::<Camellia128>($($arg),*),
            SymmetricKeyAlgorithm::Camellia192 => $f::<Camellia192>($($arg),*),
            SymmetricKeyAlgorithm::Camellia256 => $f::<Camellia256>($($arg),*),
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::Other(id) => {
                unsupported_err!("symmetric key algorithm {}", id)
            }
        }
    };
}

fn cfb_encrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    BufEncryptor<C>: KeyIvInit,
{
    BufEncryptor::<C>::new_from_slices(key, iv)?.encrypt(data);
    Ok(())
}

fn cfb_decrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    BufDecryptor<C>: KeyIvInit,
{
    BufDecryptor::<C>::new_from_slices(key, iv)?.decrypt(data);
    Ok(())
}

/// OpenPGP CFB: zero IV over `prefix || data`, optionally resynchronizing
/// on the last block of ciphertext after the `bs + 2` prefix octets.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880#section-13.9>
fn openpgp_cfb_encrypt<C>(key: &[u8], bs: usize, resync: bool, buf: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    BufEncryptor<C>: KeyIvInit,
{
    let iv = vec![0u8; bs];
    if !resync {
        return cfb_encrypt::<C>(key, &iv, buf);
    }

    let (prefix, data) = buf.split_at_mut(bs + 2);
    let mut mode = BufEncryptor::<C>::new_from_slices(key, &iv)?;
    mode.encrypt(prefix);

    // resync
    let mut mode = BufEncryptor::<C>::new_from_slices(key, &prefix[2..])?;
    mode.encrypt(data);

    Ok(())
}

fn openpgp_cfb_decrypt<C>(key: &[u8], bs: usize, resync: bool, buf: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    BufDecryptor<C>: KeyIvInit,
{
    let iv = vec![0u8; bs];
    if !resync {
        return cfb_decrypt::<C>(key, &iv, buf);
    }

    let (prefix, data) = buf.split_at_mut(bs + 2);
    let resync_iv = prefix[2..].to_vec();

    let mut mode = BufDecryptor::<C>::new_from_slices(key, &iv)?;
    mode.decrypt(prefix);

    let mut mode = BufDecryptor::<C>::new_from_slices(key, &resync_iv)?;
    mode.decrypt(data);

    Ok(())
}

/// Available symmetric key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-symmetric-key-algorithms>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
#[non_exhaustive]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    #[cfg_attr(test, proptest(skip))]
    Plaintext = 0,
    IDEA = 1,
    TripleDES = 2,
    CAST5 = 3,
    Blowfish = 4,
    // 5 & 6 are reserved for DES/SK
    AES128 = 7,
    AES192 = 8,
    AES256 = 9,
    /// Twofish with 256-bit key
    Twofish = 10,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 128-bit key
    Camellia128 = 11,
    Camellia192 = 12,
    Camellia256 = 13,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    Other(u8),
}

impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES256
    }
}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia128
            | SymmetricKeyAlgorithm::Camellia192
            | SymmetricKeyAlgorithm::Camellia256 => 16,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The size of a key in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA => 16,
            SymmetricKeyAlgorithm::TripleDES => 24,
            SymmetricKeyAlgorithm::CAST5 => 16,
            SymmetricKeyAlgorithm::Blowfish => 16,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 => 32,
            SymmetricKeyAlgorithm::Twofish => 32,
            SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::Camellia256 => 32,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// Generates a new random session key.
    pub fn new_session_key<R: Rng + CryptoRng>(self, mut rng: R) -> Zeroizing<Vec<u8>> {
        let mut session_key = Zeroizing::new(vec![0u8; self.key_size()]);
        rng.fill_bytes(&mut session_key);
        session_key
    }

    /// Random prefix with the two repeated "quick check" octets.
    fn prefix<R: Rng + CryptoRng>(self, mut rng: R) -> Vec<u8> {
        let bs = self.block_size();
        let mut prefix = vec![0u8; bs + 2];
        rng.fill_bytes(&mut prefix[..bs]);
        prefix[bs] = prefix[bs - 2];
        prefix[bs + 1] = prefix[bs - 1];
        prefix
    }

    fn check_key(self, key: &[u8]) -> Result<()> {
        if self.block_size() == 0 {
            unsupported_err!("symmetric key algorithm {:?}", self);
        }
        if key.len() != self.key_size() {
            return Err(Error::DecryptionFailed {
                message: format!(
                    "session key of {} bytes does not fit {:?}",
                    key.len(),
                    self
                ),
            });
        }
        Ok(())
    }

    /// Encrypts for a Symmetrically Encrypted Data packet: OpenPGP CFB with resync.
    pub fn encrypt<R: CryptoRng + Rng>(
        self,
        rng: R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        debug!("encrypt unprotected");
        self.check_key(key)?;

        let mut buf = self.prefix(rng);
        buf.extend_from_slice(plaintext);

        let bs = self.block_size();
        with_cipher!(self, openpgp_cfb_encrypt(key, bs, true, &mut buf))?;

        Ok(buf)
    }

    /// Encrypts for a version 1 Symmetrically Encrypted Integrity Protected
    /// Data packet, appending the MDC.
    pub fn encrypt_protected<R: CryptoRng + Rng>(
        self,
        rng: R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        debug!("protected encrypt");
        self.check_key(key)?;

        let mut buf = self.prefix(rng);
        buf.reserve(plaintext.len() + MDC_LEN);
        buf.extend_from_slice(plaintext);
        buf.extend_from_slice(&MDC_HEADER);
        let mdc = Sha1::digest(&buf);
        buf.extend_from_slice(&mdc);

        let bs = self.block_size();
        with_cipher!(self, openpgp_cfb_encrypt(key, bs, false, &mut buf))?;

        Ok(buf)
    }

    /// Decrypts the body of a Symmetrically Encrypted Data packet.
    pub fn decrypt(self, key: &[u8], mut ciphertext: Vec<u8>) -> Result<Vec<u8>> {
        debug!("decrypt unprotected");
        self.check_key(key)?;

        let bs = self.block_size();
        if ciphertext.len() < bs + 2 {
            return Err(Error::MalformedPacket {
                message: "encrypted data shorter than its prefix".to_string(),
            });
        }

        with_cipher!(self, openpgp_cfb_decrypt(key, bs, true, &mut ciphertext))?;
        ciphertext.drain(..bs + 2);

        Ok(ciphertext)
    }

    /// Decrypts a version 1 SEIPD body and verifies the MDC. No plaintext is
    /// returned unless the check succeeds.
    pub fn decrypt_protected(self, key: &[u8], mut ciphertext: Vec<u8>) -> Result<Vec<u8>> {
        debug!("decrypt protected");
        self.check_key(key)?;

        let bs = self.block_size();
        if ciphertext.len() < bs + 2 + MDC_LEN {
            debug!("protected data too short to carry a MDC");
            return Err(Error::IntegrityCheckFailed);
        }

        with_cipher!(self, openpgp_cfb_decrypt(key, bs, false, &mut ciphertext))?;

        let mdc_start = ciphertext.len() - MDC_LEN;
        let (data, mdc) = ciphertext.split_at(mdc_start);
        if mdc[..2] != MDC_HEADER {
            return Err(Error::IntegrityCheckFailed);
        }

        let mut hasher = Sha1::new();
        hasher.update(data);
        hasher.update(MDC_HEADER);
        if hasher.finalize()[..] != mdc[2..] {
            return Err(Error::IntegrityCheckFailed);
        }

        ciphertext.truncate(mdc_start);
        ciphertext.drain(..bs + 2);

        Ok(ciphertext)
    }

    /// Regular CFB with an explicit IV, used for secret key material.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        with_cipher!(self, cfb_encrypt(key, iv, data))
    }

    /// Regular CFB with an explicit IV, used for secret key material.
    pub fn decrypt_with_iv_regular(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        with_cipher!(self, cfb_decrypt(key, iv, data))
    }
}
