use std::io::{self, BufRead};

use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ensure, unsupported_err, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;

/// Coded count used for freshly protected keys (65011712 octets).
pub const DEFAULT_ITER_COUNT: u8 = 0xFF;

/// String-To-Key specifier, turns a passphrase into a symmetric key.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-string-to-key-s2k-specifier>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringToKey {
    Simple {
        hash_alg: HashAlgorithm,
    },
    Salted {
        hash_alg: HashAlgorithm,
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash_alg: HashAlgorithm,
        salt: [u8; 8],
        /// Coded count
        count: u8,
    },
    /// GnuPG extension: the secret part of the key is not present.
    GnuDummy {
        hash_alg: HashAlgorithm,
        mode: u8,
    },
}

impl StringToKey {
    pub fn new_iterated<R: CryptoRng + Rng>(
        mut rng: R,
        hash_alg: HashAlgorithm,
        count: u8,
    ) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt);

        StringToKey::IteratedAndSalted {
            hash_alg,
            salt,
            count,
        }
    }

    pub fn from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let typ = r.read_u8()?;
        let hash_alg = HashAlgorithm::from(r.read_u8()?);

        let s2k = match typ {
            0 => StringToKey::Simple { hash_alg },
            1 => StringToKey::Salted {
                hash_alg,
                salt: r.read_array::<8>()?,
            },
            3 => StringToKey::IteratedAndSalted {
                hash_alg,
                salt: r.read_array::<8>()?,
                count: r.read_u8()?,
            },
            101 => {
                let magic = r.read_array::<3>()?;
                ensure!(&magic == b"GNU", "unknown private s2k extension");
                StringToKey::GnuDummy {
                    hash_alg,
                    mode: r.read_u8()?,
                }
            }
            _ => unsupported_err!("string to key type {}", typ),
        };

        Ok(s2k)
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        match self {
            StringToKey::Simple { hash_alg }
            | StringToKey::Salted { hash_alg, .. }
            | StringToKey::IteratedAndSalted { hash_alg, .. }
            | StringToKey::GnuDummy { hash_alg, .. } => *hash_alg,
        }
    }

    /// Decodes the coded count into the number of octets to hash.
    ///
    /// Ref: <https://www.rfc-editor.org/rfc/rfc4880#section-3.7.1.3>
    pub fn decoded_count(&self) -> Option<usize> {
        match self {
            StringToKey::IteratedAndSalted { count, .. } => Some(decode_count(*count)),
            _ => None,
        }
    }

    /// Derives a key of `key_size` octets from the passphrase.
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let (hash_alg, salt, count) = match self {
            StringToKey::Simple { hash_alg } => (*hash_alg, &[][..], None),
            StringToKey::Salted { hash_alg, salt } => (*hash_alg, &salt[..], None),
            StringToKey::IteratedAndSalted {
                hash_alg,
                salt,
                count,
            } => (*hash_alg, &salt[..], Some(decode_count(*count))),
            StringToKey::GnuDummy { .. } => {
                unsupported_err!("secret key material is not present (gnu-dummy)")
            }
        };

        let digest_size = match hash_alg.digest_size() {
            Some(size) => size,
            None => unsupported_err!("s2k hash {:?}", hash_alg),
        };

        let mut key = Zeroizing::new(Vec::with_capacity(key_size));
        let rounds = key_size.div_ceil(digest_size);
        let data_len = salt.len() + passphrase.len();

        for round in 0..rounds {
            let mut hasher = hash_alg.new_hasher()?;
            // each additional context is preloaded with one more zero octet
            hasher.update(&vec![0u8; round]);

            match count {
                Some(count) => {
                    // the whole salt and passphrase is hashed at least once
                    let mut remaining = count.max(data_len);
                    while remaining > 0 {
                        let salt_part = remaining.min(salt.len());
                        hasher.update(&salt[..salt_part]);
                        remaining -= salt_part;

                        let pw_part = remaining.min(passphrase.len());
                        hasher.update(&passphrase[..pw_part]);
                        remaining -= pw_part;

                        if data_len == 0 {
                            break;
                        }
                    }
                }
                None => {
                    hasher.update(salt);
                    hasher.update(passphrase);
                }
            }

            let digest = Zeroizing::new(hasher.finalize().to_vec());
            let take = (key_size - key.len()).min(digest_size);
            key.extend_from_slice(&digest[..take]);
        }

        Ok(key)
    }
}

fn decode_count(c: u8) -> usize {
    ((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            StringToKey::Simple { hash_alg } => {
                writer.write_all(&[0, u8::from(*hash_alg)])?;
            }
            StringToKey::Salted { hash_alg, salt } => {
                writer.write_all(&[1, u8::from(*hash_alg)])?;
                writer.write_all(salt)?;
            }
            StringToKey::IteratedAndSalted {
                hash_alg,
                salt,
                count,
            } => {
                writer.write_all(&[3, u8::from(*hash_alg)])?;
                writer.write_all(salt)?;
                writer.write_all(&[*count])?;
            }
            StringToKey::GnuDummy { hash_alg, mode } => {
                writer.write_all(&[101, u8::from(*hash_alg)])?;
                writer.write_all(b"GNU")?;
                writer.write_all(&[*mode])?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            StringToKey::Simple { .. } => 2,
            StringToKey::Salted { .. } => 10,
            StringToKey::IteratedAndSalted { .. } => 11,
            StringToKey::GnuDummy { .. } => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_decoded_count() {
        assert_eq!(decode_count(0), 1024);
        assert_eq!(decode_count(96), 65536);
        assert_eq!(decode_count(0xFF), 65_011_712);
    }

    #[test]
    fn simple_s2k_is_plain_hash() {
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Sha1,
        };
        let key = s2k.derive_key(b"abc", 16).unwrap();
        assert_eq!(
            &key[..],
            &hex_literal::hex!("a9993e364706816aba3e25717850c26c")[..]
        );
    }

    #[test]
    fn long_keys_use_preloaded_contexts() {
        let s2k = StringToKey::Salted {
            hash_alg: HashAlgorithm::Sha1,
            salt: [7u8; 8],
        };
        let key = s2k.derive_key(b"passphrase", 32).unwrap();
        assert_eq!(key.len(), 32);

        let first = HashAlgorithm::Sha1
            .digest(&[&[7u8; 8][..], b"passphrase"].concat())
            .unwrap();
        let second = HashAlgorithm::Sha1
            .digest(&[&[0u8][..], &[7u8; 8][..], b"passphrase"].concat())
            .unwrap();
        assert_eq!(&key[..20], &first[..]);
        assert_eq!(&key[20..], &second[..12]);
    }

    #[test]
    fn iterated_hashes_count_octets() {
        let salt = [1, 2, 3, 4, 5, 6, 7, 8];
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt,
            count: 0,
        };
        let key = s2k.derive_key(b"pw", 32).unwrap();

        let mut data = Vec::new();
        while data.len() < 1024 {
            data.extend_from_slice(&salt);
            data.extend_from_slice(b"pw");
        }
        data.truncate(1024);
        assert_eq!(&key[..], &HashAlgorithm::Sha256.digest(&data).unwrap()[..]);
    }

    #[test]
    fn serialize_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 96);
        let bytes = s2k.to_bytes().unwrap();
        assert_eq!(bytes.len(), 11);
        assert_eq!(StringToKey::from_reader(&bytes[..]).unwrap(), s2k);

        let dummy = hex_literal::hex!("6502474e5501");
        let s2k = StringToKey::from_reader(&dummy[..]).unwrap();
        assert_eq!(
            s2k,
            StringToKey::GnuDummy {
                hash_alg: HashAlgorithm::Sha1,
                mode: 1
            }
        );
        assert!(s2k.derive_key(b"", 16).is_err());
    }

    #[test]
    fn unknown_type_is_unsupported() {
        assert!(StringToKey::from_reader(&[2u8, 2][..]).is_err());
    }
}
