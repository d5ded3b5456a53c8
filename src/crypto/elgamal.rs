//! Elgamal encryption with EME-PKCS1-v1_5 encoding of the session key.
//!
//! Ref: <https://www.rfc-editor.org/rfc/rfc4880#section-13.1>

use log::debug;
use num_bigint::traits::ModInverse;
use num_bigint::{BigUint, RandBigInt};
use num_traits::One;
use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{Error, Result};
use crate::types::Mpi;

/// 2048-bit MODP group, RFC 3526 section 3.
const MODP_2048_P: &str = "\
    FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
    29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
    EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
    E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
    EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
    C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
    83655D23DCA3AD961C62F356208552BB9ED529077096966D\
    670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
    E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
    DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
    15728E5A8AACAA68FFFFFFFFFFFFFFFF";

const MODP_2048_G: u32 = 2;

/// Secret exponent of an Elgamal key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, derive_more::Debug)]
pub struct SecretKey {
    #[debug("..")]
    x: Vec<u8>,
    #[zeroize(skip)]
    p: Mpi,
}

impl SecretKey {
    pub fn new(p: Mpi, x: &Mpi) -> Self {
        Self {
            x: x.as_bytes().to_vec(),
            p,
        }
    }

    pub fn as_mpi(&self) -> Mpi {
        Mpi::from_slice(&self.x)
    }

    /// Recovers the EME-PKCS1 decoded session key payload.
    pub fn decrypt(&self, first: &Mpi, second: &Mpi) -> Result<Zeroizing<Vec<u8>>> {
        let p = self.p.to_biguint();
        let x = BigUint::from_bytes_be(&self.x);

        let c1 = first.to_biguint();
        let c2 = second.to_biguint();
        if c1 >= p || c2 >= p {
            return Err(decryption_failed("ciphertext out of range"));
        }

        let s = c1.modpow(&x, &p);
        let s_inv = s
            .mod_inverse(&p)
            .and_then(|v| v.to_biguint())
            .ok_or_else(|| decryption_failed("shared secret is not invertible"))?;
        let m = (c2 * s_inv) % &p;

        let mut encoded = Zeroizing::new(m.to_bytes_be());
        let k = self.p.len();
        if encoded.len() > k {
            return Err(decryption_failed("decoded value too large"));
        }
        // restore the leading zero octets of the encoding
        let mut em = Zeroizing::new(vec![0u8; k - encoded.len()]);
        em.extend_from_slice(&encoded);
        encoded.zeroize();

        eme_pkcs1_decode(&em)
    }
}

/// Encrypts `plaintext` to the public key `(p, g, y)`, returning `(g^k, m * y^k)`.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    p: &Mpi,
    g: &Mpi,
    y: &Mpi,
    plaintext: &[u8],
) -> Result<(Mpi, Mpi)> {
    debug!("Elgamal encrypt");

    let em = eme_pkcs1_encode(rng, p.len(), plaintext)?;
    let m = BigUint::from_bytes_be(&em);

    let p = p.to_biguint();
    let g = g.to_biguint();
    let y = y.to_biguint();

    let two = BigUint::from(2u8);
    let k = rng.gen_biguint_range(&two, &(&p - &two));

    let c1 = g.modpow(&k, &p);
    let c2 = (m * y.modpow(&k, &p)) % &p;

    Ok((Mpi::from(&c1), Mpi::from(&c2)))
}

/// Generates a key in the RFC 3526 2048-bit group, returning `(p, g, y)` and
/// the secret exponent.
pub fn generate_key<R: CryptoRng + Rng>(rng: &mut R) -> Result<((Mpi, Mpi, Mpi), SecretKey)> {
    let p = BigUint::parse_bytes(MODP_2048_P.as_bytes(), 16)
        .ok_or_else(|| Error::Message {
            message: "invalid builtin modp group".to_string(),
        })?;
    let g = BigUint::from(MODP_2048_G);

    let two = BigUint::from(2u8);
    let x = rng.gen_biguint_range(&two, &(&p - BigUint::one()));
    let y = g.modpow(&x, &p);

    let p = Mpi::from(&p);
    let secret = SecretKey::new(p.clone(), &Mpi::from(&x));

    Ok(((p, Mpi::from(&g), Mpi::from(&y)), secret))
}

/// EME-PKCS1-v1_5 encoding: `0x00 || 0x02 || PS || 0x00 || M`.
fn eme_pkcs1_encode<R: CryptoRng + Rng>(
    rng: &mut R,
    k: usize,
    message: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if message.len() + 11 > k {
        return Err(Error::Message {
            message: "message too long for Elgamal key".to_string(),
        });
    }

    let mut em = Zeroizing::new(vec![0u8; k]);
    em[1] = 2;
    let ps_len = k - message.len() - 3;
    for b in &mut em[2..2 + ps_len] {
        *b = rng.gen_range(1..=255);
    }
    em[k - message.len()..].copy_from_slice(message);

    Ok(em)
}

fn eme_pkcs1_decode(em: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if em.len() < 11 || em[0] != 0 || em[1] != 2 {
        return Err(decryption_failed("invalid EME-PKCS1 encoding"));
    }

    let sep = em[2..]
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| decryption_failed("missing EME-PKCS1 separator"))?;
    if sep < 8 {
        return Err(decryption_failed("EME-PKCS1 padding too short"));
    }

    Ok(Zeroizing::new(em[2 + sep + 1..].to_vec()))
}

fn decryption_failed(message: &str) -> Error {
    Error::DecryptionFailed {
        message: format!("elgamal: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn modp_group_size() {
        let p = BigUint::parse_bytes(MODP_2048_P.as_bytes(), 16).unwrap();
        assert_eq!(p.bits(), 2048);
    }

    #[test]
    fn encrypt_decrypt() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ((p, g, y), secret) = generate_key(&mut rng).unwrap();

        let session = [9u8, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 0, 136];
        let (c1, c2) = encrypt(&mut rng, &p, &g, &y, &session).unwrap();
        let decrypted = secret.decrypt(&c1, &c2).unwrap();
        assert_eq!(&decrypted[..], &session[..]);
    }

    #[test]
    fn eme_pkcs1() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let em = eme_pkcs1_encode(&mut rng, 64, b"hello").unwrap();
        assert_eq!(em.len(), 64);
        assert!(em[2..58].iter().all(|b| *b != 0));
        assert_eq!(&eme_pkcs1_decode(&em).unwrap()[..], b"hello");

        assert!(eme_pkcs1_encode(&mut rng, 15, b"hello").is_err());

        let mut bad = em.to_vec();
        bad[1] = 1;
        assert!(eme_pkcs1_decode(&bad).is_err());
    }
}
