use log::debug;
use num_bigint::traits::ModInverse;
use num_bigint::BigUint;
use rand::{CryptoRng, Rng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{format_err, unsupported_err, Error, Result};
use crate::types::Mpi;

/// RSA decryption using PKCS1v15 padding.
pub fn decrypt(priv_key: &RsaPrivateKey, c: &Mpi) -> Result<Zeroizing<Vec<u8>>> {
    // the mpi drops leading zeros, the primitive wants exactly the modulus size
    let ciphertext = c.to_padded(priv_key.size());
    let m = priv_key
        .decrypt(Pkcs1v15Encrypt, &ciphertext)
        .map_err(|err| Error::DecryptionFailed {
            message: format!("rsa: {err}"),
        })?;

    Ok(Zeroizing::new(m))
}

/// RSA encryption using PKCS1v15 padding.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    n: &Mpi,
    e: &Mpi,
    plaintext: &[u8],
) -> Result<Mpi> {
    debug!("RSA encrypt");

    let key = RsaPublicKey::new(n.to_biguint(), e.to_biguint())?;
    let data = key.encrypt(rng, Pkcs1v15Encrypt, plaintext)?;

    Ok(Mpi::from_slice(&data))
}

/// Rebuilds a private key from the OpenPGP secret MPIs.
pub fn private_key_from_mpis(n: &Mpi, e: &Mpi, d: &Mpi, p: &Mpi, q: &Mpi) -> Result<RsaPrivateKey> {
    let key = RsaPrivateKey::from_components(
        n.to_biguint(),
        e.to_biguint(),
        d.to_biguint(),
        vec![p.to_biguint(), q.to_biguint()],
    )?;
    Ok(key)
}

/// The `u` value OpenPGP stores: p^-1 mod q.
pub fn secret_u(key: &RsaPrivateKey) -> Result<BigUint> {
    let [p, q] = match key.primes() {
        [p, q] => [p, q],
        _ => return Err(format_err!("rsa key must have exactly two primes")),
    };

    p.clone()
        .mod_inverse(q)
        .and_then(|u| u.to_biguint())
        .ok_or_else(|| format_err!("invalid rsa primes"))
}

/// Secret MPIs in OpenPGP order: `d`, `p`, `q`, `u`.
pub fn secret_mpis(key: &RsaPrivateKey) -> Result<[Mpi; 4]> {
    let u = secret_u(key)?;
    let [p, q] = match key.primes() {
        [p, q] => [p, q],
        _ => return Err(format_err!("rsa key must have exactly two primes")),
    };

    Ok([Mpi::from(key.d()), Mpi::from(p), Mpi::from(q), Mpi::from(&u)])
}

/// Generate an RSA key pair.
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R, bit_size: usize) -> Result<RsaPrivateKey> {
    debug!("generating {bit_size} bit RSA key");
    let key = RsaPrivateKey::new(rng, bit_size)?;
    Ok(key)
}

/// Public MPIs of a private key.
pub fn public_mpis(key: &RsaPrivateKey) -> (Mpi, Mpi) {
    (Mpi::from(key.n()), Mpi::from(key.e()))
}

/// Sign a digest using RSA with PKCS1v15 padding.
pub fn sign(key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<Mpi> {
    let scheme = match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        _ => unsupported_err!("rsa signatures over {}", hash),
    };
    let sig = key.sign(scheme, digest)?;

    Ok(Mpi::from_slice(&sig))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn encrypt_decrypt() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let key = generate_key(&mut rng, 1024).unwrap();
        let (n, e) = public_mpis(&key);

        let c = encrypt(&mut rng, &n, &e, b"session key").unwrap();
        let m = decrypt(&key, &c).unwrap();
        assert_eq!(&m[..], b"session key");
    }

    #[test]
    fn rebuild_from_mpis() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key = generate_key(&mut rng, 1024).unwrap();
        let (n, e) = public_mpis(&key);
        let d = Mpi::from(key.d());
        let p = Mpi::from(&key.primes()[0]);
        let q = Mpi::from(&key.primes()[1]);

        let rebuilt = private_key_from_mpis(&n, &e, &d, &p, &q).unwrap();
        assert_eq!(rebuilt.n(), key.n());

        let u = secret_u(&key).unwrap();
        assert_eq!((&u * &key.primes()[0]) % &key.primes()[1], BigUint::from(1u8));
    }

    #[test]
    fn sign_verifies() {
        use sha2::Digest;

        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let key = generate_key(&mut rng, 1024).unwrap();
        let digest = sha2::Sha256::digest(b"hello");

        let sig = sign(&key, HashAlgorithm::Sha256, &digest).unwrap();
        key.to_public_key()
            .verify(
                Pkcs1v15Sign::new::<sha2::Sha256>(),
                &digest,
                &sig.to_padded(key.size()),
            )
            .unwrap();
    }
}
