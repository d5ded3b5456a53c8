//! File based entry points: encrypt a file to the key in a public key ring
//! file, or decrypt a file with the key in a secret key ring file.
//!
//! On failure the output file is removed, so a partially written file is
//! never left behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, warn};
use rand::{CryptoRng, Rng};

use crate::composed::{
    decrypt, encrypt, load_private_key, load_public_key, EncryptionConfig,
};
use crate::errors::{bail, Result};
use crate::packet::LiteralDataHeader;
use crate::types::Password;

/// Runs `f` against a freshly created `path`, deleting the file if `f` fails.
fn with_output_file<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    debug!("writing to file: {}", path.display());
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut out = BufWriter::new(file);

    let res = f(&mut out).and_then(|value| {
        out.flush()?;
        Ok(value)
    });
    drop(out);

    if res.is_err() {
        if let Err(err) = fs::remove_file(path) {
            warn!("failed to remove {}: {}", path.display(), err);
        }
    }
    res
}

/// Encrypts `input` to the encryption key found in `public_key_ring`.
///
/// If `config` carries no file name, the name of `input` is recorded in the
/// literal data packet.
pub fn encrypt_file_with_rng<RAND, P, Q, K>(
    rng: RAND,
    output: P,
    input: Q,
    public_key_ring: K,
    config: &EncryptionConfig,
) -> Result<()>
where
    RAND: Rng + CryptoRng,
    P: AsRef<Path>,
    Q: AsRef<Path>,
    K: AsRef<Path>,
{
    let input = input.as_ref();
    let recipient = load_public_key(BufReader::new(File::open(public_key_ring.as_ref())?))?;

    let mut config = config.clone();
    if config.file_name.is_empty() {
        let Some(name) = input.file_name() else {
            bail!("{}: is not a valid input file", input.display());
        };
        config.file_name = name.to_string_lossy().into_owned();
    }
    let plaintext = BufReader::new(File::open(input)?);

    with_output_file(output.as_ref(), |out| {
        encrypt(rng, plaintext, &recipient, &config, out)
    })
}

/// Encrypts `input` to the encryption key found in `public_key_ring`, using
/// the thread local RNG.
pub fn encrypt_file<P, Q, K>(
    output: P,
    input: Q,
    public_key_ring: K,
    config: &EncryptionConfig,
) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    K: AsRef<Path>,
{
    encrypt_file_with_rng(rand::thread_rng(), output, input, public_key_ring, config)
}

/// Decrypts `input` with the decryption key found in `secret_key_ring`,
/// unlocked with `passphrase`, writing the literal data to `output`.
pub fn decrypt_file<P, K, Q>(
    input: P,
    secret_key_ring: K,
    passphrase: &Password,
    output: Q,
) -> Result<LiteralDataHeader>
where
    P: AsRef<Path>,
    K: AsRef<Path>,
    Q: AsRef<Path>,
{
    let key = load_private_key(
        BufReader::new(File::open(secret_key_ring.as_ref())?),
        passphrase,
    )?;
    let input = BufReader::new(File::open(input.as_ref())?);

    with_output_file(output.as_ref(), |out| decrypt(input, &key, out))
}
