use std::io::{Read, Write};

use chrono::{SubsecRound, Utc};
use derive_builder::Builder;
use log::debug;
use rand::{CryptoRng, Rng};

use crate::armor::{self, BlockType};
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{
    write_packet, CompressedData, DataMode, LiteralData, LiteralDataHeader, PacketTrait,
    PublicKey, PublicKeyEncryptedSessionKey, SymEncryptedData, SymEncryptedProtectedData,
    MAX_FILE_NAME_LEN,
};
use crate::types::CompressionAlgorithm;

/// Partial body chunk size used for large data packets.
pub const DEFAULT_PARTIAL_CHUNK_SIZE: u32 = 1024 * 512;

/// How [`encrypt`] builds a message.
#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate", error = "crate::errors::Error"))]
pub struct EncryptionConfig {
    pub cipher: SymmetricKeyAlgorithm,
    /// Use SEIPD with an MDC instead of legacy SED.
    pub integrity_protected: bool,
    /// Wrap the output in a `PGP MESSAGE` armor block.
    pub armor: bool,
    /// `None` stores the literal packet without a compression layer.
    #[builder(setter(strip_option))]
    pub compression: Option<CompressionAlgorithm>,
    #[builder(setter(into))]
    pub file_name: String,
    pub data_mode: DataMode,
    pub chunk_size: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        EncryptionConfig {
            cipher: SymmetricKeyAlgorithm::AES256,
            integrity_protected: true,
            armor: false,
            compression: Some(CompressionAlgorithm::ZIP),
            file_name: String::new(),
            data_mode: DataMode::Binary,
            chunk_size: DEFAULT_PARTIAL_CHUNK_SIZE,
        }
    }
}

impl EncryptionConfigBuilder {
    /// Stores the literal packet without a compression layer.
    pub fn no_compression(&mut self) -> &mut Self {
        self.compression = Some(None);
        self
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(size) = self.chunk_size {
            if size < 512 || !size.is_power_of_two() {
                return Err(format!(
                    "chunk size must be a power of two of at least 512, got {size}"
                ));
            }
        }
        if let Some(ref name) = self.file_name {
            if name.len() > MAX_FILE_NAME_LEN {
                return Err(format!("file name too long: {} bytes", name.len()));
            }
        }
        if let Some(cipher) = self.cipher {
            if cipher == SymmetricKeyAlgorithm::Plaintext || cipher.key_size() == 0 {
                return Err(format!("{cipher:?} can not be used for encryption"));
            }
        }
        if let Some(Some(alg)) = self.compression {
            if matches!(alg, CompressionAlgorithm::Other(_)) {
                return Err(format!("unknown compression algorithm {alg:?}"));
            }
        }
        Ok(())
    }
}

impl EncryptionConfig {
    pub fn builder() -> EncryptionConfigBuilder {
        EncryptionConfigBuilder::default()
    }
}

/// Builds the packets inside the encryption layer.
fn inner_message<R: Read>(mut plaintext: R, config: &EncryptionConfig) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    plaintext.read_to_end(&mut data)?;

    let header = LiteralDataHeader::new(
        config.data_mode,
        config.file_name.as_bytes().to_vec(),
        Utc::now().trunc_subsecs(0),
    );
    debug!("literal data: {} bytes, {:?}", data.len(), header);
    let literal = LiteralData::new(header, data);

    let mut inner = Vec::new();
    match config.compression {
        Some(alg) => {
            let mut framed = Vec::new();
            write_packet(&mut framed, &literal)?;
            let compressed = CompressedData::from_raw(alg, &framed)?;
            compressed.to_writer_partial(&mut inner, config.chunk_size)?;
        }
        None => literal.to_writer_partial(&mut inner, config.chunk_size)?,
    }

    Ok(inner)
}

/// Encrypts `plaintext` to `recipient` and writes the message to `output`.
///
/// The message is `PKESK, SEIPD(Compressed(Literal))`, with the compressed
/// layer and the integrity protection depending on `config`.
pub fn encrypt<RAND, R, W>(
    mut rng: RAND,
    plaintext: R,
    recipient: &PublicKey,
    config: &EncryptionConfig,
    mut output: W,
) -> Result<()>
where
    RAND: Rng + CryptoRng,
    R: Read,
    W: Write,
{
    let inner = inner_message(plaintext, config)?;

    let session_key = config.cipher.new_session_key(&mut rng);
    let esk =
        PublicKeyEncryptedSessionKey::from_session_key(&mut rng, &session_key, config.cipher, recipient)?;
    debug!(
        "session key for {} ({:?}), {:?}",
        recipient.key_id(),
        recipient.algorithm(),
        config.cipher
    );

    let mut message = Vec::new();
    write_packet(&mut message, &esk)?;
    if config.integrity_protected {
        let edata = SymEncryptedProtectedData::encrypt(&mut rng, config.cipher, &session_key, &inner)?;
        edata.to_writer_partial(&mut message, config.chunk_size)?;
    } else {
        let edata = SymEncryptedData::encrypt(&mut rng, config.cipher, &session_key, &inner)?;
        edata.to_writer_partial(&mut message, config.chunk_size)?;
    }

    if config.armor {
        output.write_all(armor::wrap(BlockType::Message, &message)?.as_bytes())?;
    } else {
        output.write_all(&message)?;
    }
    output.flush()?;

    Ok(())
}
