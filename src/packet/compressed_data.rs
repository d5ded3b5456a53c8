use std::io::{self, BufRead, Read, Write};

use bytes::Bytes;
use flate2::bufread::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use log::debug;

use crate::errors::{Error, Result};
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, Tag};

/// Compressed Data Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-compressed-data-packet-typ>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct CompressedData {
    compression_algorithm: CompressionAlgorithm,
    #[debug("{} bytes", compressed_data.len())]
    compressed_data: Bytes,
}

/// Streaming decompression of a compressed data body.
pub enum Decompressor<R: BufRead> {
    Uncompressed(R),
    Zip(DeflateDecoder<R>),
    Zlib(ZlibDecoder<R>),
    #[cfg(feature = "bzip2")]
    Bzip2(bzip2::bufread::BzDecoder<R>),
}

impl<R: BufRead> std::fmt::Debug for Decompressor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Decompressor::Uncompressed(_) => "Uncompressed",
            Decompressor::Zip(_) => "Zip",
            Decompressor::Zlib(_) => "Zlib",
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(_) => "Bzip2",
        };
        f.debug_tuple("Decompressor").field(&name).finish()
    }
}

impl<R: BufRead> Decompressor<R> {
    /// Reads the algorithm octet and sets up decompression of the rest.
    pub fn from_reader(mut r: R) -> Result<Self> {
        let alg = CompressionAlgorithm::from(
            r.read_u8()
                .map_err(|err| Error::from(err).into_malformed("compressed data"))?,
        );
        Self::new(alg, r)
    }

    pub fn new(alg: CompressionAlgorithm, r: R) -> Result<Self> {
        debug!("decompressing {:?}", alg);
        match alg {
            CompressionAlgorithm::Uncompressed => Ok(Decompressor::Uncompressed(r)),
            CompressionAlgorithm::ZIP => Ok(Decompressor::Zip(DeflateDecoder::new(r))),
            CompressionAlgorithm::ZLIB => Ok(Decompressor::Zlib(ZlibDecoder::new(r))),
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2 => Ok(Decompressor::Bzip2(
                bzip2::bufread::BzDecoder::new(r),
            )),
            _ => Err(Error::UnsupportedCompression {
                algorithm: u8::from(alg),
            }),
        }
    }
}

impl<R: BufRead> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decompressor::Uncompressed(r) => r.read(buf),
            Decompressor::Zip(r) => r.read(buf),
            Decompressor::Zlib(r) => r.read(buf),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(r) => r.read(buf),
        }
    }
}

/// Compresses `data` with `alg`, without the algorithm octet.
pub fn compress(alg: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    debug!("compressing {} bytes with {:?}", data.len(), alg);
    match alg {
        CompressionAlgorithm::Uncompressed => Ok(data.to_vec()),
        CompressionAlgorithm::ZIP => {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        CompressionAlgorithm::ZLIB => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        #[cfg(feature = "bzip2")]
        CompressionAlgorithm::BZip2 => {
            let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        _ => Err(Error::UnsupportedCompression {
            algorithm: u8::from(alg),
        }),
    }
}

impl CompressedData {
    /// Compresses `data` into a new packet.
    pub fn from_raw(alg: CompressionAlgorithm, data: &[u8]) -> Result<Self> {
        Ok(CompressedData {
            compression_algorithm: alg,
            compressed_data: compress(alg, data)?.into(),
        })
    }

    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let alg = CompressionAlgorithm::from(
            r.read_u8()
                .map_err(|err| Error::from(err).into_malformed("compressed data"))?,
        );
        Ok(CompressedData {
            compression_algorithm: alg,
            compressed_data: r.rest()?.freeze(),
        })
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.compression_algorithm
    }

    pub fn decompress(&self) -> Result<Decompressor<&[u8]>> {
        Decompressor::new(self.compression_algorithm, &self.compressed_data[..])
    }

    /// Decompresses the whole body.
    pub fn decompress_to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.decompress()?
            .read_to_end(&mut out)
            .map_err(|err| Error::from(err).into_malformed("compressed data"))?;
        Ok(out)
    }
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[u8::from(self.compression_algorithm)])?;
        writer.write_all(&self.compressed_data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.compressed_data.len()
    }
}

impl PacketTrait for CompressedData {
    fn tag(&self) -> Tag {
        Tag::CompressedData
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn all_algorithms() -> Vec<CompressionAlgorithm> {
        vec![
            CompressionAlgorithm::Uncompressed,
            CompressionAlgorithm::ZIP,
            CompressionAlgorithm::ZLIB,
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2,
        ]
    }

    #[test]
    fn compress_decompress() {
        let data = b"hello hello hello hello hello hello world".repeat(20);
        for alg in all_algorithms() {
            let packet = CompressedData::from_raw(alg, &data).unwrap();
            assert_eq!(packet.algorithm(), alg);

            let bytes = packet.to_bytes().unwrap();
            let back = CompressedData::try_from_reader(&bytes[..]).unwrap();
            assert_eq!(back.decompress_to_vec().unwrap(), data, "{alg:?}");
        }
    }

    #[test]
    fn unknown_algorithm() {
        let err = compress(CompressionAlgorithm::Other(110), b"x").unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompression { algorithm: 110 }));

        let packet = CompressedData::try_from_reader(&[7u8, 1, 2, 3][..]).unwrap();
        let err = packet.decompress().unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompression { algorithm: 7 }));
    }

    #[test]
    fn corrupt_stream_is_malformed() {
        let packet = CompressedData::try_from_reader(&[2u8, 0xFF, 0xFF, 0xFF, 0xFF][..]).unwrap();
        assert!(packet.decompress_to_vec().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn zip_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let packet = CompressedData::from_raw(CompressionAlgorithm::ZIP, &data).unwrap();
            prop_assert_eq!(packet.decompress_to_vec().unwrap(), data);
        }
    }
}
