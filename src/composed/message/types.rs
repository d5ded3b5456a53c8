use std::io::{self, BufRead, Read, Write};

use buffer_redux::BufReader;
use log::debug;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{malformed, Error, Result};
use crate::packet::{
    Decompressor, LiteralDataHeader, PacketBodyReader, PacketHeader, PacketTrait,
    PublicKeyEncryptedSessionKey, SymEncryptedData, SymEncryptedProtectedData,
};
use crate::parsing_reader::BufReadParsing;
use crate::types::Tag;

/// Raw packet stream a message is read from.
pub type Source<'a> = Box<dyn BufRead + 'a>;

/// Encrypted data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edata {
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
}

impl Edata {
    pub fn tag(&self) -> Tag {
        match self {
            Edata::SymEncryptedData(p) => p.tag(),
            Edata::SymEncryptedProtectedData(p) => p.tag(),
        }
    }

    /// Decrypts the payload. For integrity protected data the MDC is checked
    /// before anything is returned.
    pub fn decrypt(&self, alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Vec<u8>> {
        match self {
            Edata::SymEncryptedData(p) => p.decrypt(alg, key),
            Edata::SymEncryptedProtectedData(p) => p.decrypt(alg, key),
        }
    }

    pub(crate) fn try_from_body<R: BufRead>(tag: Tag, body: R) -> Result<Self> {
        match tag {
            Tag::SymEncryptedData => SymEncryptedData::try_from_reader(body).map(Self::from),
            Tag::SymEncryptedProtectedData => {
                SymEncryptedProtectedData::try_from_reader(body).map(Self::from)
            }
            _ => Err(Error::UnexpectedMessageType { tag }),
        }
    }
}

impl From<SymEncryptedData> for Edata {
    fn from(p: SymEncryptedData) -> Self {
        Edata::SymEncryptedData(p)
    }
}

impl From<SymEncryptedProtectedData> for Edata {
    fn from(p: SymEncryptedProtectedData) -> Self {
        Edata::SymEncryptedProtectedData(p)
    }
}

/// One layer of an OpenPGP message.
///
/// Compressed and literal layers keep a lazy reader over their packet body,
/// so payloads are streamed rather than buffered.
pub enum Message<'a> {
    Encrypted {
        esk: Vec<PublicKeyEncryptedSessionKey>,
        edata: Edata,
    },
    Compressed {
        reader: Decompressor<PacketBodyReader<Source<'a>>>,
    },
    Literal {
        header: LiteralDataHeader,
        reader: PacketBodyReader<Source<'a>>,
    },
    /// A signed message, starting with a one pass signature or a signature.
    Signed { tag: Tag },
}

impl std::fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Encrypted { esk, edata } => f
                .debug_struct("Encrypted")
                .field("esk", esk)
                .field("edata", &edata.tag())
                .finish(),
            Message::Compressed { reader } => {
                f.debug_struct("Compressed").field("reader", reader).finish()
            }
            Message::Literal { header, .. } => {
                f.debug_struct("Literal").field("header", header).finish()
            }
            Message::Signed { tag } => f.debug_struct("Signed").field("tag", tag).finish(),
        }
    }
}

/// Reads the next packet header, handing out an owned reader over its body.
pub(crate) fn next_packet(mut source: Source<'_>) -> Result<Option<PacketBodyReader<Source<'_>>>> {
    let Some(header) = PacketHeader::try_from_reader(&mut source)? else {
        return Ok(None);
    };
    debug!("found header {:?}", header);

    Ok(Some(PacketBodyReader::new(header, source)?))
}

/// Reads what is left of a packet body, returning the stream behind it.
pub(crate) fn skip_rest(mut body: PacketBodyReader<Source<'_>>) -> Result<Source<'_>> {
    let skipped = body
        .drain()
        .map_err(|err| Error::from(err).into_malformed("packet body"))?;
    if skipped > 0 {
        debug!("{:?}: skipped {} bytes", body.tag(), skipped);
    }
    Ok(body.into_inner())
}

impl<'a> Message<'a> {
    /// Reads the outermost layer of the message in `source`.
    pub fn from_reader<R: BufRead + 'a>(source: R) -> Result<Self> {
        let mut source: Source<'a> = Box::new(source);
        let mut esk = Vec::new();

        loop {
            let Some(mut body) = next_packet(source)? else {
                if esk.is_empty() {
                    malformed!("message contains no packets");
                }
                malformed!("session key packets without encrypted data");
            };

            let tag = body.tag();
            match tag {
                Tag::Marker => {
                    source = skip_rest(body)?;
                }
                Tag::PublicKeyEncryptedSessionKey => {
                    esk.push(PublicKeyEncryptedSessionKey::try_from_reader(&mut body)?);
                    source = skip_rest(body)?;
                }
                Tag::SymEncryptedData | Tag::SymEncryptedProtectedData => {
                    let edata = Edata::try_from_body(tag, &mut body)?;
                    return Ok(Message::Encrypted { esk, edata });
                }
                _ if !esk.is_empty() => {
                    return Err(Error::UnexpectedMessageType { tag });
                }
                Tag::CompressedData => {
                    let reader = Decompressor::from_reader(body)?;
                    return Ok(Message::Compressed { reader });
                }
                Tag::LiteralData => {
                    let header = LiteralDataHeader::try_from_reader(&mut body)?;
                    return Ok(Message::Literal {
                        header,
                        reader: body,
                    });
                }
                Tag::OnePassSignature | Tag::Signature => {
                    return Ok(Message::Signed { tag });
                }
                _ => return Err(Error::UnexpectedMessageType { tag }),
            }
        }
    }

    /// Reads the message inside a compressed layer.
    pub fn decompress(self) -> Result<Message<'a>> {
        match self {
            Message::Compressed { reader } => Message::from_reader(BufReader::new(reader)),
            other => Err(Error::Message {
                message: format!("not a compressed message: {other:?}"),
            }),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Message::Literal { .. })
    }

    /// Streams the payload of a literal layer to `output`, returning its
    /// header and the number of bytes written.
    pub fn write_literal<W: Write>(self, output: &mut W) -> Result<(LiteralDataHeader, u64)> {
        let Message::Literal { header, mut reader } = self else {
            return Err(Error::Message {
                message: "not a literal data message".to_string(),
            });
        };

        let mut written = 0u64;
        let mut buf = vec![0u8; 8 * 1024];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::from(err).into_malformed("literal data")),
            };
            output.write_all(&buf[..n])?;
            written += n as u64;
        }
        debug!("literal data: {} bytes", written);

        Ok((header, written))
    }
}
