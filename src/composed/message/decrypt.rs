use std::io::{Cursor, Read, Write};

use log::{debug, warn};
use zeroize::Zeroizing;

use crate::composed::key::PrivateKey;
use crate::composed::message::types::{next_packet, skip_rest, Edata, Message, Source};
use crate::composed::shared::decoder_stream;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{LiteralDataHeader, PublicKeyEncryptedSessionKey};
use crate::parsing_reader::BufReadParsing;
use crate::types::Tag;

/// Maximum number of compression layers inside the encrypted data.
pub const MAX_NESTING: usize = 16;

enum State<'a> {
    /// Collecting session key packets until the encrypted data shows up.
    AwaitEncryptedData {
        source: Source<'a>,
        esk: Vec<PublicKeyEncryptedSessionKey>,
    },
    HaveSessionKeyPacket {
        esk: Vec<PublicKeyEncryptedSessionKey>,
        edata: Edata,
    },
    Unwrapped {
        edata: Edata,
        alg: SymmetricKeyAlgorithm,
        session_key: Zeroizing<Vec<u8>>,
    },
    InnerDispatch {
        message: Message<'a>,
        depth: usize,
    },
    Done(LiteralDataHeader),
}

impl std::fmt::Debug for State<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::AwaitEncryptedData { esk, .. } => f
                .debug_struct("AwaitEncryptedData")
                .field("esk", &esk.len())
                .finish(),
            State::HaveSessionKeyPacket { esk, edata } => f
                .debug_struct("HaveSessionKeyPacket")
                .field("esk", &esk.len())
                .field("edata", &edata.tag())
                .finish(),
            State::Unwrapped { edata, alg, .. } => f
                .debug_struct("Unwrapped")
                .field("edata", &edata.tag())
                .field("alg", alg)
                .finish(),
            State::InnerDispatch { message, depth } => f
                .debug_struct("InnerDispatch")
                .field("message", message)
                .field("depth", depth)
                .finish(),
            State::Done(header) => f.debug_tuple("Done").field(header).finish(),
        }
    }
}

impl<'a> State<'a> {
    fn step<W: Write>(self, key: &PrivateKey, output: &mut W) -> Result<State<'a>> {
        match self {
            State::AwaitEncryptedData { source, mut esk } => {
                let Some(mut body) = next_packet(source)? else {
                    return Err(Error::NoEncryptedData);
                };

                match body.tag() {
                    Tag::PublicKeyEncryptedSessionKey => {
                        esk.push(PublicKeyEncryptedSessionKey::try_from_reader(&mut body)?);
                        let source = skip_rest(body)?;
                        Ok(State::AwaitEncryptedData { source, esk })
                    }
                    tag @ (Tag::SymEncryptedData | Tag::SymEncryptedProtectedData) => {
                        let edata = Edata::try_from_body(tag, &mut body)?;

                        // reading to the end verifies the armor checksum
                        let trailing = skip_rest(body)?.drain()?;
                        if trailing > 0 {
                            debug!("ignoring {} bytes after the encrypted data", trailing);
                        }
                        Ok(State::HaveSessionKeyPacket { esk, edata })
                    }
                    tag => {
                        debug!("skipping {:?} before encrypted data", tag);
                        let source = skip_rest(body)?;
                        Ok(State::AwaitEncryptedData { source, esk })
                    }
                }
            }
            State::HaveSessionKeyPacket { esk, edata } => {
                let key_id = key.key_id();
                let mut last_err = None;

                for packet in esk.iter().filter(|p| p.matches(&key_id)) {
                    match packet.decrypt(key.decryption_key()) {
                        Ok((alg, session_key)) => {
                            debug!("unwrapped {:?} session key", alg);
                            return Ok(State::Unwrapped {
                                edata,
                                alg,
                                session_key,
                            });
                        }
                        Err(err) => {
                            warn!("session key packet for {}: {}", key_id, err);
                            last_err = Some(err);
                        }
                    }
                }

                Err(last_err.unwrap_or(Error::KeyMismatch { key_id }))
            }
            State::Unwrapped {
                edata,
                alg,
                session_key,
            } => {
                let plaintext = edata.decrypt(alg, &session_key)?;
                debug!("decrypted {} bytes", plaintext.len());

                let message = Message::from_reader(Cursor::new(plaintext))?;
                Ok(State::InnerDispatch { message, depth: 0 })
            }
            State::InnerDispatch { message, depth } => match message {
                Message::Compressed { .. } => {
                    if depth >= MAX_NESTING {
                        return Err(Error::NestingTooDeep { max: MAX_NESTING });
                    }
                    Ok(State::InnerDispatch {
                        message: message.decompress()?,
                        depth: depth + 1,
                    })
                }
                Message::Literal { .. } => {
                    let (header, len) = message.write_literal(output)?;
                    debug!("wrote {} bytes of {:?}", len, header);
                    Ok(State::Done(header))
                }
                Message::Signed { .. } => Err(Error::UnsupportedSignedMessage),
                Message::Encrypted { edata, .. } => {
                    Err(Error::UnexpectedMessageType { tag: edata.tag() })
                }
            },
            State::Done(header) => Ok(State::Done(header)),
        }
    }
}

/// Decrypts the binary or armored message in `input` with `key`, writing the
/// literal data to `output`.
///
/// Returns the header of the literal data packet. For integrity protected
/// messages nothing is written unless the MDC checks out.
pub fn decrypt<R: Read, W: Write>(
    input: R,
    key: &PrivateKey,
    mut output: W,
) -> Result<LiteralDataHeader> {
    let (source, _headers) = decoder_stream(input)?;

    let mut state = State::AwaitEncryptedData {
        source,
        esk: Vec::new(),
    };
    loop {
        state = state.step(key, &mut output)?;
        if let State::Done(header) = state {
            output.flush()?;
            return Ok(header);
        }
        debug!("state {:?}", state);
    }
}
