use std::io::{self, BufRead, Read};

use log::debug;

use crate::errors::Error;
use crate::packet::PacketHeader;
use crate::types::{PacketLength, Tag};

/// Smallest first chunk of a partial body.
const MIN_FIRST_PARTIAL_LEN: u32 = 512;

/// Lazily reads the body of a single packet, following partial body chunks.
///
/// Violations of the framing surface as `io::Error`s wrapping
/// [`Error::MalformedPacket`].
pub struct PacketBodyReader<R: BufRead> {
    packet_header: PacketHeader,
    state: State<R>,
}

impl<R: BufRead> std::fmt::Debug for PacketBodyReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketBodyReader")
            .field("packet_header", &self.packet_header)
            .field("done", &self.is_done())
            .finish()
    }
}

enum State<R: BufRead> {
    /// A chunk with a known length, `last` is false for partial chunks.
    Chunk { source: io::Take<R>, last: bool },
    /// Old format packet running to the end of the input.
    Indeterminate(R),
    Done(R),
    Error,
}

fn malformed(message: impl Into<String>) -> io::Error {
    io::Error::other(Error::MalformedPacket {
        message: message.into(),
    })
}

impl<R: BufRead> PacketBodyReader<R> {
    pub fn new(packet_header: PacketHeader, source: R) -> io::Result<Self> {
        let state = match packet_header.packet_length() {
            PacketLength::Fixed(len) => {
                debug!("fixed packet {len}");
                State::Chunk {
                    source: source.take(u64::from(len)),
                    last: true,
                }
            }
            PacketLength::Indeterminate => {
                debug!("indeterminate packet");
                State::Indeterminate(source)
            }
            PacketLength::Partial(len) => {
                debug!("partial packet start {len}");
                if !packet_header.tag().allows_partial_length() {
                    return Err(malformed(format!(
                        "partial body length is not allowed for packet type {:?}",
                        packet_header.tag()
                    )));
                }
                if len < MIN_FIRST_PARTIAL_LEN {
                    return Err(malformed(format!(
                        "illegal first partial body length {len} (shorter than {MIN_FIRST_PARTIAL_LEN} bytes)"
                    )));
                }
                State::Chunk {
                    source: source.take(u64::from(len)),
                    last: false,
                }
            }
        };

        Ok(Self {
            packet_header,
            state,
        })
    }

    pub fn packet_header(&self) -> PacketHeader {
        self.packet_header
    }

    pub fn tag(&self) -> Tag {
        self.packet_header.tag()
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done(_))
    }

    /// Returns the underlying reader, positioned after this packet if the
    /// body was read to the end.
    pub fn into_inner(self) -> R {
        match self.state {
            State::Chunk { source, .. } => source.into_inner(),
            State::Indeterminate(source) | State::Done(source) => source,
            State::Error => panic!("PacketBodyReader errored"),
        }
    }

    /// Advances through exhausted chunks until data is available or the
    /// body ended.
    fn fill_inner(&mut self) -> io::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, State::Error) {
                State::Chunk { mut source, last } => {
                    let filled = source.fill_buf().map(|buf| !buf.is_empty());
                    match filled {
                        Ok(true) => {
                            self.state = State::Chunk { source, last };
                            return Ok(());
                        }
                        Ok(false) => {}
                        Err(err) => {
                            // the source may recover, e.g. after `Interrupted`
                            self.state = State::Chunk { source, last };
                            return Err(err);
                        }
                    }
                    if source.limit() > 0 {
                        return Err(malformed(format!(
                            "{:?} packet body truncated, {} bytes missing",
                            self.packet_header.tag(),
                            source.limit()
                        )));
                    }

                    let mut source = source.into_inner();
                    if last {
                        debug!("body done: {:?}", self.packet_header);
                        self.state = State::Done(source);
                        return Ok(());
                    }

                    let next = PacketLength::try_from_reader(&mut source)
                        .map_err(|err| malformed(format!("partial length: {err}")))?;
                    self.state = match next {
                        PacketLength::Fixed(len) => {
                            debug!("last partial chunk {len}");
                            State::Chunk {
                                source: source.take(u64::from(len)),
                                last: true,
                            }
                        }
                        PacketLength::Partial(len) => {
                            debug!("intermediary partial chunk {len}");
                            State::Chunk {
                                source: source.take(u64::from(len)),
                                last: false,
                            }
                        }
                        PacketLength::Indeterminate => {
                            return Err(malformed("invalid indeterminate packet length"));
                        }
                    };
                }
                state @ (State::Indeterminate(_) | State::Done(_)) => {
                    self.state = state;
                    return Ok(());
                }
                State::Error => return Err(io::Error::other("PacketBodyReader errored")),
            }
        }
    }
}

impl<R: BufRead> BufRead for PacketBodyReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill_inner()?;
        match self.state {
            State::Chunk { ref mut source, .. } => source.fill_buf(),
            State::Indeterminate(ref mut source) => source.fill_buf(),
            State::Done(_) => Ok(&[][..]),
            State::Error => Err(io::Error::other("PacketBodyReader errored")),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self.state {
            State::Chunk { ref mut source, .. } => source.consume(amt),
            State::Indeterminate(ref mut source) => source.consume(amt),
            State::Done(_) | State::Error => {}
        }
    }
}

impl<R: BufRead> Read for PacketBodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}
