use std::collections::BTreeMap;
use std::hash::Hasher;
use std::io::{self, BufRead, Read};
use std::{fmt, str};

use base64::engine::{general_purpose::STANDARD, Engine as _};
use log::{debug, warn};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until1};
use nom::character::complete::digit1;
use nom::combinator::{all_consuming, map, map_res, opt, rest, value};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::{IResult, Parser};

use crate::errors::{Error, Result};
use crate::ser::Serialize;

/// Longest line accepted anywhere in an armored block.
const MAX_LINE_LEN: u64 = 16 * 1024;

/// Armor block types.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BlockType {
    PublicKey,
    PrivateKey,
    Message,
    MultiPartMessage(usize, usize),
    Signature,
    // gnupg extension
    File,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::PublicKey => f.write_str("PGP PUBLIC KEY BLOCK"),
            BlockType::PrivateKey => f.write_str("PGP PRIVATE KEY BLOCK"),
            BlockType::MultiPartMessage(x, y) => write!(f, "PGP MESSAGE, PART {x}/{y}"),
            BlockType::Message => f.write_str("PGP MESSAGE"),
            BlockType::Signature => f.write_str("PGP SIGNATURE"),
            BlockType::File => f.write_str("PGP ARMORED FILE"),
        }
    }
}

impl Serialize for BlockType {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        write!(w, "{self}")?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.to_string().len()
    }
}

/// Armor Headers, values of repeated keys are kept in order.
pub type Headers = BTreeMap<String, Vec<String>>;

fn number(i: &[u8]) -> IResult<&[u8], usize> {
    map_res(map_res(digit1, str::from_utf8), str::parse::<usize>).parse(i)
}

/// Parses the type inside of an ascii armor header.
fn armor_header_type(i: &[u8]) -> IResult<&[u8], BlockType> {
    alt((
        value(BlockType::PublicKey, tag("PGP PUBLIC KEY BLOCK")),
        value(BlockType::PrivateKey, tag("PGP PRIVATE KEY BLOCK")),
        map(
            preceded(
                tag("PGP MESSAGE, PART "),
                pair(number, opt(preceded(tag("/"), number))),
            ),
            |(x, y)| BlockType::MultiPartMessage(x, y.unwrap_or(0)),
        ),
        value(BlockType::Message, tag("PGP MESSAGE")),
        value(BlockType::Signature, tag("PGP SIGNATURE")),
        value(BlockType::File, tag("PGP ARMORED FILE")),
    ))
    .parse(i)
}

/// Parses a single armor header line, without its line ending.
fn armor_header_line(i: &[u8]) -> IResult<&[u8], BlockType> {
    all_consuming(delimited(tag("-----BEGIN "), armor_header_type, tag("-----"))).parse(i)
}

/// Parses a single armor footer line, without its line ending.
fn armor_footer_line(i: &[u8]) -> IResult<&[u8], BlockType> {
    all_consuming(delimited(tag("-----END "), armor_header_type, tag("-----"))).parse(i)
}

/// Parses a single `Key: Value` header.
fn key_value_pair(i: &[u8]) -> IResult<&[u8], (&str, &str)> {
    all_consuming(alt((
        separated_pair(
            map_res(take_until1(": "), str::from_utf8),
            tag(": "),
            map_res(rest, str::from_utf8),
        ),
        // empty value
        map(
            terminated(map_res(take_until1(":"), str::from_utf8), tag(":")),
            |key| (key, ""),
        ),
    )))
    .parse(i)
}

/// Decodes the `=XXXX` checksum line.
fn read_checksum(line: &[u8]) -> Result<u32> {
    let raw = STANDARD.decode(&line[1..]).map_err(|err| Error::ArmorFraming {
        message: format!("invalid checksum line: {err}"),
    })?;
    match raw[..] {
        [a, b, c] => Ok(u32::from_be_bytes([0, a, b, c])),
        _ => Err(Error::ArmorFraming {
            message: "checksum line must encode 3 bytes".to_string(),
        }),
    }
}

fn framing(message: impl Into<String>) -> Error {
    Error::ArmorFraming {
        message: message.into(),
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    &line[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Header,
    Body,
    Done,
}

/// Streaming ascii armor decoding.
///
/// Leading text before the `-----BEGIN` line is skipped. The CRC-24 line is
/// optional, but if present it must match the decoded data.
pub struct Dearmor<R: BufRead> {
    /// The ascii armor parsed block type.
    pub typ: Option<BlockType>,
    /// The headers found in the armored file.
    pub headers: Headers,
    /// Optional crc checksum from the armor footer.
    pub checksum: Option<u32>,
    source: R,
    current_part: Part,
    line: Vec<u8>,
    /// Base64 characters not yet forming a full quad.
    pending: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    crc: crc24::Crc24Hasher,
}

impl<R: BufRead> fmt::Debug for Dearmor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dearmor")
            .field("typ", &self.typ)
            .field("headers", &self.headers)
            .field("checksum", &self.checksum)
            .field("current_part", &self.current_part)
            .finish()
    }
}

impl<R: BufRead> Dearmor<R> {
    pub fn new(source: R) -> Self {
        Dearmor {
            typ: None,
            headers: BTreeMap::new(),
            checksum: None,
            source,
            current_part: Part::Header,
            line: Vec::new(),
            pending: Vec::new(),
            out: Vec::new(),
            out_pos: 0,
            crc: crc24::Crc24Hasher::new(),
        }
    }

    /// Parses the armor header, if not done already.
    pub fn read_header(&mut self) -> Result<()> {
        if self.current_part != Part::Header {
            return Ok(());
        }

        loop {
            if !self.next_line()? {
                return Err(framing("missing armor header line"));
            }
            let line = trim_line(&self.line);
            if line.starts_with(b"-----") {
                let (_, typ) = armor_header_line(line).map_err(|_| {
                    framing(format!(
                        "invalid armor header line {:?}",
                        String::from_utf8_lossy(line)
                    ))
                })?;
                debug!("armor block {typ}");
                self.typ = Some(typ);
                break;
            }
        }

        loop {
            if !self.next_line()? {
                return Err(framing("unexpected end of input in armor headers"));
            }
            let line = trim_line(&self.line).to_vec();
            if line.is_empty() {
                break;
            }
            match key_value_pair(&line) {
                Ok((_, (key, value))) => {
                    self.headers
                        .entry(key.to_string())
                        .or_default()
                        .push(value.to_string());
                }
                Err(_) => {
                    // no blank line after the headers, this already is data
                    warn!("armor header section not terminated by an empty line");
                    self.current_part = Part::Body;
                    return self.body_line(&line);
                }
            }
        }

        self.current_part = Part::Body;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Reads the next line into `self.line`, returns `false` at the end of input.
    fn next_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = (&mut self.source)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut self.line)?;
        if n as u64 == MAX_LINE_LEN && self.line.last() != Some(&b'\n') {
            return Err(framing("armor line too long"));
        }
        Ok(n > 0)
    }

    /// Decodes a line of base64 data into `self.out`.
    fn body_line(&mut self, line: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(line);
        let full = self.pending.len() / 4 * 4;
        if full == 0 {
            return Ok(());
        }

        let start = self.out.len();
        STANDARD
            .decode_vec(&self.pending[..full], &mut self.out)
            .map_err(|err| framing(format!("invalid base64 data: {err}")))?;
        self.crc.write(&self.out[start..]);
        self.pending.drain(..full);

        Ok(())
    }

    fn finish(&mut self, footer: BlockType) -> Result<()> {
        self.current_part = Part::Done;

        if self.typ != Some(footer) {
            return Err(framing(format!(
                "armor footer {footer} does not match header {:?}",
                self.typ
            )));
        }
        if !self.pending.is_empty() {
            return Err(framing("truncated base64 data"));
        }

        if let Some(expected) = self.checksum {
            let actual = self.crc.finish() as u32;
            if expected != actual {
                return Err(Error::ArmorChecksumMismatch { expected, actual });
            }
        }
        Ok(())
    }

    /// Decodes more data, until at least one byte is available or the
    /// footer was read.
    fn advance(&mut self) -> Result<()> {
        self.read_header()?;

        while self.out_pos == self.out.len() && self.current_part == Part::Body {
            self.out.clear();
            self.out_pos = 0;

            if !self.next_line()? {
                self.current_part = Part::Done;
                return Err(framing("missing armor footer"));
            }
            let line = trim_line(&self.line).to_vec();

            if line.is_empty() {
                continue;
            }
            if line.starts_with(b"-----") {
                let (_, footer) = armor_footer_line(&line).map_err(|_| {
                    framing(format!(
                        "invalid armor footer line {:?}",
                        String::from_utf8_lossy(&line)
                    ))
                })?;
                return self.finish(footer);
            }
            if line[0] == b'=' {
                if self.checksum.is_some() {
                    return Err(framing("multiple checksum lines"));
                }
                self.checksum = Some(read_checksum(&line)?);
                continue;
            }
            if self.checksum.is_some() {
                return Err(framing("data after the checksum line"));
            }
            self.body_line(&line)?;
        }

        Ok(())
    }
}

impl<R: BufRead> BufRead for Dearmor<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.out_pos == self.out.len() {
            self.advance()?;
        }
        Ok(&self.out[self.out_pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.out_pos = (self.out_pos + amt).min(self.out.len());
    }
}

impl<R: BufRead> Read for Dearmor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

/// Decodes a complete armored block.
pub fn unwrap(input: &[u8]) -> Result<(BlockType, Headers, Vec<u8>)> {
    let mut dearmor = Dearmor::new(input);
    let mut bytes = Vec::new();
    dearmor.read_to_end(&mut bytes)?;

    let typ = dearmor
        .typ
        .ok_or_else(|| framing("missing armor header line"))?;
    Ok((typ, dearmor.headers, bytes))
}
