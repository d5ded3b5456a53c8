use std::io::{self, BufRead};

use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::{timestamp_to_u32, u32_to_timestamp, Serialize};
use crate::types::Tag;

/// Literal Data Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-literal-data-packet-type-id>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    header: LiteralDataHeader,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

/// Everything in a literal data packet before the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralDataHeader {
    mode: DataMode,
    /// Raw file name octets, not necessarily valid UTF-8.
    file_name: Bytes,
    created: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',
    Mime = b'm',

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for DataMode {
    fn default() -> Self {
        Self::Binary
    }
}

/// Longest file name the one octet length prefix can describe.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Cuts `name` to [`MAX_FILE_NAME_LEN`] octets, keeping UTF-8 names valid.
fn truncate_file_name(name: Bytes) -> Bytes {
    if name.len() <= MAX_FILE_NAME_LEN {
        return name;
    }
    let end = match std::str::from_utf8(&name) {
        Ok(s) => (0..=MAX_FILE_NAME_LEN)
            .rev()
            .find(|&i| s.is_char_boundary(i))
            .unwrap_or(0),
        Err(_) => MAX_FILE_NAME_LEN,
    };
    name.slice(..end)
}

impl LiteralDataHeader {
    /// Longer file names are cut to 255 octets, on a character boundary if
    /// the name is UTF-8.
    pub fn new(mode: DataMode, file_name: impl Into<Bytes>, created: DateTime<Utc>) -> Self {
        LiteralDataHeader {
            mode,
            file_name: truncate_file_name(file_name.into()),
            created: created.trunc_subsecs(0),
        }
    }

    /// Parses the header, leaving the reader at the start of the payload.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        Self::parse(&mut r).map_err(|err| err.into_malformed("literal data header"))
    }

    fn parse<R: BufRead>(r: &mut R) -> Result<Self> {
        let mode = DataMode::from(r.read_u8()?);
        let name_len = r.read_u8()?;
        let file_name = r.take_bytes(usize::from(name_len))?.freeze();
        let created = u32_to_timestamp(r.read_be_u32()?);

        Ok(LiteralDataHeader {
            mode,
            file_name,
            created,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }
}

impl Serialize for LiteralDataHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[u8::from(self.mode), self.file_name.len() as u8])?;
        writer.write_all(&self.file_name)?;
        writer.write_all(&timestamp_to_u32(&self.created).to_be_bytes())?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.file_name.len() + 4
    }
}

impl LiteralData {
    pub fn new(header: LiteralDataHeader, data: impl Into<Bytes>) -> Self {
        LiteralData {
            header,
            data: data.into(),
        }
    }

    /// Creates a binary literal data packet, stamped with the current time.
    pub fn from_bytes(file_name: impl Into<Bytes>, data: impl Into<Bytes>) -> Self {
        Self::new(
            LiteralDataHeader::new(DataMode::Binary, file_name, Utc::now()),
            data,
        )
    }

    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let header = LiteralDataHeader::try_from_reader(&mut r)?;
        let data = r.rest()?.freeze();
        Ok(LiteralData { header, data })
    }

    pub fn header(&self) -> &LiteralDataHeader {
        &self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_parts(self) -> (LiteralDataHeader, Bytes) {
        (self.header, self.data)
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.header.to_writer(writer)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.header.write_len() + self.data.len()
    }
}

impl PacketTrait for LiteralData {
    fn tag(&self) -> Tag {
        Tag::LiteralData
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_roundtrip() {
        let created = u32_to_timestamp(1_600_000_000);
        let lit = LiteralData::new(
            LiteralDataHeader::new(DataMode::Binary, &b"hello.txt"[..], created),
            &b"hello world"[..],
        );
        let bytes = lit.to_bytes().unwrap();
        assert_eq!(bytes.len(), lit.write_len());
        assert_eq!(&bytes[..2], &[b'b', 9]);

        let back = LiteralData::try_from_reader(&bytes[..]).unwrap();
        assert_eq!(back, lit);
        assert_eq!(back.header().file_name(), b"hello.txt");
    }

    #[test]
    fn truncated_header_is_malformed() {
        let err = LiteralDataHeader::try_from_reader(&[b'b', 10, b'a'][..]).unwrap_err();
        assert!(matches!(err, crate::errors::Error::MalformedPacket { .. }));
    }

    #[test]
    fn unknown_mode_is_kept() {
        let header = LiteralDataHeader::try_from_reader(&[b'x', 0, 0, 0, 0, 1][..]).unwrap();
        assert_eq!(header.mode(), DataMode::Other(b'x'));
        assert_eq!(DataMode::from(b'b'), DataMode::default());
        assert_eq!(header.created().timestamp(), 1);
    }

    #[test]
    fn long_file_names_stay_utf8() {
        // 127 two octet characters, the 128th would straddle octet 255
        let name = "é".repeat(200);
        let header = LiteralDataHeader::new(DataMode::Binary, name.into_bytes(), Utc::now());
        assert_eq!(header.file_name().len(), 254);
        assert!(std::str::from_utf8(header.file_name()).is_ok());

        let raw = vec![0xFFu8; 300];
        let header = LiteralDataHeader::new(DataMode::Binary, raw, Utc::now());
        assert_eq!(header.file_name().len(), MAX_FILE_NAME_LEN);

        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes[1], 255);
        assert_eq!(LiteralDataHeader::try_from_reader(&bytes[..]).unwrap(), header);
    }
}
