use std::io::BufRead;

use bitfields::bitfield;
use byteorder::{BigEndian, WriteBytesExt};
use log::debug;

use crate::errors::{ensure, format_err, malformed, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

/// Largest partial body chunk that can be expressed.
const MAX_PARTIAL_LEN: u32 = 1 << 30;

/// Represents a packet header.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-packet-headers>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    version: PacketHeaderVersion,
    tag: Tag,
    length: PacketLength,
}

impl PacketHeader {
    /// Parses a single packet header.
    ///
    /// Returns `Ok(None)` on a clean end of input, before the first header octet.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Option<Self>> {
        if !r.has_remaining()? {
            return Ok(None);
        }
        let first = r.read_u8()?;
        Self::from_first_octet(first, r)
            .map(Some)
            .map_err(|err| err.into_malformed("packet header"))
    }

    fn from_first_octet<R: BufRead>(first: u8, mut r: R) -> Result<Self> {
        match first & 0b1100_0000 {
            0b1100_0000 => {
                // new starts with 0b11
                let header = NewPacketHeader::from_bits(first);
                let length = PacketLength::try_from_reader(&mut r)?;
                Ok(PacketHeader {
                    version: PacketHeaderVersion::New,
                    tag: Tag::from(header.tag()),
                    length,
                })
            }
            0b1000_0000 => {
                // old starts with 0b10
                let header = OldPacketHeader::from_bits(first);
                let length = match header.length_type() {
                    0 => PacketLength::Fixed(r.read_u8()?.into()),
                    1 => PacketLength::Fixed(r.read_be_u16()?.into()),
                    2 => PacketLength::Fixed(r.read_be_u32()?),
                    _ => PacketLength::Indeterminate,
                };
                Ok(PacketHeader {
                    version: PacketHeaderVersion::Old,
                    tag: Tag::from(header.tag()),
                    length,
                })
            }
            _ => malformed!("invalid packet header octet {:#010b}", first),
        }
    }

    pub fn from_parts(
        version: PacketHeaderVersion,
        tag: Tag,
        length: PacketLength,
    ) -> Result<Self> {
        match version {
            PacketHeaderVersion::Old => {
                OldPacketHeaderBuilder::new()
                    .checked_with_tag(tag.into())
                    .map_err(|_| {
                        format_err!("tag is not compatible with old packet headers: {:?}", tag)
                    })?;
                ensure!(
                    !matches!(length, PacketLength::Partial(_)),
                    "partial lengths are only supported in new style headers"
                );
            }
            PacketHeaderVersion::New => {
                ensure!(
                    !matches!(length, PacketLength::Indeterminate),
                    "indeterminate packet length is only supported in old style headers"
                );
                if let PacketLength::Partial(l) = length {
                    ensure!(l.is_power_of_two(), "partial length must be a power of two");
                    ensure!(
                        l <= MAX_PARTIAL_LEN,
                        "partial length must be less or equal than {}",
                        MAX_PARTIAL_LEN
                    );
                }
            }
        }

        Ok(PacketHeader {
            version,
            tag,
            length,
        })
    }

    /// Creates a new style header with a fixed length.
    pub fn new_fixed(tag: Tag, length: u32) -> Self {
        PacketHeader {
            version: PacketHeaderVersion::New,
            tag,
            length: PacketLength::Fixed(length),
        }
    }

    pub const fn version(&self) -> PacketHeaderVersion {
        self.version
    }

    pub fn packet_length(&self) -> PacketLength {
        self.length
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }
}

impl Serialize for PacketHeader {
    fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        debug!("writing packet header {:?}", self);
        let tag = u8::from(self.tag);

        match self.version {
            PacketHeaderVersion::New => {
                let header = NewPacketHeaderBuilder::new().with_tag(tag).build();
                writer.write_u8(header.into_bits())?;
                self.length.to_writer_new(writer)?;
            }
            PacketHeaderVersion::Old => {
                let length_type = match self.length {
                    PacketLength::Fixed(len) => old_fixed_type(len),
                    PacketLength::Indeterminate => 3,
                    PacketLength::Partial(_) => {
                        unreachable!("invalid state: partial lengths for old style packet header");
                    }
                };
                let header = OldPacketHeaderBuilder::new()
                    .with_tag(tag)
                    .with_length_type(length_type)
                    .build();
                writer.write_u8(header.into_bits())?;
                match self.length {
                    PacketLength::Fixed(len) if len < 256 => writer.write_u8(len as u8)?,
                    PacketLength::Fixed(len) if len < 65536 => {
                        writer.write_u16::<BigEndian>(len as u16)?
                    }
                    PacketLength::Fixed(len) => writer.write_u32::<BigEndian>(len)?,
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self.version {
            PacketHeaderVersion::New => 1 + self.length.new_encoding_len(),
            PacketHeaderVersion::Old => match self.length {
                PacketLength::Fixed(len) if len < 256 => 2,
                PacketLength::Fixed(len) if len < 65536 => 3,
                PacketLength::Fixed(_) => 5,
                _ => 1,
            },
        }
    }
}

/// Old format packet header octet ("Legacy format").
#[bitfield(u8, order = msb)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OldPacketHeader {
    /// First bit is always 1
    #[bits(1, default = true)]
    _padding: bool,
    /// Version: 0
    #[bits(1, default = false)]
    _version: bool,
    #[bits(4)]
    tag: u8,
    #[bits(2)]
    length_type: u8,
}

/// New format packet header octet ("OpenPGP format").
#[bitfield(u8, order = msb)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NewPacketHeader {
    /// First bit is always 1
    #[bits(1, default = true)]
    _padding: bool,
    /// Version: 1
    #[bits(1, default = true)]
    _version: bool,
    #[bits(6)]
    tag: u8,
}

fn old_fixed_type(len: u32) -> u8 {
    if len < 256 {
        0
    } else if len < 65536 {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_write_header() {
        let header = PacketHeader::new_fixed(Tag::UserAttribute, 12875);
        assert_eq!(hex::encode(header.to_bytes().unwrap()), "d1ff0000324b");

        let header = PacketHeader::new_fixed(Tag::Signature, 302);
        assert_eq!(hex::encode(header.to_bytes().unwrap()), "c2c06e");

        let header = PacketHeader::new_fixed(Tag::Signature, 303);
        assert_eq!(hex::encode(header.to_bytes().unwrap()), "c2c06f");
    }

    #[test]
    fn test_old_header() {
        // old format public key packet, two octet length
        let bytes = hex::decode("99010d").unwrap();
        let header = PacketHeader::try_from_reader(&bytes[..]).unwrap().unwrap();
        assert_eq!(header.version(), PacketHeaderVersion::Old);
        assert_eq!(header.tag(), Tag::PublicKey);
        assert_eq!(header.packet_length(), PacketLength::Fixed(269));

        // indeterminate literal data
        let header = PacketHeader::try_from_reader(&[0xAF][..]).unwrap().unwrap();
        assert_eq!(header.tag(), Tag::LiteralData);
        assert_eq!(header.packet_length(), PacketLength::Indeterminate);
    }

    #[test]
    fn test_header_octets() {
        let new = NewPacketHeader::from_bits(0xCB);
        assert_eq!(new.tag(), u8::from(Tag::LiteralData));
        assert_eq!(NewPacketHeaderBuilder::new().with_tag(11).build().into_bits(), 0xCB);

        let old = OldPacketHeader::from_bits(0xAF);
        assert_eq!(old.tag(), u8::from(Tag::LiteralData));
        assert_eq!(old.length_type(), 3);
        let old = OldPacketHeaderBuilder::new()
            .with_tag(6)
            .with_length_type(1)
            .build();
        assert_eq!(old.into_bits(), 0x99);

        assert!(OldPacketHeaderBuilder::new().checked_with_tag(18).is_err());
    }

    #[test]
    fn test_invalid_headers() {
        let err = PacketHeader::try_from_reader(&[0x3F, 0x01][..]).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { .. }), "{err:?}");

        // truncated length
        let err = PacketHeader::try_from_reader(&[0xCB, 0xFF, 0x00][..]).unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { .. }), "{err:?}");

        assert!(PacketHeader::try_from_reader(&[][..]).unwrap().is_none());
    }

    #[test]
    fn test_from_parts() {
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::Old,
            Tag::SymEncryptedProtectedData,
            PacketLength::Fixed(1)
        )
        .is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::New,
            Tag::LiteralData,
            PacketLength::Partial(3)
        )
        .is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::New,
            Tag::LiteralData,
            PacketLength::Indeterminate
        )
        .is_err());
    }

    impl Arbitrary for PacketHeader {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            prop_oneof![
                (1u8..16, any::<u32>()).prop_map(|(tag, len)| PacketHeader::from_parts(
                    PacketHeaderVersion::Old,
                    Tag::from(tag),
                    PacketLength::Fixed(len)
                )
                .unwrap()),
                (1u8..16).prop_map(|tag| PacketHeader::from_parts(
                    PacketHeaderVersion::Old,
                    Tag::from(tag),
                    PacketLength::Indeterminate
                )
                .unwrap()),
                (1u8..64, any::<u32>()).prop_map(|(tag, len)| PacketHeader::from_parts(
                    PacketHeaderVersion::New,
                    Tag::from(tag),
                    PacketLength::Fixed(len)
                )
                .unwrap()),
                (1u8..64, 0u32..=30).prop_map(|(tag, exp)| PacketHeader::from_parts(
                    PacketHeaderVersion::New,
                    Tag::from(tag),
                    PacketLength::Partial(1 << exp)
                )
                .unwrap()),
            ]
            .boxed()
        }
    }

    proptest! {
        #[test]
        fn header_write_len(header: PacketHeader) {
            let mut buf = Vec::new();
            header.to_writer(&mut buf).unwrap();
            prop_assert_eq!(buf.len(), header.write_len());
        }

        #[test]
        fn header_roundtrip(header: PacketHeader) {
            let mut buf = Vec::new();
            header.to_writer(&mut buf).unwrap();
            let back = PacketHeader::try_from_reader(&buf[..]).unwrap().unwrap();
            prop_assert_eq!(header, back);
        }
    }
}
