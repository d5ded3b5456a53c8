use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::Result;
use crate::parsing_reader::BufReadParsing;

/// Represents the packet length.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketLength {
    Fixed(u32),
    /// Old format only: the packet extends to the end of its container.
    Indeterminate,
    /// New format only: one chunk of a partial body, always a power of two.
    Partial(u32),
}

impl PacketLength {
    /// Reads a new format length.
    ///
    /// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-openpgp-format-packet-lengt>
    pub fn try_from_reader<R: BufRead>(mut r: R) -> io::Result<Self> {
        let olen = r.read_u8()?;
        let len = match olen {
            // One-Octet Lengths
            0..=191 => PacketLength::Fixed(olen.into()),
            // Two-Octet Lengths
            192..=223 => {
                let a = r.read_u8()?;
                PacketLength::Fixed(((u32::from(olen) - 192) << 8) + 192 + u32::from(a))
            }
            // Partial Body Lengths
            224..=254 => PacketLength::Partial(1 << (olen & 0x1F)),
            // Five-Octet Lengths
            255 => PacketLength::Fixed(r.read_be_u32()?),
        };
        Ok(len)
    }

    /// Writes a new format length.
    pub fn to_writer_new<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match *self {
            PacketLength::Fixed(len) if len < 192 => writer.write_u8(len as u8)?,
            PacketLength::Fixed(len) if len < 8384 => {
                writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
                writer.write_u8(((len - 192) & 0xFF) as u8)?;
            }
            PacketLength::Fixed(len) => {
                writer.write_u8(255)?;
                writer.write_u32::<BigEndian>(len)?;
            }
            PacketLength::Partial(len) => {
                debug_assert!(len.is_power_of_two());
                writer.write_u8(224 + len.trailing_zeros() as u8)?;
            }
            PacketLength::Indeterminate => {
                unreachable!("invalid state: indeterminate lengths for new style packet header");
            }
        }
        Ok(())
    }

    /// Number of bytes [`Self::to_writer_new`] emits.
    pub fn new_encoding_len(&self) -> usize {
        match *self {
            PacketLength::Fixed(len) if len < 192 => 1,
            PacketLength::Fixed(len) if len < 8384 => 2,
            PacketLength::Fixed(_) => 5,
            PacketLength::Partial(_) => 1,
            PacketLength::Indeterminate => 0,
        }
    }
}

/// Packet Type ID, see <https://www.rfc-editor.org/rfc/rfc9580.html#packet-types>
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
#[non_exhaustive]
pub enum Tag {
    /// Public-Key Encrypted Session Key Packet
    PublicKeyEncryptedSessionKey = 1,
    /// Signature Packet
    Signature = 2,
    /// Symmetric-Key Encrypted Session Key Packet
    SymKeyEncryptedSessionKey = 3,
    /// One-Pass Signature Packet
    OnePassSignature = 4,
    /// Secret-Key Packet
    SecretKey = 5,
    /// Public-Key Packet
    PublicKey = 6,
    /// Secret-Subkey Packet
    SecretSubkey = 7,
    /// Compressed Data Packet
    CompressedData = 8,
    /// Symmetrically Encrypted Data Packet
    SymEncryptedData = 9,
    /// Marker Packet
    Marker = 10,
    /// Literal Data Packet
    LiteralData = 11,
    /// Trust Packet
    Trust = 12,
    /// User ID Packet
    UserId = 13,
    /// Public-Subkey Packet
    PublicSubkey = 14,
    /// User Attribute Packet
    UserAttribute = 17,
    /// Sym. Encrypted and Integrity Protected Data Packet
    SymEncryptedProtectedData = 18,
    /// Modification Detection Code Packet
    ModDetectionCode = 19,
    /// Padding Packet
    Padding = 21,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    Other(u8),
}

impl Tag {
    /// Only data packets may use partial body lengths.
    pub fn allows_partial_length(self) -> bool {
        matches!(
            self,
            Tag::LiteralData
                | Tag::CompressedData
                | Tag::SymEncryptedData
                | Tag::SymEncryptedProtectedData
        )
    }
}

/// The version of the packet format.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-packet-headers>
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum PacketHeaderVersion {
    /// Old Packet Format ("Legacy packet format")
    Old,
    /// New Packet Format ("OpenPGP packet format")
    #[default]
    New,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_length_encoding() {
        let mut buf = Vec::new();
        PacketLength::Fixed(12875).to_writer_new(&mut buf).unwrap();
        assert_eq!(hex::encode(&buf), "ff0000324b");

        let mut buf = Vec::new();
        PacketLength::Fixed(302).to_writer_new(&mut buf).unwrap();
        assert_eq!(hex::encode(&buf), "c06e");

        let mut buf = Vec::new();
        PacketLength::Partial(512).to_writer_new(&mut buf).unwrap();
        assert_eq!(hex::encode(&buf), "e9");
    }

    #[test]
    fn test_tag_catch_all() {
        assert_eq!(Tag::from(11), Tag::LiteralData);
        assert_eq!(Tag::from(60), Tag::Other(60));
        assert_eq!(u8::from(Tag::Other(60)), 60);
    }

    proptest! {
        #[test]
        fn new_length_roundtrip(len: u32) {
            let length = PacketLength::Fixed(len);
            let mut buf = Vec::new();
            length.to_writer_new(&mut buf).unwrap();
            prop_assert_eq!(buf.len(), length.new_encoding_len());
            prop_assert_eq!(PacketLength::try_from_reader(&buf[..]).unwrap(), length);
        }

        #[test]
        fn partial_length_roundtrip(exp in 0u32..=30) {
            let length = PacketLength::Partial(1 << exp);
            let mut buf = Vec::new();
            length.to_writer_new(&mut buf).unwrap();
            prop_assert_eq!(PacketLength::try_from_reader(&buf[..]).unwrap(), length);
        }
    }
}
