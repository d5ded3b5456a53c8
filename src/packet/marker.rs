use std::io::{self, BufRead};

use crate::errors::{malformed, Result};
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

const PGP: [u8; 3] = [0x50, 0x47, 0x50];

/// Marker Packet, ignored on read.
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-marker-packet-type-id-10>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marker;

impl Marker {
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let marker = r.rest()?;
        if marker[..] != PGP {
            malformed!("invalid marker packet");
        }
        Ok(Marker)
    }
}

impl Serialize for Marker {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&PGP)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        PGP.len()
    }
}

impl PacketTrait for Marker {
    fn tag(&self) -> Tag {
        Tag::Marker
    }
}
