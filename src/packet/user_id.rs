use std::io::{self, BufRead};

use bytes::Bytes;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// User ID Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-user-id-packet-type-id-13>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    id: Bytes,
}

impl UserId {
    pub fn from_str(id: &str) -> Self {
        UserId {
            id: Bytes::copy_from_slice(id.as_bytes()),
        }
    }

    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        Ok(UserId {
            id: r.rest()?.freeze(),
        })
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The id as text, lossy for ids that are not UTF-8.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.id)
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}

impl PacketTrait for UserId {
    fn tag(&self) -> Tag {
        Tag::UserId
    }
}
