use std::io;

use log::debug;

use crate::errors::{ensure, Result};
use crate::packet::PacketHeader;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

pub trait PacketTrait: Serialize {
    fn tag(&self) -> Tag;

    fn packet_header_version(&self) -> PacketHeaderVersion {
        PacketHeaderVersion::New
    }

    /// Write this packet including a fixed length packet header.
    fn to_writer_with_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let len = self.write_len().try_into()?;
        let header = PacketHeader::from_parts(
            self.packet_header_version(),
            self.tag(),
            PacketLength::Fixed(len),
        )?;

        header.to_writer(writer)?;
        self.to_writer(writer)?;

        Ok(())
    }

    /// Length in bytes used when calling `to_writer_with_header`.
    fn write_len_with_header(&self) -> usize {
        let len = self.write_len();
        let header = PacketHeader::new_fixed(self.tag(), len as u32);
        header.write_len() + len
    }

    /// Writes the packet, splitting bodies larger than `chunk_size` into
    /// partial body chunks. Only data packets may be split.
    fn to_writer_partial<W: io::Write>(&self, writer: &mut W, chunk_size: u32) -> Result<()> {
        if self.write_len() <= chunk_size as usize || !self.tag().allows_partial_length() {
            return self.to_writer_with_header(writer);
        }

        ensure!(
            chunk_size.is_power_of_two() && chunk_size >= 512,
            "invalid partial chunk size {}",
            chunk_size
        );

        let body = self.to_bytes()?;
        debug!(
            "writing {:?} with partial lengths, {} bytes in chunks of {}",
            self.tag(),
            body.len(),
            chunk_size
        );

        let mut chunks = body.chunks(chunk_size as usize).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let length = if chunks.peek().is_some() || chunk.len() == chunk_size as usize {
                PacketLength::Partial(chunk_size)
            } else {
                PacketLength::Fixed(chunk.len().try_into()?)
            };

            if first {
                PacketHeader::from_parts(PacketHeaderVersion::New, self.tag(), length)?
                    .to_writer(writer)?;
                first = false;
            } else {
                length.to_writer_new(writer)?;
            }
            writer.write_all(chunk)?;
        }

        // a body that is an exact multiple of the chunk size ends in an empty chunk
        if body.len() % chunk_size as usize == 0 {
            PacketLength::Fixed(0).to_writer_new(writer)?;
        }

        Ok(())
    }
}

impl<T: PacketTrait> PacketTrait for &T {
    fn tag(&self) -> Tag {
        (*self).tag()
    }

    fn packet_header_version(&self) -> PacketHeaderVersion {
        (*self).packet_header_version()
    }
}

/// Writes a single packet with its header.
pub fn write_packet<W: io::Write, P: PacketTrait>(writer: &mut W, packet: &P) -> Result<()> {
    debug!("writing packet {:?}", packet.tag());
    packet.to_writer_with_header(writer)
}
