use std::io::BufRead;

use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::packet::{Packet, PacketBodyReader, PacketHeader};
use crate::parsing_reader::BufReadParsing;
use crate::types::Tag;

/// Parses packets, in a streaming fashion, from the given reader.
///
/// Iterating yields fully parsed packets. [`PacketParser::next_body`] hands
/// out the raw body of the next packet instead, for callers that want to
/// stream large data packets.
#[derive(Debug)]
pub struct PacketParser<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> PacketParser<R> {
    pub fn new(reader: R) -> Self {
        PacketParser {
            reader,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads the next packet header and returns a lazy reader over its body.
    ///
    /// The body must be read to its end before the next call, otherwise the
    /// parser continues in the middle of the current packet.
    pub fn next_body(&mut self) -> Option<Result<PacketBodyReader<&mut R>>> {
        if self.done {
            return None;
        }

        let header = match PacketHeader::try_from_reader(&mut self.reader) {
            Ok(Some(header)) => header,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        debug!("found header {:?}", header);
        match PacketBodyReader::new(header, &mut self.reader) {
            Ok(body) => Some(Ok(body)),
            Err(err) => {
                self.done = true;
                Some(Err(err.into()))
            }
        }
    }
}

impl<R: BufRead> PacketParser<R> {
    /// Like [`Iterator::next`], but also reports the tag of the packet, which
    /// is known even when its body failed to parse.
    pub fn next_tagged(&mut self) -> Option<(Option<Tag>, Result<Packet>)> {
        let mut body = match self.next_body()? {
            Ok(body) => body,
            Err(err) => return Some((None, Err(err))),
        };
        let header = body.packet_header();
        let tag = Some(header.tag());

        let packet = Packet::from_reader(header, &mut body);
        // whatever the packet parser left over belongs to this packet
        let drained = body.drain();

        let res = match (packet, drained) {
            (Ok(packet), Ok(0)) => Ok(packet),
            (Ok(packet), Ok(skipped)) => {
                warn!("{:?}: ignoring {} trailing bytes", header.tag(), skipped);
                Ok(packet)
            }
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(_)) => {
                self.done = true;
                Err(err)
            }
            (Ok(_), Err(err)) => {
                self.done = true;
                Err(Error::from(err).into_malformed("packet body"))
            }
        };

        Some((tag, res))
    }
}

impl<R: BufRead> Iterator for PacketParser<R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tagged().map(|(_, res)| res)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::packet::{write_packet, LiteralData, Marker, PacketTrait, UserId};
    use crate::types::Tag;
    use crate::ser::Serialize;

    #[test]
    fn parses_mixed_stream() {
        let mut buf = Vec::new();
        write_packet(&mut buf, &Marker).unwrap();
        write_packet(&mut buf, &UserId::from_str("bob")).unwrap();
        write_packet(&mut buf, &LiteralData::from_bytes("a.txt", &b"hello"[..])).unwrap();

        let packets: Vec<Packet> = PacketParser::new(&buf[..])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], Packet::Marker(Marker));
        assert_eq!(packets[1].tag(), Tag::UserId);
        match &packets[2] {
            Packet::LiteralData(lit) => assert_eq!(lit.data(), b"hello"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_packets_are_kept() {
        // new format, tag 60, three bytes body
        let raw = [0xC0 | 60, 3, 1, 2, 3];
        let packets: Vec<Packet> = PacketParser::new(&raw[..])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            packets,
            vec![Packet::Unknown {
                tag: Tag::Other(60),
                body: vec![1u8, 2, 3].into()
            }]
        );
    }

    #[test]
    fn partial_lengths_stream() {
        let data = vec![7u8; 3000];
        let lit = LiteralData::from_bytes("", data.clone());
        let mut buf = Vec::new();
        lit.to_writer_partial(&mut buf, 512).unwrap();
        // first octet plus partial length octet for 512
        assert_eq!(&buf[..2], &[0xC0 | 11, 0xE9]);

        let mut parser = PacketParser::new(&buf[..]);
        let mut body = parser.next_body().unwrap().unwrap();
        let mut raw = Vec::new();
        body.read_to_end(&mut raw).unwrap();
        assert_eq!(raw, lit.to_bytes().unwrap());
        drop(body);
        assert!(parser.next_body().is_none());
    }

    #[test]
    fn exact_multiple_of_chunk_size() {
        let lit = LiteralData::from_bytes("", vec![1u8; 1024 - 6]);
        assert_eq!(lit.write_len(), 1024);

        let mut buf = Vec::new();
        lit.to_writer_partial(&mut buf, 512).unwrap();

        let packets: Vec<Packet> = PacketParser::new(&buf[..])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(packets, vec![Packet::LiteralData(lit)]);
    }

    #[test]
    fn truncated_body_is_malformed() {
        let mut buf = Vec::new();
        write_packet(&mut buf, &UserId::from_str("carol")).unwrap();
        buf.truncate(buf.len() - 2);

        let res: Result<Vec<Packet>> = PacketParser::new(&buf[..]).collect();
        assert!(matches!(res, Err(Error::MalformedPacket { .. })), "{res:?}");
    }

    #[test]
    fn small_first_partial_chunk_is_malformed() {
        // literal data with a 256 byte first partial chunk
        let mut raw = vec![0xC0 | 11, 0xE8];
        raw.extend_from_slice(&[0u8; 256]);
        raw.push(0);

        let mut parser = PacketParser::new(&raw[..]);
        let err = parser.next().unwrap().unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { .. }), "{err:?}");
        assert!(parser.next().is_none());
    }

    #[test]
    fn invalid_header_bit_is_malformed() {
        let raw = [0x3F, 0, 0];
        let err = PacketParser::new(&raw[..]).next().unwrap().unwrap_err();
        assert!(matches!(err, Error::MalformedPacket { .. }), "{err:?}");
    }
}
