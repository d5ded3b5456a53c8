use std::io::{BufRead, Read};

use buffer_redux::BufReader;
use log::{debug, warn};

use crate::armor::{self, BlockType, Dearmor};
use crate::errors::{Error, Result};

/// Peeks at the first byte: OpenPGP packets always have the high bit set,
/// armored text never does. Empty input counts as an empty packet stream.
pub(crate) fn is_binary<R: BufRead>(input: &mut R) -> Result<bool> {
    let buf = input.fill_buf()?;
    let Some(first) = buf.first() else {
        return Ok(true);
    };

    Ok(first & 0x80 != 0)
}

/// Turns binary or ASCII armored input into a reader over the raw packet
/// stream.
///
/// Returns the armor headers, or `None` for binary input.
pub fn decoder_stream<'a, R: Read + 'a>(
    input: R,
) -> Result<(Box<dyn BufRead + 'a>, Option<armor::Headers>)> {
    let mut input = BufReader::new(input);

    if is_binary(&mut input)? {
        debug!("binary input");
        return Ok((Box::new(input), None));
    }

    let mut dearmor = Dearmor::new(input);
    dearmor.read_header()?;
    let typ = dearmor.typ.ok_or_else(|| Error::ArmorFraming {
        message: "missing armor header".to_string(),
    })?;
    debug!("armored input: {typ}");
    if !matches!(
        typ,
        BlockType::Message
            | BlockType::MultiPartMessage(..)
            | BlockType::PublicKey
            | BlockType::PrivateKey
            | BlockType::File
    ) {
        warn!("unexpected armor block {typ}, trying to read it anyway");
    }
    let headers = dearmor.headers.clone();

    Ok((Box::new(BufReader::new(dearmor)), Some(headers)))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::armor;

    #[test]
    fn detects_binary_and_armor() {
        let binary = [0xCB, 0x03, b'a', b'b', b'c'];
        let (mut r, headers) = decoder_stream(&binary[..]).unwrap();
        assert!(headers.is_none());
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, binary);

        let armored = armor::wrap(BlockType::Message, &binary).unwrap();
        let (mut r, headers) = decoder_stream(armored.as_bytes()).unwrap();
        assert!(headers.is_some());
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, binary);
    }

    #[test]
    fn empty_input_is_empty_stream() {
        let (mut r, headers) = decoder_stream(&b""[..]).unwrap();
        assert!(headers.is_none());
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn text_without_armor_is_framing_error() {
        let Err(err) = decoder_stream(&b"just some text\n"[..]) else {
            panic!("plain text must not decode");
        };
        assert!(matches!(err, Error::ArmorFraming { .. }), "{err:?}");
    }
}
