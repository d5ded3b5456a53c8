use std::io::Write;

use base64::engine::{general_purpose, Engine as _};

use crate::armor::{BlockType, Headers};
use crate::errors::Result;
use crate::line_writer::{LineBreak, LineWriter};
use crate::ser::Serialize;

/// Armors `source`, 64 base64 characters per line, followed by the
/// optional CRC-24 line.
pub fn write(
    source: &impl Serialize,
    typ: BlockType,
    writer: &mut impl Write,
    headers: Option<&Headers>,
    include_checksum: bool,
) -> Result<()> {
    let data = source.to_bytes()?;

    // write armor header
    writer.write_all(&b"-----BEGIN "[..])?;
    typ.to_writer(writer)?;
    writer.write_all(&b"-----\n"[..])?;

    // write armor headers
    if let Some(headers) = headers {
        for (key, values) in headers.iter() {
            for value in values {
                writer.write_all(key.as_bytes())?;
                writer.write_all(&b": "[..])?;
                writer.write_all(value.as_bytes())?;
                writer.write_all(&b"\n"[..])?;
            }
        }
    }

    writer.write_all(&b"\n"[..])?;

    // write body
    {
        let mut line_wrapper = LineWriter::<_, 64>::new(writer.by_ref(), LineBreak::Lf);
        {
            let mut enc =
                base64::write::EncoderWriter::new(&mut line_wrapper, &general_purpose::STANDARD);
            enc.write_all(&data)?;
            enc.finish()?;
        }
        line_wrapper.finish()?;
    }

    // write crc
    if include_checksum {
        let crc = crc24::hash_raw(&data);
        let crc_buf = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];

        writer.write_all(b"=")?;
        writer.write_all(general_purpose::STANDARD.encode(crc_buf).as_bytes())?;
        writer.write_all(&b"\n"[..])?;
    }

    // write footer
    writer.write_all(&b"-----END "[..])?;
    typ.to_writer(writer)?;
    writer.write_all(&b"-----\n"[..])?;
    writer.flush()?;

    Ok(())
}

/// Armors raw bytes into a string.
pub fn wrap(typ: BlockType, data: &[u8]) -> Result<String> {
    let mut out = Vec::new();
    write(&RawBytes(data), typ, &mut out, None, true)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

struct RawBytes<'a>(&'a [u8]);

impl Serialize for RawBytes<'_> {
    fn to_writer<W: std::io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(self.0)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::armor::unwrap;

    #[test]
    fn writes_no_doubleline() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        for i in 2..300 {
            let buf: Vec<u8> = (0..i).map(|_| rng.gen()).collect();
            let dest = wrap(BlockType::Message, &buf).unwrap();
            let lines = dest.lines().collect::<Vec<_>>();

            assert_eq!(lines[0], "-----BEGIN PGP MESSAGE-----");
            assert!(lines[1].is_empty());
            assert!(
                !lines[lines.len() - 3].is_empty(),
                "last line must not be empty"
            );
            assert!(lines[2..lines.len() - 2].iter().all(|l| l.len() <= 64));
            assert_eq!(
                lines[lines.len() - 2].len(),
                5,
                "invalid checksum line: '{}'",
                lines[lines.len() - 2]
            );
            assert_eq!(lines[lines.len() - 1], "-----END PGP MESSAGE-----");

            let (typ, _, data) = unwrap(dest.as_bytes()).unwrap();
            assert_eq!(typ, BlockType::Message);
            assert_eq!(data, buf);
        }
    }

    #[test]
    fn writes_no_checksum() {
        let mut dest = Vec::new();
        write(&RawBytes(b"hello world"), BlockType::Message, &mut dest, None, false).unwrap();
        assert_eq!(
            std::str::from_utf8(&dest).unwrap(),
            "-----BEGIN PGP MESSAGE-----\n\naGVsbG8gd29ybGQ=\n-----END PGP MESSAGE-----\n"
        );
    }

    #[test]
    fn writes_headers_and_checksum() {
        let mut headers = Headers::new();
        headers.insert("Comment".into(), vec!["a".into(), "b".into()]);

        let mut dest = Vec::new();
        write(
            &RawBytes(b"hello world"),
            BlockType::PublicKey,
            &mut dest,
            Some(&headers),
            true,
        )
        .unwrap();
        assert_eq!(
            std::str::from_utf8(&dest).unwrap(),
            "-----BEGIN PGP PUBLIC KEY BLOCK-----\nComment: a\nComment: b\n\naGVsbG8gd29ybGQ=\n=sDy3\n-----END PGP PUBLIC KEY BLOCK-----\n"
        );

        let (_, parsed, _) = unwrap(&dest).unwrap();
        assert_eq!(parsed, headers);
    }

    #[test]
    fn rearmor_is_identical() {
        let first = wrap(BlockType::Message, b"idempotent").unwrap();
        let (typ, _, data) = unwrap(first.as_bytes()).unwrap();
        assert_eq!(wrap(typ, &data).unwrap(), first);
    }
}
