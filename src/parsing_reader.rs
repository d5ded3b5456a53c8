//! Helpers to pull fixed size values out of a [`BufRead`].

use std::io::{self, BufRead};

use bytes::BytesMut;

pub trait BufReadParsing: BufRead + Sized {
    fn read_u8(&mut self) -> io::Result<u8> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    fn read_be_u16(&mut self) -> io::Result<u16> {
        self.read_array::<2>().map(u16::from_be_bytes)
    }

    fn read_be_u32(&mut self) -> io::Result<u32> {
        self.read_array::<4>().map(u32::from_be_bytes)
    }

    /// Returns `true` if at least one more byte can be read.
    fn has_remaining(&mut self) -> io::Result<bool> {
        Ok(!self.fill_buf()?.is_empty())
    }

    fn read_array<const C: usize>(&mut self) -> io::Result<[u8; C]> {
        let mut arr = [0u8; C];
        let mut read = 0;

        while read < C {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("needed {C} bytes, got {read}"),
                ));
            }

            let n = (C - read).min(buf.len());
            arr[read..read + n].copy_from_slice(&buf[..n]);
            read += n;
            self.consume(n);
        }

        Ok(arr)
    }

    /// Reads exactly `size` bytes.
    fn take_bytes(&mut self, size: usize) -> io::Result<BytesMut> {
        // grow with the data actually present, a bogus length must not allocate up front
        let mut out = BytesMut::with_capacity(size.min(1024));

        while out.len() < size {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("needed {size} bytes, got {}", out.len()),
                ));
            }

            let n = (size - out.len()).min(buf.len());
            out.extend_from_slice(&buf[..n]);
            self.consume(n);
        }

        Ok(out)
    }

    /// Reads everything until EOF.
    fn rest(&mut self) -> io::Result<BytesMut> {
        let mut out = BytesMut::new();
        loop {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Ok(out);
            }
            let n = buf.len();
            out.extend_from_slice(buf);
            self.consume(n);
        }
    }

    /// Drains the reader, returning how many bytes were skipped.
    fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl<B: BufRead> BufReadParsing for B {}
