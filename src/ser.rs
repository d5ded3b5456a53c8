//! # Serialize trait module

use std::io;

use chrono::{DateTime, Utc};

use crate::errors::Result;

pub trait Serialize {
    fn to_writer<W: io::Write>(&self, _: &mut W) -> Result<()>;
    fn write_len(&self) -> usize;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.write_len());
        self.to_writer(&mut buf)?;

        Ok(buf)
    }
}

impl<T: Serialize> Serialize for &T {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        (*self).to_writer(writer)
    }

    fn write_len(&self) -> usize {
        (*self).write_len()
    }
}

impl<T: Serialize> Serialize for Vec<T> {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for x in self.iter() {
            x.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.iter().map(|w| w.write_len()).sum()
    }
}

/// OpenPGP timestamps are unsigned 32 bit seconds, clamped on overflow.
pub(crate) fn timestamp_to_u32(t: &DateTime<Utc>) -> u32 {
    u32::try_from(t.timestamp()).unwrap_or(if t.timestamp() < 0 { 0 } else { u32::MAX })
}

pub(crate) fn u32_to_timestamp(secs: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(secs), 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_clamp() {
        let t = u32_to_timestamp(1_700_000_000);
        assert_eq!(timestamp_to_u32(&t), 1_700_000_000);

        let before_epoch = DateTime::from_timestamp(-5, 0).unwrap();
        assert_eq!(timestamp_to_u32(&before_epoch), 0);
    }
}
