use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use num_bigint::BigUint;
use zeroize::Zeroize;

use crate::errors::{malformed, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// Number of bits we accept when reading MPIs, same limit as gnupg.
const MAX_EXTERN_MPI_BITS: u16 = 16384;

/// An owned multiprecision integer, stored big endian without leading zeros.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-multiprecision-integers>
#[derive(Default, Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Mpi(#[debug("{}", hex::encode(_0))] Bytes);

impl Mpi {
    /// Reads a length prefixed MPI.
    pub fn from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let len_bits = r.read_be_u16()?;
        if len_bits > MAX_EXTERN_MPI_BITS {
            malformed!("MPI of {} bits is too large", len_bits);
        }

        let len_bytes = usize::from(len_bits.div_ceil(8));
        let raw = r.take_bytes(len_bytes)?.freeze();
        let start = raw.len() - strip_leading_zeros(&raw).len();

        Ok(Mpi(raw.slice(start..)))
    }

    /// Wraps raw big endian bytes, which are not length prefixed.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(Bytes::copy_from_slice(strip_leading_zeros(raw)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bit_len(&self) -> usize {
        match self.0.first() {
            None => 0,
            Some(first) => self.0.len() * 8 - first.leading_zeros() as usize,
        }
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Left pads the value with zeros to `size` bytes.
    pub fn to_padded(&self, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size.saturating_sub(self.0.len())];
        out.extend_from_slice(&self.0);
        out
    }
}

impl From<&BigUint> for Mpi {
    fn from(n: &BigUint) -> Self {
        let mut bytes = n.to_bytes_be();
        let mpi = Mpi::from_slice(&bytes);
        bytes.zeroize();
        mpi
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<BigEndian>(u16::try_from(self.bit_len())?)?;
        w.write_all(&self.0)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.0.len()
    }
}

#[inline]
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
