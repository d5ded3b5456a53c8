//! # Armor module
//!
//! ASCII Armor as specified in RFC 9580: radix-64 framing with an optional
//! CRC-24 checksum line.

mod reader;
mod writer;

pub use self::reader::*;
pub use self::writer::*;
