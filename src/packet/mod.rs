//! # Packet module
//!
//! Parsing and serialization of the individual OpenPGP packets this crate
//! understands. [`PacketParser`] turns a byte stream into [`Packet`]s, or into
//! lazy [`PacketBodyReader`]s for streaming consumers.
//!
//! ```rust
//! use pgp_envelope::packet::{write_packet, LiteralData, Packet, PacketParser};
//!
//! let mut buf = Vec::new();
//! write_packet(&mut buf, &LiteralData::from_bytes("hello.txt", &b"Hello World"[..])).unwrap();
//!
//! let packets = PacketParser::new(&buf[..])
//!     .collect::<pgp_envelope::errors::Result<Vec<Packet>>>()
//!     .unwrap();
//! assert_eq!(packets.len(), 1);
//! ```

mod header;
mod many;
mod packet_sum;
mod packet_trait;
mod reader;

mod compressed_data;
mod key;
mod literal_data;
mod marker;
mod one_pass_signature;
mod public_key_encrypted_session_key;
mod signature;
mod sym_encrypted_data;
mod sym_encrypted_protected_data;
mod user_id;

pub use self::compressed_data::*;
pub use self::header::*;
pub use self::key::*;
pub use self::literal_data::*;
pub use self::many::*;
pub use self::marker::*;
pub use self::one_pass_signature::*;
pub use self::packet_sum::*;
pub use self::packet_trait::*;
pub use self::public_key_encrypted_session_key::*;
pub use self::reader::*;
pub use self::signature::*;
pub use self::sym_encrypted_data::*;
pub use self::sym_encrypted_protected_data::*;
pub use self::user_id::*;
