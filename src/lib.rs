//! # pgp-envelope
//!
//! A minimal OpenPGP message engine. It encrypts data to a single RSA or
//! Elgamal key and decrypts such messages again, following
//! [RFC 9580](https://www.rfc-editor.org/rfc/rfc9580.html) for the v4 packet
//! formats.
//!
//! - [`packet`] reads and writes the individual packets.
//! - [`armor`] converts between binary and ASCII armored data.
//! - [`composed`] holds key rings, key generation, [`encrypt`] and [`decrypt`].
//! - [`file`] offers the same operations on paths.
//!
//! Signing and signature verification are not supported, messages carrying
//! signatures are rejected with [`errors::Error::UnsupportedSignedMessage`].

#![forbid(unsafe_code)]

pub(crate) mod util;

pub mod armor;
pub mod composed;
pub mod crypto;
pub mod errors;
pub mod file;
pub mod line_writer;
pub mod packet;
pub mod parsing_reader;
pub mod ser;
pub mod types;

pub use self::composed::{
    decrypt, encrypt, EncryptionConfig, EncryptionConfigBuilder, PrivateKey, PublicKeyRing,
    SecretKeyRing,
};
pub use self::file::{decrypt_file, encrypt_file};
