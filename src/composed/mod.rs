//! Handle OpenPGP objects that are composed of multiple packets: key rings
//! and encrypted messages.
//!
//! See <https://www.rfc-editor.org/rfc/rfc9580#name-packet-sequence-composition>
//!
//! Keys are generated with [`SecretKeyParamsBuilder`] and read with
//! [`PublicKeyRing`] and [`SecretKeyRing`]. Messages are produced with
//! [`encrypt`] and consumed with [`decrypt`].
//!
//! # Example
//!
//! ```rust
//! use pgp_envelope::composed::{
//!     decrypt, encrypt, EncryptionConfig, KeyType, SecretKeyParamsBuilder,
//! };
//! use pgp_envelope::types::Password;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! let secret_ring = SecretKeyParamsBuilder::default()
//!     .key_type(KeyType::Rsa(1024))
//!     .primary_user_id("Me <me@example.com>")
//!     .passphrase("secret")
//!     .build()
//!     .expect("valid key parameters")
//!     .generate(&mut rng)
//!     .expect("key generation");
//! let public_ring = secret_ring.to_public();
//!
//! let config = EncryptionConfig::builder()
//!     .armor(true)
//!     .build()
//!     .expect("valid config");
//! let mut encrypted = Vec::new();
//! encrypt(
//!     &mut rng,
//!     &b"Hello World"[..],
//!     public_ring.encryption_key().unwrap(),
//!     &config,
//!     &mut encrypted,
//! )
//! .expect("encryption");
//!
//! let key = secret_ring
//!     .decryption_key(&Password::from("secret"))
//!     .expect("unlock");
//! let mut plaintext = Vec::new();
//! decrypt(&encrypted[..], &key, &mut plaintext).expect("decryption");
//!
//! assert_eq!(plaintext, b"Hello World");
//! ```

pub mod key;
pub mod message;

mod shared;

pub use self::key::*;
pub use self::message::*;
pub use self::shared::decoder_stream;
