use std::fmt;

use crate::errors::{ensure_eq, Result};

/// Represents a Key ID, the low 64 bits of a v4 fingerprint.
#[derive(Clone, Copy, Eq, PartialEq, Hash, derive_more::Debug)]
#[debug("KeyId({})", hex::encode(_0))]
pub struct KeyId([u8; 8]);

impl KeyId {
    /// The all zero key id, used by anonymous recipients.
    pub const WILDCARD: KeyId = KeyId([0u8; 8]);

    pub const fn new(id: [u8; 8]) -> Self {
        Self(id)
    }

    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        ensure_eq!(input.len(), 8, "invalid key id length");
        let mut r = [0u8; 8];
        r.copy_from_slice(input);

        Ok(KeyId(r))
    }

    pub fn is_wildcard(&self) -> bool {
        self == &Self::WILDCARD
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// A v4 key fingerprint.
#[derive(Clone, Copy, Eq, PartialEq, Hash, derive_more::Debug)]
#[debug("Fingerprint({})", hex::encode(_0))]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    pub const fn new(fp: [u8; 20]) -> Self {
        Self(fp)
    }

    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[12..]);
        KeyId(id)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_fingerprint_suffix() {
        let fp = Fingerprint::new(hex_literal::hex!(
            "7c8f6e7d3c1fa0b04bcd8b3a0d6e5f1123456789"
        ));
        assert_eq!(fp.key_id(), KeyId::new(hex_literal::hex!("0d6e5f1123456789")));
        assert_eq!(fp.key_id().to_string(), "0D6E5F1123456789");
    }

    #[test]
    fn wildcard() {
        assert!(KeyId::WILDCARD.is_wildcard());
        assert!(KeyId::from_slice(&[0; 8]).unwrap().is_wildcard());
        assert!(KeyId::from_slice(&[0; 7]).is_err());
    }
}
