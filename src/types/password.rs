use zeroize::Zeroizing;

/// A passphrase used to unlock secret keys. Scrubbed on drop.
#[derive(Clone, Default, derive_more::Debug)]
#[debug("Password(***)")]
pub struct Password(Zeroizing<Vec<u8>>);

impl Password {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(Zeroizing::new(value.into_bytes()))
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(Zeroizing::new(value.as_bytes().to_vec()))
    }
}

impl From<&[u8]> for Password {
    fn from(value: &[u8]) -> Self {
        Self(Zeroizing::new(value.to_vec()))
    }
}

impl From<Zeroizing<Vec<u8>>> for Password {
    fn from(value: Zeroizing<Vec<u8>>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let pw = Password::from("hunter2");
        assert_eq!(format!("{pw:?}"), "Password(***)");
        assert_eq!(pw.as_bytes(), b"hunter2");
    }
}
