use std::num::TryFromIntError;

use snafu::Snafu;

use crate::types::{KeyId, Tag};

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Error types
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("malformed packet: {message}"))]
    MalformedPacket { message: String },
    #[snafu(display("armor checksum mismatch: expected {expected:06x}, computed {actual:06x}"))]
    ArmorChecksumMismatch { expected: u32, actual: u32 },
    #[snafu(display("invalid armor framing: {message}"))]
    ArmorFraming { message: String },
    #[snafu(display("no encryption capable key found in key ring"))]
    NoEncryptionKey,
    #[snafu(display("no usable secret key found in key ring"))]
    NoSecretKey,
    #[snafu(display("wrong passphrase for secret key {key_id}"))]
    WrongPassphrase { key_id: KeyId },
    #[snafu(display("unsupported compression algorithm {algorithm}"))]
    UnsupportedCompression { algorithm: u8 },
    #[snafu(display("input does not contain encrypted data"))]
    NoEncryptedData,
    #[snafu(display("message is not encrypted to key {key_id}"))]
    KeyMismatch { key_id: KeyId },
    #[snafu(display("session key decryption failed: {message}"))]
    DecryptionFailed { message: String },
    #[snafu(display("Modification Detection Code error"))]
    IntegrityCheckFailed,
    #[snafu(display("encrypted message contains a signed message, not literal data"))]
    UnsupportedSignedMessage,
    #[snafu(display("unexpected packet {tag:?}, message is not a simple encrypted file"))]
    UnexpectedMessageType { tag: Tag },
    #[snafu(display("message nesting exceeds {max} layers"))]
    NestingTooDeep { max: usize },

    #[snafu(transparent)]
    Base64Decode { source: base64::DecodeError },
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
    #[snafu(display("IO error: {source}"))]
    IO { source: std::io::Error },
    #[snafu(display("invalid key length"))]
    InvalidKeyLength,
    /// Signals packet versions and parameters we don't support
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
}

impl Error {
    /// Re-labels truncation style IO failures, which while parsing a packet body
    /// mean that the declared length does not match the available data.
    pub(crate) fn into_malformed(self, context: &str) -> Self {
        match self {
            Error::IO { source }
                if matches!(
                    source.kind(),
                    std::io::ErrorKind::UnexpectedEof
                        | std::io::ErrorKind::InvalidInput
                        | std::io::ErrorKind::InvalidData
                ) =>
            {
                Error::MalformedPacket {
                    message: format!("{context}: {source}"),
                }
            }
            err => err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        // typed errors raised inside `Read` adapters travel wrapped in io::Error
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(err)) => *err,
                Some(Err(inner)) => Error::IO {
                    source: std::io::Error::new(kind, inner),
                },
                None => Error::IO {
                    source: kind.into(),
                },
            };
        }

        Error::IO { source: err }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::IO { source } => source,
            err => std::io::Error::other(err),
        }
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::InvalidKeyLength
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::Message { message: err }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::Message {
            message: err.to_string(),
        }
    }
}

macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! malformed {
    ($e:expr) => {
        return Err($crate::errors::Error::MalformedPacket { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::MalformedPacket { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message { message: format!($fmt, $($arg)+) }
    };
}

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            $crate::errors::bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::errors::bail!($fmt, $($arg)+);
        }
    };
}

macro_rules! ensure_eq {
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(
                        "assertion failed: `(left == right)` left: `{:?}`, right: `{:?}`: {}",
                        left_val,
                        right_val,
                        format_args!($($arg)+)
                    )
                }
            }
        }
    });
}

pub(crate) use bail;
pub(crate) use ensure;
pub(crate) use ensure_eq;
pub(crate) use format_err;
pub(crate) use malformed;
pub(crate) use unsupported_err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_error_survives_io_roundtrip() {
        let io_err: std::io::Error = Error::IntegrityCheckFailed.into();
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IntegrityCheckFailed));
    }

    #[test]
    fn plain_io_error_stays_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IO { .. }));

        let err = err.into_malformed("literal data");
        assert!(matches!(err, Error::MalformedPacket { .. }));
    }
}
