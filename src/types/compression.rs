use num_enum::{FromPrimitive, IntoPrimitive};

/// Available compression algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-compression-algorithms>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
#[non_exhaustive]
pub enum CompressionAlgorithm {
    Uncompressed = 0,
    /// Raw DEFLATE, RFC 1951
    ZIP = 1,
    /// RFC 1950
    ZLIB = 2,
    BZip2 = 3,

    #[num_enum(catch_all)]
    Other(#[cfg_attr(test, proptest(strategy = "4u8.."))] u8),
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::ZIP
    }
}
