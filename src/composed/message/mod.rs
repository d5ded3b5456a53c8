mod builder;
mod decrypt;
mod types;

pub use self::builder::{
    encrypt, EncryptionConfig, EncryptionConfigBuilder, DEFAULT_PARTIAL_CHUNK_SIZE,
};
pub use self::decrypt::{decrypt, MAX_NESTING};
pub use self::types::{Edata, Message, Source};
