mod compression;
mod key_flags;
mod key_id;
mod mpi;
mod packet;
mod params;
mod password;
mod s2k;

pub use self::compression::CompressionAlgorithm;
pub use self::key_flags::KeyFlags;
pub use self::key_id::{Fingerprint, KeyId};
pub use self::mpi::Mpi;
pub use self::packet::{PacketHeaderVersion, PacketLength, Tag};
pub use self::params::{EncryptedSecretParams, PlainSecretParams, PublicParams, SecretParams};
pub use self::password::Password;
pub use self::s2k::{StringToKey, DEFAULT_ITER_COUNT};
