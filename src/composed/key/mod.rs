mod builder;
mod public;
mod secret;
mod shared;

pub use self::builder::*;
pub use self::public::*;
pub use self::secret::*;
pub use self::shared::*;
