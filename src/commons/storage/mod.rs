//! Persistent storage of CA material.

pub use self::disk::{Artifact, Error, Scope, Store, LOCK_FILE_NAME};
pub use self::ident::{CommonName, CommonNameError};

mod disk;
mod ident;
